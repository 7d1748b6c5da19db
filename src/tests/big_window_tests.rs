// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Windows larger than the native coordinate range, and the moves and
//! scrolls that keep them inside it.

use test_log::test;

use super::*;
use crate::backend::headless::Request;
use crate::backend::{NativeEvent, NativeEventKind, Serial};
use crate::{Event, Point, Rectangle, WindowType};

#[test]
fn big_window_is_clamped_to_native_range() {
    let (backend, mut display) = display();
    let scene = scene(&mut display);
    let native = display.native_window(scene.canvas).unwrap();

    let info = display.position_info(scene.canvas).unwrap();
    assert!(info.big);
    assert_eq!((info.x, info.width, info.x_offset), (0, 32768, 0));
    assert_eq!(info.clip_rect, Rectangle::new(0, 0, 800, 50));

    display.move_window(scene.canvas, -50_000, 0);
    let info = display.position_info(scene.canvas).unwrap();
    assert_eq!((info.x, info.width), (-16384, 32768));
    assert_eq!(display.get_offsets(scene.canvas), (33616, 0));
    assert_eq!(info.clip_rect, Rectangle::new(50_000, 0, 800, 50));
    assert_eq!(display.get_geometry(scene.canvas), Some(Rectangle::new(-50_000, 0, 100_000, 50)));

    let state = backend.window_state(native).unwrap();
    assert_eq!((state.x, state.width), (-16384, 32768));
    assert!(state.mapped);
}

#[test]
fn far_moves_unmap_natively_but_not_for_the_toolkit() {
    let (backend, mut display) = display();
    let scene = scene(&mut display);
    let native = display.native_window(scene.canvas).unwrap();

    display.move_window(scene.canvas, -200_000, 0);
    assert!(!display.position_info(scene.canvas).unwrap().mapped);
    assert!(!backend.window_state(native).unwrap().mapped);
    assert!(display.is_visible(scene.canvas));

    display.move_window(scene.canvas, -50_000, 0);
    assert!(display.position_info(scene.canvas).unwrap().mapped);
    assert!(backend.window_state(native).unwrap().mapped);

    // The unmap and map are swallowed; the area back in view is repainted.
    display.process_all_updates();
    let events = drain(&mut display);
    assert_eq!(events.len(), 1, "{events:?}");
    match &events[0] {
        Event::Expose { window, area, .. } => {
            assert_eq!(*window, scene.canvas);
            assert_eq!(*area, Rectangle::new(50_000, 0, 800, 50));
        }
        other => panic!("expected an expose, got {other:?}"),
    }
}

#[test]
fn children_of_big_windows_agree_with_the_server() {
    let (backend, mut display) = display();
    let scene = scene(&mut display);
    let marker = shown_window(
        &mut display,
        Some(scene.canvas),
        WindowType::Child,
        Rectangle::new(50_300, 10, 20, 20),
    );
    let canvas_native = display.native_window(scene.canvas).unwrap();
    let marker_native = display.native_window(marker).unwrap();

    display.move_window(scene.canvas, -50_000, 0);

    let info = display.position_info(marker).unwrap();
    assert_eq!((info.x, info.y), (16684, 10));
    assert_eq!(display.get_offsets(marker), (0, 0));
    assert!(info.mapped);

    let canvas = backend.window_state(canvas_native).unwrap();
    let marker = backend.window_state(marker_native).unwrap();
    assert_eq!((marker.x, marker.y), (16684, 10));
    // 300 pixels into the viewport, where logical x 50300 now sits.
    assert_eq!(i32::from(canvas.x) + i32::from(marker.x), 300);
}

#[test]
fn guffaw_scroll_moves_children_with_gravity() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    let button = shown_window(
        &mut display,
        Some(frame.viewport),
        WindowType::Child,
        Rectangle::new(10, 10, 50, 50),
    );
    drain(&mut display);
    let viewport_native = display.native_window(frame.viewport).unwrap();
    let button_native = display.native_window(button).unwrap();
    backend.clear_requests();

    display.scroll(frame.viewport, -100, 0);

    assert_eq!(display.get_position(button), Some((-90, 10)));
    assert_eq!(display.position_info(button).unwrap().x, -90);
    assert_eq!(backend.window_state(button_native).unwrap().x, -90);
    let viewport = backend.window_state(viewport_native).unwrap();
    assert_eq!((viewport.x, viewport.y, viewport.width), (0, 0, 800));

    let requests = backend.requests();
    assert!(requests
        .iter()
        .any(|(_, r)| matches!(r, Request::SetWinGravity { window, static_gravity: true } if *window == button_native)));
    assert!(!requests.iter().any(|(_, r)| matches!(r, Request::CopyArea { .. })));

    let area = display.get_update_area(frame.viewport).unwrap();
    assert_eq!(area.clipbox(), Rectangle::new(700, 0, 100, 600));
}

#[test]
fn stale_exposes_follow_a_guffaw_scroll() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    shown_window(
        &mut display,
        Some(frame.viewport),
        WindowType::Child,
        Rectangle::new(10, 10, 50, 50),
    );
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();
    let before = backend.last_serial();

    display.scroll(frame.viewport, -100, 0);
    backend.inject(NativeEvent::Window {
        window: native,
        serial: before,
        kind: NativeEventKind::Expose {
            area: Rectangle::new(300, 0, 50, 50),
            count: 0,
        },
    });
    assert!(!display.events_pending());

    let area = display.get_update_area(frame.viewport).unwrap();
    assert!(area.point_in(210, 10));
    assert!(!area.point_in(310, 10));
    assert!(area.point_in(750, 300));
}

#[test]
fn copy_scroll_translates_stale_exposes() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();
    let before = backend.last_serial();
    backend.clear_requests();

    display.scroll(frame.viewport, 0, -30);

    let copy = backend.requests().into_iter().find_map(|(_, r)| match r {
        Request::CopyArea {
            src_rect,
            dst_origin,
            ..
        } => Some((src_rect, dst_origin)),
        _ => None,
    });
    assert_eq!(copy, Some((Rectangle::new(0, 30, 800, 570), Point::new(0, 0))));

    let expose = |serial: Serial, area: Rectangle| NativeEvent::Window {
        window: native,
        serial,
        kind: NativeEventKind::Expose { area, count: 0 },
    };
    backend.inject(expose(before, Rectangle::new(100, 100, 10, 10)));
    backend.inject(expose(backend.last_serial(), Rectangle::new(100, 300, 10, 10)));
    assert!(!display.events_pending());

    let area = display.get_update_area(frame.viewport).unwrap();
    assert!(area.point_in(105, 75));
    assert!(!area.point_in(105, 105));
    assert!(area.point_in(105, 305));
    assert!(area.point_in(400, 580));
    // The fresh expose retired the translation.
    assert_eq!(display.translate_queue.len(), 0);
}

#[test]
fn translation_queue_is_bounded() {
    let (_backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);

    for _ in 0..crate::position::MAX_QUEUE_LEN {
        display.scroll(frame.viewport, 0, -1);
    }
    assert_eq!(display.translate_queue.len(), crate::position::MAX_QUEUE_LEN);

    // No expose can predate the queued items any more.
    display.scroll(frame.viewport, 0, -1);
    assert_eq!(display.translate_queue.len(), 1);
}

#[test]
fn pending_stale_exposes_keep_translations_alive() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();
    let before = backend.last_serial();

    for _ in 0..crate::position::MAX_QUEUE_LEN {
        display.scroll(frame.viewport, 0, -1);
    }
    backend.inject(NativeEvent::Window {
        window: native,
        serial: before,
        kind: NativeEventKind::Expose {
            area: Rectangle::new(100, 400, 10, 10),
            count: 0,
        },
    });
    display.scroll(frame.viewport, 0, -1);
    assert_eq!(display.translate_queue.len(), crate::position::MAX_QUEUE_LEN + 1);

    assert!(!display.events_pending());
    let area = display.get_update_area(frame.viewport).unwrap();
    assert!(area.point_in(105, 340));
    assert!(!area.point_in(105, 405));
    assert!(area.point_in(400, 560));
}

#[test]
fn ancestors_at_the_end_of_the_coordinate_space() {
    let (_backend, mut display) = display();
    let frame = frame(&mut display);
    let square = Rectangle::new(0, 0, 10, 10);
    let far = shown_window(
        &mut display,
        Some(frame.viewport),
        WindowType::Child,
        Rectangle::new(i32::MIN, 0, 10, 10),
    );
    let inner = shown_window(&mut display, Some(far), WindowType::Child, square);
    let leaf = shown_window(&mut display, Some(inner), WindowType::Child, square);

    assert_eq!(display.get_position(leaf), Some((0, 0)));
    assert_eq!(display.get_origin(far), Some(Point::new(i32::MIN, 0)));
    assert!(display.position_info(leaf).unwrap().clip_rect.is_empty());

    display.move_window(far, i32::MIN, -5);
    assert_eq!(display.get_origin(leaf), Some(Point::new(i32::MIN, -5)));
    drain(&mut display);
}
