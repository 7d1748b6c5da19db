// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Invalidation, update processing and content moves.

use std::ops::ControlFlow;

use test_log::test;

use super::*;
use crate::backend::headless::Request;
use crate::backend::{NativeEvent, NativeEventKind, Serial};
use crate::{Event, MainLoop, Point, Rectangle, Region, WindowId, WindowType};

fn stale_expose(window: crate::NativeWindow, serial: Serial, area: Rectangle) -> NativeEvent {
    NativeEvent::Window {
        window,
        serial,
        kind: NativeEventKind::Expose { area, count: 0 },
    }
}

#[test]
fn invalidation_reaches_covered_children() {
    let (_backend, mut display) = display();
    let frame = frame(&mut display);
    let button = shown_window(
        &mut display,
        Some(frame.viewport),
        WindowType::Child,
        Rectangle::new(10, 10, 50, 50),
    );
    drain(&mut display);

    display.invalidate_rect(frame.viewport, Some(Rectangle::new(0, 0, 30, 30)), true);
    display.process_updates(frame.viewport, true);
    let exposed: Vec<(WindowId, Rectangle)> = drain(&mut display)
        .into_iter()
        .map(|event| match event {
            Event::Expose { window, area, .. } => (window, area),
            other => panic!("expected an expose, got {other:?}"),
        })
        .collect();
    assert_eq!(
        exposed,
        vec![
            (frame.viewport, Rectangle::new(0, 0, 30, 30)),
            (button, Rectangle::new(0, 0, 20, 20)),
        ]
    );

    // Painted areas are gone.
    display.process_all_updates();
    assert!(drain(&mut display).is_empty());
}

#[test]
fn hidden_windows_collect_no_updates() {
    let (_backend, mut display) = display();
    let frame = frame(&mut display);
    display.hide(frame.viewport);
    drain(&mut display);

    display.invalidate_rect(frame.viewport, None, false);
    assert_eq!(display.get_update_area(frame.viewport), None);

    display.show(frame.viewport);
    display.invalidate_rect(frame.viewport, Some(Rectangle::new(700, 500, 300, 300)), false);
    let area = display.get_update_area(frame.viewport).unwrap();
    assert_eq!(area.clipbox(), Rectangle::new(700, 500, 100, 100));
}

#[test]
fn move_region_carries_pending_damage() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    display.invalidate_rect(frame.viewport, Some(Rectangle::new(10, 10, 20, 20)), false);
    backend.clear_requests();

    let moved = Region::from_rect(Rectangle::new(0, 0, 100, 100));
    display.move_region(frame.viewport, &moved, 50, 0);

    let area = display.get_update_area(frame.viewport).unwrap();
    assert!(area.point_in(65, 15));
    assert!(area.point_in(45, 50));
    assert!(!area.point_in(100, 50));

    let copies: Vec<Request> = backend
        .requests()
        .into_iter()
        .map(|(_, r)| r)
        .filter(|r| matches!(r, Request::SetClipRectangles { .. } | Request::CopyArea { .. }))
        .collect();
    assert_eq!(copies.len(), 3, "{copies:?}");
    assert!(matches!(
        &copies[0],
        Request::SetClipRectangles { rects: Some(rects), .. } if rects == &[Rectangle::new(50, 0, 100, 100)]
    ));
    assert!(matches!(
        &copies[1],
        Request::CopyArea { src_rect, dst_origin, .. }
            if *src_rect == Rectangle::new(0, 0, 100, 100) && *dst_origin == Point::new(50, 0)
    ));
    assert!(matches!(&copies[2], Request::SetClipRectangles { rects: None, .. }));
}

#[test]
fn stale_exposes_follow_moved_regions() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();
    let before = backend.last_serial();

    let moved = Region::from_rect(Rectangle::new(0, 0, 100, 100));
    display.move_region(frame.viewport, &moved, 50, 0);
    display.get_update_area(frame.viewport);

    backend.inject(stale_expose(native, before, Rectangle::new(20, 20, 10, 10)));
    backend.inject(stale_expose(native, before, Rectangle::new(300, 300, 10, 10)));
    assert!(!display.events_pending());

    let area = display.get_update_area(frame.viewport).unwrap();
    assert!(area.point_in(75, 25));
    assert!(!area.point_in(25, 25));
    assert!(area.point_in(305, 305));
}

#[test]
fn painted_areas_cancel_stale_exposes() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();

    display.invalidate_rect(frame.viewport, Some(Rectangle::new(0, 0, 100, 100)), false);
    let before = backend.last_serial();
    display.process_all_updates();
    assert!(matches!(drain(&mut display).as_slice(), [Event::Expose { .. }]));

    backend.inject(stale_expose(native, before, Rectangle::new(10, 10, 20, 20)));
    backend.inject(stale_expose(native, before, Rectangle::new(90, 90, 20, 20)));
    assert!(!display.events_pending());

    let area = display.get_update_area(frame.viewport).unwrap();
    assert!(area.point_in(105, 105));
    assert!(!area.point_in(95, 95));
    assert!(!area.point_in(15, 15));
}

#[test]
fn main_loop_paints_then_dispatches() {
    let (_backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    display.invalidate_rect(frame.viewport, Some(Rectangle::new(0, 0, 10, 10)), false);

    let mut main_loop = MainLoop::new(display);
    let mut seen = Vec::new();
    main_loop.run(|display, event| {
        let done = matches!(event, Event::Delete { .. });
        if let Event::Expose { window, .. } = &event {
            display.put_event(Event::Delete { window: *window });
        }
        seen.push(event);
        if done {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    assert_eq!(seen.len(), 2);
    assert!(matches!(&seen[0], Event::Expose { window, .. } if *window == frame.viewport));
    assert_eq!(seen[1], Event::Delete { window: frame.viewport });
    assert!(main_loop.quit_handle().is_quit());
    assert!(!main_loop.iteration(false, &mut |_, _| ControlFlow::Continue(())));
}
