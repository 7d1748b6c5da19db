// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Native event translation, filters, error handling and display state.

use std::cell::RefCell;
use std::rc::Rc;

use keyboard_types::Key;
use test_log::test;

use super::*;
use crate::backend::headless::Headless;
use crate::backend::{Backend, InputInfo, NativeEvent, NativeEventKind, NativeGc, NativeWindow, NativeWindowAttributes};
use crate::display::Atom;
use crate::event::ScrollDirection;
use crate::{
    Display, Error, Event, EventMask, FilterReturn, Rectangle, WindowAttributes, WindowClass, WindowId,
    WindowType,
};

fn at(x: i32, y: i32) -> InputInfo {
    InputInfo {
        time: 42,
        x,
        y,
        x_root: x,
        y_root: y,
        state: 0,
    }
}

#[test]
fn pointer_positions_are_logical() {
    let (backend, mut display) = display();
    let scene = scene(&mut display);
    display.move_window(scene.canvas, -50_000, 0);
    drain(&mut display);
    let native = display.native_window(scene.canvas).unwrap();

    backend.inject_window_event(
        native,
        NativeEventKind::ButtonPress {
            info: at(16784, 5),
            button: 1,
        },
    );
    match display.get_next_event() {
        Some(Event::ButtonPress(press)) => {
            assert_eq!(press.window, scene.canvas);
            assert_eq!((press.pointer.x, press.pointer.y), (50_400, 5));
            assert_eq!(press.pointer.x_root, 16784);
            assert_eq!(press.button, 1);
        }
        other => panic!("expected a button press, got {other:?}"),
    }
}

#[test]
fn wheel_buttons_scroll() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();

    for (button, direction) in [
        (4, ScrollDirection::Up),
        (5, ScrollDirection::Down),
        (6, ScrollDirection::Left),
        (7, ScrollDirection::Right),
    ] {
        backend.inject_window_event(
            native,
            NativeEventKind::ButtonPress {
                info: at(1, 2),
                button,
            },
        );
        backend.inject_window_event(
            native,
            NativeEventKind::ButtonRelease {
                info: at(1, 2),
                button,
            },
        );
        match drain(&mut display).as_slice() {
            [Event::Scroll(scroll)] => assert_eq!(scroll.direction, direction),
            other => panic!("button {button}: {other:?}"),
        }
    }
}

#[test]
fn unselected_events_are_dropped() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();

    backend.inject_window_event(
        native,
        NativeEventKind::Motion {
            info: at(3, 3),
            is_hint: false,
        },
    );
    backend.inject_window_event(native, NativeEventKind::Focus { focus_in: true });
    backend.inject_window_event(
        NativeWindow(0x5eed),
        NativeEventKind::ButtonPress {
            info: at(0, 0),
            button: 1,
        },
    );
    assert!(drain(&mut display).is_empty());

    display.set_events(frame.viewport, TEST_EVENTS | EventMask::FOCUS_CHANGE);
    assert!(display.get_events(frame.viewport).contains(EventMask::FOCUS_CHANGE));
    backend.inject_window_event(native, NativeEventKind::Focus { focus_in: true });
    assert_eq!(
        drain(&mut display),
        vec![Event::Focus {
            window: frame.viewport,
            focus_in: true
        }]
    );
}

#[test]
fn keys_are_translated() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.top).unwrap();

    for (keyval, key) in [(0xff0d, Key::Enter), (0x61, Key::Character("a".into()))] {
        backend.inject_window_event(
            native,
            NativeEventKind::KeyPress {
                info: at(0, 0),
                keycode: 36,
                keyval,
            },
        );
        match display.get_next_event() {
            Some(Event::KeyPress(press)) => {
                assert_eq!(press.window, frame.top);
                assert_eq!(press.key, key);
                assert_eq!(press.keyval, keyval);
                assert_eq!(press.hardware_keycode, 36);
            }
            other => panic!("expected a key press, got {other:?}"),
        }
    }
    // Releases were not selected.
    backend.inject_window_event(
        native,
        NativeEventKind::KeyRelease {
            info: at(0, 0),
            keycode: 36,
            keyval: 0xff0d,
        },
    );
    assert_eq!(display.get_next_event(), None);
}

#[test]
fn filters_run_before_translation() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let native = display.native_window(frame.viewport).unwrap();
    let viewport = frame.viewport;

    let no_right_clicks = display
        .add_filter(None, |event| match event {
            NativeEvent::Window {
                kind: NativeEventKind::ButtonPress { button: 3, .. },
                ..
            } => FilterReturn::Remove,
            _ => FilterReturn::Continue,
        })
        .unwrap();
    display.add_filter(Some(viewport), move |event| match event {
        NativeEvent::Window {
            kind: NativeEventKind::Focus { .. },
            ..
        } => FilterReturn::Translate(Event::Delete { window: viewport }),
        _ => FilterReturn::Continue,
    });

    let press = |button| NativeEventKind::ButtonPress {
        info: at(0, 0),
        button,
    };
    backend.inject_window_event(native, press(3));
    backend.inject_window_event(native, press(1));
    backend.inject_window_event(native, NativeEventKind::Focus { focus_in: false });
    let events = drain(&mut display);
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(&events[0], Event::ButtonPress(e) if e.button == 1));
    assert_eq!(events[1], Event::Delete { window: viewport });

    assert!(display.remove_filter(no_right_clicks));
    assert!(!display.remove_filter(no_right_clicks));
    backend.inject_window_event(native, press(3));
    assert!(matches!(drain(&mut display).as_slice(), [Event::ButtonPress(e)] if e.button == 3));
}

#[test]
fn put_event_goes_to_the_back_of_the_queue() {
    let (_backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);

    display.put_event(Event::Delete { window: frame.top });
    display.put_event(Event::Delete {
        window: frame.viewport,
    });
    assert!(display.events_pending());
    assert_eq!(display.peek_event(), Some(&Event::Delete { window: frame.top }));
    assert_eq!(
        drain(&mut display),
        vec![
            Event::Delete { window: frame.top },
            Event::Delete {
                window: frame.viewport
            }
        ]
    );
}

#[test]
fn window_manager_configures_toplevels() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);
    drain(&mut display);
    let top = display.native_window(frame.top).unwrap();
    let viewport = display.native_window(frame.viewport).unwrap();

    backend.inject_window_event(
        top,
        NativeEventKind::Configure {
            x: 50,
            y: 60,
            width: 640,
            height: 480,
        },
    );
    backend.inject_window_event(
        viewport,
        NativeEventKind::Configure {
            x: 5,
            y: 5,
            width: 10,
            height: 10,
        },
    );
    assert_eq!(
        drain(&mut display),
        vec![Event::Configure {
            window: frame.top,
            x: 50,
            y: 60,
            width: 640,
            height: 480
        }]
    );
    assert_eq!(display.get_geometry(frame.top), Some(Rectangle::new(50, 60, 640, 480)));
    assert_eq!(display.get_geometry(frame.viewport), Some(Rectangle::new(0, 0, 800, 600)));
}

#[test]
fn destroy_reports_children_first() {
    let (backend, mut display) = display();
    let scene = scene(&mut display);
    let native = display.native_window(scene.top).unwrap();

    display.destroy_window(scene.top);
    assert!(display.is_destroyed(scene.canvas));
    assert!(backend.window_state(native).is_none());
    assert_eq!(
        drain(&mut display),
        vec![
            Event::Destroy {
                window: scene.canvas
            },
            Event::Destroy {
                window: scene.viewport
            },
            Event::Destroy { window: scene.top },
        ]
    );
    // Destroying again is harmless.
    display.destroy_window(scene.top);
    assert!(drain(&mut display).is_empty());
}

#[test]
fn popups_bypass_the_window_manager() {
    let (backend, mut display) = display();
    let redirected = |display: &Display<Headless>, id: WindowId| {
        display
            .native_window(id)
            .and_then(|native| backend.window_state(native))
            .map(|state| state.override_redirect)
    };
    let rect = Rectangle::new(0, 0, 50, 50);
    let top = shown_window(&mut display, None, WindowType::Toplevel, rect);
    let temp = shown_window(&mut display, None, WindowType::Temp, rect);
    let menu = display
        .create_window(
            None,
            &WindowAttributes {
                window_type: WindowType::Toplevel,
                override_redirect: true,
                ..WindowAttributes::default()
            },
        )
        .unwrap();
    assert_eq!(redirected(&display, top), Some(false));
    assert_eq!(redirected(&display, temp), Some(true));
    assert_eq!(redirected(&display, menu), Some(true));
}

#[test]
fn foreign_windows_are_adopted() {
    let (backend, mut display) = display();
    let attrs = NativeWindowAttributes {
        x: 20,
        y: 30,
        width: 200,
        height: 100,
        class: WindowClass::InputOutput,
        window_type: WindowType::Toplevel,
        depth: 24,
        colormap: None,
        background: None,
        event_mask: EventMask::empty(),
        override_redirect: false,
        title: None,
        wmclass: None,
    };
    let native = backend.create_window(backend.root_window(), &attrs).unwrap();

    let id = display.foreign_new(native).unwrap();
    assert_eq!(display.foreign_new(native), Some(id));
    assert_eq!(display.window_type(id), Some(WindowType::Foreign));
    assert_eq!(display.get_geometry(id), Some(Rectangle::new(20, 30, 200, 100)));
    assert_eq!(display.lookup(native), Some(id));
    assert_eq!(display.foreign_new(NativeWindow(0x5eed)), None);
}

#[test]
fn error_traps_nest() {
    let (backend, mut display) = display();

    display.push_error_trap();
    display.push_error_trap();
    backend.map_window(NativeWindow(0x5eed));
    backend.free_gc(NativeGc(0x5eed));
    let inner = display.pop_error_trap().unwrap();
    // BadWindow, the first of the two failures.
    assert_eq!(inner.code, 3);
    assert_eq!(inner.resource, 0x5eed);

    backend.free_gc(NativeGc(0x5eed));
    let outer = display.pop_error_trap().unwrap();
    // BadGC
    assert_eq!(outer.code, 13);

    display.push_error_trap();
    assert_eq!(display.pop_error_trap(), None);
    assert_eq!(display.pop_error_trap(), None);
}

#[test]
fn untrapped_errors_are_fatal() {
    let (backend, mut display) = display();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    display.set_fatal_handler(move |err| sink.borrow_mut().push(err.clone()));

    backend.map_window(NativeWindow(0x5eed));
    display.sync();
    backend.inject(NativeEvent::ConnectionLost);
    assert!(!display.events_pending());

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(matches!(seen[0], Error::Protocol(err) if err.code == 3));
    assert!(matches!(seen[1], Error::ConnectionLost));
}

#[test]
fn close_is_idempotent() {
    let (backend, mut display) = display();
    let frame = frame(&mut display);

    display.close();
    assert!(display.is_closed());
    assert!(backend.is_closed());
    assert!(display.is_destroyed(frame.top));
    display.close();

    let attrs = crate::WindowAttributes::default();
    assert!(matches!(display.create_window(None, &attrs), Err(Error::DisplayClosed)));
    assert!(!display.events_pending());
}

#[test]
fn atoms_are_cached() {
    let (backend, mut display) = display();

    assert_eq!(display.intern_atom("WM_NAME", true), Some(Atom(39)));
    assert_eq!(display.intern_atom("GDK_SHELL_TEST", true), None);
    let atom = display.intern_atom("GDK_SHELL_TEST", false).unwrap();
    assert_eq!(atom, Atom(69));
    assert_eq!(display.atom_name(atom).as_deref(), Some("GDK_SHELL_TEST"));
    assert_eq!(display.atom_name(Atom(31)).as_deref(), Some("STRING"));

    backend.clear_requests();
    display.intern_atom("GDK_SHELL_TEST", false);
    display.atom_name(Atom(31));
    assert!(backend.requests().is_empty());
}

#[test]
fn core_pointer_is_listed() {
    let (_backend, display) = display();
    let pointer = display.core_pointer().unwrap();
    assert_eq!(pointer.name, "Core Pointer");
    assert!(pointer.has_cursor);
    assert_eq!(display.list_devices().len(), 1);
}
