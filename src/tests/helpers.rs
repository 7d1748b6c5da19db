// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Helper types and functions for the scenario tests.

use crate::backend::headless::{Headless, HeadlessConfig};
use crate::{Display, DisplayConfig, Event, EventMask, Rectangle, WindowAttributes, WindowId, WindowType};

/// What the test windows select.
pub(crate) const TEST_EVENTS: EventMask = EventMask::from_bits_truncate(
    EventMask::EXPOSURE.bits()
        | EventMask::STRUCTURE.bits()
        | EventMask::BUTTON_PRESS.bits()
        | EventMask::BUTTON_RELEASE.bits()
        | EventMask::KEY_PRESS.bits(),
);

pub(crate) fn display() -> (Headless, Display<Headless>) {
    display_with(HeadlessConfig::default())
}

pub(crate) fn display_with(config: HeadlessConfig) -> (Headless, Display<Headless>) {
    let backend = Headless::new(config);
    let display = Display::with_backend(backend.clone(), DisplayConfig::default())
        .expect("headless display");
    (backend, display)
}

/// Creates and shows a window selecting [`TEST_EVENTS`].
pub(crate) fn shown_window(
    display: &mut Display<Headless>,
    parent: Option<WindowId>,
    window_type: WindowType,
    rect: Rectangle,
) -> WindowId {
    let attrs = WindowAttributes {
        window_type,
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
        event_mask: TEST_EVENTS,
        ..WindowAttributes::default()
    };
    let id = display.create_window(parent, &attrs).expect("create window");
    display.show(id);
    id
}

/// Everything queued so far, without painting pending updates.
pub(crate) fn drain(display: &mut Display<Headless>) -> Vec<Event> {
    std::iter::from_fn(|| display.get_next_event()).collect()
}

/// An 800x600 toplevel whose viewport child covers it.
pub(crate) struct Frame {
    pub top: WindowId,
    pub viewport: WindowId,
}

pub(crate) fn frame(display: &mut Display<Headless>) -> Frame {
    let top = shown_window(display, None, WindowType::Toplevel, Rectangle::new(0, 0, 800, 600));
    let viewport = shown_window(display, Some(top), WindowType::Child, Rectangle::new(0, 0, 800, 600));
    Frame { top, viewport }
}

/// A [`Frame`] whose viewport holds a canvas far wider than the native
/// coordinate range.
pub(crate) struct Scene {
    pub top: WindowId,
    pub viewport: WindowId,
    pub canvas: WindowId,
}

pub(crate) fn scene(display: &mut Display<Headless>) -> Scene {
    let Frame { top, viewport } = frame(display);
    let canvas = shown_window(
        display,
        Some(viewport),
        WindowType::Child,
        Rectangle::new(0, 0, 100_000, 50),
    );
    drain(display);
    Scene {
        top,
        viewport,
        canvas,
    }
}
