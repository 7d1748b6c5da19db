// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Abstract events, event filters, and translation of native events.

use std::collections::VecDeque;

use bitflags::bitflags;
use keyboard_types::{Key, KeyState, Modifiers};

use crate::backend::{Backend, InputInfo, NativeEvent, NativeEventKind, Serial};
use crate::display::Display;
use crate::error::{Error, ProtocolError};
use crate::geometry::Rectangle;
use crate::keysym::keysym_to_key;
use crate::region::Region;
use crate::window::{EventMask, WindowId, WindowType};

bitflags! {
    /// Modifier keys and pointer buttons held when an event happened.
    pub struct ModifierType: u16 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;
        const BUTTON4 = 1 << 11;
        const BUTTON5 = 1 << 12;
    }
}

impl ModifierType {
    /// The keyboard modifiers, in the usual mapping of the mod keys.
    pub fn modifiers(self) -> Modifiers {
        let mut ret = Modifiers::default();
        let key_masks = [
            (ModifierType::SHIFT, Modifiers::SHIFT),
            (ModifierType::CONTROL, Modifiers::CONTROL),
            (ModifierType::MOD1, Modifiers::ALT),
            (ModifierType::MOD2, Modifiers::NUM_LOCK),
            (ModifierType::MOD4, Modifiers::META),
            (ModifierType::LOCK, Modifiers::CAPS_LOCK),
        ];
        for (mask, modifiers) in key_masks {
            if self.contains(mask) {
                ret |= modifiers;
            }
        }
        ret
    }

    fn any_button(self) -> bool {
        self.intersects(
            ModifierType::BUTTON1
                | ModifierType::BUTTON2
                | ModifierType::BUTTON3
                | ModifierType::BUTTON4
                | ModifierType::BUTTON5,
        )
    }
}

/// Why the pointer entered or left a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingMode {
    Normal,
    Grab,
    Ungrab,
}

/// Where the pointer came from or went to, relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDetail {
    Ancestor,
    Virtual,
    Inferior,
    Nonlinear,
    NonlinearVirtual,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Pointer position and modifier state shared by the input events.
///
/// `x` and `y` are logical window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerState {
    pub time: u32,
    pub x: i32,
    pub y: i32,
    pub x_root: i32,
    pub y_root: i32,
    pub state: ModifierType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEvent {
    pub window: WindowId,
    pub pointer: PointerState,
    pub button: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollEvent {
    pub window: WindowId,
    pub pointer: PointerState,
    pub direction: ScrollDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionEvent {
    pub window: WindowId,
    pub pointer: PointerState,
    pub is_hint: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossingEvent {
    pub window: WindowId,
    pub pointer: PointerState,
    /// `true` for enter, `false` for leave.
    pub enter: bool,
    pub mode: CrossingMode,
    pub detail: NotifyDetail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub window: WindowId,
    pub time: u32,
    pub key_state: KeyState,
    pub key: Key,
    pub mods: Modifiers,
    pub state: ModifierType,
    pub keyval: u32,
    pub hardware_keycode: u32,
}

/// An event delivered to the toolkit.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Part of a window needs to be repainted.
    Expose {
        window: WindowId,
        area: Rectangle,
        region: Region,
        count: u32,
    },
    ButtonPress(ButtonEvent),
    ButtonRelease(ButtonEvent),
    Scroll(ScrollEvent),
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    Motion(MotionEvent),
    Crossing(CrossingEvent),
    Focus {
        window: WindowId,
        focus_in: bool,
    },
    /// A toplevel's geometry changed.
    Configure {
        window: WindowId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Map {
        window: WindowId,
    },
    Unmap {
        window: WindowId,
    },
    /// The window manager asked for the window to be closed.
    Delete {
        window: WindowId,
    },
    Destroy {
        window: WindowId,
    },
}

impl Event {
    pub fn window(&self) -> WindowId {
        match self {
            Event::Expose { window, .. }
            | Event::Focus { window, .. }
            | Event::Configure { window, .. }
            | Event::Map { window }
            | Event::Unmap { window }
            | Event::Delete { window }
            | Event::Destroy { window } => *window,
            Event::ButtonPress(e) | Event::ButtonRelease(e) => e.window,
            Event::Scroll(e) => e.window,
            Event::KeyPress(e) | Event::KeyRelease(e) => e.window,
            Event::Motion(e) => e.window,
            Event::Crossing(e) => e.window,
        }
    }
}

/// What a filter decided about a native event.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterReturn {
    /// Let the next filter, and then the normal translation, see the event.
    Continue,
    /// Deliver this event instead.
    Translate(Event),
    /// Drop the event.
    Remove,
}

/// A function that gets to see native events before they are translated.
pub type Filter = Box<dyn FnMut(&NativeEvent) -> FilterReturn>;

/// Identifies a filter for [`Display::remove_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u64);

/// The toolkit's event queue, plus native events read but not yet translated.
#[derive(Default)]
pub(crate) struct EventQueue {
    queue: VecDeque<Event>,
    pub pending_native: VecDeque<NativeEvent>,
    pub default_filters: Vec<(FilterId, Filter)>,
    next_filter: u64,
}

impl EventQueue {
    pub fn push(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn peek(&self) -> Option<&Event> {
        self.queue.front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn next_filter_id(&mut self) -> FilterId {
        self.next_filter += 1;
        FilterId(self.next_filter)
    }
}

fn run_filters(filters: &mut [(FilterId, Filter)], native: &NativeEvent) -> FilterReturn {
    for (_, filter) in filters.iter_mut() {
        match filter(native) {
            FilterReturn::Continue => {}
            other => return other,
        }
    }
    FilterReturn::Continue
}

fn motion_wanted(mask: EventMask, state: ModifierType) -> bool {
    mask.contains(EventMask::POINTER_MOTION)
        || (mask.contains(EventMask::BUTTON_MOTION) && state.any_button())
        || (mask.contains(EventMask::BUTTON1_MOTION) && state.contains(ModifierType::BUTTON1))
        || (mask.contains(EventMask::BUTTON2_MOTION) && state.contains(ModifierType::BUTTON2))
        || (mask.contains(EventMask::BUTTON3_MOTION) && state.contains(ModifierType::BUTTON3))
}

fn scroll_direction(button: u32) -> Option<ScrollDirection> {
    match button {
        4 => Some(ScrollDirection::Up),
        5 => Some(ScrollDirection::Down),
        6 => Some(ScrollDirection::Left),
        7 => Some(ScrollDirection::Right),
        _ => None,
    }
}

/// An active error trap.
#[derive(Debug)]
pub(crate) struct ErrorTrap {
    /// Errors for requests from this serial on belong to the trap.
    pub start: Serial,
    pub error: Option<ProtocolError>,
}

impl<B: Backend> Display<B> {
    /// Whether an event is ready, reading native events if necessary.
    pub fn events_pending(&mut self) -> bool {
        if self.events.is_empty() {
            self.queue_native_events();
        }
        !self.events.is_empty()
    }

    /// Takes the next event off the queue, reading native events if the
    /// queue is empty. Never blocks.
    pub fn get_next_event(&mut self) -> Option<Event> {
        if self.events.is_empty() {
            self.queue_native_events();
        }
        self.events.pop()
    }

    /// The next event, left on the queue.
    pub fn peek_event(&mut self) -> Option<&Event> {
        if self.events.is_empty() {
            self.queue_native_events();
        }
        self.events.peek()
    }

    /// Appends an event to the queue.
    pub fn put_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Installs a filter for the native events of `window`, or for all
    /// native events if `window` is `None`. Filters for all events run
    /// first.
    pub fn add_filter(
        &mut self,
        window: Option<WindowId>,
        filter: impl FnMut(&NativeEvent) -> FilterReturn + 'static,
    ) -> Option<FilterId> {
        let id = self.events.next_filter_id();
        let filter: Filter = Box::new(filter);
        match window {
            None => self.events.default_filters.push((id, filter)),
            Some(window) => {
                let Some(record) = self.windows.get_mut(window) else {
                    tracing::warn!("add_filter: {:?} has been destroyed", window);
                    return None;
                };
                record.filters.push((id, filter));
            }
        }
        Some(id)
    }

    /// Removes a filter. Returns `false` if it was not installed.
    pub fn remove_filter(&mut self, id: FilterId) -> bool {
        let before = self.events.default_filters.len();
        self.events.default_filters.retain(|(f, _)| *f != id);
        if self.events.default_filters.len() != before {
            return true;
        }
        for window in self.handles.values() {
            if let Some(record) = self.windows.get_mut(*window) {
                let before = record.filters.len();
                record.filters.retain(|(f, _)| *f != id);
                if record.filters.len() != before {
                    return true;
                }
            }
        }
        false
    }

    /// Translates every native event that is ready into the queue.
    pub(crate) fn queue_native_events(&mut self) {
        while !self.closed {
            let native = match self.events.pending_native.pop_front() {
                Some(native) => native,
                None => match self.backend.poll_event() {
                    Some(native) => native,
                    None => break,
                },
            };
            if let Some(event) = self.translate_event(native) {
                self.events.push(event);
            }
        }
    }

    /// Turns a native event into the event to deliver, if any.
    pub(crate) fn translate_event(&mut self, native: NativeEvent) -> Option<Event> {
        let (window, serial, kind) = match &native {
            NativeEvent::ConnectionLost => {
                self.fatal(Error::ConnectionLost);
                return None;
            }
            NativeEvent::Error(err) => {
                self.handle_protocol_error(*err);
                return None;
            }
            NativeEvent::Window {
                window,
                serial,
                kind,
            } => (*window, *serial, kind),
        };
        let id = self.handles.get(&window).copied();

        match run_filters(&mut self.events.default_filters, &native) {
            FilterReturn::Continue => {}
            FilterReturn::Translate(event) => return Some(event),
            FilterReturn::Remove => return None,
        }
        if let Some(record) = id.and_then(|id| self.windows.get_mut(id)) {
            match run_filters(&mut record.filters, &native) {
                FilterReturn::Continue => {}
                FilterReturn::Translate(event) => return Some(event),
                FilterReturn::Remove => return None,
            }
        }

        let Some(id) = id else {
            tracing::debug!("dropping {:?} for unknown window {:?}", kind, window);
            return None;
        };
        let record = self.windows.get(id)?;
        let mask = record.event_mask;
        let (x_offset, y_offset) = (record.position.x_offset, record.position.y_offset);
        let pointer = |info: &InputInfo| PointerState {
            time: info.time,
            x: info.x + x_offset,
            y: info.y + y_offset,
            x_root: info.x_root,
            y_root: info.y_root,
            state: ModifierType::from_bits_truncate(info.state),
        };
        note!(self.config.debug_flags, EVENTS, "{:?} for {:?}", kind, id);

        match kind {
            NativeEventKind::Expose { area, .. } | NativeEventKind::GraphicsExpose { area, .. } => {
                self.process_expose(id, serial, area.translate(x_offset, y_offset));
                None
            }
            NativeEventKind::NoExpose => None,
            NativeEventKind::ButtonPress { info, button } => match scroll_direction(*button) {
                Some(direction) => mask
                    .intersects(EventMask::SCROLL | EventMask::BUTTON_PRESS)
                    .then(|| {
                        Event::Scroll(ScrollEvent {
                            window: id,
                            pointer: pointer(info),
                            direction,
                        })
                    }),
                None => mask.contains(EventMask::BUTTON_PRESS).then(|| {
                    Event::ButtonPress(ButtonEvent {
                        window: id,
                        pointer: pointer(info),
                        button: *button,
                    })
                }),
            },
            NativeEventKind::ButtonRelease { info, button } => {
                // The press already reported the scroll.
                if scroll_direction(*button).is_some() {
                    return None;
                }
                mask.contains(EventMask::BUTTON_RELEASE).then(|| {
                    Event::ButtonRelease(ButtonEvent {
                        window: id,
                        pointer: pointer(info),
                        button: *button,
                    })
                })
            }
            NativeEventKind::KeyPress {
                info,
                keycode,
                keyval,
            } => mask.contains(EventMask::KEY_PRESS).then(|| {
                Event::KeyPress(key_event(id, info, *keycode, *keyval, KeyState::Down))
            }),
            NativeEventKind::KeyRelease {
                info,
                keycode,
                keyval,
            } => mask.contains(EventMask::KEY_RELEASE).then(|| {
                Event::KeyRelease(key_event(id, info, *keycode, *keyval, KeyState::Up))
            }),
            NativeEventKind::Motion { info, is_hint } => {
                let pointer = pointer(info);
                motion_wanted(mask, pointer.state).then(|| {
                    Event::Motion(MotionEvent {
                        window: id,
                        pointer,
                        is_hint: *is_hint,
                    })
                })
            }
            NativeEventKind::Crossing {
                info,
                enter,
                mode,
                detail,
            } => {
                let wanted = if *enter {
                    EventMask::ENTER_NOTIFY
                } else {
                    EventMask::LEAVE_NOTIFY
                };
                mask.contains(wanted).then(|| {
                    Event::Crossing(CrossingEvent {
                        window: id,
                        pointer: pointer(info),
                        enter: *enter,
                        mode: *mode,
                        detail: *detail,
                    })
                })
            }
            NativeEventKind::Focus { focus_in } => mask
                .contains(EventMask::FOCUS_CHANGE)
                .then(|| Event::Focus {
                    window: id,
                    focus_in: *focus_in,
                }),
            NativeEventKind::Configure {
                x,
                y,
                width,
                height,
            } => self.translate_configure(id, Rectangle::new(*x, *y, *width, *height)),
            NativeEventKind::Map => {
                let record = self.windows.get_mut(id)?;
                if record.virtual_maps > 0 {
                    record.virtual_maps -= 1;
                    return None;
                }
                mask.contains(EventMask::STRUCTURE)
                    .then(|| Event::Map { window: id })
            }
            NativeEventKind::Unmap => {
                let record = self.windows.get_mut(id)?;
                if record.virtual_unmaps > 0 {
                    record.virtual_unmaps -= 1;
                    return None;
                }
                mask.contains(EventMask::STRUCTURE)
                    .then(|| Event::Unmap { window: id })
            }
            NativeEventKind::Destroy => {
                self.forget_window(id);
                None
            }
            NativeEventKind::DeleteRequest => Some(Event::Delete { window: id }),
            NativeEventKind::Other { code } => {
                tracing::debug!("ignoring native event {} for {:?}", code, id);
                None
            }
        }
    }

    /// Window managers move and resize toplevels behind our back; child
    /// windows only change when we ask, so their notifications carry nothing new.
    fn translate_configure(&mut self, id: WindowId, rect: Rectangle) -> Option<Event> {
        let record = self.windows.get_mut(id)?;
        if record.window_type == WindowType::Child || record.window_type == WindowType::Root {
            return None;
        }
        if record.position.native_rect() != rect {
            record.x = rect.x;
            record.y = rect.y;
            record.width = rect.width;
            record.height = rect.height;
            self.init_position(id);
        }
        let record = self.windows.get(id)?;
        record
            .event_mask
            .contains(EventMask::STRUCTURE)
            .then(|| Event::Configure {
                window: id,
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            })
    }

    /// Hands a protocol error to the innermost trap covering its request,
    /// or to the fatal handler.
    pub(crate) fn handle_protocol_error(&mut self, err: ProtocolError) {
        for trap in self.error_traps.iter_mut().rev() {
            if !err.serial.is_before(trap.start) {
                if trap.error.is_none() {
                    trap.error = Some(err);
                }
                return;
            }
        }
        tracing::error!(
            "protocol error {} from request {} on {:#x} (serial {})",
            err.code,
            err.request_code,
            err.resource,
            err.serial.0
        );
        self.fatal(Error::Protocol(err));
    }
}

fn key_event(id: WindowId, info: &InputInfo, keycode: u32, keyval: u32, key_state: KeyState) -> KeyEvent {
    let state = ModifierType::from_bits_truncate(info.state);
    KeyEvent {
        window: id,
        time: info.time,
        key_state,
        key: keysym_to_key(keyval),
        mods: state.modifiers(),
        state,
        keyval,
        hardware_keycode: keycode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_mapping() {
        let state = ModifierType::SHIFT | ModifierType::MOD1 | ModifierType::BUTTON1;
        assert_eq!(state.modifiers(), Modifiers::SHIFT | Modifiers::ALT);
        assert!(state.any_button());
        assert!(!ModifierType::CONTROL.any_button());
    }

    #[test]
    fn motion_masks() {
        let held = ModifierType::BUTTON2;
        assert!(motion_wanted(EventMask::POINTER_MOTION, ModifierType::empty()));
        assert!(!motion_wanted(EventMask::BUTTON_MOTION, ModifierType::empty()));
        assert!(motion_wanted(EventMask::BUTTON_MOTION, held));
        assert!(motion_wanted(EventMask::BUTTON2_MOTION, held));
        assert!(!motion_wanted(EventMask::BUTTON1_MOTION, held));
    }

    #[test]
    fn scroll_buttons() {
        assert_eq!(scroll_direction(4), Some(ScrollDirection::Up));
        assert_eq!(scroll_direction(7), Some(ScrollDirection::Right));
        assert_eq!(scroll_direction(1), None);
    }
}
