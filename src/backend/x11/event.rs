// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Conversion of X11 events into native events.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, ConnectionExt, ModMask};
use x11rb::protocol::Event;
use x11rb::xcb_ffi::XCBConnection;

use super::application::Application;
use super::error::Error;
use crate::backend::{InputInfo, NativeEvent, NativeEventKind, NativeWindow, Serial};
use crate::error::ProtocolError;
use crate::event::{CrossingMode, NotifyDetail};
use crate::geometry::Rectangle;

/// The core keyboard mapping, fetched once at connection time.
pub(crate) struct Keymap {
    min_keycode: u8,
    per_keycode: usize,
    keysyms: Vec<u32>,
}

impl Keymap {
    pub fn fetch(conn: &XCBConnection) -> Result<Keymap, Error> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode.saturating_sub(min_keycode).saturating_add(1);
        let reply = conn.get_keyboard_mapping(min_keycode, count)?.reply()?;
        Ok(Keymap {
            min_keycode,
            per_keycode: usize::from(reply.keysyms_per_keycode),
            keysyms: reply.keysyms,
        })
    }

    /// The keysym for `keycode` under the modifiers in `state`, following the
    /// core protocol's rules for the first keysym group.
    pub fn lookup(&self, keycode: u8, state: u16) -> u32 {
        if keycode < self.min_keycode || self.per_keycode == 0 {
            return 0;
        }
        let start = usize::from(keycode - self.min_keycode) * self.per_keycode;
        let syms = match self.keysyms.get(start..start + self.per_keycode.min(2)) {
            Some(syms) => syms,
            None => return 0,
        };
        let lower = syms[0];
        let upper = match syms.get(1) {
            Some(&sym) if sym != 0 => sym,
            _ => latin_upper(lower),
        };

        let shift = state & u16::from(ModMask::SHIFT) != 0;
        let lock = state & u16::from(ModMask::LOCK) != 0;
        let alphabetic = latin_upper(lower) != lower;
        if shift ^ (lock && alphabetic) {
            upper
        } else {
            lower
        }
    }
}

fn latin_upper(keysym: u32) -> u32 {
    match keysym {
        0x61..=0x7a | 0xe0..=0xf6 | 0xf8..=0xfe => keysym - 0x20,
        _ => keysym,
    }
}

macro_rules! input_info {
    ($ev:expr) => {
        InputInfo {
            time: $ev.time,
            x: i32::from($ev.event_x),
            y: i32::from($ev.event_y),
            x_root: i32::from($ev.root_x),
            y_root: i32::from($ev.root_y),
            state: $ev.state,
        }
    };
}

fn crossing_mode(mode: xproto::NotifyMode) -> CrossingMode {
    match mode {
        xproto::NotifyMode::GRAB => CrossingMode::Grab,
        xproto::NotifyMode::UNGRAB => CrossingMode::Ungrab,
        _ => CrossingMode::Normal,
    }
}

fn notify_detail(detail: xproto::NotifyDetail) -> NotifyDetail {
    match detail {
        xproto::NotifyDetail::ANCESTOR => NotifyDetail::Ancestor,
        xproto::NotifyDetail::VIRTUAL => NotifyDetail::Virtual,
        xproto::NotifyDetail::INFERIOR => NotifyDetail::Inferior,
        xproto::NotifyDetail::NONLINEAR => NotifyDetail::Nonlinear,
        xproto::NotifyDetail::NONLINEAR_VIRTUAL => NotifyDetail::NonlinearVirtual,
        _ => NotifyDetail::Unknown,
    }
}

fn area(x: u16, y: u16, width: u16, height: u16) -> Rectangle {
    Rectangle::new(
        i32::from(x),
        i32::from(y),
        i32::from(width),
        i32::from(height),
    )
}

impl Application {
    /// Converts an event read from the connection. `serial` is the full
    /// sequence number of the last request the server had seen.
    pub(crate) fn translate_event(&self, event: Event, serial: u64) -> Option<NativeEvent> {
        let serial = Serial(serial);
        let (window, kind) = match event {
            Event::Expose(ev) => (
                ev.window,
                NativeEventKind::Expose {
                    area: area(ev.x, ev.y, ev.width, ev.height),
                    count: u32::from(ev.count),
                },
            ),
            Event::GraphicsExposure(ev) => (
                ev.drawable,
                NativeEventKind::GraphicsExpose {
                    area: area(ev.x, ev.y, ev.width, ev.height),
                    count: u32::from(ev.count),
                },
            ),
            Event::NoExposure(ev) => (ev.drawable, NativeEventKind::NoExpose),
            Event::ButtonPress(ev) => (
                ev.event,
                NativeEventKind::ButtonPress {
                    info: input_info!(ev),
                    button: u32::from(ev.detail),
                },
            ),
            Event::ButtonRelease(ev) => (
                ev.event,
                NativeEventKind::ButtonRelease {
                    info: input_info!(ev),
                    button: u32::from(ev.detail),
                },
            ),
            Event::KeyPress(ev) => (
                ev.event,
                NativeEventKind::KeyPress {
                    info: input_info!(ev),
                    keycode: u32::from(ev.detail),
                    keyval: self.keymap.lookup(ev.detail, ev.state),
                },
            ),
            Event::KeyRelease(ev) => (
                ev.event,
                NativeEventKind::KeyRelease {
                    info: input_info!(ev),
                    keycode: u32::from(ev.detail),
                    keyval: self.keymap.lookup(ev.detail, ev.state),
                },
            ),
            Event::MotionNotify(ev) => (
                ev.event,
                NativeEventKind::Motion {
                    info: input_info!(ev),
                    is_hint: ev.detail == xproto::Motion::HINT,
                },
            ),
            Event::EnterNotify(ev) => (
                ev.event,
                NativeEventKind::Crossing {
                    info: input_info!(ev),
                    enter: true,
                    mode: crossing_mode(ev.mode),
                    detail: notify_detail(ev.detail),
                },
            ),
            Event::LeaveNotify(ev) => (
                ev.event,
                NativeEventKind::Crossing {
                    info: input_info!(ev),
                    enter: false,
                    mode: crossing_mode(ev.mode),
                    detail: notify_detail(ev.detail),
                },
            ),
            Event::FocusIn(ev) => (ev.event, NativeEventKind::Focus { focus_in: true }),
            Event::FocusOut(ev) => (ev.event, NativeEventKind::Focus { focus_in: false }),
            Event::ConfigureNotify(ev) => (
                ev.window,
                NativeEventKind::Configure {
                    x: i32::from(ev.x),
                    y: i32::from(ev.y),
                    width: i32::from(ev.width),
                    height: i32::from(ev.height),
                },
            ),
            Event::MapNotify(ev) => (ev.window, NativeEventKind::Map),
            Event::UnmapNotify(ev) => (ev.window, NativeEventKind::Unmap),
            Event::DestroyNotify(ev) => (ev.window, NativeEventKind::Destroy),
            Event::ClientMessage(ev) => {
                let data = ev.data.as_data32();
                if ev.format == 32
                    && ev.type_ == self.atoms.WM_PROTOCOLS
                    && data[0] == self.atoms.WM_DELETE_WINDOW
                {
                    (ev.window, NativeEventKind::DeleteRequest)
                } else {
                    (
                        ev.window,
                        NativeEventKind::Other {
                            code: xproto::CLIENT_MESSAGE_EVENT,
                        },
                    )
                }
            }
            Event::Error(err) => {
                return Some(NativeEvent::Error(ProtocolError {
                    serial,
                    code: err.error_code,
                    request_code: err.major_opcode,
                    resource: u64::from(err.bad_value),
                }))
            }
            ev => {
                tracing::trace!("ignoring X11 event {:?}", ev);
                return None;
            }
        };
        Some(NativeEvent::Window {
            window: NativeWindow(u64::from(window)),
            serial,
            kind,
        })
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    fn us_keymap() -> Keymap {
        // Keycodes 10 ("a"), 11 ("1"/"!") and 12 (Return), two syms each.
        Keymap {
            min_keycode: 10,
            per_keycode: 2,
            keysyms: vec![0x61, 0, 0x31, 0x21, 0xff0d, 0],
        }
    }

    #[test]
    fn shift_selects_the_second_keysym() {
        let keymap = us_keymap();
        let shift = u16::from(ModMask::SHIFT);
        assert_eq!(keymap.lookup(11, 0), 0x31);
        assert_eq!(keymap.lookup(11, shift), 0x21);
        assert_eq!(keymap.lookup(12, shift), 0xff0d);
    }

    #[test]
    fn letters_follow_shift_and_lock() {
        let keymap = us_keymap();
        let shift = u16::from(ModMask::SHIFT);
        let lock = u16::from(ModMask::LOCK);
        assert_eq!(keymap.lookup(10, 0), 0x61);
        assert_eq!(keymap.lookup(10, shift), 0x41);
        assert_eq!(keymap.lookup(10, lock), 0x41);
        assert_eq!(keymap.lookup(10, shift | lock), 0x61);
        // Lock leaves digits alone.
        assert_eq!(keymap.lookup(11, lock), 0x31);
    }

    #[test]
    fn unknown_keycodes_have_no_keysym() {
        let keymap = us_keymap();
        assert_eq!(keymap.lookup(9, 0), 0);
        assert_eq!(keymap.lookup(200, 0), 0);
    }
}
