// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Various utilities for working with windows. Includes utilities for converting between Windows
//! and Rust types, including strings.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use winapi::shared::minwindef::{DWORD, WPARAM};
use winapi::shared::windef::{COLORREF, RECT};
use winapi::shared::winerror::HRESULT_FROM_WIN32;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::winuser::*;

use super::error::Error;
use crate::geometry::Rectangle;

/// The calling thread's last error, as an `HRESULT`.
pub fn last_error() -> Error {
    Error::Hr(HRESULT_FROM_WIN32(unsafe { GetLastError() }))
}

pub trait ToWide {
    fn to_wide_sized(&self) -> Vec<u16>;
    fn to_wide(&self) -> Vec<u16>;
}

impl<T> ToWide for T
where
    T: AsRef<OsStr>,
{
    fn to_wide_sized(&self) -> Vec<u16> {
        self.as_ref().encode_wide().collect()
    }
    fn to_wide(&self) -> Vec<u16> {
        self.as_ref().encode_wide().chain(Some(0)).collect()
    }
}

pub trait FromWide {
    fn to_u16_slice(&self) -> &[u16];

    fn to_string(&self) -> Option<String> {
        String::from_utf16(self.to_u16_slice()).ok()
    }
}

impl FromWide for [u16] {
    fn to_u16_slice(&self) -> &[u16] {
        self
    }
}

pub fn rect_from_win(rect: &RECT) -> Rectangle {
    Rectangle::new(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
}

pub fn rect_to_win(rect: &Rectangle) -> RECT {
    RECT {
        left: rect.x,
        top: rect.y,
        right: rect.x + rect.width,
        bottom: rect.y + rect.height,
    }
}

/// Pixels of the system visual are `COLORREF`s.
pub fn colorref(pixel: u32) -> COLORREF {
    pixel & 0x00ff_ffff
}

/// Converts the `MK_*` flags of a mouse message into X-style modifier state.
pub fn mouse_state(wparam: WPARAM) -> u16 {
    let flags = wparam as DWORD;
    let mut state = 0;
    for (mk, bit) in [
        (MK_SHIFT, 1 << 0),
        (MK_CONTROL, 1 << 2),
        (MK_LBUTTON, 1 << 8),
        (MK_MBUTTON, 1 << 9),
        (MK_RBUTTON, 1 << 10),
    ] {
        if flags & mk as DWORD != 0 {
            state |= bit;
        }
    }
    state | key_state()
}

/// Modifier state read from the keyboard, for messages that do not carry it.
pub fn key_state() -> u16 {
    let down = |vk: i32| unsafe { GetKeyState(vk) } < 0;
    let toggled = |vk: i32| unsafe { GetKeyState(vk) } & 1 != 0;
    let mut state = 0;
    if down(VK_SHIFT) {
        state |= 1 << 0;
    }
    if toggled(VK_CAPITAL) {
        state |= 1 << 1;
    }
    if down(VK_CONTROL) {
        state |= 1 << 2;
    }
    if down(VK_MENU) {
        state |= 1 << 3;
    }
    if toggled(VK_NUMLOCK) {
        state |= 1 << 4;
    }
    if down(VK_LWIN) || down(VK_RWIN) {
        state |= 1 << 6;
    }
    state
}

/// Maps a virtual key code to the keysym an X server would report.
pub fn vk_to_keysym(vk: i32, shift: bool) -> u32 {
    match vk {
        VK_BACK => 0xff08,
        VK_TAB => 0xff09,
        VK_RETURN => 0xff0d,
        VK_PAUSE => 0xff13,
        VK_ESCAPE => 0xff1b,
        VK_HOME => 0xff50,
        VK_LEFT => 0xff51,
        VK_UP => 0xff52,
        VK_RIGHT => 0xff53,
        VK_DOWN => 0xff54,
        VK_PRIOR => 0xff55,
        VK_NEXT => 0xff56,
        VK_END => 0xff57,
        VK_INSERT => 0xff63,
        VK_DELETE => 0xffff,
        VK_SHIFT | VK_LSHIFT => 0xffe1,
        VK_RSHIFT => 0xffe2,
        VK_CONTROL | VK_LCONTROL => 0xffe3,
        VK_RCONTROL => 0xffe4,
        VK_CAPITAL => 0xffe5,
        VK_MENU | VK_LMENU => 0xffe9,
        VK_RMENU => 0xffea,
        VK_LWIN => 0xffeb,
        VK_RWIN => 0xffec,
        VK_SPACE => 0x20,
        VK_F1..=VK_F24 => 0xffbe + (vk - VK_F1) as u32,
        VK_NUMPAD0..=VK_NUMPAD9 => 0xffb0 + (vk - VK_NUMPAD0) as u32,
        0x30..=0x39 => vk as u32,
        0x41..=0x5a if shift => vk as u32,
        0x41..=0x5a => vk as u32 + 0x20,
        _ => {
            // Let the keyboard layout decide for punctuation.
            let ch = unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_CHAR) } & 0x7fff;
            if ch == 0 {
                0
            } else {
                ch
            }
        }
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn letters_follow_shift() {
        assert_eq!(vk_to_keysym(0x41, false), 0x61);
        assert_eq!(vk_to_keysym(0x41, true), 0x41);
        assert_eq!(vk_to_keysym(VK_RETURN, false), 0xff0d);
        assert_eq!(vk_to_keysym(VK_F1 + 2, false), 0xffc0);
    }

    #[test]
    fn rects_convert_both_ways() {
        let rect = Rectangle::new(-5, 10, 20, 30);
        assert_eq!(rect_from_win(&rect_to_win(&rect)), rect);
    }
}
