// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Keysym to logical key conversion.

use keyboard_types::Key;

#[allow(non_upper_case_globals)]
mod sym {
    pub const BackSpace: u32 = 0xff08;
    pub const Tab: u32 = 0xff09;
    pub const Linefeed: u32 = 0xff0a;
    pub const Clear: u32 = 0xff0b;
    pub const Return: u32 = 0xff0d;
    pub const Pause: u32 = 0xff13;
    pub const Scroll_Lock: u32 = 0xff14;
    pub const Escape: u32 = 0xff1b;
    pub const Multi_key: u32 = 0xff20;
    pub const ISO_Left_Tab: u32 = 0xfe20;
    pub const Home: u32 = 0xff50;
    pub const Left: u32 = 0xff51;
    pub const Up: u32 = 0xff52;
    pub const Right: u32 = 0xff53;
    pub const Down: u32 = 0xff54;
    pub const Prior: u32 = 0xff55;
    pub const Next: u32 = 0xff56;
    pub const End: u32 = 0xff57;
    pub const Begin: u32 = 0xff58;
    pub const Select: u32 = 0xff60;
    pub const Print: u32 = 0xff61;
    pub const Execute: u32 = 0xff62;
    pub const Insert: u32 = 0xff63;
    pub const Undo: u32 = 0xff65;
    pub const Redo: u32 = 0xff66;
    pub const Menu: u32 = 0xff67;
    pub const Find: u32 = 0xff68;
    pub const Cancel: u32 = 0xff69;
    pub const Help: u32 = 0xff6a;
    pub const Break: u32 = 0xff6b;
    pub const Mode_switch: u32 = 0xff7e;
    pub const Num_Lock: u32 = 0xff7f;
    pub const KP_Space: u32 = 0xff80;
    pub const KP_Tab: u32 = 0xff89;
    pub const KP_Enter: u32 = 0xff8d;
    pub const KP_Home: u32 = 0xff95;
    pub const KP_Left: u32 = 0xff96;
    pub const KP_Up: u32 = 0xff97;
    pub const KP_Right: u32 = 0xff98;
    pub const KP_Down: u32 = 0xff99;
    pub const KP_Prior: u32 = 0xff9a;
    pub const KP_Next: u32 = 0xff9b;
    pub const KP_End: u32 = 0xff9c;
    pub const KP_Begin: u32 = 0xff9d;
    pub const KP_Insert: u32 = 0xff9e;
    pub const KP_Delete: u32 = 0xff9f;
    pub const KP_Multiply: u32 = 0xffaa;
    pub const KP_9: u32 = 0xffb9;
    pub const F1: u32 = 0xffbe;
    pub const F12: u32 = 0xffc9;
    pub const Shift_L: u32 = 0xffe1;
    pub const Shift_R: u32 = 0xffe2;
    pub const Control_L: u32 = 0xffe3;
    pub const Control_R: u32 = 0xffe4;
    pub const Caps_Lock: u32 = 0xffe5;
    pub const Meta_L: u32 = 0xffe7;
    pub const Meta_R: u32 = 0xffe8;
    pub const Alt_L: u32 = 0xffe9;
    pub const Alt_R: u32 = 0xffea;
    pub const Super_L: u32 = 0xffeb;
    pub const Super_R: u32 = 0xffec;
    pub const Hyper_L: u32 = 0xffed;
    pub const Hyper_R: u32 = 0xffee;
    pub const Delete: u32 = 0xffff;
}

/// Keysyms at or above this encode a Unicode code point directly.
const UNICODE_OFFSET: u32 = 0x0100_0000;

/// Converts a keysym into a logical key.
///
/// Keysyms without a known meaning come out as [`Key::Unidentified`].
#[allow(non_upper_case_globals)]
pub fn keysym_to_key(keysym: u32) -> Key {
    use sym::*;

    match keysym {
        BackSpace => Key::Backspace,
        Tab | KP_Tab | ISO_Left_Tab => Key::Tab,
        Clear | KP_Begin | Begin => Key::Clear,
        Return | KP_Enter | Linefeed => Key::Enter,
        Pause => Key::Pause,
        Scroll_Lock => Key::ScrollLock,
        Escape => Key::Escape,
        Multi_key => Key::Compose,
        Home | KP_Home => Key::Home,
        Left | KP_Left => Key::ArrowLeft,
        Up | KP_Up => Key::ArrowUp,
        Right | KP_Right => Key::ArrowRight,
        Down | KP_Down => Key::ArrowDown,
        Prior | KP_Prior => Key::PageUp,
        Next | KP_Next => Key::PageDown,
        End | KP_End => Key::End,
        Select => Key::Select,
        Print => Key::PrintScreen,
        Execute => Key::Execute,
        Insert | KP_Insert => Key::Insert,
        Undo => Key::Undo,
        Redo => Key::Redo,
        Menu => Key::ContextMenu,
        Find => Key::Find,
        Cancel => Key::Cancel,
        Help => Key::Help,
        Break => Key::Attn,
        Mode_switch => Key::ModeChange,
        Num_Lock => Key::NumLock,
        Shift_L | Shift_R => Key::Shift,
        Control_L | Control_R => Key::Control,
        Caps_Lock => Key::CapsLock,
        Meta_L | Meta_R => Key::Meta,
        Alt_L | Alt_R => Key::Alt,
        Super_L | Super_R => Key::Super,
        Hyper_L | Hyper_R => Key::Hyper,
        Delete | KP_Delete => Key::Delete,
        F1..=F12 => function_key(keysym - F1),
        KP_Space => Key::Character(" ".into()),
        // Keypad digits and operators follow the ASCII layout offset by 0xff80.
        KP_Multiply..=KP_9 => char_key(keysym - 0xff80),
        0x20..=0x7e | 0xa0..=0xff => char_key(keysym),
        UNICODE_OFFSET.. => char_key(keysym - UNICODE_OFFSET),
        _ => Key::Unidentified,
    }
}

fn function_key(index: u32) -> Key {
    const KEYS: [Key; 12] = [
        Key::F1,
        Key::F2,
        Key::F3,
        Key::F4,
        Key::F5,
        Key::F6,
        Key::F7,
        Key::F8,
        Key::F9,
        Key::F10,
        Key::F11,
        Key::F12,
    ];
    KEYS.get(index as usize).cloned().unwrap_or(Key::Unidentified)
}

fn char_key(code: u32) -> Key {
    match char::from_u32(code) {
        Some(c) if !c.is_control() => Key::Character(c.to_string()),
        _ => Key::Unidentified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys() {
        assert_eq!(keysym_to_key(0xff0d), Key::Enter);
        assert_eq!(keysym_to_key(0xff8d), Key::Enter);
        assert_eq!(keysym_to_key(0xffc0), Key::F3);
        assert_eq!(keysym_to_key(0xffe9), Key::Alt);
        assert_eq!(keysym_to_key(0x1234), Key::Unidentified);
    }

    #[test]
    fn mixed_case_keysyms() {
        assert_eq!(keysym_to_key(0xff14), Key::ScrollLock);
        assert_eq!(keysym_to_key(0xfe20), Key::Tab);
        assert_eq!(keysym_to_key(0xff95), Key::Home);
        assert_eq!(keysym_to_key(0xff96), Key::ArrowLeft);
    }

    #[test]
    fn character_keys() {
        assert_eq!(keysym_to_key(0x61), Key::Character("a".into()));
        assert_eq!(keysym_to_key(0xe9), Key::Character("é".into()));
        assert_eq!(keysym_to_key(0xffb5), Key::Character("5".into()));
        assert_eq!(keysym_to_key(0x0100_20ac), Key::Character("€".into()));
    }
}
