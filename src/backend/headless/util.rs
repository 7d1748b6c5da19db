// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Protocol numbers the headless server reports in its errors.
//!
//! They match the X11 core protocol so that errors look the same whichever
//! backend produced them.

pub mod opcode {
    pub const CREATE_WINDOW: u8 = 1;
    pub const CHANGE_WINDOW_ATTRIBUTES: u8 = 2;
    pub const DESTROY_WINDOW: u8 = 4;
    pub const REPARENT_WINDOW: u8 = 7;
    pub const MAP_WINDOW: u8 = 8;
    pub const UNMAP_WINDOW: u8 = 10;
    pub const CONFIGURE_WINDOW: u8 = 12;
    pub const CHANGE_PROPERTY: u8 = 18;
    pub const OPEN_FONT: u8 = 45;
    pub const CLOSE_FONT: u8 = 46;
    pub const CREATE_PIXMAP: u8 = 53;
    pub const FREE_PIXMAP: u8 = 54;
    pub const CREATE_GC: u8 = 55;
    pub const CHANGE_GC: u8 = 56;
    pub const SET_DASHES: u8 = 58;
    pub const SET_CLIP_RECTANGLES: u8 = 59;
    pub const FREE_GC: u8 = 60;
    pub const COPY_AREA: u8 = 62;
    pub const POLY_FILL_RECTANGLE: u8 = 70;
    pub const PUT_IMAGE: u8 = 72;
    pub const CREATE_COLORMAP: u8 = 78;
    pub const FREE_COLORMAP: u8 = 79;
    pub const FREE_COLORS: u8 = 88;
    pub const STORE_COLORS: u8 = 89;
}

pub mod error_code {
    pub const BAD_VALUE: u8 = 2;
    pub const BAD_WINDOW: u8 = 3;
    pub const BAD_PIXMAP: u8 = 4;
    pub const BAD_FONT: u8 = 7;
    pub const BAD_MATCH: u8 = 8;
    pub const BAD_DRAWABLE: u8 = 9;
    pub const BAD_COLOR: u8 = 12;
    pub const BAD_GC: u8 = 13;
    pub const BAD_NAME: u8 = 15;
}

/// Atoms every server knows from the start, in id order starting at 1.
pub const PREDEFINED_ATOMS: &[&str] = &[
    "PRIMARY",
    "SECONDARY",
    "ARC",
    "ATOM",
    "BITMAP",
    "CARDINAL",
    "COLORMAP",
    "CURSOR",
    "CUT_BUFFER0",
    "CUT_BUFFER1",
    "CUT_BUFFER2",
    "CUT_BUFFER3",
    "CUT_BUFFER4",
    "CUT_BUFFER5",
    "CUT_BUFFER6",
    "CUT_BUFFER7",
    "DRAWABLE",
    "FONT",
    "INTEGER",
    "PIXMAP",
    "POINT",
    "RECTANGLE",
    "RESOURCE_MANAGER",
    "RGB_COLOR_MAP",
    "RGB_BEST_MAP",
    "RGB_BLUE_MAP",
    "RGB_DEFAULT_MAP",
    "RGB_GRAY_MAP",
    "RGB_GREEN_MAP",
    "RGB_RED_MAP",
    "STRING",
    "VISUALID",
    "WINDOW",
    "WM_COMMAND",
    "WM_HINTS",
    "WM_CLIENT_MACHINE",
    "WM_ICON_NAME",
    "WM_ICON_SIZE",
    "WM_NAME",
    "WM_NORMAL_HINTS",
    "WM_SIZE_HINTS",
    "WM_ZOOM_HINTS",
    "MIN_SPACE",
    "NORM_SPACE",
    "MAX_SPACE",
    "END_SPACE",
    "SUPERSCRIPT_X",
    "SUPERSCRIPT_Y",
    "SUBSCRIPT_X",
    "SUBSCRIPT_Y",
    "UNDERLINE_POSITION",
    "UNDERLINE_THICKNESS",
    "STRIKEOUT_ASCENT",
    "STRIKEOUT_DESCENT",
    "ITALIC_ANGLE",
    "X_HEIGHT",
    "QUAD_WIDTH",
    "WEIGHT",
    "POINT_SIZE",
    "RESOLUTION",
    "COPYRIGHT",
    "NOTICE",
    "FONT_NAME",
    "FAMILY_NAME",
    "FULL_NAME",
    "CAP_HEIGHT",
    "WM_CLASS",
    "WM_TRANSIENT_FOR",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_atom_ids() {
        let id = |name: &str| PREDEFINED_ATOMS.iter().position(|a| *a == name).map(|i| i + 1);
        assert_eq!(id("PRIMARY"), Some(1));
        assert_eq!(id("STRING"), Some(31));
        assert_eq!(id("WM_NAME"), Some(39));
        assert_eq!(id("WM_TRANSIENT_FOR"), Some(68));
    }
}
