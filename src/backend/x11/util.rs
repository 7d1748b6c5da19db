// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Miscellaneous utility functions for working with X11.

use x11rb::protocol::xproto::{self, ImageOrder, Screen, Setup, Visualtype};

use crate::colormap::{Visual, VisualClass};
use crate::window::EventMask;

macro_rules! log_x11 {
    ($val:expr) => {
        if let Err(e) = $val {
            // Errors here mean the connection is gone; the request itself
            // reports its failure asynchronously.
            tracing::error!("X11 error: {}", e);
        }
    };
}

/// Finds a visual and the depth it belongs to.
pub fn find_visual(screen: &Screen, visual_id: u32) -> Option<(Visualtype, u8)> {
    for depth in &screen.allowed_depths {
        for visual in &depth.visuals {
            if visual.visual_id == visual_id {
                return Some((*visual, depth.depth));
            }
        }
    }
    None
}

pub fn visual_from_x11(visual: &Visualtype, depth: u8) -> Visual {
    let class = match visual.class {
        xproto::VisualClass::STATIC_GRAY => VisualClass::StaticGray,
        xproto::VisualClass::GRAY_SCALE => VisualClass::GrayScale,
        xproto::VisualClass::STATIC_COLOR => VisualClass::StaticColor,
        xproto::VisualClass::PSEUDO_COLOR => VisualClass::PseudoColor,
        xproto::VisualClass::DIRECT_COLOR => VisualClass::DirectColor,
        _ => VisualClass::TrueColor,
    };
    Visual {
        id: visual.visual_id,
        class,
        depth,
        colormap_size: usize::from(visual.colormap_entries),
        bits_per_rgb: visual.bits_per_rgb_value,
        red_mask: visual.red_mask,
        green_mask: visual.green_mask,
        blue_mask: visual.blue_mask,
    }
}

const EVENT_MASKS: [(EventMask, xproto::EventMask); 19] = [
    (EventMask::EXPOSURE, xproto::EventMask::EXPOSURE),
    (EventMask::POINTER_MOTION, xproto::EventMask::POINTER_MOTION),
    (EventMask::POINTER_MOTION_HINT, xproto::EventMask::POINTER_MOTION_HINT),
    (EventMask::BUTTON_MOTION, xproto::EventMask::BUTTON_MOTION),
    (EventMask::BUTTON1_MOTION, xproto::EventMask::BUTTON1_MOTION),
    (EventMask::BUTTON2_MOTION, xproto::EventMask::BUTTON2_MOTION),
    (EventMask::BUTTON3_MOTION, xproto::EventMask::BUTTON3_MOTION),
    (EventMask::BUTTON_PRESS, xproto::EventMask::BUTTON_PRESS),
    (EventMask::BUTTON_RELEASE, xproto::EventMask::BUTTON_RELEASE),
    (EventMask::KEY_PRESS, xproto::EventMask::KEY_PRESS),
    (EventMask::KEY_RELEASE, xproto::EventMask::KEY_RELEASE),
    (EventMask::ENTER_NOTIFY, xproto::EventMask::ENTER_WINDOW),
    (EventMask::LEAVE_NOTIFY, xproto::EventMask::LEAVE_WINDOW),
    (EventMask::FOCUS_CHANGE, xproto::EventMask::FOCUS_CHANGE),
    (EventMask::STRUCTURE, xproto::EventMask::STRUCTURE_NOTIFY),
    (EventMask::PROPERTY_CHANGE, xproto::EventMask::PROPERTY_CHANGE),
    (EventMask::VISIBILITY_NOTIFY, xproto::EventMask::VISIBILITY_CHANGE),
    (EventMask::SUBSTRUCTURE, xproto::EventMask::SUBSTRUCTURE_NOTIFY),
    // X has no scroll events; the wheel arrives as button presses.
    (EventMask::SCROLL, xproto::EventMask::BUTTON_PRESS),
];

/// The native event mask selecting `mask`.
pub fn event_mask(mask: EventMask) -> xproto::EventMask {
    EVENT_MASKS
        .iter()
        .filter(|(ours, _)| mask.contains(*ours))
        .fold(xproto::EventMask::NO_EVENT, |acc, (_, theirs)| acc | *theirs)
}

/// Repacks XBM bitmap data (rows padded to bytes, least significant bit
/// first) into the server's bitmap format.
pub fn bitmap_to_server(setup: &Setup, width: usize, height: usize, data: &[u8]) -> Vec<u8> {
    let src_stride = (width + 7) / 8;
    let pad = usize::from(setup.bitmap_format_scanline_pad.max(8)) / 8;
    let dst_stride = (src_stride + pad - 1) / pad * pad;
    let msb_first = setup.bitmap_format_bit_order == ImageOrder::MSB_FIRST;

    let mut out = vec![0u8; dst_stride * height];
    for (src, dst) in data
        .chunks(src_stride)
        .take(height)
        .zip(out.chunks_mut(dst_stride))
    {
        for (s, d) in src.iter().zip(dst.iter_mut()) {
            *d = if msb_first { s.reverse_bits() } else { *s };
        }
    }
    out
}
