// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Colormaps on a true color display.
//!
//! Every pixel is a `COLORREF`, so allocating a color only packs it and
//! there are no writeable cells.

use super::application::{error_code, Application};
use super::error::Error;
use crate::backend::NativeColormap;
use crate::colormap::{Color, Visual};

/// The color a `COLORREF` pixel shows.
fn unpack(pixel: u32) -> Color {
    let channel = |shift: u32| ((pixel >> shift) & 0xff) as u16 * 0x101;
    Color {
        pixel,
        red: channel(0),
        green: channel(8),
        blue: channel(16),
    }
}

impl Application {
    fn colormap_exists(&self, colormap: NativeColormap) -> bool {
        self.resources.borrow().colormaps.contains(&colormap.0)
    }

    pub fn create_colormap(&self, visual: &Visual, private: bool) -> Result<NativeColormap, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.request();
        if private {
            tracing::debug!("private colormap for visual {} is shared on Win32", visual.id);
        }
        let mut resources = self.resources.borrow_mut();
        let id = resources.alloc_id();
        resources.colormaps.insert(id);
        Ok(NativeColormap(id))
    }

    pub fn free_colormap(&self, colormap: NativeColormap) {
        self.request();
        if colormap.0 == super::application::SYSTEM_COLORMAP
            || !self.resources.borrow_mut().colormaps.remove(&colormap.0)
        {
            self.shared.push_error(error_code::BAD_COLOR, colormap.0);
        }
    }

    pub fn alloc_color(&self, colormap: NativeColormap, color: &Color) -> Option<Color> {
        self.request();
        if !self.colormap_exists(colormap) {
            return None;
        }
        let pixel = self.visual().pack_pixel(color.red, color.green, color.blue);
        Some(unpack(pixel))
    }

    pub fn alloc_color_cells(&self, colormap: NativeColormap, count: usize) -> Option<Vec<u32>> {
        self.request();
        tracing::debug!(
            "no writeable cells on colormap {}, {} requested",
            colormap.0,
            count
        );
        None
    }

    pub fn free_colors(&self, colormap: NativeColormap, _pixels: &[u32]) {
        self.request();
        if !self.colormap_exists(colormap) {
            self.shared.push_error(error_code::BAD_COLOR, colormap.0);
        }
    }

    pub fn store_colors(&self, colormap: NativeColormap, _colors: &[Color]) {
        self.request();
        let code = if self.colormap_exists(colormap) {
            // Every cell is read-only.
            error_code::BAD_ACCESS
        } else {
            error_code::BAD_COLOR
        };
        self.shared.push_error(code, colormap.0);
    }

    pub fn query_colors(&self, colormap: NativeColormap, pixels: &[u32]) -> Vec<Color> {
        self.request();
        if !self.colormap_exists(colormap) {
            self.shared.push_error(error_code::BAD_COLOR, colormap.0);
            return Vec::new();
        }
        pixels.iter().map(|p| unpack(p & 0x00ff_ffff)).collect()
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn colorrefs_keep_red_in_the_low_byte() {
        let color = unpack(0x0000_80ff);
        assert_eq!(color.red, 0xffff);
        assert_eq!(color.green, 0x8080);
        assert_eq!(color.blue, 0);
    }
}
