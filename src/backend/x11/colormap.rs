// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Colormaps and color cells.

use std::convert::TryFrom;

use x11rb::protocol::xproto::{self, ColorFlag, ColormapAlloc, Coloritem, ConnectionExt};

use super::application::Application;
use super::error::Error;
use crate::backend::NativeColormap;
use crate::colormap::{Color, Visual};

fn cmap(colormap: NativeColormap) -> xproto::Colormap {
    colormap.0 as xproto::Colormap
}

impl Application {
    pub fn create_colormap(&self, visual: &Visual, private: bool) -> Result<NativeColormap, Error> {
        let id = self.generate_id()?;
        let alloc = if private {
            ColormapAlloc::ALL
        } else {
            ColormapAlloc::NONE
        };
        let root = self.root();
        self.send(|conn| conn.create_colormap(alloc, id, root, visual.id));
        Ok(NativeColormap(u64::from(id)))
    }

    pub fn free_colormap(&self, colormap: NativeColormap) {
        self.send(|conn| conn.free_colormap(cmap(colormap)));
    }

    pub fn alloc_color(&self, colormap: NativeColormap, color: &Color) -> Option<Color> {
        let reply = self
            .call(|conn| conn.alloc_color(cmap(colormap), color.red, color.green, color.blue))
            .map_err(|e| tracing::debug!("AllocColor failed: {}", e))
            .ok()?;
        Some(Color {
            pixel: reply.pixel,
            red: reply.red,
            green: reply.green,
            blue: reply.blue,
        })
    }

    pub fn alloc_color_cells(&self, colormap: NativeColormap, count: usize) -> Option<Vec<u32>> {
        let count = u16::try_from(count).ok()?;
        let reply = self
            .call(|conn| conn.alloc_color_cells(false, cmap(colormap), count, 0))
            .map_err(|e| tracing::debug!("AllocColorCells failed: {}", e))
            .ok()?;
        Some(reply.pixels)
    }

    pub fn free_colors(&self, colormap: NativeColormap, pixels: &[u32]) {
        if !pixels.is_empty() {
            self.send(|conn| conn.free_colors(cmap(colormap), 0, pixels));
        }
    }

    pub fn store_colors(&self, colormap: NativeColormap, colors: &[Color]) {
        let items: Vec<Coloritem> = colors
            .iter()
            .map(|c| Coloritem {
                pixel: c.pixel,
                red: c.red,
                green: c.green,
                blue: c.blue,
                flags: (ColorFlag::RED | ColorFlag::GREEN | ColorFlag::BLUE).into(),
            })
            .collect();
        if !items.is_empty() {
            self.send(|conn| conn.store_colors(cmap(colormap), &items));
        }
    }

    pub fn query_colors(&self, colormap: NativeColormap, pixels: &[u32]) -> Vec<Color> {
        if pixels.is_empty() {
            return Vec::new();
        }
        match self.call(|conn| conn.query_colors(cmap(colormap), pixels)) {
            Ok(reply) => pixels
                .iter()
                .zip(reply.colors)
                .map(|(&pixel, rgb)| Color {
                    pixel,
                    red: rgb.red,
                    green: rgb.green,
                    blue: rgb.blue,
                })
                .collect(),
            Err(e) => {
                tracing::debug!("QueryColors failed: {}", e);
                Vec::new()
            }
        }
    }
}
