// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Visuals, colors and colormaps.
//!
//! A [`Colormap`] maps RGB requests onto native pixel values. How that works
//! depends on the visual class:
//!
//! - true and direct color visuals pack the components straight into a pixel;
//! - pseudo color and gray scale visuals allocate palette cells, either from
//!   a private palette the colormap owns or from a palette shared with other
//!   clients;
//! - static visuals have a fixed palette the server picks from.
//!
//! Palette cells are reference counted so that repeated requests for the
//! same color share one cell.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::backend::{Backend, NativeColormap};
use crate::error::Error;

/// Minimum time between two non-forced palette reads from the server.
const SYNC_INTERVAL: Duration = Duration::from_secs(2);

/// The kind of color model a visual implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualClass {
    StaticGray,
    GrayScale,
    StaticColor,
    PseudoColor,
    TrueColor,
    DirectColor,
}

/// A description of how pixel values are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visual {
    pub id: u32,
    pub class: VisualClass,
    pub depth: u8,
    pub colormap_size: usize,
    pub bits_per_rgb: u8,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl Visual {
    /// A true color visual with the usual 8-8-8 or 5-6-5 layout.
    pub fn true_color(id: u32, depth: u8) -> Visual {
        let (red_mask, green_mask, blue_mask): (u32, u32, u32) = match depth {
            15 => (0x7c00, 0x03e0, 0x001f),
            16 => (0xf800, 0x07e0, 0x001f),
            _ => (0x00ff_0000, 0x0000_ff00, 0x0000_00ff),
        };
        Visual {
            id,
            class: VisualClass::TrueColor,
            depth,
            colormap_size: 1 << (red_mask >> red_mask.trailing_zeros()).trailing_ones(),
            bits_per_rgb: 8,
            red_mask,
            green_mask,
            blue_mask,
        }
    }

    /// A palette based visual of the given class.
    pub fn indexed(id: u32, class: VisualClass, depth: u8) -> Visual {
        Visual {
            id,
            class,
            depth,
            colormap_size: 1usize << depth.min(16),
            bits_per_rgb: 8,
            red_mask: 0,
            green_mask: 0,
            blue_mask: 0,
        }
    }

    /// Shift and precision of the red channel.
    pub fn red_shift_prec(&self) -> (u32, u32) {
        decompose_mask(self.red_mask)
    }

    /// Shift and precision of the green channel.
    pub fn green_shift_prec(&self) -> (u32, u32) {
        decompose_mask(self.green_mask)
    }

    /// Shift and precision of the blue channel.
    pub fn blue_shift_prec(&self) -> (u32, u32) {
        decompose_mask(self.blue_mask)
    }

    /// Whether pixels are looked up in a palette.
    pub fn has_palette(&self) -> bool {
        !matches!(self.class, VisualClass::TrueColor | VisualClass::DirectColor)
    }

    /// Packs 16-bit components into a pixel for true and direct color visuals.
    ///
    /// Bits not covered by any channel mask, and not above the visual's
    /// depth, are set so that e.g. an alpha channel comes out opaque.
    pub fn pack_pixel(&self, red: u16, green: u16, blue: u16) -> u32 {
        let padding = if self.depth >= 32 {
            0
        } else {
            !0u32 << self.depth
        };
        let unused = !(self.red_mask | self.green_mask | self.blue_mask | padding);
        let channel = |value: u16, (shift, prec): (u32, u32)| -> u32 {
            if prec == 0 {
                0
            } else {
                ((value as u32) >> (16 - prec.min(16))) << shift
            }
        };
        unused
            | channel(red, self.red_shift_prec())
            | channel(green, self.green_shift_prec())
            | channel(blue, self.blue_shift_prec())
    }
}

fn decompose_mask(mask: u32) -> (u32, u32) {
    if mask == 0 {
        return (0, 0);
    }
    let shift = mask.trailing_zeros();
    (shift, (mask >> shift).trailing_ones())
}

/// A color with 16-bit components and the pixel value it was allocated as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub pixel: u32,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xffff, 0xffff, 0xffff);

    /// A color that has not been allocated yet.
    pub const fn rgb(red: u16, green: u16, blue: u16) -> Color {
        Color {
            pixel: 0,
            red,
            green,
            blue,
        }
    }

    /// Scales 8-bit components up to the full 16-bit range.
    pub const fn rgb8(red: u8, green: u8, blue: u8) -> Color {
        Color::rgb(
            red as u16 * 0x101,
            green as u16 * 0x101,
            blue as u16 * 0x101,
        )
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrrgggbbb` or `#rrrrggggbbbb`.
    ///
    /// Like the X color syntax, shorter forms give the most significant bits.
    pub fn parse(spec: &str) -> Option<Color> {
        let hex = spec.strip_prefix('#')?;
        if hex.is_empty() || hex.len() % 3 != 0 || hex.len() > 12 {
            return None;
        }
        let n = hex.len() / 3;
        let component = |i: usize| -> Option<u16> {
            let v = u16::from_str_radix(hex.get(i * n..(i + 1) * n)?, 16).ok()?;
            Some(v << (16 - 4 * n as u32))
        };
        Some(Color::rgb(component(0)?, component(1)?, component(2)?))
    }

    /// Compares the components only, ignoring the pixel.
    pub fn same_rgb(&self, other: &Color) -> bool {
        self.red == other.red && self.green == other.green && self.blue == other.blue
    }

    fn key(&self) -> (u16, u16, u16) {
        (self.red, self.green, self.blue)
    }
}

/// Returns the palette index closest to `color`, by the sum of the
/// absolute component differences.
///
/// When `available` is given only indices marked `true` are considered.
/// On ties the lowest index wins.
pub fn match_color(palette: &[Color], color: &Color, available: Option<&[bool]>) -> Option<usize> {
    let mut best = None;
    let mut max = 3 * 65536;
    for (i, entry) in palette.iter().enumerate() {
        if let Some(available) = available {
            if !available.get(i).copied().unwrap_or(false) {
                continue;
            }
        }
        let distance = (color.red as i32 - entry.red as i32).abs()
            + (color.green as i32 - entry.green as i32).abs()
            + (color.blue as i32 - entry.blue as i32).abs();
        if distance < max {
            best = Some(i);
            max = distance;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, Default)]
struct CellInfo {
    ref_count: u32,
    writeable: bool,
}

struct ColormapState<B: Backend> {
    backend: B,
    native: NativeColormap,
    visual: Visual,
    private: bool,
    owned: bool,
    palette: Vec<Color>,
    info: Vec<CellInfo>,
    hash: HashMap<(u16, u16, u16), u32>,
    last_sync: Option<Instant>,
}

impl<B: Backend> Drop for ColormapState<B> {
    fn drop(&mut self) {
        if self.owned {
            self.backend.free_colormap(self.native);
        }
    }
}

/// A shared handle to a colormap.
///
/// Cloning the handle shares the colormap; the native colormap is released
/// when the last handle goes away.
pub struct Colormap<B: Backend> {
    inner: Rc<RefCell<ColormapState<B>>>,
}

impl<B: Backend> Clone for Colormap<B> {
    fn clone(&self) -> Self {
        Colormap {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Colormap<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Colormap")
            .field("native", &state.native)
            .field("class", &state.visual.class)
            .field("private", &state.private)
            .finish()
    }
}

impl<B: Backend> Colormap<B> {
    /// Creates a new colormap for `visual`.
    ///
    /// A private palette colormap starts out as a copy of the system palette
    /// so that switching to it does not flash.
    pub fn new(backend: &B, visual: &Visual, private: bool) -> Result<Colormap<B>, Error> {
        let (private, native) = match visual.class {
            VisualClass::GrayScale | VisualClass::PseudoColor => {
                (private, backend.create_colormap(visual, private)?)
            }
            VisualClass::DirectColor => (true, backend.create_colormap(visual, true)?),
            VisualClass::StaticGray | VisualClass::StaticColor | VisualClass::TrueColor => {
                (false, backend.create_colormap(visual, false)?)
            }
        };
        let state = ColormapState::new(backend.clone(), native, visual.clone(), private, true);
        let colormap = Colormap {
            inner: Rc::new(RefCell::new(state)),
        };

        match visual.class {
            VisualClass::GrayScale | VisualClass::PseudoColor if private => {
                let size = visual.colormap_size;
                let pixels: Vec<u32> = (0..size as u32).collect();
                let system = backend.query_colors(backend.system_colormap(), &pixels);
                backend.store_colors(native, &system);
                let mut state = colormap.inner.borrow_mut();
                for c in system {
                    if let Some(slot) = state.palette.get_mut(c.pixel as usize) {
                        *slot = c;
                    }
                }
            }
            VisualClass::DirectColor => {
                let (_, prec) = visual.red_shift_prec();
                let size = 1usize << prec;
                let ramp: Vec<Color> = (0..size)
                    .map(|i| {
                        let v = (i * 65535 / (size.max(2) - 1)) as u16;
                        Color {
                            pixel: visual.pack_pixel(v, v, v),
                            red: v,
                            green: v,
                            blue: v,
                        }
                    })
                    .collect();
                backend.store_colors(native, &ramp);
            }
            VisualClass::StaticGray | VisualClass::StaticColor => {
                colormap.inner.borrow_mut().sync(true);
            }
            _ => {}
        }
        tracing::debug!(
            "created {:?} colormap {:?} (private: {})",
            visual.class,
            native,
            private
        );
        Ok(colormap)
    }

    /// Wraps the server's default colormap. It is never freed.
    pub fn system(backend: &B) -> Colormap<B> {
        let visual = backend.system_visual();
        let state = ColormapState::new(
            backend.clone(),
            backend.system_colormap(),
            visual,
            false,
            false,
        );
        let colormap = Colormap {
            inner: Rc::new(RefCell::new(state)),
        };
        if colormap.visual().has_palette() {
            colormap.inner.borrow_mut().sync(true);
        }
        colormap
    }

    pub fn visual(&self) -> Visual {
        self.inner.borrow().visual.clone()
    }

    pub fn native(&self) -> NativeColormap {
        self.inner.borrow().native
    }

    pub fn is_private(&self) -> bool {
        self.inner.borrow().private
    }

    /// The number of palette entries, or 0 for visuals without a palette.
    pub fn size(&self) -> usize {
        self.inner.borrow().palette.len()
    }

    /// A snapshot of the local palette.
    pub fn colors(&self) -> Vec<Color> {
        self.inner.borrow().palette.clone()
    }

    /// Returns `true` if both handles refer to the same colormap.
    pub fn ptr_eq(&self, other: &Colormap<B>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Re-reads unallocated palette cells from the server.
    ///
    /// Unless `force` is set this is skipped when the last read was less
    /// than two seconds ago.
    pub fn sync(&self, force: bool) {
        self.inner.borrow_mut().sync(force);
    }

    /// Allocates pixels for `colors`, filling in their `pixel` fields.
    ///
    /// Returns the number of colors that got no pixel, and one flag per
    /// color telling whether it did. With `best_match` a color that cannot
    /// be allocated exactly is replaced by the closest one available, and
    /// its components are updated to match.
    pub fn alloc_colors(
        &self,
        colors: &mut [Color],
        writeable: bool,
        best_match: bool,
    ) -> (usize, Vec<bool>) {
        let success = self
            .inner
            .borrow_mut()
            .alloc_colors(colors, writeable, best_match);
        let failed = success.iter().filter(|ok| !**ok).count();
        (failed, success)
    }

    /// Allocates a single color. See [`alloc_colors`](Self::alloc_colors).
    pub fn alloc_color(&self, color: &mut Color, writeable: bool, best_match: bool) -> bool {
        let (failed, _) = self.alloc_colors(std::slice::from_mut(color), writeable, best_match);
        failed == 0
    }

    /// Releases colors previously allocated from this colormap.
    pub fn free_colors(&self, colors: &[Color]) {
        self.inner.borrow_mut().free_colors(colors);
    }

    /// Changes the value of a writeable cell.
    pub fn change_color(&self, color: &Color) -> bool {
        self.inner.borrow_mut().change_color(color)
    }

    /// Stores the first `ncolors` entries of the local palette on the server.
    pub fn change(&self, ncolors: usize) {
        let state = self.inner.borrow();
        let n = ncolors.min(state.palette.len());
        state.backend.store_colors(state.native, &state.palette[..n]);
    }

    /// Reports the components a pixel value stands for.
    pub fn query_color(&self, pixel: u32) -> Color {
        self.inner.borrow().query_color(pixel)
    }
}

impl<B: Backend> ColormapState<B> {
    fn new(backend: B, native: NativeColormap, visual: Visual, private: bool, owned: bool) -> Self {
        let (palette, info) = if visual.has_palette() {
            let size = visual.colormap_size;
            let palette = (0..size as u32)
                .map(|pixel| Color {
                    pixel,
                    ..Color::BLACK
                })
                .collect();
            (palette, vec![CellInfo::default(); size])
        } else {
            (Vec::new(), Vec::new())
        };
        ColormapState {
            backend,
            native,
            visual,
            private,
            owned,
            palette,
            info,
            hash: HashMap::new(),
            last_sync: None,
        }
    }

    fn sync(&mut self, force: bool) {
        if self.palette.is_empty() {
            return;
        }
        let now = Instant::now();
        if !force {
            if let Some(last) = self.last_sync {
                if now.duration_since(last) < SYNC_INTERVAL {
                    return;
                }
            }
        }
        self.last_sync = Some(now);

        let pixels: Vec<u32> = self
            .info
            .iter()
            .enumerate()
            .filter(|(_, info)| info.ref_count == 0)
            .map(|(i, _)| i as u32)
            .collect();
        if pixels.is_empty() {
            return;
        }
        for c in self.backend.query_colors(self.native, &pixels) {
            if let Some(slot) = self.palette.get_mut(c.pixel as usize) {
                *slot = c;
            }
        }
    }

    /// Records a newly granted read-only cell.
    fn add(&mut self, color: &Color) {
        let pixel = color.pixel as usize;
        if pixel >= self.palette.len() {
            return;
        }
        self.palette[pixel] = *color;
        if self.info[pixel].ref_count == 0 {
            self.hash.insert(color.key(), color.pixel);
        }
        self.info[pixel].ref_count += 1;
    }

    /// One native allocation, folding duplicates into the local refcount.
    fn alloc1(&mut self, color: &Color) -> Option<Color> {
        let granted = self.backend.alloc_color(self.native, color)?;
        let pixel = granted.pixel as usize;
        if pixel < self.palette.len() {
            if self.info[pixel].ref_count > 0 {
                self.backend.free_colors(self.native, &[granted.pixel]);
                self.info[pixel].ref_count += 1;
            } else {
                self.add(&granted);
            }
        }
        Some(granted)
    }

    fn alloc_colors(&mut self, colors: &mut [Color], writeable: bool, best_match: bool) -> Vec<bool> {
        let mut success = vec![false; colors.len()];
        match self.visual.class {
            VisualClass::PseudoColor | VisualClass::GrayScale => {
                if writeable {
                    self.alloc_writeable(colors, &mut success);
                } else {
                    self.alloc_pseudocolor(colors, &mut success, best_match);
                }
            }
            VisualClass::TrueColor | VisualClass::DirectColor => {
                if writeable {
                    tracing::warn!(
                        "writeable colors are not available on a {:?} visual",
                        self.visual.class
                    );
                } else {
                    for (color, ok) in colors.iter_mut().zip(success.iter_mut()) {
                        color.pixel = self.visual.pack_pixel(color.red, color.green, color.blue);
                        *ok = true;
                    }
                }
            }
            VisualClass::StaticGray | VisualClass::StaticColor => {
                for i in 0..colors.len() {
                    if let Some(granted) = self.backend.alloc_color(self.native, &colors[i]) {
                        colors[i] = granted;
                        success[i] = true;
                    } else if best_match {
                        if let Some(index) = match_color(&self.palette, &colors[i], None) {
                            colors[i] = self.palette[index];
                            success[i] = true;
                        }
                    }
                }
            }
        }
        let failed = success.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            tracing::debug!("{} of {} colors could not be allocated", failed, colors.len());
        }
        success
    }

    fn alloc_writeable(&mut self, colors: &mut [Color], success: &mut [bool]) {
        if self.private {
            let mut index = 0;
            for (color, ok) in colors.iter_mut().zip(success.iter_mut()) {
                while index < self.info.len() && self.info[index].ref_count != 0 {
                    index += 1;
                }
                if index >= self.info.len() {
                    break;
                }
                color.pixel = index as u32;
                self.info[index].ref_count += 1;
                self.info[index].writeable = true;
                *ok = true;
            }
            return;
        }

        let pixels = match self.backend.alloc_color_cells(self.native, colors.len()) {
            Some(pixels) => pixels,
            None => return,
        };
        for ((color, ok), pixel) in colors.iter_mut().zip(success.iter_mut()).zip(pixels) {
            if let Some(info) = self.info.get_mut(pixel as usize) {
                info.ref_count += 1;
                info.writeable = true;
            }
            color.pixel = pixel;
            *ok = true;
        }
    }

    fn alloc_pseudocolor(&mut self, colors: &mut [Color], success: &mut [bool], best_match: bool) {
        let mut remaining = 0;
        for (color, ok) in colors.iter_mut().zip(success.iter_mut()) {
            if let Some(&pixel) = self.hash.get(&color.key()) {
                self.info[pixel as usize].ref_count += 1;
                color.pixel = pixel;
                *ok = true;
            } else {
                remaining += 1;
            }
        }
        if remaining == 0 {
            return;
        }
        if self.private {
            self.alloc_private(colors, success, best_match);
        } else {
            self.alloc_shared(colors, success, best_match);
        }
    }

    fn alloc_private(&mut self, colors: &mut [Color], success: &mut [bool], best_match: bool) {
        let mut store = Vec::new();
        let mut index = 0;
        let mut remaining = 0;
        for (color, ok) in colors.iter_mut().zip(success.iter_mut()) {
            if *ok {
                continue;
            }
            while index < self.info.len() && self.info[index].ref_count != 0 {
                index += 1;
            }
            if index < self.info.len() {
                color.pixel = index as u32;
                store.push(*color);
                self.add(color);
                *ok = true;
            } else {
                remaining += 1;
            }
        }
        if !store.is_empty() {
            self.backend.store_colors(self.native, &store);
        }

        if remaining > 0 && best_match {
            let available: Vec<bool> = self.info.iter().map(|info| !info.writeable).collect();
            for (color, ok) in colors.iter_mut().zip(success.iter_mut()) {
                if *ok {
                    continue;
                }
                if let Some(index) = match_color(&self.palette, color, Some(&available)) {
                    *color = self.palette[index];
                    self.info[index].ref_count += 1;
                    *ok = true;
                }
            }
        }
    }

    fn alloc_shared(&mut self, colors: &mut [Color], success: &mut [bool], best_match: bool) {
        let mut remaining = 0;
        for (color, ok) in colors.iter_mut().zip(success.iter_mut()) {
            if *ok {
                continue;
            }
            match self.alloc1(color) {
                Some(granted) => {
                    *color = granted;
                    *ok = true;
                }
                None => remaining += 1,
            }
        }
        if remaining == 0 || !best_match {
            return;
        }

        // Only built once an exact allocation has failed.
        let mut available: Vec<bool> = self
            .info
            .iter()
            .map(|info| info.ref_count == 0 || !info.writeable)
            .collect();
        self.sync(false);

        let mut gave_up = vec![false; colors.len()];
        while remaining > 0 {
            for i in 0..colors.len() {
                if success[i] || gave_up[i] {
                    continue;
                }
                match match_color(&self.palette, &colors[i], Some(&available)) {
                    Some(index) if self.info[index].ref_count > 0 => {
                        self.info[index].ref_count += 1;
                        colors[i] = self.palette[index];
                        success[i] = true;
                        remaining -= 1;
                    }
                    Some(index) => {
                        let candidate = self.palette[index];
                        match self.alloc1(&candidate) {
                            Some(granted) => {
                                colors[i] = granted;
                                success[i] = true;
                                remaining -= 1;
                                // The palette changed, so rescan from the start.
                                break;
                            }
                            None => available[index] = false,
                        }
                    }
                    None => {
                        gave_up[i] = true;
                        remaining -= 1;
                    }
                }
            }
        }
    }

    fn free_colors(&mut self, colors: &[Color]) {
        if !matches!(
            self.visual.class,
            VisualClass::PseudoColor | VisualClass::GrayScale
        ) {
            return;
        }
        let mut pixels = Vec::new();
        for color in colors {
            let pixel = color.pixel as usize;
            let Some(info) = self.info.get_mut(pixel) else {
                tracing::warn!("freeing pixel {} outside the colormap", pixel);
                continue;
            };
            if info.ref_count == 0 {
                continue;
            }
            info.ref_count -= 1;
            if info.ref_count == 0 {
                pixels.push(color.pixel);
                if !info.writeable {
                    self.hash.remove(&self.palette[pixel].key());
                }
                info.writeable = false;
            }
        }
        if !pixels.is_empty() {
            self.backend.free_colors(self.native, &pixels);
        }
    }

    fn change_color(&mut self, color: &Color) -> bool {
        match self.visual.class {
            VisualClass::PseudoColor | VisualClass::GrayScale | VisualClass::DirectColor => {
                self.backend.store_colors(self.native, &[*color]);
                if let Some(slot) = self.palette.get_mut(color.pixel as usize) {
                    *slot = *color;
                }
                true
            }
            class => {
                tracing::warn!("cannot change colors of a {:?} colormap", class);
                false
            }
        }
    }

    fn query_color(&self, pixel: u32) -> Color {
        let visual = &self.visual;
        let scale = |value: u32, max: u32| -> u16 {
            if max == 0 {
                0
            } else {
                (65535.0 * value as f64 / max as f64).round() as u16
            }
        };
        match visual.class {
            VisualClass::TrueColor | VisualClass::DirectColor => {
                let channel = |mask: u32, (shift, prec): (u32, u32)| {
                    scale((pixel & mask) >> shift, (1u32 << prec) - 1)
                };
                Color {
                    pixel,
                    red: channel(visual.red_mask, visual.red_shift_prec()),
                    green: channel(visual.green_mask, visual.green_shift_prec()),
                    blue: channel(visual.blue_mask, visual.blue_shift_prec()),
                }
            }
            VisualClass::StaticGray | VisualClass::GrayScale => {
                let max = (1u64 << visual.depth.min(32)) - 1;
                let v = scale(pixel, max as u32);
                Color {
                    pixel,
                    red: v,
                    green: v,
                    blue: v,
                }
            }
            VisualClass::StaticColor => self
                .backend
                .query_colors(self.native, &[pixel])
                .into_iter()
                .next()
                .unwrap_or(Color { pixel, ..Color::BLACK }),
            VisualClass::PseudoColor => match self.palette.get(pixel as usize) {
                Some(c) => *c,
                None => {
                    tracing::warn!("pixel {} is outside the colormap", pixel);
                    Color { pixel, ..Color::BLACK }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{Headless, HeadlessConfig, Request};

    fn pseudo_backend(capacity: Option<usize>) -> Headless {
        Headless::new(HeadlessConfig {
            visual: Visual::indexed(0x21, VisualClass::PseudoColor, 4),
            shared_cell_capacity: capacity,
            ..HeadlessConfig::default()
        })
    }

    #[test]
    fn true_color_packing() {
        let visual = Visual::true_color(1, 24);
        assert_eq!(visual.pack_pixel(0xffff, 0x8000, 0), 0x00ff_8000);
        let argb = Visual {
            depth: 32,
            ..Visual::true_color(2, 24)
        };
        assert_eq!(argb.pack_pixel(0xffff, 0x8000, 0), 0xffff_8000);
        let rgb565 = Visual::true_color(3, 16);
        assert_eq!(rgb565.pack_pixel(0xffff, 0xffff, 0xffff), 0xffff);
    }

    #[test]
    fn true_color_layouts_per_depth() {
        let rgb555 = Visual::true_color(1, 15);
        assert_eq!(rgb555.red_shift_prec(), (10, 5));
        assert_eq!(rgb555.green_shift_prec(), (5, 5));
        assert_eq!(rgb555.colormap_size, 32);

        let rgb565 = Visual::true_color(2, 16);
        assert_eq!(rgb565.red_shift_prec(), (11, 5));
        assert_eq!(rgb565.green_shift_prec(), (5, 6));
        assert_eq!(rgb565.blue_shift_prec(), (0, 5));
        assert_eq!(rgb565.colormap_size, 32);

        let rgb888 = Visual::true_color(3, 24);
        assert_eq!(rgb888.red_shift_prec(), (16, 8));
        assert_eq!(rgb888.colormap_size, 256);
    }

    #[test]
    fn match_color_prefers_first_on_ties() {
        let palette = [Color::rgb(100, 0, 0), Color::rgb(0, 100, 0)];
        let probe = Color::rgb(50, 50, 0);
        assert_eq!(match_color(&palette, &probe, None), Some(0));
        assert_eq!(match_color(&palette, &probe, Some(&[false, true])), Some(1));
        assert_eq!(match_color(&palette, &probe, Some(&[false, false])), None);
    }

    #[test]
    fn parse_hex_forms() {
        assert_eq!(Color::parse("#f00"), Some(Color::rgb(0xf000, 0, 0)));
        assert_eq!(Color::parse("#00ff80"), Some(Color::rgb(0, 0xff00, 0x8000)));
        assert_eq!(Color::parse("#123412341234"), Some(Color::rgb(0x1234, 0x1234, 0x1234)));
        assert_eq!(Color::parse("red"), None);
        assert_eq!(Color::parse("#12"), None);
    }

    #[test]
    fn true_color_colormap_allocates_directly() {
        let backend = Headless::new(HeadlessConfig::default());
        let colormap = Colormap::system(&backend);
        let mut colors = [Color::rgb(0xffff, 0, 0), Color::rgb(0, 0, 0xffff)];
        assert_eq!(
            colormap.alloc_colors(&mut colors, false, false),
            (0, vec![true, true])
        );
        assert_eq!(colors[0].pixel, 0xff0000);
        assert_eq!(colors[1].pixel, 0x0000ff);
        let back = colormap.query_color(0x00ff00);
        assert_eq!((back.red, back.green, back.blue), (0, 0xffff, 0));
    }

    #[test]
    fn private_palette_falls_back_to_best_match() {
        let backend = pseudo_backend(None);
        let colormap = Colormap::new(&backend, &backend.system_visual(), true).unwrap();
        assert_eq!(colormap.size(), 16);

        let mut ramp: Vec<Color> = (0..16u16).map(|i| Color::rgb(i * 4096, 0, 0)).collect();
        assert_eq!(colormap.alloc_colors(&mut ramp, false, false).0, 0);
        let pixels: Vec<u32> = ramp.iter().map(|c| c.pixel).collect();
        assert_eq!(pixels, (0..16).collect::<Vec<u32>>());

        // The palette is full: an exact request fails, a best match succeeds.
        let mut extra = Color::rgb(4100, 10, 0);
        assert!(!colormap.alloc_color(&mut extra, false, false));
        assert!(colormap.alloc_color(&mut extra, false, true));
        assert_eq!(extra.pixel, 1);
        assert_eq!(extra.red, 4096);
    }

    #[test]
    fn repeated_colors_share_a_cell() {
        let backend = pseudo_backend(Some(4));
        let colormap = Colormap::system(&backend);
        let mut a = Color::rgb(0xffff, 0, 0);
        let mut b = Color::rgb(0xffff, 0, 0);
        assert!(colormap.alloc_color(&mut a, false, false));
        assert!(colormap.alloc_color(&mut b, false, false));
        assert_eq!(a.pixel, b.pixel);

        backend.clear_requests();
        colormap.free_colors(&[a]);
        assert!(!backend
            .requests()
            .iter()
            .any(|(_, r)| matches!(r, Request::FreeColors { .. })));
        colormap.free_colors(&[b]);
        assert!(backend
            .requests()
            .iter()
            .any(|(_, r)| matches!(r, Request::FreeColors { pixels, .. } if pixels == &vec![a.pixel])));
    }

    #[test]
    fn shared_palette_matches_after_native_failure() {
        let backend = pseudo_backend(Some(2));
        let colormap = Colormap::system(&backend);
        let mut red = Color::rgb(0xffff, 0, 0);
        let mut green = Color::rgb(0, 0xffff, 0);
        assert!(colormap.alloc_color(&mut red, false, false));
        assert!(colormap.alloc_color(&mut green, false, false));

        let mut blue = Color::rgb(0, 0, 60000);
        assert!(!colormap.alloc_color(&mut blue, false, false));
        assert!(colormap.alloc_color(&mut blue, false, true));
        // Red and green are equally far away; the lower pixel wins.
        assert_eq!(blue.pixel, red.pixel);
        assert!(blue.same_rgb(&red));
    }

    #[test]
    fn writeable_cells_can_change() {
        let backend = pseudo_backend(None);
        let colormap = Colormap::new(&backend, &backend.system_visual(), true).unwrap();
        let mut cell = Color::rgb(0, 0, 0);
        assert!(colormap.alloc_color(&mut cell, true, false));
        cell.red = 0x1234;
        assert!(colormap.change_color(&cell));
        assert_eq!(colormap.query_color(cell.pixel).red, 0x1234);
        let stored = backend.query_colors(colormap.native(), &[cell.pixel]);
        assert_eq!(stored[0].red, 0x1234);
    }
}
