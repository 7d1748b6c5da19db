// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Graphics contexts.
//!
//! A [`Gc`] carries the drawing state used by the drawing calls on
//! [`Display`](crate::Display). Changes are recorded locally and only sent
//! to the server right before the next drawing call that uses the GC, at
//! which point origins and clip are also shifted into the native coordinate
//! space of the drawable being drawn to.

use std::cell::Cell;

use crate::backend::{Backend, NativeFont, NativeGc, NativeGcValues};
use crate::colormap::{Color, Colormap};
use crate::display::Display;
use crate::drawable::{Drawable, Font, Pixmap};
use crate::error::Error;
use crate::geometry::{Point, Rectangle};
use crate::region::Region;

bitflags::bitflags! {
    /// Selects which fields of [`GcValues`] an operation uses.
    pub struct GcValuesMask: u32 {
        const FOREGROUND = 1 << 0;
        const BACKGROUND = 1 << 1;
        const FONT = 1 << 2;
        const FUNCTION = 1 << 3;
        const FILL = 1 << 4;
        const TILE = 1 << 5;
        const STIPPLE = 1 << 6;
        const CLIP_MASK = 1 << 7;
        const SUBWINDOW = 1 << 8;
        const TS_X_ORIGIN = 1 << 9;
        const TS_Y_ORIGIN = 1 << 10;
        const CLIP_X_ORIGIN = 1 << 11;
        const CLIP_Y_ORIGIN = 1 << 12;
        const EXPOSURES = 1 << 13;
        const LINE_WIDTH = 1 << 14;
        const LINE_STYLE = 1 << 15;
        const CAP_STYLE = 1 << 16;
        const JOIN_STYLE = 1 << 17;
    }
}

/// How source and destination pixels are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Copy,
    Invert,
    Xor,
    Clear,
    And,
    AndReverse,
    AndInvert,
    Noop,
    Or,
    Equiv,
    OrReverse,
    CopyInvert,
    OrInvert,
    Nand,
    Nor,
    Set,
}

/// How shapes are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fill {
    Solid,
    Tiled,
    Stippled,
    OpaqueStippled,
}

/// Whether drawing to a window also affects its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubwindowMode {
    ClipByChildren,
    IncludeInferiors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStyle {
    Solid,
    OnOffDash,
    DoubleDash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapStyle {
    NotLast,
    Butt,
    Round,
    Projecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinStyle {
    Miter,
    Round,
    Bevel,
}

/// The full set of GC attributes.
///
/// Pixmaps and fonts are shared handles; putting one into a GC keeps it
/// alive for as long as the GC uses it.
pub struct GcValues<B: Backend> {
    pub foreground: Color,
    pub background: Color,
    pub font: Option<Font<B>>,
    pub function: Function,
    pub fill: Fill,
    pub tile: Option<Pixmap<B>>,
    pub stipple: Option<Pixmap<B>>,
    pub clip_mask: Option<Pixmap<B>>,
    pub subwindow_mode: SubwindowMode,
    pub ts_x_origin: i32,
    pub ts_y_origin: i32,
    pub clip_x_origin: i32,
    pub clip_y_origin: i32,
    pub graphics_exposures: bool,
    pub line_width: i32,
    pub line_style: LineStyle,
    pub cap_style: CapStyle,
    pub join_style: JoinStyle,
}

impl<B: Backend> Clone for GcValues<B> {
    fn clone(&self) -> Self {
        GcValues {
            foreground: self.foreground,
            background: self.background,
            font: self.font.clone(),
            function: self.function,
            fill: self.fill,
            tile: self.tile.clone(),
            stipple: self.stipple.clone(),
            clip_mask: self.clip_mask.clone(),
            subwindow_mode: self.subwindow_mode,
            ts_x_origin: self.ts_x_origin,
            ts_y_origin: self.ts_y_origin,
            clip_x_origin: self.clip_x_origin,
            clip_y_origin: self.clip_y_origin,
            graphics_exposures: self.graphics_exposures,
            line_width: self.line_width,
            line_style: self.line_style,
            cap_style: self.cap_style,
            join_style: self.join_style,
        }
    }
}

impl<B: Backend> Default for GcValues<B> {
    fn default() -> Self {
        GcValues {
            foreground: Color::BLACK,
            background: Color::WHITE,
            font: None,
            function: Function::Copy,
            fill: Fill::Solid,
            tile: None,
            stipple: None,
            clip_mask: None,
            subwindow_mode: SubwindowMode::ClipByChildren,
            ts_x_origin: 0,
            ts_y_origin: 0,
            clip_x_origin: 0,
            clip_y_origin: 0,
            graphics_exposures: true,
            line_width: 0,
            line_style: LineStyle::Solid,
            cap_style: CapStyle::Butt,
            join_style: JoinStyle::Miter,
        }
    }
}

const ORIGINS: GcValuesMask = GcValuesMask::from_bits_truncate(
    GcValuesMask::TS_X_ORIGIN.bits()
        | GcValuesMask::TS_Y_ORIGIN.bits()
        | GcValuesMask::CLIP_X_ORIGIN.bits()
        | GcValuesMask::CLIP_Y_ORIGIN.bits(),
);

/// A graphics context.
pub struct Gc<B: Backend> {
    backend: B,
    native: NativeGc,
    depth: u8,
    values: GcValues<B>,
    clip_region: Option<Region>,
    dashes: Option<(i32, Vec<u8>)>,
    colormap: Option<Colormap<B>>,
    dirty: Cell<GcValuesMask>,
    clip_dirty: Cell<bool>,
    dashes_dirty: Cell<bool>,
    applied_offset: Cell<(i32, i32)>,
}

impl<B: Backend> Drop for Gc<B> {
    fn drop(&mut self) {
        self.backend.free_gc(self.native);
    }
}

impl<B: Backend> Gc<B> {
    /// Creates a GC with default values, usable with drawables like `drawable`.
    pub fn new(display: &Display<B>, drawable: &Drawable<B>) -> Result<Gc<B>, Error> {
        Gc::with_values(display, drawable, &GcValues::default(), GcValuesMask::empty())
    }

    /// Creates a GC and applies the fields of `values` selected by `mask`.
    pub fn with_values(
        display: &Display<B>,
        drawable: &Drawable<B>,
        values: &GcValues<B>,
        mask: GcValuesMask,
    ) -> Result<Gc<B>, Error> {
        let target = display.drawable_target(drawable)?;
        let native = display.backend().create_gc(target.native)?;
        let mut gc = Gc {
            backend: display.backend().clone(),
            native,
            depth: display.drawable_depth(drawable),
            values: GcValues::default(),
            clip_region: None,
            dashes: None,
            colormap: display.drawable_colormap(drawable),
            dirty: Cell::new(GcValuesMask::empty()),
            clip_dirty: Cell::new(false),
            dashes_dirty: Cell::new(false),
            applied_offset: Cell::new((0, 0)),
        };
        gc.set_values(values, mask);
        Ok(gc)
    }

    pub fn native(&self) -> NativeGc {
        self.native
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// A copy of the current values.
    pub fn values(&self) -> GcValues<B> {
        self.values.clone()
    }

    pub fn clip_region(&self) -> Option<&Region> {
        self.clip_region.as_ref()
    }

    pub fn colormap(&self) -> Option<&Colormap<B>> {
        self.colormap.as_ref()
    }

    pub fn set_colormap(&mut self, colormap: Colormap<B>) {
        self.colormap = Some(colormap);
    }

    fn mark_dirty(&self, mask: GcValuesMask) {
        self.dirty.set(self.dirty.get() | mask);
    }

    /// Copies the fields of `values` selected by `mask` into this GC.
    pub fn set_values(&mut self, values: &GcValues<B>, mask: GcValuesMask) {
        let v = &mut self.values;
        if mask.contains(GcValuesMask::FOREGROUND) {
            v.foreground = values.foreground;
        }
        if mask.contains(GcValuesMask::BACKGROUND) {
            v.background = values.background;
        }
        if mask.contains(GcValuesMask::FONT) {
            v.font = values.font.clone();
        }
        if mask.contains(GcValuesMask::FUNCTION) {
            v.function = values.function;
        }
        if mask.contains(GcValuesMask::FILL) {
            v.fill = values.fill;
        }
        if mask.contains(GcValuesMask::TILE) {
            v.tile = values.tile.clone();
        }
        if mask.contains(GcValuesMask::STIPPLE) {
            v.stipple = values.stipple.clone();
        }
        if mask.contains(GcValuesMask::CLIP_MASK) {
            v.clip_mask = values.clip_mask.clone();
            self.clip_region = None;
            self.clip_dirty.set(true);
        }
        if mask.contains(GcValuesMask::SUBWINDOW) {
            v.subwindow_mode = values.subwindow_mode;
        }
        if mask.contains(GcValuesMask::TS_X_ORIGIN) {
            v.ts_x_origin = values.ts_x_origin;
        }
        if mask.contains(GcValuesMask::TS_Y_ORIGIN) {
            v.ts_y_origin = values.ts_y_origin;
        }
        if mask.contains(GcValuesMask::CLIP_X_ORIGIN) {
            v.clip_x_origin = values.clip_x_origin;
        }
        if mask.contains(GcValuesMask::CLIP_Y_ORIGIN) {
            v.clip_y_origin = values.clip_y_origin;
        }
        if mask.contains(GcValuesMask::EXPOSURES) {
            v.graphics_exposures = values.graphics_exposures;
        }
        if mask.contains(GcValuesMask::LINE_WIDTH) {
            v.line_width = values.line_width;
        }
        if mask.contains(GcValuesMask::LINE_STYLE) {
            v.line_style = values.line_style;
        }
        if mask.contains(GcValuesMask::CAP_STYLE) {
            v.cap_style = values.cap_style;
        }
        if mask.contains(GcValuesMask::JOIN_STYLE) {
            v.join_style = values.join_style;
        }
        self.mark_dirty(mask);
    }

    pub fn set_foreground(&mut self, color: &Color) {
        self.values.foreground = *color;
        self.mark_dirty(GcValuesMask::FOREGROUND);
    }

    pub fn set_background(&mut self, color: &Color) {
        self.values.background = *color;
        self.mark_dirty(GcValuesMask::BACKGROUND);
    }

    /// Allocates `color` in the GC's colormap and uses it as the foreground.
    pub fn set_rgb_fg_color(&mut self, color: &Color) -> Result<(), Error> {
        let mut color = *color;
        self.alloc_in_colormap(&mut color)?;
        self.set_foreground(&color);
        Ok(())
    }

    /// Allocates `color` in the GC's colormap and uses it as the background.
    pub fn set_rgb_bg_color(&mut self, color: &Color) -> Result<(), Error> {
        let mut color = *color;
        self.alloc_in_colormap(&mut color)?;
        self.set_background(&color);
        Ok(())
    }

    fn alloc_in_colormap(&self, color: &mut Color) -> Result<(), Error> {
        let colormap = self.colormap.as_ref().ok_or_else(|| {
            Error::InvalidInput("GC has no colormap to allocate colors in".into())
        })?;
        if !colormap.alloc_color(color, false, true) {
            return Err(Error::InvalidInput(format!(
                "could not allocate color {:04x}/{:04x}/{:04x}",
                color.red, color.green, color.blue
            )));
        }
        Ok(())
    }

    pub fn set_font(&mut self, font: &Font<B>) {
        self.values.font = Some(font.clone());
        self.mark_dirty(GcValuesMask::FONT);
    }

    pub fn set_function(&mut self, function: Function) {
        self.values.function = function;
        self.mark_dirty(GcValuesMask::FUNCTION);
    }

    pub fn set_fill(&mut self, fill: Fill) {
        self.values.fill = fill;
        self.mark_dirty(GcValuesMask::FILL);
    }

    pub fn set_tile(&mut self, tile: Option<&Pixmap<B>>) {
        self.values.tile = tile.cloned();
        self.mark_dirty(GcValuesMask::TILE);
    }

    pub fn set_stipple(&mut self, stipple: Option<&Pixmap<B>>) {
        self.values.stipple = stipple.cloned();
        self.mark_dirty(GcValuesMask::STIPPLE);
    }

    pub fn set_ts_origin(&mut self, x: i32, y: i32) {
        self.values.ts_x_origin = x;
        self.values.ts_y_origin = y;
        self.mark_dirty(GcValuesMask::TS_X_ORIGIN | GcValuesMask::TS_Y_ORIGIN);
    }

    pub fn set_clip_origin(&mut self, x: i32, y: i32) {
        self.values.clip_x_origin = x;
        self.values.clip_y_origin = y;
        self.mark_dirty(GcValuesMask::CLIP_X_ORIGIN | GcValuesMask::CLIP_Y_ORIGIN);
        if self.clip_region.is_some() {
            self.clip_dirty.set(true);
        }
    }

    /// Clips to the set bits of a bitmap. Replaces any clip region.
    pub fn set_clip_mask(&mut self, mask: Option<&Pixmap<B>>) {
        self.values.clip_mask = mask.cloned();
        self.clip_region = None;
        self.clip_dirty.set(true);
        self.mark_dirty(GcValuesMask::CLIP_MASK);
    }

    /// Clips to a region, or removes the clip. Replaces any clip mask and
    /// resets the clip origin.
    pub fn set_clip_region(&mut self, region: Option<&Region>) {
        if self.values.clip_mask.take().is_some() {
            self.mark_dirty(GcValuesMask::CLIP_MASK);
        }
        self.clip_region = region.cloned();
        self.values.clip_x_origin = 0;
        self.values.clip_y_origin = 0;
        self.mark_dirty(GcValuesMask::CLIP_X_ORIGIN | GcValuesMask::CLIP_Y_ORIGIN);
        self.clip_dirty.set(true);
    }

    /// Clips to a rectangle, or removes the clip.
    pub fn set_clip_rectangle(&mut self, rect: Option<Rectangle>) {
        let region = rect.map(Region::from_rect);
        self.set_clip_region(region.as_ref());
    }

    pub fn set_subwindow(&mut self, mode: SubwindowMode) {
        self.values.subwindow_mode = mode;
        self.mark_dirty(GcValuesMask::SUBWINDOW);
    }

    pub fn set_exposures(&mut self, exposures: bool) {
        self.values.graphics_exposures = exposures;
        self.mark_dirty(GcValuesMask::EXPOSURES);
    }

    pub fn set_line_attributes(
        &mut self,
        line_width: i32,
        line_style: LineStyle,
        cap_style: CapStyle,
        join_style: JoinStyle,
    ) {
        self.values.line_width = line_width;
        self.values.line_style = line_style;
        self.values.cap_style = cap_style;
        self.values.join_style = join_style;
        self.mark_dirty(
            GcValuesMask::LINE_WIDTH
                | GcValuesMask::LINE_STYLE
                | GcValuesMask::CAP_STYLE
                | GcValuesMask::JOIN_STYLE,
        );
    }

    /// Sets the dash pattern used by dashed line styles.
    pub fn set_dashes(&mut self, offset: i32, dashes: &[u8]) -> Result<(), Error> {
        if dashes.is_empty() || dashes.contains(&0) {
            return Err(Error::InvalidInput(
                "dash lengths must be non-empty and non-zero".into(),
            ));
        }
        self.dashes = Some((offset, dashes.to_vec()));
        self.dashes_dirty.set(true);
        Ok(())
    }

    /// Shifts the tile/stipple and clip origins by `(-x, -y)`.
    pub fn offset(&mut self, x: i32, y: i32) {
        if x == 0 && y == 0 {
            return;
        }
        self.values.ts_x_origin -= x;
        self.values.ts_y_origin -= y;
        self.values.clip_x_origin -= x;
        self.values.clip_y_origin -= y;
        self.mark_dirty(ORIGINS);
        if self.clip_region.is_some() {
            self.clip_dirty.set(true);
        }
    }

    /// Makes this GC a copy of `src`.
    ///
    /// Shared resources such as pixmaps and fonts are shared again, the clip
    /// region is duplicated.
    pub fn copy_from(&mut self, src: &Gc<B>) {
        self.values = src.values.clone();
        self.clip_region = src.clip_region.clone();
        self.dashes = src.dashes.clone();
        self.colormap = src.colormap.clone();
        self.mark_dirty(GcValuesMask::all());
        self.clip_dirty.set(true);
        self.dashes_dirty.set(self.dashes.is_some());
    }

    fn native_values(&self, (ox, oy): (i32, i32)) -> NativeGcValues {
        let v = &self.values;
        NativeGcValues {
            foreground: v.foreground.pixel,
            background: v.background.pixel,
            font: v.font.as_ref().map(|f| f.native()),
            function: v.function,
            fill: v.fill,
            tile: v.tile.as_ref().map(|p| p.native()),
            stipple: v.stipple.as_ref().map(|p| p.native()),
            clip_mask: v.clip_mask.as_ref().map(|p| p.native()),
            subwindow_mode: v.subwindow_mode,
            ts_origin: Point::new(v.ts_x_origin - ox, v.ts_y_origin - oy),
            clip_origin: Point::new(v.clip_x_origin - ox, v.clip_y_origin - oy),
            graphics_exposures: v.graphics_exposures,
            line_width: v.line_width,
            line_style: v.line_style,
            cap_style: v.cap_style,
            join_style: v.join_style,
        }
    }

    /// Like [`flush`](Self::flush), with `font` selected for one text call.
    pub(crate) fn flush_with_font(&self, offset: (i32, i32), font: NativeFont) {
        self.flush(offset);
        if self.values.font.as_ref().map(|f| f.native()) != Some(font) {
            let mut values = self.native_values(offset);
            values.font = Some(font);
            self.backend.change_gc(self.native, &values, GcValuesMask::FONT);
            // Restore the GC's own font on the next flush.
            self.mark_dirty(GcValuesMask::FONT);
        }
    }

    /// Sends pending changes to the server before drawing to a drawable
    /// whose native coordinates are offset by `offset` from logical ones.
    pub(crate) fn flush(&self, offset: (i32, i32)) {
        if self.applied_offset.get() != offset {
            self.applied_offset.set(offset);
            self.mark_dirty(ORIGINS);
            if self.clip_region.is_some() {
                self.clip_dirty.set(true);
            }
        }

        let dirty = self.dirty.replace(GcValuesMask::empty());
        let values = self.native_values(offset);
        if !dirty.is_empty() {
            self.backend.change_gc(self.native, &values, dirty);
        }

        if self.clip_dirty.replace(false) {
            match (&self.clip_region, &self.values.clip_mask) {
                (Some(region), _) => {
                    self.backend
                        .set_clip_rectangles(self.native, values.clip_origin, Some(region.rects()));
                }
                (None, Some(_)) => {
                    if !dirty.contains(GcValuesMask::CLIP_MASK) {
                        self.backend
                            .change_gc(self.native, &values, GcValuesMask::CLIP_MASK);
                    }
                }
                (None, None) => {
                    self.backend
                        .set_clip_rectangles(self.native, values.clip_origin, None);
                }
            }
        }

        if self.dashes_dirty.replace(false) {
            if let Some((offset, dashes)) = &self.dashes {
                self.backend.set_dashes(self.native, *offset, dashes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{Headless, HeadlessConfig, Request};
    use crate::config::DisplayConfig;

    fn display() -> (Headless, Display<Headless>) {
        let backend = Headless::new(HeadlessConfig::default());
        let display = Display::with_backend(backend.clone(), DisplayConfig::default()).unwrap();
        (backend, display)
    }

    #[test]
    fn clip_mask_and_region_are_exclusive() {
        let (_backend, display) = display();
        let root = Drawable::Window(display.root_window());
        let mut gc = Gc::new(&display, &root).unwrap();
        let mask = Pixmap::new(&display, None, 8, 8, Some(1)).unwrap();

        gc.set_clip_mask(Some(&mask));
        assert!(gc.values().clip_mask.is_some());
        gc.set_clip_rectangle(Some(Rectangle::new(0, 0, 4, 4)));
        assert!(gc.values().clip_mask.is_none());
        assert!(gc.clip_region().is_some());
        gc.set_clip_mask(Some(&mask));
        assert!(gc.clip_region().is_none());
    }

    #[test]
    fn copy_shares_resources_and_duplicates_clip() {
        let (_backend, display) = display();
        let root = Drawable::Window(display.root_window());
        let tile = Pixmap::new(&display, None, 8, 8, Some(24)).unwrap();

        let mut src = Gc::new(&display, &root).unwrap();
        src.set_tile(Some(&tile));
        src.set_fill(Fill::Tiled);
        src.set_clip_rectangle(Some(Rectangle::new(1, 2, 3, 4)));

        let mut dst = Gc::new(&display, &root).unwrap();
        dst.copy_from(&src);
        assert_eq!(tile.ref_count(), 3);
        assert_eq!(dst.values().fill, Fill::Tiled);
        assert_eq!(dst.clip_region(), src.clip_region());

        drop(src);
        assert_eq!(tile.ref_count(), 2);
        assert!(dst.clip_region().is_some());
    }

    #[test]
    fn copies_do_not_follow_later_changes() {
        let (_backend, display) = display();
        let root = Drawable::Window(display.root_window());
        let tile = Pixmap::new(&display, None, 8, 8, Some(24)).unwrap();
        let other = Pixmap::new(&display, None, 4, 4, Some(24)).unwrap();
        let clip = Rectangle::new(1, 2, 3, 4);

        let mut src = Gc::new(&display, &root).unwrap();
        src.set_tile(Some(&tile));
        src.set_clip_rectangle(Some(clip));
        let mut dst = Gc::new(&display, &root).unwrap();
        dst.copy_from(&src);

        src.set_tile(Some(&other));
        src.set_clip_rectangle(Some(Rectangle::new(50, 50, 5, 5)));

        let dst_tile = dst.values().tile;
        assert!(dst_tile.as_ref().map_or(false, |t| t.ptr_eq(&tile)));
        drop(dst_tile);
        assert_eq!(dst.clip_region(), Some(&Region::from_rect(clip)));
        // `tile` itself and the copy in `dst`.
        assert_eq!(tile.ref_count(), 2);
        assert_eq!(other.ref_count(), 2);

        drop(dst);
        assert_eq!(tile.ref_count(), 1);
    }

    #[test]
    fn changes_are_flushed_lazily() {
        let (backend, display) = display();
        let root = Drawable::Window(display.root_window());
        let mut gc = Gc::new(&display, &root).unwrap();
        backend.clear_requests();

        gc.set_foreground(&Color {
            pixel: 7,
            ..Color::BLACK
        });
        gc.set_line_attributes(3, LineStyle::OnOffDash, CapStyle::Round, JoinStyle::Bevel);
        assert!(backend.requests().is_empty());

        gc.flush((0, 0));
        let changes: Vec<GcValuesMask> = backend
            .requests()
            .into_iter()
            .filter_map(|(_, r)| match r {
                Request::ChangeGc { mask, .. } => Some(mask),
                _ => None,
            })
            .collect();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].contains(GcValuesMask::FOREGROUND | GcValuesMask::LINE_WIDTH));

        backend.clear_requests();
        gc.flush((0, 0));
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn offsets_shift_clip_origin() {
        let (backend, display) = display();
        let root = Drawable::Window(display.root_window());
        let mut gc = Gc::new(&display, &root).unwrap();
        gc.set_clip_rectangle(Some(Rectangle::new(0, 0, 10, 10)));
        gc.flush((0, 0));
        backend.clear_requests();

        gc.flush((100, -20));
        let clip = backend.requests().into_iter().find_map(|(_, r)| match r {
            Request::SetClipRectangles { origin, rects, .. } => Some((origin, rects)),
            _ => None,
        });
        assert_eq!(
            clip,
            Some((
                Point::new(-100, 20),
                Some(vec![Rectangle::new(0, 0, 10, 10)])
            ))
        );
    }

    #[test]
    fn invalid_dashes_are_rejected() {
        let (_backend, display) = display();
        let root = Drawable::Window(display.root_window());
        let mut gc = Gc::new(&display, &root).unwrap();
        assert!(gc.set_dashes(0, &[]).is_err());
        assert!(gc.set_dashes(0, &[4, 0]).is_err());
        assert!(gc.set_dashes(2, &[4, 2]).is_ok());
    }
}
