// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Drawables, pixmaps, fonts and the drawing primitives.
//!
//! Drawing always happens in logical coordinates. When the target is a
//! window whose native origin has been moved away from its logical origin,
//! coordinates are shifted by the window's offset before they are sent.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Backend, DrawOp, FontMetrics, NativeDrawable, NativeFont, NativePixmap};
use crate::colormap::Colormap;
use crate::display::Display;
use crate::error::Error;
use crate::gc::Gc;
use crate::geometry::{Arc, Point, Rectangle, Segment};
use crate::window::WindowId;

struct PixmapInner<B: Backend> {
    backend: B,
    native: NativePixmap,
    width: i32,
    height: i32,
    depth: u8,
    colormap: RefCell<Option<Colormap<B>>>,
}

impl<B: Backend> Drop for PixmapInner<B> {
    fn drop(&mut self) {
        self.backend.free_pixmap(self.native);
    }
}

/// An offscreen image. Cloning shares the pixmap.
pub struct Pixmap<B: Backend> {
    inner: Rc<PixmapInner<B>>,
}

impl<B: Backend> Clone for Pixmap<B> {
    fn clone(&self) -> Self {
        Pixmap {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Pixmap<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pixmap")
            .field("native", &self.inner.native)
            .field("size", &(self.inner.width, self.inner.height))
            .field("depth", &self.inner.depth)
            .finish()
    }
}

impl<B: Backend> Pixmap<B> {
    /// Creates a pixmap on the same screen as `window` (or the root window).
    ///
    /// Without an explicit `depth` the window's depth is used; a pixmap of
    /// the window's depth also picks up its colormap.
    pub fn new(
        display: &Display<B>,
        window: Option<WindowId>,
        width: i32,
        height: i32,
        depth: Option<u8>,
    ) -> Result<Pixmap<B>, Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidInput(format!(
                "pixmap size must be positive, got {width}x{height}"
            )));
        }
        let window = window.unwrap_or_else(|| display.root_window());
        let drawable = Drawable::Window(window);
        let target = display.drawable_target(&drawable)?;
        let window_depth = display.drawable_depth(&drawable);
        let depth = depth.unwrap_or(window_depth);
        let native = display
            .backend()
            .create_pixmap(target.native, width, height, depth)?;
        let colormap = if depth == window_depth {
            display.drawable_colormap(&drawable)
        } else {
            None
        };
        Ok(Pixmap {
            inner: Rc::new(PixmapInner {
                backend: display.backend().clone(),
                native,
                width,
                height,
                depth,
                colormap: RefCell::new(colormap),
            }),
        })
    }

    /// Creates a depth 1 pixmap from packed, LSB-first rows padded to bytes.
    pub fn bitmap_from_data(
        display: &Display<B>,
        window: Option<WindowId>,
        data: &[u8],
        width: i32,
        height: i32,
    ) -> Result<Pixmap<B>, Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidInput(format!(
                "bitmap size must be positive, got {width}x{height}"
            )));
        }
        let stride = (width as usize + 7) / 8;
        if data.len() < stride * height as usize {
            return Err(Error::InvalidInput(format!(
                "bitmap data too short: {} bytes for {width}x{height}",
                data.len()
            )));
        }
        let window = window.unwrap_or_else(|| display.root_window());
        let target = display.drawable_target(&Drawable::Window(window))?;
        let native = display
            .backend()
            .create_bitmap_from_data(target.native, width, height, data)?;
        Ok(Pixmap {
            inner: Rc::new(PixmapInner {
                backend: display.backend().clone(),
                native,
                width,
                height,
                depth: 1,
                colormap: RefCell::new(None),
            }),
        })
    }

    pub fn native(&self) -> NativePixmap {
        self.inner.native
    }

    pub fn size(&self) -> (i32, i32) {
        (self.inner.width, self.inner.height)
    }

    pub fn depth(&self) -> u8 {
        self.inner.depth
    }

    pub fn colormap(&self) -> Option<Colormap<B>> {
        self.inner.colormap.borrow().clone()
    }

    pub fn set_colormap(&self, colormap: &Colormap<B>) {
        if colormap.visual().depth != self.inner.depth {
            tracing::warn!(
                "colormap depth {} does not match pixmap depth {}",
                colormap.visual().depth,
                self.inner.depth
            );
            return;
        }
        *self.inner.colormap.borrow_mut() = Some(colormap.clone());
    }

    /// Returns `true` if both handles refer to the same pixmap.
    pub fn ptr_eq(&self, other: &Pixmap<B>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The number of live handles to this pixmap.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

struct FontInner<B: Backend> {
    backend: B,
    native: NativeFont,
    name: String,
    metrics: FontMetrics,
}

impl<B: Backend> Drop for FontInner<B> {
    fn drop(&mut self) {
        self.backend.free_font(self.native);
    }
}

/// A server side font. Cloning shares the font.
pub struct Font<B: Backend> {
    inner: Rc<FontInner<B>>,
}

impl<B: Backend> Clone for Font<B> {
    fn clone(&self) -> Self {
        Font {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> Font<B> {
    pub fn load(display: &Display<B>, name: &str) -> Result<Font<B>, Error> {
        let (native, metrics) = display.backend().load_font(name)?;
        Ok(Font {
            inner: Rc::new(FontInner {
                backend: display.backend().clone(),
                native,
                name: name.to_string(),
                metrics,
            }),
        })
    }

    pub fn native(&self) -> NativeFont {
        self.inner.native
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ascent(&self) -> i32 {
        self.inner.metrics.ascent
    }

    pub fn descent(&self) -> i32 {
        self.inner.metrics.descent
    }
}

/// Something that can be drawn to: a window or a pixmap.
pub enum Drawable<B: Backend> {
    Window(WindowId),
    Pixmap(Pixmap<B>),
}

impl<B: Backend> Clone for Drawable<B> {
    fn clone(&self) -> Self {
        match self {
            Drawable::Window(id) => Drawable::Window(*id),
            Drawable::Pixmap(p) => Drawable::Pixmap(p.clone()),
        }
    }
}

impl<B: Backend> From<WindowId> for Drawable<B> {
    fn from(id: WindowId) -> Self {
        Drawable::Window(id)
    }
}

impl<B: Backend> From<&Pixmap<B>> for Drawable<B> {
    fn from(pixmap: &Pixmap<B>) -> Self {
        Drawable::Pixmap(pixmap.clone())
    }
}

/// Where a drawing call ends up natively.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target {
    pub native: NativeDrawable,
    pub x_offset: i32,
    pub y_offset: i32,
}

impl<B: Backend> Display<B> {
    pub(crate) fn drawable_target(&self, drawable: &Drawable<B>) -> Result<Target, Error> {
        match drawable {
            Drawable::Pixmap(p) => Ok(Target {
                native: NativeDrawable::Pixmap(p.native()),
                x_offset: 0,
                y_offset: 0,
            }),
            Drawable::Window(id) => {
                let record = self.windows.get(*id).ok_or(Error::WindowDestroyed)?;
                Ok(Target {
                    native: NativeDrawable::Window(record.native),
                    x_offset: record.position.x_offset,
                    y_offset: record.position.y_offset,
                })
            }
        }
    }

    /// Resolves a drawing target, logging and skipping destroyed windows.
    fn draw_target(&self, drawable: &Drawable<B>) -> Option<Target> {
        if let Drawable::Window(id) = drawable {
            match self.windows.get(*id) {
                None => {
                    tracing::warn!("drawing to destroyed window {:?}", id);
                    return None;
                }
                Some(record) if record.input_only => {
                    tracing::warn!("drawing to input-only window {:?}", id);
                    return None;
                }
                Some(_) => {}
            }
        }
        self.drawable_target(drawable).ok()
    }

    pub fn drawable_size(&self, drawable: &Drawable<B>) -> (i32, i32) {
        match drawable {
            Drawable::Pixmap(p) => p.size(),
            Drawable::Window(id) => self
                .windows
                .get(*id)
                .map(|r| (r.width, r.height))
                .unwrap_or((0, 0)),
        }
    }

    pub fn drawable_depth(&self, drawable: &Drawable<B>) -> u8 {
        match drawable {
            Drawable::Pixmap(p) => p.depth(),
            Drawable::Window(id) => self.windows.get(*id).map(|r| r.depth).unwrap_or(0),
        }
    }

    pub fn drawable_colormap(&self, drawable: &Drawable<B>) -> Option<Colormap<B>> {
        match drawable {
            Drawable::Pixmap(p) => p.colormap(),
            Drawable::Window(id) => self.windows.get(*id).and_then(|r| r.colormap.clone()),
        }
    }

    fn submit(&self, drawable: &Drawable<B>, gc: &Gc<B>, op: impl FnOnce(i32, i32) -> DrawOp) {
        let Some(target) = self.draw_target(drawable) else {
            return;
        };
        gc.flush((target.x_offset, target.y_offset));
        let op = op(-target.x_offset, -target.y_offset);
        self.backend.draw(target.native, gc.native(), &op);
    }

    pub fn draw_point(&self, drawable: &Drawable<B>, gc: &Gc<B>, x: i32, y: i32) {
        self.draw_points(drawable, gc, &[Point::new(x, y)]);
    }

    pub fn draw_points(&self, drawable: &Drawable<B>, gc: &Gc<B>, points: &[Point]) {
        if points.is_empty() {
            return;
        }
        self.submit(drawable, gc, |dx, dy| {
            DrawOp::Points(points.iter().map(|p| p.translate(dx, dy)).collect())
        });
    }

    pub fn draw_line(&self, drawable: &Drawable<B>, gc: &Gc<B>, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.draw_segments(drawable, gc, &[Segment::new(x1, y1, x2, y2)]);
    }

    /// Draws a connected polyline.
    pub fn draw_lines(&self, drawable: &Drawable<B>, gc: &Gc<B>, points: &[Point]) {
        if points.len() < 2 {
            return;
        }
        self.submit(drawable, gc, |dx, dy| {
            DrawOp::Lines(points.iter().map(|p| p.translate(dx, dy)).collect())
        });
    }

    pub fn draw_segments(&self, drawable: &Drawable<B>, gc: &Gc<B>, segments: &[Segment]) {
        if segments.is_empty() {
            return;
        }
        self.submit(drawable, gc, |dx, dy| {
            DrawOp::Segments(segments.iter().map(|s| s.translate(dx, dy)).collect())
        });
    }

    /// Draws a rectangle. A negative width or height means "to the edge of
    /// the drawable".
    pub fn draw_rectangle(
        &self,
        drawable: &Drawable<B>,
        gc: &Gc<B>,
        filled: bool,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        let (dw, dh) = self.drawable_size(drawable);
        let width = if width < 0 { dw } else { width };
        let height = if height < 0 { dh } else { height };
        self.submit(drawable, gc, |dx, dy| DrawOp::Rectangles {
            filled,
            rects: vec![Rectangle::new(x + dx, y + dy, width, height)],
        });
    }

    pub fn draw_rectangles(&self, drawable: &Drawable<B>, gc: &Gc<B>, filled: bool, rects: &[Rectangle]) {
        if rects.is_empty() {
            return;
        }
        self.submit(drawable, gc, |dx, dy| DrawOp::Rectangles {
            filled,
            rects: rects.iter().map(|r| r.translate(dx, dy)).collect(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_arc(
        &self,
        drawable: &Drawable<B>,
        gc: &Gc<B>,
        filled: bool,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        angle1: i32,
        angle2: i32,
    ) {
        let (dw, dh) = self.drawable_size(drawable);
        let arc = Arc {
            x,
            y,
            width: if width < 0 { dw } else { width },
            height: if height < 0 { dh } else { height },
            angle1,
            angle2,
        };
        self.submit(drawable, gc, |dx, dy| DrawOp::Arcs {
            filled,
            arcs: vec![arc.translate(dx, dy)],
        });
    }

    pub fn draw_polygon(&self, drawable: &Drawable<B>, gc: &Gc<B>, filled: bool, points: &[Point]) {
        if points.is_empty() {
            return;
        }
        self.submit(drawable, gc, |dx, dy| {
            let mut points: Vec<Point> = points.iter().map(|p| p.translate(dx, dy)).collect();
            // Outlines are closed explicitly; fills close themselves.
            if !filled && points.first() != points.last() {
                if let Some(first) = points.first().copied() {
                    points.push(first);
                }
            }
            DrawOp::Polygon { filled, points }
        });
    }

    /// Draws a string with `font` at baseline origin `(x, y)`.
    pub fn draw_text(&self, drawable: &Drawable<B>, font: &Font<B>, gc: &Gc<B>, x: i32, y: i32, text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(target) = self.draw_target(drawable) else {
            return;
        };
        gc.flush_with_font((target.x_offset, target.y_offset), font.native());
        self.backend.draw(
            target.native,
            gc.native(),
            &DrawOp::Text {
                x: x - target.x_offset,
                y: y - target.y_offset,
                text: text.to_string(),
            },
        );
    }

    /// Copies a rectangle from `src` to `dest`. A negative width or height
    /// means "to the edge of the source".
    #[allow(clippy::too_many_arguments)]
    pub fn draw_drawable(
        &self,
        dest: &Drawable<B>,
        gc: &Gc<B>,
        src: &Drawable<B>,
        xsrc: i32,
        ysrc: i32,
        xdest: i32,
        ydest: i32,
        width: i32,
        height: i32,
    ) {
        let (sw, sh) = self.drawable_size(src);
        let width = if width < 0 { sw } else { width };
        let height = if height < 0 { sh } else { height };
        let (Some(src_target), Some(dest_target)) = (self.draw_target(src), self.draw_target(dest)) else {
            return;
        };
        gc.flush((dest_target.x_offset, dest_target.y_offset));
        self.backend.copy_area(
            src_target.native,
            dest_target.native,
            gc.native(),
            Rectangle::new(
                xsrc - src_target.x_offset,
                ysrc - src_target.y_offset,
                width,
                height,
            ),
            Point::new(xdest - dest_target.x_offset, ydest - dest_target.y_offset),
        );
    }
}
