// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Pixmaps, fonts, graphics contexts and drawing.

use std::convert::TryFrom;

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    self, CapStyle as X11CapStyle, ChangeGCAux, ClipOrdering, ConnectionExt, CoordMode,
    CreateGCAux, FillStyle, ImageFormat, JoinStyle as X11JoinStyle, LineStyle as X11LineStyle,
    PolyShape, SubwindowMode as X11SubwindowMode, GX,
};

use super::application::Application;
use super::error::Error;
use super::util;
use crate::backend::{
    DrawOp, FontMetrics, NativeDrawable, NativeFont, NativeGc, NativeGcValues, NativePixmap,
};
use crate::gc::{CapStyle, Fill, Function, GcValuesMask, JoinStyle, LineStyle, SubwindowMode};
use crate::geometry::{Point, Rectangle};
use crate::util::{clamp_i16, clamp_u16};

fn drawable_id(drawable: NativeDrawable) -> xproto::Drawable {
    drawable.id() as xproto::Drawable
}

fn gx(function: Function) -> GX {
    match function {
        Function::Copy => GX::COPY,
        Function::Invert => GX::INVERT,
        Function::Xor => GX::XOR,
        Function::Clear => GX::CLEAR,
        Function::And => GX::AND,
        Function::AndReverse => GX::AND_REVERSE,
        Function::AndInvert => GX::AND_INVERTED,
        Function::Noop => GX::NOOP,
        Function::Or => GX::OR,
        Function::Equiv => GX::EQUIV,
        Function::OrReverse => GX::OR_REVERSE,
        Function::CopyInvert => GX::COPY_INVERTED,
        Function::OrInvert => GX::OR_INVERTED,
        Function::Nand => GX::NAND,
        Function::Nor => GX::NOR,
        Function::Set => GX::SET,
    }
}

fn fill_style(fill: Fill) -> FillStyle {
    match fill {
        Fill::Solid => FillStyle::SOLID,
        Fill::Tiled => FillStyle::TILED,
        Fill::Stippled => FillStyle::STIPPLED,
        Fill::OpaqueStippled => FillStyle::OPAQUE_STIPPLED,
    }
}

fn point(p: &Point) -> xproto::Point {
    xproto::Point {
        x: clamp_i16(p.x),
        y: clamp_i16(p.y),
    }
}

fn rectangle(r: &Rectangle) -> xproto::Rectangle {
    xproto::Rectangle {
        x: clamp_i16(r.x),
        y: clamp_i16(r.y),
        width: clamp_u16(r.width),
        height: clamp_u16(r.height),
    }
}

/// Core fonts are indexed by Latin-1 code points.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Builds the item list of a `PolyText8` request: a length byte, a delta
/// byte and at most 254 characters per item.
fn text_items(text: &[u8]) -> Vec<u8> {
    let mut items = Vec::with_capacity(text.len() + 2 * (text.len() / 254 + 1));
    for chunk in text.chunks(254) {
        items.push(chunk.len() as u8);
        items.push(0);
        items.extend_from_slice(chunk);
    }
    items
}

impl Application {
    pub fn create_pixmap(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    ) -> Result<NativePixmap, Error> {
        let id = self.generate_id()?;
        self.send(|conn| {
            conn.create_pixmap(
                depth,
                id,
                drawable_id(drawable),
                clamp_u16(width),
                clamp_u16(height),
            )
        });
        Ok(NativePixmap(u64::from(id)))
    }

    pub fn create_bitmap_from_data(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        data: &[u8],
    ) -> Result<NativePixmap, Error> {
        let pixmap = self.create_pixmap(drawable, width, height, 1)?;
        let pixmap_id = pixmap.0 as xproto::Pixmap;
        let (width, height) = (clamp_u16(width), clamp_u16(height));
        let image = util::bitmap_to_server(
            self.connection().setup(),
            usize::from(width),
            usize::from(height),
            data,
        );

        let gc = self.generate_id()?;
        self.send(|conn| conn.create_gc(gc, pixmap_id, &CreateGCAux::new()));
        self.send(|conn| {
            conn.put_image(
                ImageFormat::Z_PIXMAP,
                pixmap_id,
                gc,
                width,
                height,
                0,
                0,
                0,
                1,
                &image,
            )
        });
        self.send(|conn| conn.free_gc(gc));
        Ok(pixmap)
    }

    pub fn free_pixmap(&self, pixmap: NativePixmap) {
        self.send(|conn| conn.free_pixmap(pixmap.0 as xproto::Pixmap));
    }

    pub fn load_font(&self, name: &str) -> Result<(NativeFont, FontMetrics), Error> {
        let id = self.generate_id()?;
        self.send_checked(|conn| conn.open_font(id, name.as_bytes()))?;
        let reply = match self.call(|conn| conn.query_font(id)) {
            Ok(reply) => reply,
            Err(e) => {
                self.send(|conn| conn.close_font(id));
                return Err(e);
            }
        };
        let metrics = FontMetrics {
            ascent: i32::from(reply.font_ascent),
            descent: i32::from(reply.font_descent),
        };
        Ok((NativeFont(u64::from(id)), metrics))
    }

    pub fn free_font(&self, font: NativeFont) {
        self.send(|conn| conn.close_font(font.0 as xproto::Font));
    }

    pub fn create_gc(&self, drawable: NativeDrawable) -> Result<NativeGc, Error> {
        let id = self.generate_id()?;
        self.send(|conn| conn.create_gc(id, drawable_id(drawable), &CreateGCAux::new()));
        Ok(NativeGc(u64::from(id)))
    }

    pub fn free_gc(&self, gc: NativeGc) {
        self.send(|conn| conn.free_gc(gc.0 as xproto::Gcontext));
    }

    pub fn change_gc(&self, gc: NativeGc, values: &NativeGcValues, mask: GcValuesMask) {
        let mut aux = ChangeGCAux::new();
        if mask.contains(GcValuesMask::FOREGROUND) {
            aux = aux.foreground(values.foreground);
        }
        if mask.contains(GcValuesMask::BACKGROUND) {
            aux = aux.background(values.background);
        }
        if mask.contains(GcValuesMask::FONT) {
            if let Some(font) = values.font {
                aux = aux.font(font.0 as xproto::Font);
            }
        }
        if mask.contains(GcValuesMask::FUNCTION) {
            aux = aux.function(gx(values.function));
        }
        if mask.contains(GcValuesMask::FILL) {
            aux = aux.fill_style(fill_style(values.fill));
        }
        if mask.contains(GcValuesMask::TILE) {
            if let Some(tile) = values.tile {
                aux = aux.tile(tile.0 as xproto::Pixmap);
            }
        }
        if mask.contains(GcValuesMask::STIPPLE) {
            if let Some(stipple) = values.stipple {
                aux = aux.stipple(stipple.0 as xproto::Pixmap);
            }
        }
        if mask.contains(GcValuesMask::CLIP_MASK) {
            let clip = values
                .clip_mask
                .map_or(x11rb::NONE, |p| p.0 as xproto::Pixmap);
            aux = aux.clip_mask(clip);
        }
        if mask.contains(GcValuesMask::SUBWINDOW) {
            aux = aux.subwindow_mode(match values.subwindow_mode {
                SubwindowMode::ClipByChildren => X11SubwindowMode::CLIP_BY_CHILDREN,
                SubwindowMode::IncludeInferiors => X11SubwindowMode::INCLUDE_INFERIORS,
            });
        }
        if mask.contains(GcValuesMask::TS_X_ORIGIN) {
            aux = aux.tile_stipple_x_origin(values.ts_origin.x);
        }
        if mask.contains(GcValuesMask::TS_Y_ORIGIN) {
            aux = aux.tile_stipple_y_origin(values.ts_origin.y);
        }
        if mask.contains(GcValuesMask::CLIP_X_ORIGIN) {
            aux = aux.clip_x_origin(values.clip_origin.x);
        }
        if mask.contains(GcValuesMask::CLIP_Y_ORIGIN) {
            aux = aux.clip_y_origin(values.clip_origin.y);
        }
        if mask.contains(GcValuesMask::EXPOSURES) {
            aux = aux.graphics_exposures(u32::from(values.graphics_exposures));
        }
        if mask.contains(GcValuesMask::LINE_WIDTH) {
            aux = aux.line_width(u32::try_from(values.line_width).unwrap_or(0));
        }
        if mask.contains(GcValuesMask::LINE_STYLE) {
            aux = aux.line_style(match values.line_style {
                LineStyle::Solid => X11LineStyle::SOLID,
                LineStyle::OnOffDash => X11LineStyle::ON_OFF_DASH,
                LineStyle::DoubleDash => X11LineStyle::DOUBLE_DASH,
            });
        }
        if mask.contains(GcValuesMask::CAP_STYLE) {
            aux = aux.cap_style(match values.cap_style {
                CapStyle::NotLast => X11CapStyle::NOT_LAST,
                CapStyle::Butt => X11CapStyle::BUTT,
                CapStyle::Round => X11CapStyle::ROUND,
                CapStyle::Projecting => X11CapStyle::PROJECTING,
            });
        }
        if mask.contains(GcValuesMask::JOIN_STYLE) {
            aux = aux.join_style(match values.join_style {
                JoinStyle::Miter => X11JoinStyle::MITER,
                JoinStyle::Round => X11JoinStyle::ROUND,
                JoinStyle::Bevel => X11JoinStyle::BEVEL,
            });
        }
        self.send(|conn| conn.change_gc(gc.0 as xproto::Gcontext, &aux));
    }

    pub fn set_clip_rectangles(&self, gc: NativeGc, origin: Point, rects: Option<&[Rectangle]>) {
        let gc = gc.0 as xproto::Gcontext;
        match rects {
            Some(rects) => {
                let rects: Vec<xproto::Rectangle> = rects
                    .iter()
                    .filter(|r| !r.is_empty())
                    .map(rectangle)
                    .collect();
                self.send(|conn| {
                    conn.set_clip_rectangles(
                        ClipOrdering::UNSORTED,
                        gc,
                        clamp_i16(origin.x),
                        clamp_i16(origin.y),
                        &rects,
                    )
                });
            }
            None => {
                let aux = ChangeGCAux::new()
                    .clip_mask(x11rb::NONE)
                    .clip_x_origin(origin.x)
                    .clip_y_origin(origin.y);
                self.send(|conn| conn.change_gc(gc, &aux));
            }
        }
    }

    pub fn set_dashes(&self, gc: NativeGc, offset: i32, dashes: &[u8]) {
        let offset = u16::try_from(offset).unwrap_or(0);
        self.send(|conn| conn.set_dashes(gc.0 as xproto::Gcontext, offset, dashes));
    }

    pub fn draw(&self, drawable: NativeDrawable, gc: NativeGc, op: &DrawOp) {
        let d = drawable_id(drawable);
        let gc = gc.0 as xproto::Gcontext;
        match op {
            DrawOp::Points(points) => {
                let points: Vec<_> = points.iter().map(point).collect();
                self.send(|conn| conn.poly_point(CoordMode::ORIGIN, d, gc, &points));
            }
            DrawOp::Segments(segments) => {
                let segments: Vec<_> = segments
                    .iter()
                    .map(|s| xproto::Segment {
                        x1: clamp_i16(s.x1),
                        y1: clamp_i16(s.y1),
                        x2: clamp_i16(s.x2),
                        y2: clamp_i16(s.y2),
                    })
                    .collect();
                self.send(|conn| conn.poly_segment(d, gc, &segments));
            }
            DrawOp::Lines(points) => {
                let points: Vec<_> = points.iter().map(point).collect();
                self.send(|conn| conn.poly_line(CoordMode::ORIGIN, d, gc, &points));
            }
            DrawOp::Rectangles { filled, rects } => {
                let rects: Vec<_> = rects.iter().map(rectangle).collect();
                if *filled {
                    self.send(|conn| conn.poly_fill_rectangle(d, gc, &rects));
                } else {
                    self.send(|conn| conn.poly_rectangle(d, gc, &rects));
                }
            }
            DrawOp::Arcs { filled, arcs } => {
                let arcs: Vec<_> = arcs
                    .iter()
                    .map(|a| xproto::Arc {
                        x: clamp_i16(a.x),
                        y: clamp_i16(a.y),
                        width: clamp_u16(a.width),
                        height: clamp_u16(a.height),
                        angle1: clamp_i16(a.angle1),
                        angle2: clamp_i16(a.angle2),
                    })
                    .collect();
                if *filled {
                    self.send(|conn| conn.poly_fill_arc(d, gc, &arcs));
                } else {
                    self.send(|conn| conn.poly_arc(d, gc, &arcs));
                }
            }
            DrawOp::Polygon { filled, points } => {
                let mut points: Vec<_> = points.iter().map(point).collect();
                if *filled {
                    self.send(|conn| {
                        conn.fill_poly(d, gc, PolyShape::COMPLEX, CoordMode::ORIGIN, &points)
                    });
                } else {
                    if let Some(&first) = points.first() {
                        points.push(first);
                    }
                    self.send(|conn| conn.poly_line(CoordMode::ORIGIN, d, gc, &points));
                }
            }
            DrawOp::Text { x, y, text } => {
                let items = text_items(&latin1(text));
                if !items.is_empty() {
                    self.send(|conn| {
                        conn.poly_text8(d, gc, clamp_i16(*x), clamp_i16(*y), &items)
                    });
                }
            }
        }
    }

    pub fn copy_area(
        &self,
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    ) {
        if src_rect.is_empty() {
            return;
        }
        self.send(|conn| {
            conn.copy_area(
                drawable_id(src),
                drawable_id(dst),
                gc.0 as xproto::Gcontext,
                clamp_i16(src_rect.x),
                clamp_i16(src_rect.y),
                clamp_i16(dst_origin.x),
                clamp_i16(dst_origin.y),
                clamp_u16(src_rect.width),
                clamp_u16(src_rect.height),
            )
        });
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn long_text_is_split_into_items() {
        let text = vec![b'x'; 300];
        let items = text_items(&text);
        assert_eq!(items.len(), 304);
        assert_eq!(&items[..2], &[254, 0]);
        assert_eq!(&items[256..258], &[46, 0]);
    }

    #[test]
    fn text_is_sent_as_latin1() {
        assert_eq!(latin1("añ€"), vec![b'a', 0xf1, b'?']);
    }
}
