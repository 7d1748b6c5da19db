// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Pixmaps, fonts and drawing through GDI.
//!
//! GDI has no server-side graphics contexts. A GC is kept here as plain
//! values and turned into pens, brushes and a clip region for the duration
//! of each drawing call.

use std::mem;
use std::ptr;

use winapi::shared::minwindef::{DWORD, UINT};
use winapi::shared::windef::{HBITMAP, HDC, HFONT, HGDIOBJ, HWND, POINT};
use winapi::um::wingdi as gdi;
use winapi::um::winuser::{GetDCEx, IsWindow, IsWindowVisible, ReleaseDC, DCX_CACHE, DCX_CLIPCHILDREN, DCX_CLIPSIBLINGS};

use super::application::{error_code, Application};
use super::error::Error;
use super::util::{self, ToWide};
use crate::backend::{
    DrawOp, FontMetrics, NativeDrawable, NativeEventKind, NativeFont, NativeGc, NativeGcValues,
    NativePixmap,
};
use crate::gc::{CapStyle, Fill, Function, GcValuesMask, JoinStyle, LineStyle, SubwindowMode};
use crate::geometry::{Arc, Point, Rectangle};

/// A graphics context, emulated on the client.
#[derive(Debug, Clone)]
pub(crate) struct GcState {
    values: NativeGcValues,
    clip: Option<Vec<Rectangle>>,
    clip_origin: Point,
    dashes: Vec<u8>,
    dash_offset: i32,
}

impl Default for GcState {
    fn default() -> GcState {
        GcState {
            values: NativeGcValues {
                foreground: 0,
                background: 1,
                font: None,
                function: Function::Copy,
                fill: Fill::Solid,
                tile: None,
                stipple: None,
                clip_mask: None,
                subwindow_mode: SubwindowMode::ClipByChildren,
                ts_origin: Point::default(),
                clip_origin: Point::default(),
                graphics_exposures: true,
                line_width: 0,
                line_style: LineStyle::Solid,
                cap_style: CapStyle::Butt,
                join_style: JoinStyle::Miter,
            },
            clip: None,
            clip_origin: Point::default(),
            dashes: vec![4, 4],
            dash_offset: 0,
        }
    }
}

impl GcState {
    fn merge(&mut self, values: &NativeGcValues, mask: GcValuesMask) {
        let v = &mut self.values;
        macro_rules! take {
            ($flag:ident, $field:ident) => {
                if mask.contains(GcValuesMask::$flag) {
                    v.$field = values.$field.clone();
                }
            };
        }
        take!(FOREGROUND, foreground);
        take!(BACKGROUND, background);
        take!(FONT, font);
        take!(FUNCTION, function);
        take!(FILL, fill);
        take!(TILE, tile);
        take!(STIPPLE, stipple);
        take!(CLIP_MASK, clip_mask);
        take!(SUBWINDOW, subwindow_mode);
        take!(EXPOSURES, graphics_exposures);
        take!(LINE_WIDTH, line_width);
        take!(LINE_STYLE, line_style);
        take!(CAP_STYLE, cap_style);
        take!(JOIN_STYLE, join_style);
        if mask.contains(GcValuesMask::TS_X_ORIGIN) {
            v.ts_origin.x = values.ts_origin.x;
        }
        if mask.contains(GcValuesMask::TS_Y_ORIGIN) {
            v.ts_origin.y = values.ts_origin.y;
        }
        if mask.contains(GcValuesMask::CLIP_X_ORIGIN) {
            v.clip_origin.x = values.clip_origin.x;
        }
        if mask.contains(GcValuesMask::CLIP_Y_ORIGIN) {
            v.clip_origin.y = values.clip_origin.y;
        }
        if mask.contains(GcValuesMask::CLIP_MASK) {
            // A clip mask replaces clip rectangles, like on X.
            self.clip = None;
        }
    }
}

fn rop2(function: Function) -> i32 {
    match function {
        Function::Copy => gdi::R2_COPYPEN,
        Function::Invert => gdi::R2_NOT,
        Function::Xor => gdi::R2_XORPEN,
        Function::Clear => gdi::R2_BLACK,
        Function::And => gdi::R2_MASKPEN,
        Function::AndReverse => gdi::R2_MASKPENNOT,
        Function::AndInvert => gdi::R2_MASKNOTPEN,
        Function::Noop => gdi::R2_NOP,
        Function::Or => gdi::R2_MERGEPEN,
        Function::Equiv => gdi::R2_NOTXORPEN,
        Function::OrReverse => gdi::R2_MERGEPENNOT,
        Function::CopyInvert => gdi::R2_NOTCOPYPEN,
        Function::OrInvert => gdi::R2_MERGENOTPEN,
        Function::Nand => gdi::R2_NOTMASKPEN,
        Function::Nor => gdi::R2_NOTMERGEPEN,
        Function::Set => gdi::R2_WHITE,
    }
}

/// The ternary raster operation `BitBlt` uses for a GC function.
fn rop3(function: Function) -> DWORD {
    match function {
        Function::Copy => gdi::SRCCOPY,
        Function::Invert => gdi::DSTINVERT,
        Function::Xor => gdi::SRCINVERT,
        Function::Clear => gdi::BLACKNESS,
        Function::And => gdi::SRCAND,
        Function::AndReverse => gdi::SRCERASE,
        Function::AndInvert => 0x0022_0326,
        Function::Noop => 0x00aa_0029,
        Function::Or => gdi::SRCPAINT,
        Function::Equiv => 0x0099_0066,
        Function::OrReverse => 0x00dd_0228,
        Function::CopyInvert => gdi::NOTSRCCOPY,
        Function::OrInvert => gdi::MERGEPAINT,
        Function::Nand => 0x0077_00e6,
        Function::Nor => gdi::NOTSRCERASE,
        Function::Set => gdi::WHITENESS,
    }
}

/// What a font name asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FontRequest {
    family: String,
    pixel_size: i32,
    bold: bool,
    italic: bool,
}

/// Understands XLFD names and bare family names.
fn parse_font_name(name: &str) -> FontRequest {
    let mut request = FontRequest {
        family: "Courier New".to_owned(),
        pixel_size: 13,
        bold: false,
        italic: false,
    };
    if !name.starts_with('-') {
        if !name.eq_ignore_ascii_case("fixed") && !name.is_empty() {
            request.family = name.to_owned();
        }
        return request;
    }
    // -foundry-family-weight-slant-setwidth-style-pixels-...
    let fields: Vec<&str> = name.split('-').collect();
    let field = |i: usize| fields.get(i).copied().filter(|f| !f.is_empty() && *f != "*");
    if let Some(family) = field(2) {
        request.family = family.to_owned();
    }
    request.bold = field(3).map_or(false, |w| w.eq_ignore_ascii_case("bold"));
    request.italic = field(4).map_or(false, |s| s == "i" || s == "o");
    if let Some(size) = field(7).and_then(|s| s.parse::<i32>().ok()).filter(|s| *s > 0) {
        request.pixel_size = size;
    }
    request
}

/// Converts XBM data into rows for `CreateBitmap`.
///
/// XBM rows are byte aligned with the first pixel in the low bit. Device
/// dependent bitmaps are word aligned with the first pixel in the high bit,
/// and their zero bits take the foreground color.
fn xbm_to_ddb(width: i32, height: i32, data: &[u8]) -> Vec<u8> {
    let src_stride = ((width + 7) / 8) as usize;
    let dst_stride = ((width + 15) / 16 * 2) as usize;
    let mut out = vec![0xff; dst_stride * height.max(0) as usize];
    for (row, dst) in out.chunks_mut(dst_stride).enumerate() {
        let src = data.get(row * src_stride..).unwrap_or(&[]);
        for (d, s) in dst.iter_mut().zip(src.iter().take(src_stride)) {
            *d = !s.reverse_bits();
        }
    }
    out
}

/// A `PS_USERSTYLE` pattern that starts `offset` pixels into `dashes`.
///
/// User styles always start with a dash and must alternate across
/// repeats, so zero length entries pad the front or back as needed.
fn rotated_dashes(dashes: &[u8], offset: i32) -> Vec<DWORD> {
    let mut pattern: Vec<DWORD> = dashes.iter().map(|d| DWORD::from(*d)).collect();
    if pattern.len() % 2 == 1 {
        pattern.extend_from_within(..);
    }
    let total: DWORD = pattern.iter().sum();
    if total == 0 {
        return pattern;
    }
    let mut skip = offset.rem_euclid(total as i32) as DWORD;
    let mut i = 0;
    while skip >= pattern[i] {
        skip -= pattern[i];
        i += 1;
    }
    let mut out = Vec::with_capacity(pattern.len() + 2);
    if i % 2 == 1 {
        out.push(0);
    }
    out.push(pattern[i] - skip);
    out.extend_from_slice(&pattern[i + 1..]);
    out.extend_from_slice(&pattern[..i]);
    if skip > 0 {
        out.push(skip);
    }
    if out.len() % 2 == 1 {
        out.push(0);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArcShape {
    Empty,
    Full,
    /// Radial end points for a counter-clockwise arc.
    Partial { start: (i32, i32), end: (i32, i32) },
}

fn arc_shape(arc: &Arc) -> ArcShape {
    const FULL: i32 = 360 * 64;
    if arc.angle2 == 0 || arc.width <= 0 || arc.height <= 0 {
        return ArcShape::Empty;
    }
    if arc.angle2.abs() >= FULL {
        return ArcShape::Full;
    }
    let (from, to) = if arc.angle2 > 0 {
        (arc.angle1, arc.angle1 + arc.angle2)
    } else {
        (arc.angle1 + arc.angle2, arc.angle1)
    };
    let cx = arc.x as f64 + arc.width as f64 / 2.0;
    let cy = arc.y as f64 + arc.height as f64 / 2.0;
    let radial = |angle: i32| {
        let rad = (angle as f64 / 64.0).to_radians();
        (
            (cx + arc.width as f64 * rad.cos()).round() as i32,
            (cy - arc.height as f64 * rad.sin()).round() as i32,
        )
    };
    ArcShape::Partial {
        start: radial(from),
        end: radial(to),
    }
}

fn to_points(points: &[Point]) -> Vec<POINT> {
    points.iter().map(|p| POINT { x: p.x, y: p.y }).collect()
}

/// GDI objects created for one drawing call.
struct GdiObjects {
    objects: Vec<HGDIOBJ>,
}

impl GdiObjects {
    fn add(&mut self, obj: HGDIOBJ) -> HGDIOBJ {
        if !obj.is_null() {
            self.objects.push(obj);
        }
        obj
    }
}

impl Drop for GdiObjects {
    fn drop(&mut self) {
        for obj in self.objects.drain(..) {
            unsafe {
                gdi::DeleteObject(obj);
            }
        }
    }
}

impl Application {
    fn pixmap_exists(&self, pixmap: NativePixmap) -> bool {
        self.resources.borrow().pixmaps.contains(&pixmap.0)
    }

    fn gc_state(&self, gc: NativeGc) -> Option<GcState> {
        self.resources.borrow().gcs.get(&gc.0).cloned()
    }

    /// Runs `f` with a device context for `drawable`.
    ///
    /// Reports `BadDrawable` and returns `None` if the drawable is unknown.
    fn with_dc<R>(
        &self,
        drawable: NativeDrawable,
        include_inferiors: bool,
        f: impl FnOnce(HDC) -> R,
    ) -> Option<R> {
        match drawable {
            NativeDrawable::Window(window) => {
                let hwnd = window.0 as usize as HWND;
                if unsafe { IsWindow(hwnd) } == 0 {
                    self.shared.push_error(error_code::BAD_DRAWABLE, window.0);
                    return None;
                }
                let mut flags = DCX_CACHE | DCX_CLIPSIBLINGS;
                if !include_inferiors {
                    flags |= DCX_CLIPCHILDREN;
                }
                let dc = unsafe { GetDCEx(hwnd, ptr::null_mut(), flags) };
                if dc.is_null() {
                    tracing::warn!("GetDCEx failed for window {:x}", window.0);
                    return None;
                }
                let dc = scopeguard::guard(dc, |dc| unsafe {
                    ReleaseDC(hwnd, dc);
                });
                Some(f(*dc))
            }
            NativeDrawable::Pixmap(pixmap) => {
                if !self.pixmap_exists(pixmap) {
                    self.shared.push_error(error_code::BAD_DRAWABLE, pixmap.0);
                    return None;
                }
                let dc = unsafe { gdi::CreateCompatibleDC(ptr::null_mut()) };
                if dc.is_null() {
                    tracing::warn!("CreateCompatibleDC failed");
                    return None;
                }
                let old = unsafe { gdi::SelectObject(dc, pixmap.0 as usize as HGDIOBJ) };
                let dc = scopeguard::guard(dc, |dc| unsafe {
                    gdi::SelectObject(dc, old);
                    gdi::DeleteDC(dc);
                });
                Some(f(*dc))
            }
        }
    }

    pub fn create_pixmap(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    ) -> Result<NativePixmap, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.request();
        let (width, height) = (width.max(1), height.max(1));
        let bitmap = if depth == 1 {
            unsafe { gdi::CreateBitmap(width, height, 1, 1, ptr::null()) }
        } else {
            self.with_dc(drawable, false, |dc| unsafe {
                gdi::CreateCompatibleBitmap(dc, width, height)
            })
            .unwrap_or(ptr::null_mut())
        };
        if bitmap.is_null() {
            return Err(util::last_error());
        }
        let id = bitmap as usize as u64;
        self.resources.borrow_mut().pixmaps.insert(id);
        Ok(NativePixmap(id))
    }

    pub fn create_bitmap_from_data(
        &self,
        _drawable: NativeDrawable,
        width: i32,
        height: i32,
        data: &[u8],
    ) -> Result<NativePixmap, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.request();
        let bits = xbm_to_ddb(width, height, data);
        let bitmap: HBITMAP =
            unsafe { gdi::CreateBitmap(width.max(1), height.max(1), 1, 1, bits.as_ptr().cast()) };
        if bitmap.is_null() {
            return Err(util::last_error());
        }
        let id = bitmap as usize as u64;
        self.resources.borrow_mut().pixmaps.insert(id);
        Ok(NativePixmap(id))
    }

    pub fn free_pixmap(&self, pixmap: NativePixmap) {
        self.request();
        if self.resources.borrow_mut().pixmaps.remove(&pixmap.0) {
            unsafe {
                gdi::DeleteObject(pixmap.0 as usize as HGDIOBJ);
            }
        } else {
            self.shared.push_error(error_code::BAD_PIXMAP, pixmap.0);
        }
    }

    pub fn load_font(&self, name: &str) -> Result<(NativeFont, FontMetrics), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.request();
        let request = parse_font_name(name);
        let face = request.family.to_wide();
        let font: HFONT = unsafe {
            gdi::CreateFontW(
                -request.pixel_size,
                0,
                0,
                0,
                if request.bold { gdi::FW_BOLD } else { gdi::FW_NORMAL },
                request.italic as DWORD,
                0,
                0,
                gdi::DEFAULT_CHARSET as DWORD,
                gdi::OUT_DEFAULT_PRECIS as DWORD,
                gdi::CLIP_DEFAULT_PRECIS as DWORD,
                gdi::DEFAULT_QUALITY as DWORD,
                (gdi::DEFAULT_PITCH | gdi::FF_DONTCARE) as DWORD,
                face.as_ptr(),
            )
        };
        if font.is_null() {
            return Err(Error::Null);
        }
        let metrics = unsafe {
            let dc = gdi::CreateCompatibleDC(ptr::null_mut());
            let old = gdi::SelectObject(dc, font as HGDIOBJ);
            let mut tm: gdi::TEXTMETRICW = mem::zeroed();
            let ok = gdi::GetTextMetricsW(dc, &mut tm) != 0;
            gdi::SelectObject(dc, old);
            gdi::DeleteDC(dc);
            if ok {
                FontMetrics {
                    ascent: tm.tmAscent,
                    descent: tm.tmDescent,
                }
            } else {
                FontMetrics {
                    ascent: request.pixel_size * 4 / 5,
                    descent: request.pixel_size / 5,
                }
            }
        };
        tracing::debug!("loaded font {:?} as {:?}", name, request);
        let id = font as usize as u64;
        self.resources.borrow_mut().fonts.insert(id);
        Ok((NativeFont(id), metrics))
    }

    pub fn free_font(&self, font: NativeFont) {
        self.request();
        if self.resources.borrow_mut().fonts.remove(&font.0) {
            unsafe {
                gdi::DeleteObject(font.0 as usize as HGDIOBJ);
            }
        } else {
            self.shared.push_error(error_code::BAD_FONT, font.0);
        }
    }

    pub fn create_gc(&self, drawable: NativeDrawable) -> Result<NativeGc, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.request();
        let exists = match drawable {
            NativeDrawable::Window(w) => unsafe { IsWindow(w.0 as usize as HWND) } != 0,
            NativeDrawable::Pixmap(p) => self.pixmap_exists(p),
        };
        if !exists {
            self.shared.push_error(error_code::BAD_DRAWABLE, drawable.id());
        }
        let mut resources = self.resources.borrow_mut();
        let id = resources.alloc_id();
        resources.gcs.insert(id, GcState::default());
        Ok(NativeGc(id))
    }

    pub fn free_gc(&self, gc: NativeGc) {
        self.request();
        if self.resources.borrow_mut().gcs.remove(&gc.0).is_none() {
            self.shared.push_error(error_code::BAD_GC, gc.0);
        }
    }

    pub fn change_gc(&self, gc: NativeGc, values: &NativeGcValues, mask: GcValuesMask) {
        self.request();
        let mut resources = self.resources.borrow_mut();
        if mask.contains(GcValuesMask::FONT) {
            if let Some(font) = values.font.filter(|f| !resources.fonts.contains(&f.0)) {
                drop(resources);
                self.shared.push_error(error_code::BAD_FONT, font.0);
                return;
            }
        }
        let pixmaps = [
            (GcValuesMask::TILE, values.tile),
            (GcValuesMask::STIPPLE, values.stipple),
            (GcValuesMask::CLIP_MASK, values.clip_mask),
        ];
        for (flag, pixmap) in pixmaps {
            if let Some(pixmap) = pixmap.filter(|p| mask.contains(flag) && !resources.pixmaps.contains(&p.0)) {
                drop(resources);
                self.shared.push_error(error_code::BAD_PIXMAP, pixmap.0);
                return;
            }
        }
        match resources.gcs.get_mut(&gc.0) {
            Some(state) => state.merge(values, mask),
            None => {
                drop(resources);
                self.shared.push_error(error_code::BAD_GC, gc.0);
            }
        }
    }

    pub fn set_clip_rectangles(&self, gc: NativeGc, origin: Point, rects: Option<&[Rectangle]>) {
        self.request();
        let mut resources = self.resources.borrow_mut();
        match resources.gcs.get_mut(&gc.0) {
            Some(state) => {
                state.clip = rects.map(<[Rectangle]>::to_vec);
                state.clip_origin = origin;
                state.values.clip_mask = None;
            }
            None => {
                drop(resources);
                self.shared.push_error(error_code::BAD_GC, gc.0);
            }
        }
    }

    pub fn set_dashes(&self, gc: NativeGc, offset: i32, dashes: &[u8]) {
        self.request();
        let mut resources = self.resources.borrow_mut();
        match resources.gcs.get_mut(&gc.0) {
            Some(state) => {
                state.dashes = dashes.to_vec();
                state.dash_offset = offset;
            }
            None => {
                drop(resources);
                self.shared.push_error(error_code::BAD_GC, gc.0);
            }
        }
    }

    /// Selects the GC's pen, brush, raster operation and clip into `dc`.
    ///
    /// Returned objects must outlive their use in `dc`.
    unsafe fn apply_gc(&self, dc: HDC, gc: &GcState, filled: bool) -> GdiObjects {
        let mut objects = GdiObjects {
            objects: Vec::new(),
        };
        let v = &gc.values;
        let fg = util::colorref(v.foreground);
        gdi::SetROP2(dc, rop2(v.function));
        gdi::SetTextColor(dc, fg);
        gdi::SetBkColor(dc, util::colorref(v.background));
        gdi::SetBkMode(
            dc,
            if v.line_style == LineStyle::DoubleDash || v.fill == Fill::OpaqueStippled {
                gdi::OPAQUE
            } else {
                gdi::TRANSPARENT
            },
        );

        let pen = if filled {
            gdi::GetStockObject(gdi::NULL_PEN as i32)
        } else {
            let cap = match v.cap_style {
                CapStyle::NotLast | CapStyle::Butt => gdi::PS_ENDCAP_FLAT,
                CapStyle::Round => gdi::PS_ENDCAP_ROUND,
                CapStyle::Projecting => gdi::PS_ENDCAP_SQUARE,
            };
            let join = match v.join_style {
                JoinStyle::Miter => gdi::PS_JOIN_MITER,
                JoinStyle::Round => gdi::PS_JOIN_ROUND,
                JoinStyle::Bevel => gdi::PS_JOIN_BEVEL,
            };
            let brush = gdi::LOGBRUSH {
                lbStyle: gdi::BS_SOLID as UINT,
                lbColor: fg,
                lbHatch: 0,
            };
            let width = v.line_width.max(1) as DWORD;
            let dashes = rotated_dashes(&gc.dashes, gc.dash_offset);
            let pen = if v.line_style != LineStyle::Solid && !dashes.is_empty() {
                gdi::ExtCreatePen(
                    gdi::PS_GEOMETRIC | gdi::PS_USERSTYLE | cap | join,
                    width,
                    &brush,
                    dashes.len() as DWORD,
                    dashes.as_ptr(),
                )
            } else if v.line_width <= 1 {
                gdi::CreatePen(gdi::PS_SOLID as i32, 1, fg)
            } else {
                gdi::ExtCreatePen(
                    gdi::PS_GEOMETRIC | gdi::PS_SOLID | cap | join,
                    width,
                    &brush,
                    0,
                    ptr::null(),
                )
            };
            objects.add(pen as HGDIOBJ)
        };
        gdi::SelectObject(dc, pen);

        let brush = if !filled {
            gdi::GetStockObject(gdi::NULL_BRUSH as i32)
        } else {
            let pattern = match v.fill {
                Fill::Solid => None,
                Fill::Tiled => v.tile,
                Fill::Stippled | Fill::OpaqueStippled => v.stipple,
            };
            let brush = match pattern {
                Some(pixmap) => gdi::CreatePatternBrush(pixmap.0 as usize as HBITMAP),
                None => gdi::CreateSolidBrush(fg),
            };
            objects.add(brush as HGDIOBJ)
        };
        gdi::SelectObject(dc, brush);
        gdi::SetBrushOrgEx(dc, v.ts_origin.x, v.ts_origin.y, ptr::null_mut());

        if let Some(font) = v.font {
            gdi::SelectObject(dc, font.0 as usize as HGDIOBJ);
        }

        if v.clip_mask.is_some() {
            tracing::debug!("clip masks are not supported by GDI, drawing unclipped");
        }
        if let Some(rects) = &gc.clip {
            let region = objects.add(gdi::CreateRectRgn(0, 0, 0, 0) as HGDIOBJ);
            for rect in rects {
                let r = rect.translate(gc.clip_origin.x, gc.clip_origin.y);
                let part = gdi::CreateRectRgn(r.x, r.y, r.x + r.width, r.y + r.height);
                gdi::CombineRgn(region as _, region as _, part, gdi::RGN_OR);
                gdi::DeleteObject(part as HGDIOBJ);
            }
            gdi::SelectClipRgn(dc, region as _);
        }
        objects
    }

    pub fn draw(&self, drawable: NativeDrawable, gc: NativeGc, op: &DrawOp) {
        self.request();
        let Some(state) = self.gc_state(gc) else {
            self.shared.push_error(error_code::BAD_GC, gc.0);
            return;
        };
        let filled = matches!(
            op,
            DrawOp::Rectangles { filled: true, .. }
                | DrawOp::Arcs { filled: true, .. }
                | DrawOp::Polygon { filled: true, .. }
        );
        let include_inferiors = state.values.subwindow_mode == SubwindowMode::IncludeInferiors;
        self.with_dc(drawable, include_inferiors, |dc| unsafe {
            let saved = gdi::SaveDC(dc);
            let _objects = self.apply_gc(dc, &state, filled);
            draw_op(dc, &state, op);
            gdi::RestoreDC(dc, saved);
        });
    }

    pub fn copy_area(
        &self,
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    ) {
        self.request();
        let Some(state) = self.gc_state(gc) else {
            self.shared.push_error(error_code::BAD_GC, gc.0);
            return;
        };
        let include_inferiors = state.values.subwindow_mode == SubwindowMode::IncludeInferiors;
        let rop = rop3(state.values.function);
        let blit = |dst_dc: HDC, src_dc: HDC| unsafe {
            let saved = gdi::SaveDC(dst_dc);
            let _objects = self.apply_gc(dst_dc, &state, true);
            gdi::BitBlt(
                dst_dc,
                dst_origin.x,
                dst_origin.y,
                src_rect.width,
                src_rect.height,
                src_dc,
                src_rect.x,
                src_rect.y,
                rop,
            );
            gdi::RestoreDC(dst_dc, saved);
        };
        let done = if src == dst {
            self.with_dc(dst, include_inferiors, |dc| blit(dc, dc))
        } else {
            self.with_dc(src, include_inferiors, |src_dc| {
                self.with_dc(dst, include_inferiors, |dst_dc| blit(dst_dc, src_dc))
            })
            .flatten()
        };

        let NativeDrawable::Window(window) = dst else {
            return;
        };
        if done.is_none() || !state.values.graphics_exposures {
            return;
        }
        // Contents of hidden windows are gone; everything else was copied.
        let hidden = match src {
            NativeDrawable::Window(w) => unsafe { IsWindowVisible(w.0 as usize as HWND) } == 0,
            NativeDrawable::Pixmap(_) => false,
        };
        let kind = if hidden {
            NativeEventKind::GraphicsExpose {
                area: Rectangle::new(dst_origin.x, dst_origin.y, src_rect.width, src_rect.height),
                count: 0,
            }
        } else {
            NativeEventKind::NoExpose
        };
        self.shared.push(window.0 as usize as HWND, kind);
    }
}

unsafe fn draw_op(dc: HDC, gc: &GcState, op: &DrawOp) {
    match op {
        DrawOp::Points(points) => {
            let color = util::colorref(gc.values.foreground);
            for p in points {
                gdi::SetPixelV(dc, p.x, p.y, color);
            }
        }
        DrawOp::Segments(segments) => {
            for s in segments {
                gdi::MoveToEx(dc, s.x1, s.y1, ptr::null_mut());
                gdi::LineTo(dc, s.x2, s.y2);
            }
        }
        DrawOp::Lines(points) => {
            let points = to_points(points);
            gdi::Polyline(dc, points.as_ptr(), points.len() as i32);
        }
        DrawOp::Rectangles { rects, .. } => {
            // Filled: the null pen drops the last row and column. Outlined:
            // X covers width + 1 pixels.
            for r in rects {
                gdi::Rectangle(dc, r.x, r.y, r.x + r.width + 1, r.y + r.height + 1);
            }
        }
        DrawOp::Arcs { filled, arcs } => {
            for arc in arcs {
                let (left, top) = (arc.x, arc.y);
                let (right, bottom) = (arc.x + arc.width + 1, arc.y + arc.height + 1);
                match (arc_shape(arc), filled) {
                    (ArcShape::Empty, _) => {}
                    (ArcShape::Full, true) => {
                        gdi::Ellipse(dc, left, top, right, bottom);
                    }
                    (ArcShape::Full, false) => {
                        let (x, y) = (right, (top + bottom) / 2);
                        gdi::Arc(dc, left, top, right, bottom, x, y, x, y);
                    }
                    (ArcShape::Partial { start, end }, true) => {
                        gdi::Pie(dc, left, top, right, bottom, start.0, start.1, end.0, end.1);
                    }
                    (ArcShape::Partial { start, end }, false) => {
                        gdi::Arc(dc, left, top, right, bottom, start.0, start.1, end.0, end.1);
                    }
                }
            }
        }
        DrawOp::Polygon { filled, points } => {
            let mut points = to_points(points);
            if *filled {
                gdi::SetPolyFillMode(dc, gdi::ALTERNATE);
                gdi::Polygon(dc, points.as_ptr(), points.len() as i32);
            } else {
                if let Some(first) = points.first().copied() {
                    points.push(first);
                }
                gdi::Polyline(dc, points.as_ptr(), points.len() as i32);
            }
        }
        DrawOp::Text { x, y, text } => {
            let wide = text.to_wide_sized();
            gdi::SetTextAlign(dc, gdi::TA_BASELINE | gdi::TA_LEFT);
            gdi::TextOutW(dc, *x, *y, wide.as_ptr(), wide.len() as i32);
        }
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn xlfd_names_select_family_and_size() {
        let request = parse_font_name("-adobe-helvetica-bold-o-normal--14-*-*-*-*-*-*-*");
        assert_eq!(
            request,
            FontRequest {
                family: "helvetica".to_owned(),
                pixel_size: 14,
                bold: true,
                italic: true,
            }
        );
        assert_eq!(parse_font_name("fixed").family, "Courier New");
        assert_eq!(parse_font_name("Consolas").family, "Consolas");
        assert_eq!(parse_font_name("-*-*-*-*-*--*-*").pixel_size, 13);
    }

    #[test]
    fn xbm_rows_are_word_aligned_and_msb_first() {
        // 3x2: first row has the leftmost pixel set, second the rightmost.
        let rows = xbm_to_ddb(3, 2, &[0b001, 0b100]);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], !0b1000_0000);
        assert_eq!(rows[1], 0xff);
        assert_eq!(rows[2], !0b0010_0000);
    }

    #[test]
    fn dash_offsets_rotate_the_pattern() {
        assert_eq!(rotated_dashes(&[4, 2], 0), vec![4, 2]);
        assert_eq!(rotated_dashes(&[4, 2], 1), vec![3, 2, 1, 0]);
        assert_eq!(rotated_dashes(&[4, 2], 4), vec![0, 2, 4, 0]);
        assert_eq!(rotated_dashes(&[4, 2], 5), vec![0, 1, 4, 1]);
        assert_eq!(rotated_dashes(&[4, 2], 6), vec![4, 2]);
        // Odd lists repeat, like on X.
        assert_eq!(rotated_dashes(&[3], 0), vec![3, 3]);
    }

    #[test]
    fn arcs_go_counter_clockwise() {
        let quarter = Arc {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
            angle1: 0,
            angle2: 90 * 64,
        };
        assert_eq!(
            arc_shape(&quarter),
            ArcShape::Partial {
                start: (150, 50),
                end: (50, -50),
            }
        );
        let reversed = Arc {
            angle1: 90 * 64,
            angle2: -90 * 64,
            ..quarter
        };
        assert_eq!(arc_shape(&reversed), arc_shape(&quarter));
        let full = Arc {
            angle2: 400 * 64,
            ..quarter
        };
        assert_eq!(arc_shape(&full), ArcShape::Full);
        assert_eq!(arc_shape(&Arc { angle2: 0, ..quarter }), ArcShape::Empty);
    }
}
