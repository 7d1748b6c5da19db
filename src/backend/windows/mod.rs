// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! The Win32 backend.
//!
//! Windows are real `HWND`s. Everything the X protocol keeps on the server
//! and Win32 does not have (graphics contexts, colormaps) is emulated on the
//! client. Requests on unknown handles are reported as the X error the
//! server would have sent, so error traps work the same on both systems.

mod application;
mod colormap;
mod drawable;
pub mod error;
mod util;
mod window;

use std::rc::Rc;
use std::time::Duration;

use self::application::{Application, SYSTEM_COLORMAP};
use crate::backend::{
    Backend, CoordinateLimits, DrawOp, FontMetrics, NativeColormap, NativeDrawable, NativeEvent,
    NativeFont, NativeGc, NativeGcValues, NativePixmap, NativeWindow, NativeWindowAttributes,
    Serial,
};
use crate::colormap::{Color, Visual};
use crate::display::{Atom, DeviceInfo, InputMode, InputSource};
use crate::error::Error;
use crate::gc::GcValuesMask;
use crate::geometry::{Point, Rectangle};
use crate::window::EventMask;

/// The Win32 desktop of the calling thread.
#[derive(Clone)]
pub struct Win32(Rc<Application>);

impl Backend for Win32 {
    fn open(name: Option<&str>, synchronous: bool) -> Result<Win32, Error> {
        if let Some(name) = name {
            tracing::debug!("ignoring display name {:?} on Win32", name);
        }
        if synchronous {
            // GDI calls already complete before returning.
            tracing::debug!("synchronous mode has no effect on Win32");
        }
        Ok(Win32(Rc::new(Application::new()?)))
    }

    fn limits(&self) -> CoordinateLimits {
        CoordinateLimits::WIN32
    }

    fn supports_static_gravity(&self) -> bool {
        false
    }

    fn next_request_serial(&self) -> Serial {
        self.0.next_serial()
    }

    fn root_window(&self) -> NativeWindow {
        self.0.root_window()
    }

    fn screen_size(&self) -> (i32, i32) {
        self.0.screen_size()
    }

    fn system_visual(&self) -> Visual {
        self.0.visual().clone()
    }

    fn system_colormap(&self) -> NativeColormap {
        NativeColormap(SYSTEM_COLORMAP)
    }

    fn create_window(
        &self,
        parent: NativeWindow,
        attrs: &NativeWindowAttributes,
    ) -> Result<NativeWindow, Error> {
        Ok(self.0.create_window(parent, attrs)?)
    }

    fn destroy_window(&self, window: NativeWindow) {
        self.0.destroy_window(window);
    }

    fn reparent_window(&self, window: NativeWindow, parent: NativeWindow, x: i32, y: i32) {
        self.0.reparent_window(window, parent, x, y);
    }

    fn map_window(&self, window: NativeWindow) {
        self.0.map_window(window);
    }

    fn unmap_window(&self, window: NativeWindow) {
        self.0.unmap_window(window);
    }

    fn move_window(&self, window: NativeWindow, x: i32, y: i32) {
        self.0.move_window(window, x, y);
    }

    fn resize_window(&self, window: NativeWindow, width: i32, height: i32) {
        self.0.resize_window(window, width, height);
    }

    fn move_resize_window(&self, window: NativeWindow, rect: Rectangle) {
        self.0.move_resize_window(window, rect);
    }

    fn restack_window(&self, window: NativeWindow, raise: bool) {
        self.0.restack_window(window, raise);
    }

    fn set_event_mask(&self, _window: NativeWindow, _mask: EventMask) {
        // Win32 sends every message; the display filters by mask.
        self.0.request();
    }

    fn set_bit_gravity_static(&self, _window: NativeWindow, _on: bool) -> bool {
        false
    }

    fn set_win_gravity_static(&self, _window: NativeWindow, _on: bool) -> bool {
        false
    }

    fn set_background(&self, window: NativeWindow, pixel: Option<u32>) {
        self.0.set_background(window, pixel);
    }

    fn set_title(&self, window: NativeWindow, title: &str) {
        self.0.set_title(window, title);
    }

    fn window_geometry(&self, window: NativeWindow) -> Option<Rectangle> {
        self.0.window_geometry(window)
    }

    fn create_pixmap(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    ) -> Result<NativePixmap, Error> {
        Ok(self.0.create_pixmap(drawable, width, height, depth)?)
    }

    fn create_bitmap_from_data(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        data: &[u8],
    ) -> Result<NativePixmap, Error> {
        Ok(self.0.create_bitmap_from_data(drawable, width, height, data)?)
    }

    fn free_pixmap(&self, pixmap: NativePixmap) {
        self.0.free_pixmap(pixmap);
    }

    fn load_font(&self, name: &str) -> Result<(NativeFont, FontMetrics), Error> {
        Ok(self.0.load_font(name)?)
    }

    fn free_font(&self, font: NativeFont) {
        self.0.free_font(font);
    }

    fn create_gc(&self, drawable: NativeDrawable) -> Result<NativeGc, Error> {
        Ok(self.0.create_gc(drawable)?)
    }

    fn free_gc(&self, gc: NativeGc) {
        self.0.free_gc(gc);
    }

    fn change_gc(&self, gc: NativeGc, values: &NativeGcValues, mask: GcValuesMask) {
        self.0.change_gc(gc, values, mask);
    }

    fn set_clip_rectangles(&self, gc: NativeGc, origin: Point, rects: Option<&[Rectangle]>) {
        self.0.set_clip_rectangles(gc, origin, rects);
    }

    fn set_dashes(&self, gc: NativeGc, offset: i32, dashes: &[u8]) {
        self.0.set_dashes(gc, offset, dashes);
    }

    fn draw(&self, drawable: NativeDrawable, gc: NativeGc, op: &DrawOp) {
        self.0.draw(drawable, gc, op);
    }

    fn copy_area(
        &self,
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    ) {
        self.0.copy_area(src, dst, gc, src_rect, dst_origin);
    }

    fn create_colormap(&self, visual: &Visual, private: bool) -> Result<NativeColormap, Error> {
        Ok(self.0.create_colormap(visual, private)?)
    }

    fn free_colormap(&self, colormap: NativeColormap) {
        self.0.free_colormap(colormap);
    }

    fn alloc_color(&self, colormap: NativeColormap, color: &Color) -> Option<Color> {
        self.0.alloc_color(colormap, color)
    }

    fn alloc_color_cells(&self, colormap: NativeColormap, count: usize) -> Option<Vec<u32>> {
        self.0.alloc_color_cells(colormap, count)
    }

    fn free_colors(&self, colormap: NativeColormap, pixels: &[u32]) {
        self.0.free_colors(colormap, pixels);
    }

    fn store_colors(&self, colormap: NativeColormap, colors: &[Color]) {
        self.0.store_colors(colormap, colors);
    }

    fn query_colors(&self, colormap: NativeColormap, pixels: &[u32]) -> Vec<Color> {
        self.0.query_colors(colormap, pixels)
    }

    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Option<Atom> {
        self.0.intern_atom(name, only_if_exists)
    }

    fn atom_name(&self, atom: Atom) -> Option<String> {
        self.0.atom_name(atom)
    }

    fn list_devices(&self) -> Vec<DeviceInfo> {
        vec![DeviceInfo {
            name: "Core Pointer".to_owned(),
            source: InputSource::Mouse,
            mode: InputMode::Screen,
            has_cursor: true,
            num_axes: 2,
        }]
    }

    fn beep(&self) {
        self.0.beep();
    }

    fn flush(&self) {
        self.0.flush();
    }

    fn sync(&self) {
        self.0.flush();
    }

    fn poll_event(&self) -> Option<NativeEvent> {
        self.0.poll_event()
    }

    fn wait_event(&self, timeout: Option<Duration>) -> bool {
        self.0.wait_event(timeout)
    }

    fn close(&self) {
        self.0.close();
    }
}
