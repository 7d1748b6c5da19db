// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! A backend without a windowing system.
//!
//! The server lives in the same process and behaves like a 16-bit X server:
//! it keeps window geometry in wrapped native coordinates, answers requests
//! on unknown resources with asynchronous errors and reports structure
//! changes as events. Every request is logged with its serial, which makes
//! this backend the one the test suite drives the core with. It is also the
//! [`DefaultBackend`](super::DefaultBackend) on platforms without a native
//! one.

mod server;
mod util;

pub mod error;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    Backend, CoordinateLimits, DrawOp, FontMetrics, NativeColormap, NativeDrawable, NativeEvent,
    NativeEventKind, NativeFont, NativeGc, NativeGcValues, NativePixmap, NativeWindow,
    NativeWindowAttributes, Serial,
};
use crate::colormap::{Color, Visual};
use crate::display::{Atom, DeviceInfo, InputMode, InputSource};
use crate::error::Error;
use crate::gc::GcValuesMask;
use crate::geometry::{Point, Rectangle};
use crate::window::EventMask;

use self::server::Server;

pub use self::server::{Request, WindowState};

/// How the headless server is set up.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub screen_width: i32,
    pub screen_height: i32,
    pub limits: CoordinateLimits,
    /// The visual of the root window and the system colormap.
    pub visual: Visual,
    /// Whether static gravity is honoured.
    pub static_gravity: bool,
    /// Limits how many cells of the shared colormap can be allocated, to
    /// simulate other clients holding the rest.
    pub shared_cell_capacity: Option<usize>,
    pub devices: Vec<DeviceInfo>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        HeadlessConfig {
            screen_width: 1280,
            screen_height: 1024,
            limits: CoordinateLimits::X11,
            visual: Visual::true_color(0x21, 24),
            static_gravity: true,
            shared_cell_capacity: None,
            devices: vec![DeviceInfo {
                name: "Core Pointer".to_owned(),
                source: InputSource::Mouse,
                mode: InputMode::Screen,
                has_cursor: true,
                num_axes: 2,
            }],
        }
    }
}

/// A handle to an in-process server. Clones share the server.
#[derive(Clone)]
pub struct Headless {
    server: Rc<RefCell<Server>>,
}

impl std::fmt::Debug for Headless {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Headless").finish_non_exhaustive()
    }
}

impl Headless {
    pub fn new(config: HeadlessConfig) -> Headless {
        Headless {
            server: Rc::new(RefCell::new(Server::new(config))),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Server) -> R) -> Option<R> {
        match borrow_mut!(self.server) {
            Ok(mut server) => Some(f(&mut server)),
            Err(e) => {
                tracing::error!("{}", e);
                None
            }
        }
    }

    fn try_with<R>(
        &self,
        f: impl FnOnce(&mut Server) -> Result<R, error::Error>,
    ) -> Result<R, Error> {
        let mut server =
            borrow_mut!(self.server).map_err(|e| error::Error::Busy(Arc::new(e)))?;
        Ok(f(&mut server)?)
    }

    /// Every request issued so far, with its serial.
    pub fn requests(&self) -> Vec<(Serial, Request)> {
        self.with(|s| s.requests().to_vec()).unwrap_or_default()
    }

    pub fn clear_requests(&self) {
        self.with(Server::clear_requests);
    }

    /// The serial of the last request the server processed.
    pub fn last_serial(&self) -> Serial {
        self.with(|s| s.last_serial()).unwrap_or_default()
    }

    /// Queues an event as if the server had sent it.
    pub fn inject(&self, event: NativeEvent) {
        self.with(|s| s.push_event(event));
    }

    /// Queues an event for `window`, stamped with the last serial.
    pub fn inject_window_event(&self, window: NativeWindow, kind: NativeEventKind) {
        self.with(|s| {
            let serial = s.last_serial();
            s.push_event(NativeEvent::Window {
                window,
                serial,
                kind,
            })
        });
    }

    /// A snapshot of what the server knows about `window`.
    pub fn window_state(&self, window: NativeWindow) -> Option<WindowState> {
        self.with(|s| s.window(window).cloned()).flatten()
    }

    pub fn is_viewable(&self, window: NativeWindow) -> bool {
        self.with(|s| s.is_viewable(window)).unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.with(|s| s.is_closed()).unwrap_or(true)
    }
}

impl Backend for Headless {
    fn open(name: Option<&str>, _synchronous: bool) -> Result<Headless, Error> {
        tracing::debug!("opening headless display {:?}", name);
        Ok(Headless::new(HeadlessConfig::default()))
    }

    fn limits(&self) -> CoordinateLimits {
        self.with(|s| s.config().limits)
            .unwrap_or(CoordinateLimits::X11)
    }

    fn supports_static_gravity(&self) -> bool {
        self.with(|s| s.config().static_gravity).unwrap_or(false)
    }

    fn next_request_serial(&self) -> Serial {
        self.with(|s| s.next_serial()).unwrap_or_default()
    }

    fn root_window(&self) -> NativeWindow {
        server::ROOT
    }

    fn screen_size(&self) -> (i32, i32) {
        self.with(|s| (s.config().screen_width, s.config().screen_height))
            .unwrap_or((0, 0))
    }

    fn system_visual(&self) -> Visual {
        self.with(|s| s.config().visual.clone())
            .unwrap_or_else(|| Visual::true_color(0, 24))
    }

    fn system_colormap(&self) -> NativeColormap {
        server::SYSTEM_COLORMAP
    }

    fn create_window(
        &self,
        parent: NativeWindow,
        attrs: &NativeWindowAttributes,
    ) -> Result<NativeWindow, Error> {
        self.try_with(|s| s.create_window(parent, attrs))
    }

    fn destroy_window(&self, window: NativeWindow) {
        self.with(|s| s.destroy_window(window));
    }

    fn reparent_window(&self, window: NativeWindow, parent: NativeWindow, x: i32, y: i32) {
        self.with(|s| s.reparent_window(window, parent, x, y));
    }

    fn map_window(&self, window: NativeWindow) {
        self.with(|s| s.map_window(window));
    }

    fn unmap_window(&self, window: NativeWindow) {
        self.with(|s| s.unmap_window(window));
    }

    fn move_window(&self, window: NativeWindow, x: i32, y: i32) {
        self.with(|s| s.configure_window(window, Some(x), Some(y), None, None));
    }

    fn resize_window(&self, window: NativeWindow, width: i32, height: i32) {
        self.with(|s| s.configure_window(window, None, None, Some(width), Some(height)));
    }

    fn move_resize_window(&self, window: NativeWindow, rect: Rectangle) {
        self.with(|s| {
            s.configure_window(
                window,
                Some(rect.x),
                Some(rect.y),
                Some(rect.width),
                Some(rect.height),
            )
        });
    }

    fn restack_window(&self, window: NativeWindow, raise: bool) {
        self.with(|s| s.restack_window(window, raise));
    }

    fn set_event_mask(&self, window: NativeWindow, mask: EventMask) {
        self.with(|s| s.set_event_mask(window, mask));
    }

    fn set_bit_gravity_static(&self, window: NativeWindow, on: bool) -> bool {
        self.with(|s| s.set_bit_gravity_static(window, on))
            .unwrap_or(false)
    }

    fn set_win_gravity_static(&self, window: NativeWindow, on: bool) -> bool {
        self.with(|s| s.set_win_gravity_static(window, on))
            .unwrap_or(false)
    }

    fn set_background(&self, window: NativeWindow, pixel: Option<u32>) {
        self.with(|s| s.set_background(window, pixel));
    }

    fn set_title(&self, window: NativeWindow, title: &str) {
        self.with(|s| s.set_title(window, title));
    }

    fn window_geometry(&self, window: NativeWindow) -> Option<Rectangle> {
        self.with(|s| s.window_geometry(window)).flatten()
    }

    fn create_pixmap(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    ) -> Result<NativePixmap, Error> {
        self.try_with(|s| s.create_pixmap(drawable, width, height, depth))
    }

    fn create_bitmap_from_data(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        data: &[u8],
    ) -> Result<NativePixmap, Error> {
        self.try_with(|s| s.create_bitmap_from_data(drawable, width, height, data))
    }

    fn free_pixmap(&self, pixmap: NativePixmap) {
        self.with(|s| s.free_pixmap(pixmap));
    }

    fn load_font(&self, name: &str) -> Result<(NativeFont, FontMetrics), Error> {
        self.try_with(|s| s.load_font(name))
    }

    fn free_font(&self, font: NativeFont) {
        self.with(|s| s.free_font(font));
    }

    fn create_gc(&self, drawable: NativeDrawable) -> Result<NativeGc, Error> {
        self.try_with(|s| s.create_gc(drawable))
    }

    fn free_gc(&self, gc: NativeGc) {
        self.with(|s| s.free_gc(gc));
    }

    fn change_gc(&self, gc: NativeGc, values: &NativeGcValues, mask: GcValuesMask) {
        self.with(|s| s.change_gc(gc, values, mask));
    }

    fn set_clip_rectangles(&self, gc: NativeGc, origin: Point, rects: Option<&[Rectangle]>) {
        self.with(|s| s.set_clip_rectangles(gc, origin, rects));
    }

    fn set_dashes(&self, gc: NativeGc, offset: i32, dashes: &[u8]) {
        self.with(|s| s.set_dashes(gc, offset, dashes));
    }

    fn draw(&self, drawable: NativeDrawable, gc: NativeGc, op: &DrawOp) {
        self.with(|s| s.draw(drawable, gc, op));
    }

    fn copy_area(
        &self,
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    ) {
        self.with(|s| s.copy_area(src, dst, gc, src_rect, dst_origin));
    }

    fn create_colormap(&self, visual: &Visual, private: bool) -> Result<NativeColormap, Error> {
        self.try_with(|s| s.create_colormap(visual, private))
    }

    fn free_colormap(&self, colormap: NativeColormap) {
        self.with(|s| s.free_colormap(colormap));
    }

    fn alloc_color(&self, colormap: NativeColormap, color: &Color) -> Option<Color> {
        self.with(|s| s.alloc_color(colormap, color)).flatten()
    }

    fn alloc_color_cells(&self, colormap: NativeColormap, count: usize) -> Option<Vec<u32>> {
        self.with(|s| s.alloc_color_cells(colormap, count))
            .flatten()
    }

    fn free_colors(&self, colormap: NativeColormap, pixels: &[u32]) {
        self.with(|s| s.free_colors(colormap, pixels));
    }

    fn store_colors(&self, colormap: NativeColormap, colors: &[Color]) {
        self.with(|s| s.store_colors(colormap, colors));
    }

    fn query_colors(&self, colormap: NativeColormap, pixels: &[u32]) -> Vec<Color> {
        self.with(|s| s.query_colors(colormap, pixels))
            .unwrap_or_default()
    }

    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Option<Atom> {
        self.with(|s| s.intern_atom(name, only_if_exists))
            .flatten()
    }

    fn atom_name(&self, atom: Atom) -> Option<String> {
        self.with(|s| s.atom_name(atom)).flatten()
    }

    fn list_devices(&self) -> Vec<DeviceInfo> {
        self.with(|s| s.devices()).unwrap_or_default()
    }

    fn beep(&self) {
        self.with(Server::bell);
    }

    fn flush(&self) {}

    fn sync(&self) {
        self.with(Server::sync);
    }

    fn poll_event(&self) -> Option<NativeEvent> {
        self.with(Server::pop_event).flatten()
    }

    fn wait_event(&self, timeout: Option<Duration>) -> bool {
        if self.with(|s| s.has_events()).unwrap_or(false) {
            return true;
        }
        // Nothing can arrive while this thread sleeps, so there is no point
        // waiting longer than asked, or at all without a timeout.
        if let Some(timeout) = timeout {
            std::thread::sleep(timeout);
        }
        false
    }

    fn close(&self) {
        tracing::debug!("closing headless display");
        self.with(Server::close);
    }
}
