// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! The native display seam.
//!
//! Everything above this module works in 32-bit logical coordinates and
//! talks to the windowing system only through the [`Backend`] trait. A
//! backend is a cheaply clonable handle to one connection; the core keeps
//! clones inside pixmaps, GCs and colormaps so they can release their
//! native resources when dropped.

use std::fmt;
use std::time::Duration;

use crate::colormap::{Color, Visual};
use crate::display::{Atom, DeviceInfo};
use crate::error::{Error, ProtocolError};
use crate::event::{CrossingMode, NotifyDetail};
use crate::gc::{CapStyle, Fill, Function, GcValuesMask, JoinStyle, LineStyle, SubwindowMode};
use crate::geometry::{Arc, Point, Rectangle, Segment};
use crate::window::{EventMask, WindowClass, WindowType};

pub mod headless;

#[cfg(all(
    feature = "x11",
    any(target_os = "freebsd", target_os = "linux", target_os = "openbsd")
))]
pub mod x11;

#[cfg(target_os = "windows")]
pub mod windows;

cfg_if::cfg_if! {
    if #[cfg(target_os = "windows")] {
        /// The backend [`Display::open`](crate::Display::open) uses on this platform.
        pub type DefaultBackend = windows::Win32;
    } else if #[cfg(all(
        feature = "x11",
        any(target_os = "freebsd", target_os = "linux", target_os = "openbsd")
    ))] {
        /// The backend [`Display::open`](crate::Display::open) uses on this platform.
        pub type DefaultBackend = x11::X11;
    } else {
        /// The backend [`Display::open`](crate::Display::open) uses on this platform.
        pub type DefaultBackend = headless::Headless;
    }
}

/// A request sequence number.
///
/// Serials grow monotonically but may wrap, so they are compared with
/// [`is_before`](Serial::is_before) instead of `<`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Serial(pub u64);

impl Serial {
    /// Returns `true` if `self` was issued strictly before `other`.
    pub fn is_before(self, other: Serial) -> bool {
        (self.0.wrapping_sub(other.0) as i64) < 0
    }
}

/// The coordinate limits of a native windowing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateLimits {
    /// The largest extent a native window may have.
    pub size_limit: i32,
    /// Native positions below this are avoided for big windows.
    pub low: i32,
    /// Native positions above this are avoided for big windows.
    pub high: i32,
    /// The distance after which native coordinates wrap around.
    pub wrap: i32,
}

impl CoordinateLimits {
    /// 16-bit signed coordinates with 16-bit unsigned extents.
    pub const X11: CoordinateLimits = CoordinateLimits {
        size_limit: 32768,
        low: -16384,
        high: 16384,
        wrap: 65536,
    };

    /// Win32 keeps one unit of headroom on each side.
    pub const WIN32: CoordinateLimits = CoordinateLimits {
        size_limit: 32767,
        low: -16383,
        high: 16383,
        wrap: 65535,
    };
}

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

native_handle!(
    /// A window id on the native server.
    NativeWindow
);
native_handle!(
    /// An offscreen pixmap id on the native server.
    NativePixmap
);
native_handle!(
    /// A graphics context id on the native server.
    NativeGc
);
native_handle!(
    /// A colormap id on the native server.
    NativeColormap
);
native_handle!(
    /// A font id on the native server.
    NativeFont
);

/// Something that can be drawn to natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeDrawable {
    Window(NativeWindow),
    Pixmap(NativePixmap),
}

impl NativeDrawable {
    pub fn id(self) -> u64 {
        match self {
            NativeDrawable::Window(w) => w.0,
            NativeDrawable::Pixmap(p) => p.0,
        }
    }
}

/// Everything a backend needs to create a native window.
///
/// Geometry is already limited to what the native system can hold.
#[derive(Debug, Clone)]
pub struct NativeWindowAttributes {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub class: WindowClass,
    pub window_type: WindowType,
    pub depth: u8,
    pub colormap: Option<NativeColormap>,
    pub background: Option<u32>,
    pub event_mask: EventMask,
    pub override_redirect: bool,
    pub title: Option<String>,
    pub wmclass: Option<(String, String)>,
}

/// GC state in native form: pixel values and native handles.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeGcValues {
    pub foreground: u32,
    pub background: u32,
    pub font: Option<NativeFont>,
    pub function: Function,
    pub fill: Fill,
    pub tile: Option<NativePixmap>,
    pub stipple: Option<NativePixmap>,
    pub clip_mask: Option<NativePixmap>,
    pub subwindow_mode: SubwindowMode,
    pub ts_origin: Point,
    pub clip_origin: Point,
    pub graphics_exposures: bool,
    pub line_width: i32,
    pub line_style: LineStyle,
    pub cap_style: CapStyle,
    pub join_style: JoinStyle,
}

/// One native drawing primitive, already in native coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Points(Vec<Point>),
    Segments(Vec<Segment>),
    Lines(Vec<Point>),
    Rectangles { filled: bool, rects: Vec<Rectangle> },
    Arcs { filled: bool, arcs: Vec<Arc> },
    Polygon { filled: bool, points: Vec<Point> },
    Text { x: i32, y: i32, text: String },
}

/// Font metrics reported when a font is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontMetrics {
    pub ascent: i32,
    pub descent: i32,
}

/// Pointer and modifier state attached to input events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputInfo {
    pub time: u32,
    pub x: i32,
    pub y: i32,
    pub x_root: i32,
    pub y_root: i32,
    pub state: u16,
}

/// What happened to a native window.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEventKind {
    Expose { area: Rectangle, count: u32 },
    GraphicsExpose { area: Rectangle, count: u32 },
    NoExpose,
    ButtonPress { info: InputInfo, button: u32 },
    ButtonRelease { info: InputInfo, button: u32 },
    KeyPress { info: InputInfo, keycode: u32, keyval: u32 },
    KeyRelease { info: InputInfo, keycode: u32, keyval: u32 },
    Motion { info: InputInfo, is_hint: bool },
    Crossing {
        info: InputInfo,
        enter: bool,
        mode: CrossingMode,
        detail: NotifyDetail,
    },
    Focus { focus_in: bool },
    Configure { x: i32, y: i32, width: i32, height: i32 },
    Map,
    Unmap,
    Destroy,
    DeleteRequest,
    Other { code: u8 },
}

/// An event as read from the native connection.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    Window {
        window: NativeWindow,
        serial: Serial,
        kind: NativeEventKind,
    },
    Error(ProtocolError),
    ConnectionLost,
}

impl NativeEvent {
    pub fn window(&self) -> Option<NativeWindow> {
        match self {
            NativeEvent::Window { window, .. } => Some(*window),
            _ => None,
        }
    }

    pub fn serial(&self) -> Option<Serial> {
        match self {
            NativeEvent::Window { serial, .. } => Some(*serial),
            NativeEvent::Error(err) => Some(err.serial),
            NativeEvent::ConnectionLost => None,
        }
    }
}

/// Platform specific errors.
#[derive(Debug, Clone)]
pub enum PlatformError {
    Headless(headless::error::Error),
    #[cfg(all(
        feature = "x11",
        any(target_os = "freebsd", target_os = "linux", target_os = "openbsd")
    ))]
    X11(x11::error::Error),
    #[cfg(target_os = "windows")]
    Windows(windows::error::Error),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            PlatformError::Headless(e) => fmt::Display::fmt(e, f),
            #[cfg(all(
                feature = "x11",
                any(target_os = "freebsd", target_os = "linux", target_os = "openbsd")
            ))]
            PlatformError::X11(e) => fmt::Display::fmt(e, f),
            #[cfg(target_os = "windows")]
            PlatformError::Windows(e) => fmt::Display::fmt(e, f),
        }
    }
}

/// A connection to a native windowing system.
///
/// Requests that only change server state do not report failure directly;
/// the server answers them with an asynchronous [`NativeEvent::Error`], which
/// the display routes to an error trap or the fatal handler. Requests that
/// create resources or need a reply return a `Result` or `Option`.
pub trait Backend: Clone + 'static {
    /// Connects to the display named by `name`, or the default display.
    fn open(name: Option<&str>, synchronous: bool) -> Result<Self, Error>;

    fn limits(&self) -> CoordinateLimits;

    /// Whether static window and bit gravity are honoured by the server.
    fn supports_static_gravity(&self) -> bool;

    /// The serial the next request will be issued with.
    fn next_request_serial(&self) -> Serial;

    fn root_window(&self) -> NativeWindow;
    fn screen_size(&self) -> (i32, i32);
    fn system_visual(&self) -> Visual;
    fn system_colormap(&self) -> NativeColormap;

    fn create_window(
        &self,
        parent: NativeWindow,
        attrs: &NativeWindowAttributes,
    ) -> Result<NativeWindow, Error>;
    fn destroy_window(&self, window: NativeWindow);
    fn reparent_window(&self, window: NativeWindow, parent: NativeWindow, x: i32, y: i32);
    fn map_window(&self, window: NativeWindow);
    fn unmap_window(&self, window: NativeWindow);
    fn move_window(&self, window: NativeWindow, x: i32, y: i32);
    fn resize_window(&self, window: NativeWindow, width: i32, height: i32);
    fn move_resize_window(&self, window: NativeWindow, rect: Rectangle);
    fn restack_window(&self, window: NativeWindow, raise: bool);
    fn set_event_mask(&self, window: NativeWindow, mask: EventMask);
    /// Sets the gravity of the window's contents. Returns `false` if unsupported.
    fn set_bit_gravity_static(&self, window: NativeWindow, on: bool) -> bool;
    /// Sets the gravity of the window relative to its parent. Returns `false` if unsupported.
    fn set_win_gravity_static(&self, window: NativeWindow, on: bool) -> bool;
    /// Sets the background pixel, or no background at all.
    fn set_background(&self, window: NativeWindow, pixel: Option<u32>);
    fn set_title(&self, window: NativeWindow, title: &str);
    /// Geometry of any window on the server, relative to its parent.
    fn window_geometry(&self, window: NativeWindow) -> Option<Rectangle>;

    fn create_pixmap(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    ) -> Result<NativePixmap, Error>;
    fn create_bitmap_from_data(
        &self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        data: &[u8],
    ) -> Result<NativePixmap, Error>;
    fn free_pixmap(&self, pixmap: NativePixmap);

    fn load_font(&self, name: &str) -> Result<(NativeFont, FontMetrics), Error>;
    fn free_font(&self, font: NativeFont);

    fn create_gc(&self, drawable: NativeDrawable) -> Result<NativeGc, Error>;
    fn free_gc(&self, gc: NativeGc);
    fn change_gc(&self, gc: NativeGc, values: &NativeGcValues, mask: GcValuesMask);
    /// Replaces the clip with a set of rectangles, or removes it.
    fn set_clip_rectangles(&self, gc: NativeGc, origin: Point, rects: Option<&[Rectangle]>);
    fn set_dashes(&self, gc: NativeGc, offset: i32, dashes: &[u8]);

    fn draw(&self, drawable: NativeDrawable, gc: NativeGc, op: &DrawOp);
    fn copy_area(
        &self,
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    );

    fn create_colormap(&self, visual: &Visual, private: bool) -> Result<NativeColormap, Error>;
    fn free_colormap(&self, colormap: NativeColormap);
    /// Allocates a read-only cell. The returned color carries the pixel and
    /// the components the server actually granted.
    fn alloc_color(&self, colormap: NativeColormap, color: &Color) -> Option<Color>;
    /// Allocates `count` writeable cells.
    fn alloc_color_cells(&self, colormap: NativeColormap, count: usize) -> Option<Vec<u32>>;
    fn free_colors(&self, colormap: NativeColormap, pixels: &[u32]);
    fn store_colors(&self, colormap: NativeColormap, colors: &[Color]);
    fn query_colors(&self, colormap: NativeColormap, pixels: &[u32]) -> Vec<Color>;

    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Option<Atom>;
    fn atom_name(&self, atom: Atom) -> Option<String>;
    fn list_devices(&self) -> Vec<DeviceInfo>;

    fn beep(&self);
    fn flush(&self);
    /// Flushes and waits until the server has processed every request.
    fn sync(&self);

    /// Returns the next event that is ready, without blocking.
    fn poll_event(&self) -> Option<NativeEvent>;
    /// Blocks until an event may be ready or the timeout expires.
    ///
    /// Returns `true` if the connection became readable.
    fn wait_event(&self, timeout: Option<Duration>) -> bool;

    fn close(&self);
}
