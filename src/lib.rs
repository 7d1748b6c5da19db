// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Windowing-system abstraction.
//!
//! `gdk-shell` gives a toolkit one model of windows, pixmaps, graphics
//! contexts, regions and colormaps on top of native windowing systems whose
//! window coordinates are limited to 16 bits. Windows may be arbitrarily
//! large and may sit anywhere in 32-bit logical coordinates; the
//! [`position`] engine keeps the native windows inside the representable
//! range and corrects the exposes the server reports across such moves.
//!
//! Everything starts from a [`Display`], generic over a [`backend::Backend`].
//! The backend used by [`Display::open`] is picked at build time, see
//! [`backend::DefaultBackend`].

#![warn(rustdoc::broken_intra_doc_links)]
#![allow(clippy::new_without_default, clippy::too_many_arguments)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod util;

pub mod backend;
pub mod colormap;
pub mod config;
pub mod display;
pub mod drawable;
pub mod error;
pub mod event;
pub mod gc;
pub mod geometry;
pub mod keysym;
pub mod position;
pub mod region;
pub mod runloop;
pub mod threads;
pub mod window;

#[cfg(test)]
mod tests;

pub use keyboard_types;

pub use backend::{Backend, DefaultBackend, NativeEvent, NativeWindow, Serial};
pub use colormap::{Color, Colormap, Visual, VisualClass};
pub use config::{DebugFlags, DisplayConfig};
pub use display::{Atom, DeviceInfo, Display, InputMode, InputSource};
pub use drawable::{Drawable, Font, Pixmap};
pub use error::{Error, ProtocolError};
pub use event::{Event, FilterId, FilterReturn, ModifierType, ScrollDirection};
pub use gc::{Gc, GcValues, GcValuesMask};
pub use geometry::{Arc, Point, Rectangle, Segment};
pub use position::PositionInfo;
pub use region::{FillRule, OverlapType, Region};
pub use runloop::{EventSource, MainLoop, QuitHandle};
pub use threads::{threads_enter, threads_leave, ThreadsGuard};
pub use window::{EventMask, WindowAttributes, WindowClass, WindowId, WindowType};
