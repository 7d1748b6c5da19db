// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! The display: one connection to a windowing server and everything the
//! core tracks about it.

use std::collections::HashMap;

use crate::backend::{Backend, DefaultBackend, NativeEvent, NativeGc, NativeWindow};
use crate::colormap::Colormap;
use crate::config::DisplayConfig;
use crate::error::{Error, ProtocolError};
use crate::event::{ErrorTrap, EventQueue};
use crate::geometry::Rectangle;
use crate::position::{PositionInfo, TranslateQueue};
use crate::window::{EventMask, WindowId, WindowRecord, WindowTree, WindowType};

/// An interned string identifier shared with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Mouse,
    Pen,
    Eraser,
    Cursor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Disabled,
    Screen,
    Window,
}

/// An input device known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub source: InputSource,
    pub mode: InputMode,
    pub has_cursor: bool,
    pub num_axes: u32,
}

type FatalHandler = Box<dyn FnMut(&Error)>;

/// A connection to a windowing server.
///
/// Owns every window record, the handle table mapping native windows back
/// to them, the atom cache, the event queue and the translation queue of
/// the big-window engine. A display is bound to the thread that opened it.
pub struct Display<B: Backend = DefaultBackend> {
    pub(crate) backend: B,
    pub(crate) config: DisplayConfig,
    pub(crate) windows: WindowTree<B>,
    pub(crate) root: WindowId,
    pub(crate) handles: HashMap<NativeWindow, WindowId>,
    atoms: HashMap<String, Atom>,
    atom_names: HashMap<Atom, String>,
    devices: Vec<DeviceInfo>,
    pub(crate) translate_queue: TranslateQueue,
    pub(crate) events: EventQueue,
    pub(crate) error_traps: Vec<ErrorTrap>,
    fatal_handler: Option<FatalHandler>,
    pub(crate) system_colormap: Colormap<B>,
    /// Windows with a pending update area, in invalidation order.
    pub(crate) update_windows: Vec<WindowId>,
    pub(crate) scratch_gc: Option<NativeGc>,
    pub(crate) closed: bool,
}

impl<B: Backend> Display<B> {
    /// Connects to the display named in `config`.
    pub fn open(config: DisplayConfig) -> Result<Display<B>, Error> {
        let backend = B::open(config.display_name.as_deref(), config.synchronous)?;
        Display::with_backend(backend, config)
    }

    /// Sets up a display on an already connected backend.
    pub fn with_backend(backend: B, config: DisplayConfig) -> Result<Display<B>, Error> {
        let root_native = backend.root_window();
        let (width, height) = backend.screen_size();
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidInput(format!(
                "screen size {width}x{height} is not usable"
            )));
        }
        let system_colormap = Colormap::system(&backend);
        let screen = Rectangle::new(0, 0, width, height);

        let mut windows = WindowTree::new();
        let root = windows.insert(WindowRecord {
            native: root_native,
            window_type: WindowType::Root,
            parent: None,
            children: Vec::new(),
            x: 0,
            y: 0,
            width,
            height,
            depth: system_colormap.visual().depth,
            colormap: Some(system_colormap.clone()),
            event_mask: EventMask::empty(),
            mapped: true,
            input_only: false,
            guffaw_gravity: false,
            background: None,
            position: PositionInfo::unvirtualized(screen),
            update_area: None,
            filters: Vec::new(),
            title: None,
            virtual_unmaps: 0,
            virtual_maps: 0,
        });
        let mut handles = HashMap::new();
        handles.insert(root_native, root);
        let devices = backend.list_devices();

        note!(
            config.debug_flags,
            MISC,
            "opened display {:?}: {}x{} screen, {} input devices",
            config.display_name,
            width,
            height,
            devices.len()
        );
        Ok(Display {
            backend,
            config,
            windows,
            root,
            handles,
            atoms: HashMap::new(),
            atom_names: HashMap::new(),
            devices,
            translate_queue: TranslateQueue::default(),
            events: EventQueue::default(),
            error_traps: Vec::new(),
            fatal_handler: None,
            system_colormap,
            update_windows: Vec::new(),
            scratch_gc: None,
            closed: false,
        })
    }

    /// Tears the display down. Closing twice does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        // Set first: a fatal error while tearing down must not recurse.
        self.closed = true;
        tracing::debug!("closing display {:?}", self.config.display_name);
        if let Some(gc) = self.scratch_gc.take() {
            self.backend.free_gc(gc);
        }
        self.windows = WindowTree::new();
        self.handles.clear();
        self.update_windows.clear();
        self.translate_queue.forget(|_| true);
        self.events = EventQueue::default();
        self.error_traps.clear();
        self.backend.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn root_window(&self) -> WindowId {
        self.root
    }

    pub fn system_colormap(&self) -> &Colormap<B> {
        &self.system_colormap
    }

    /// The window wrapping a native window, if we know it.
    pub fn lookup(&self, native: NativeWindow) -> Option<WindowId> {
        self.handles.get(&native).copied()
    }

    pub fn screen_size(&self) -> (i32, i32) {
        self.backend.screen_size()
    }

    pub fn beep(&self) {
        self.backend.beep();
    }

    pub fn flush(&self) {
        self.backend.flush();
    }

    /// Waits for the server to process every request, then handles the
    /// errors it reported.
    pub fn sync(&mut self) {
        self.backend.sync();
        self.drain_errors();
    }

    pub(crate) fn sync_if_synchronous(&mut self) {
        if self.config.synchronous {
            self.sync();
        }
    }

    /// Returns the atom for `name`, creating it unless `only_if_exists`.
    pub fn intern_atom(&mut self, name: &str, only_if_exists: bool) -> Option<Atom> {
        if let Some(atom) = self.atoms.get(name) {
            return Some(*atom);
        }
        let atom = self.backend.intern_atom(name, only_if_exists)?;
        self.atoms.insert(name.to_owned(), atom);
        self.atom_names.insert(atom, name.to_owned());
        Some(atom)
    }

    pub fn atom_name(&mut self, atom: Atom) -> Option<String> {
        if let Some(name) = self.atom_names.get(&atom) {
            return Some(name.clone());
        }
        let name = self.backend.atom_name(atom)?;
        self.atom_names.insert(atom, name.clone());
        self.atoms.insert(name.clone(), atom);
        Some(name)
    }

    pub fn list_devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// The device driving the on-screen pointer.
    pub fn core_pointer(&self) -> Option<&DeviceInfo> {
        self.devices
            .iter()
            .find(|d| d.source == InputSource::Mouse && d.has_cursor)
    }

    /// Starts catching protocol errors instead of treating them as fatal.
    pub fn push_error_trap(&mut self) {
        let start = self.backend.next_request_serial();
        self.error_traps.push(ErrorTrap { start, error: None });
    }

    /// Stops the innermost error trap and returns the first error it caught.
    pub fn pop_error_trap(&mut self) -> Option<ProtocolError> {
        self.backend.sync();
        self.drain_errors();
        match self.error_traps.pop() {
            Some(trap) => trap.error,
            None => {
                tracing::warn!("pop_error_trap without a matching push_error_trap");
                None
            }
        }
    }

    /// Replaces the default handling of fatal errors, which logs, closes
    /// the display and exits the process.
    pub fn set_fatal_handler(&mut self, handler: impl FnMut(&Error) + 'static) {
        self.fatal_handler = Some(Box::new(handler));
    }

    pub(crate) fn fatal(&mut self, err: Error) {
        match self.fatal_handler.take() {
            Some(mut handler) => {
                handler(&err);
                if self.fatal_handler.is_none() {
                    self.fatal_handler = Some(handler);
                }
            }
            None => {
                tracing::error!("fatal display error: {}", err);
                self.close();
                std::process::exit(1);
            }
        }
    }

    /// Reads everything the server has sent and routes the errors among it.
    fn drain_errors(&mut self) {
        while let Some(native) = self.backend.poll_event() {
            self.events.pending_native.push_back(native);
        }
        if !self
            .events
            .pending_native
            .iter()
            .any(|e| matches!(e, NativeEvent::Error(_)))
        {
            return;
        }
        let pending = std::mem::take(&mut self.events.pending_native);
        let mut errors = Vec::new();
        for native in pending {
            match native {
                NativeEvent::Error(err) => errors.push(err),
                other => self.events.pending_native.push_back(other),
            }
        }
        for err in errors {
            self.handle_protocol_error(err);
        }
    }
}

impl<B: Backend> Drop for Display<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::headless::Headless;
    use static_assertions as sa;

    sa::assert_not_impl_any!(Display<Headless>: Send, Sync);
}
