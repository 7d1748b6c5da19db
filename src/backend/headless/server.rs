// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! The in-process server: its resources, the request log and the event queue.
//!
//! Window geometry is kept the way a 16-bit server keeps it: positions wrap
//! around, extents are clamped. This is what makes the headless backend
//! useful for checking the coordinate virtualization above it.

use std::collections::{BTreeMap, HashMap, VecDeque};

use super::error::Error;
use super::util::{error_code, opcode, PREDEFINED_ATOMS};
use super::HeadlessConfig;
use crate::backend::{
    DrawOp, FontMetrics, NativeColormap, NativeDrawable, NativeEvent, NativeEventKind, NativeFont,
    NativeGc, NativeGcValues, NativePixmap, NativeWindow, NativeWindowAttributes, Serial,
};
use crate::colormap::{Color, Visual, VisualClass};
use crate::display::{Atom, DeviceInfo};
use crate::error::ProtocolError;
use crate::gc::GcValuesMask;
use crate::geometry::{Point, Rectangle};
use crate::region::Region;
use crate::util::{clamp_u16, wrap_i16};
use crate::window::{EventMask, WindowClass};

pub(super) const ROOT: NativeWindow = NativeWindow(0x1d3);
pub(super) const SYSTEM_COLORMAP: NativeColormap = NativeColormap(0x20);
const RESOURCE_BASE: u64 = 0x0040_0000;

/// A request as the server received it. Coordinates are native.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateWindow {
        window: NativeWindow,
        parent: NativeWindow,
        rect: Rectangle,
        class: WindowClass,
        event_mask: EventMask,
    },
    DestroyWindow {
        window: NativeWindow,
    },
    ReparentWindow {
        window: NativeWindow,
        parent: NativeWindow,
        x: i32,
        y: i32,
    },
    MapWindow {
        window: NativeWindow,
    },
    UnmapWindow {
        window: NativeWindow,
    },
    /// A move, a resize or both; `None` leaves the value alone.
    ConfigureWindow {
        window: NativeWindow,
        x: Option<i32>,
        y: Option<i32>,
        width: Option<i32>,
        height: Option<i32>,
    },
    RestackWindow {
        window: NativeWindow,
        raise: bool,
    },
    SetEventMask {
        window: NativeWindow,
        mask: EventMask,
    },
    SetBitGravity {
        window: NativeWindow,
        static_gravity: bool,
    },
    SetWinGravity {
        window: NativeWindow,
        static_gravity: bool,
    },
    SetBackground {
        window: NativeWindow,
        pixel: Option<u32>,
    },
    SetTitle {
        window: NativeWindow,
        title: String,
    },
    GetGeometry {
        window: NativeWindow,
    },
    CreatePixmap {
        pixmap: NativePixmap,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    },
    PutBitmap {
        pixmap: NativePixmap,
        data: Vec<u8>,
    },
    FreePixmap {
        pixmap: NativePixmap,
    },
    OpenFont {
        font: NativeFont,
        name: String,
    },
    CloseFont {
        font: NativeFont,
    },
    CreateGc {
        gc: NativeGc,
        drawable: NativeDrawable,
    },
    FreeGc {
        gc: NativeGc,
    },
    ChangeGc {
        gc: NativeGc,
        values: Box<NativeGcValues>,
        mask: GcValuesMask,
    },
    SetClipRectangles {
        gc: NativeGc,
        origin: Point,
        rects: Option<Vec<Rectangle>>,
    },
    SetDashes {
        gc: NativeGc,
        offset: i32,
        dashes: Vec<u8>,
    },
    Draw {
        drawable: NativeDrawable,
        gc: NativeGc,
        op: DrawOp,
    },
    CopyArea {
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    },
    CreateColormap {
        colormap: NativeColormap,
        visual: u32,
        private: bool,
    },
    FreeColormap {
        colormap: NativeColormap,
    },
    AllocColor {
        colormap: NativeColormap,
        color: Color,
    },
    AllocColorCells {
        colormap: NativeColormap,
        count: usize,
    },
    FreeColors {
        colormap: NativeColormap,
        pixels: Vec<u32>,
    },
    StoreColors {
        colormap: NativeColormap,
        colors: Vec<Color>,
    },
    QueryColors {
        colormap: NativeColormap,
        pixels: Vec<u32>,
    },
    InternAtom {
        name: String,
        only_if_exists: bool,
    },
    GetAtomName {
        atom: Atom,
    },
    Bell,
    /// A round trip.
    Sync,
}

/// What the server knows about one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub parent: Option<NativeWindow>,
    /// Bottom-most first.
    pub children: Vec<NativeWindow>,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub class: WindowClass,
    pub mapped: bool,
    pub event_mask: EventMask,
    pub bit_gravity_static: bool,
    pub win_gravity_static: bool,
    pub background: Option<u32>,
    pub override_redirect: bool,
    pub title: Option<String>,
    pub wmclass: Option<(String, String)>,
}

impl WindowState {
    pub fn rect(&self) -> Rectangle {
        Rectangle::new(
            self.x as i32,
            self.y as i32,
            self.width as i32,
            self.height as i32,
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct PixmapState {
    width: i32,
    height: i32,
}

#[derive(Debug, Clone, Copy)]
struct GcState {
    graphics_exposures: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    color: Color,
    /// Read-only users of the cell.
    refs: u32,
    /// Allocated for writing by one client.
    writeable: bool,
}

impl Cell {
    fn is_free(&self) -> bool {
        self.refs == 0 && !self.writeable
    }
}

#[derive(Debug, Clone)]
struct ColormapState {
    visual: Visual,
    /// Every cell belongs to the one client that created the colormap.
    private: bool,
    cells: Vec<Cell>,
    /// How many cells may be allocated at once.
    capacity: usize,
}

impl ColormapState {
    fn new(visual: &Visual, private: bool, capacity: Option<usize>) -> ColormapState {
        let size = if visual.has_palette() {
            visual.colormap_size
        } else {
            0
        };
        let cells = (0..size as u32)
            .map(|pixel| Cell {
                color: static_cell(visual, pixel),
                refs: 0,
                writeable: private,
            })
            .collect();
        ColormapState {
            visual: visual.clone(),
            private,
            cells,
            capacity: capacity.unwrap_or(size).min(size),
        }
    }

    fn allocated(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_free()).count()
    }

    fn query(&self, pixel: u32) -> Color {
        if self.visual.has_palette() {
            return self
                .cells
                .get(pixel as usize)
                .map(|c| Color { pixel, ..c.color })
                .unwrap_or(Color {
                    pixel,
                    ..Color::BLACK
                });
        }
        let channel = |mask: u32| -> u16 {
            if mask == 0 {
                return 0;
            }
            let shift = mask.trailing_zeros();
            let max = mask >> shift;
            (((pixel & mask) >> shift) as u64 * 65535 / max as u64) as u16
        };
        Color {
            pixel,
            red: channel(self.visual.red_mask),
            green: channel(self.visual.green_mask),
            blue: channel(self.visual.blue_mask),
        }
    }
}

/// The fixed content of a palette cell before anyone stores to it.
///
/// Static color visuals get an RGB cube, split like 3-3-2 at depth 8, and
/// static gray visuals a ramp. Cells of dynamic visuals start out black.
fn static_cell(visual: &Visual, pixel: u32) -> Color {
    let scale = |value: u32, max: u32| -> u16 {
        if max == 0 {
            0
        } else {
            (value as u64 * 65535 / max as u64) as u16
        }
    };
    match visual.class {
        VisualClass::StaticColor => {
            let bits = (visual.depth as u32).min(16);
            let blue_bits = bits / 3;
            let green_bits = (bits - blue_bits + 1) / 2;
            let red_bits = bits - blue_bits - green_bits;
            let field = |shift: u32, bits: u32| (pixel >> shift) & ((1 << bits) - 1);
            Color {
                pixel,
                red: scale(field(green_bits + blue_bits, red_bits), (1 << red_bits) - 1),
                green: scale(field(blue_bits, green_bits), (1 << green_bits) - 1),
                blue: scale(field(0, blue_bits), (1 << blue_bits) - 1),
            }
        }
        VisualClass::StaticGray => {
            let v = scale(pixel, visual.colormap_size.max(2) as u32 - 1);
            Color {
                pixel,
                red: v,
                green: v,
                blue: v,
            }
        }
        _ => Color {
            pixel,
            ..Color::BLACK
        },
    }
}

pub(super) struct Server {
    config: HeadlessConfig,
    next_serial: u64,
    next_resource: u64,
    requests: Vec<(Serial, Request)>,
    events: VecDeque<NativeEvent>,
    windows: BTreeMap<NativeWindow, WindowState>,
    pixmaps: HashMap<NativePixmap, PixmapState>,
    gcs: HashMap<NativeGc, GcState>,
    fonts: HashMap<NativeFont, String>,
    colormaps: HashMap<NativeColormap, ColormapState>,
    atoms: Vec<String>,
    closed: bool,
}

impl Server {
    pub fn new(config: HeadlessConfig) -> Server {
        let mut windows = BTreeMap::new();
        windows.insert(
            ROOT,
            WindowState {
                parent: None,
                children: Vec::new(),
                x: 0,
                y: 0,
                width: clamp_u16(config.screen_width),
                height: clamp_u16(config.screen_height),
                class: WindowClass::InputOutput,
                mapped: true,
                event_mask: EventMask::empty(),
                bit_gravity_static: false,
                win_gravity_static: false,
                background: None,
                override_redirect: false,
                title: None,
                wmclass: None,
            },
        );
        let mut colormaps = HashMap::new();
        colormaps.insert(
            SYSTEM_COLORMAP,
            ColormapState::new(&config.visual, false, config.shared_cell_capacity),
        );
        Server {
            config,
            next_serial: 1,
            next_resource: RESOURCE_BASE,
            requests: Vec::new(),
            events: VecDeque::new(),
            windows,
            pixmaps: HashMap::new(),
            gcs: HashMap::new(),
            fonts: HashMap::new(),
            colormaps,
            atoms: PREDEFINED_ATOMS.iter().map(|a| a.to_string()).collect(),
            closed: false,
        }
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    pub fn next_serial(&self) -> Serial {
        Serial(self.next_serial)
    }

    /// The serial of the last request the server processed.
    pub fn last_serial(&self) -> Serial {
        Serial(self.next_serial.wrapping_sub(1))
    }

    pub fn requests(&self) -> &[(Serial, Request)] {
        &self.requests
    }

    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    pub fn push_event(&mut self, event: NativeEvent) {
        self.events.push_back(event);
    }

    pub fn pop_event(&mut self) -> Option<NativeEvent> {
        self.events.pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn window(&self, window: NativeWindow) -> Option<&WindowState> {
        self.windows.get(&window)
    }

    /// Mapped, and so are all its ancestors.
    pub fn is_viewable(&self, window: NativeWindow) -> bool {
        let mut current = Some(window);
        while let Some(w) = current {
            match self.windows.get(&w) {
                Some(state) if state.mapped => current = state.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.config.devices.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.events.clear();
    }

    fn record(&mut self, request: Request) -> Serial {
        let serial = Serial(self.next_serial);
        self.next_serial = self.next_serial.wrapping_add(1);
        self.requests.push((serial, request));
        serial
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_resource += 1;
        self.next_resource
    }

    /// Reports an error for a request that gets no reply.
    fn refuse(&mut self, serial: Serial, code: u8, request_code: u8, resource: u64) {
        tracing::debug!(
            "headless: request {} on {:#x} failed with error {}",
            request_code,
            resource,
            code
        );
        self.events.push_back(NativeEvent::Error(ProtocolError {
            serial,
            code,
            request_code,
            resource,
        }));
    }

    fn deliver(&mut self, window: NativeWindow, serial: Serial, kind: NativeEventKind) {
        self.events.push_back(NativeEvent::Window {
            window,
            serial,
            kind,
        });
    }

    /// Delivers a structure event if the window selected them.
    fn notify_structure(&mut self, window: NativeWindow, serial: Serial, kind: NativeEventKind) {
        let selected = self
            .windows
            .get(&window)
            .map_or(false, |w| w.event_mask.contains(EventMask::STRUCTURE));
        if selected {
            self.deliver(window, serial, kind);
        }
    }

    fn check_window(&mut self, serial: Serial, window: NativeWindow, request_code: u8) -> bool {
        if self.windows.contains_key(&window) {
            true
        } else {
            self.refuse(serial, error_code::BAD_WINDOW, request_code, window.0);
            false
        }
    }

    fn drawable_exists(&self, drawable: NativeDrawable) -> bool {
        match drawable {
            NativeDrawable::Window(w) => self.windows.contains_key(&w),
            NativeDrawable::Pixmap(p) => self.pixmaps.contains_key(&p),
        }
    }

    fn drawable_size(&self, drawable: NativeDrawable) -> Option<(i32, i32)> {
        match drawable {
            NativeDrawable::Window(w) => self
                .windows
                .get(&w)
                .map(|s| (s.width as i32, s.height as i32)),
            NativeDrawable::Pixmap(p) => self.pixmaps.get(&p).map(|s| (s.width, s.height)),
        }
    }

    fn is_ancestor(&self, ancestor: NativeWindow, mut window: NativeWindow) -> bool {
        loop {
            if window == ancestor {
                return true;
            }
            match self.windows.get(&window).and_then(|w| w.parent) {
                Some(parent) => window = parent,
                None => return false,
            }
        }
    }

    pub fn create_window(
        &mut self,
        parent: NativeWindow,
        attrs: &NativeWindowAttributes,
    ) -> Result<NativeWindow, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let window = NativeWindow(self.alloc_id());
        let rect = Rectangle::new(attrs.x, attrs.y, attrs.width, attrs.height);
        self.record(Request::CreateWindow {
            window,
            parent,
            rect,
            class: attrs.class,
            event_mask: attrs.event_mask,
        });
        let Some(parent_state) = self.windows.get_mut(&parent) else {
            return Err(Error::Refused {
                code: error_code::BAD_WINDOW,
                request_code: opcode::CREATE_WINDOW,
                resource: parent.0,
            });
        };
        if attrs.width <= 0 || attrs.height <= 0 {
            return Err(Error::Refused {
                code: error_code::BAD_VALUE,
                request_code: opcode::CREATE_WINDOW,
                resource: parent.0,
            });
        }
        parent_state.children.push(window);
        self.windows.insert(
            window,
            WindowState {
                parent: Some(parent),
                children: Vec::new(),
                x: wrap_i16(attrs.x),
                y: wrap_i16(attrs.y),
                width: clamp_u16(attrs.width),
                height: clamp_u16(attrs.height),
                class: attrs.class,
                mapped: false,
                event_mask: attrs.event_mask,
                bit_gravity_static: false,
                win_gravity_static: false,
                background: attrs.background,
                override_redirect: attrs.override_redirect,
                title: attrs.title.clone(),
                wmclass: attrs.wmclass.clone(),
            },
        );
        Ok(window)
    }

    pub fn destroy_window(&mut self, window: NativeWindow) {
        let serial = self.record(Request::DestroyWindow { window });
        if window == ROOT {
            return;
        }
        let (mapped, parent) = match self.windows.get(&window) {
            Some(state) => (state.mapped, state.parent),
            None => {
                self.refuse(serial, error_code::BAD_WINDOW, opcode::DESTROY_WINDOW, window.0);
                return;
            }
        };
        if mapped {
            self.notify_structure(window, serial, NativeEventKind::Unmap);
        }
        if let Some(parent) = parent.and_then(|p| self.windows.get_mut(&p)) {
            parent.children.retain(|c| *c != window);
        }

        // Children are destroyed before their parents.
        let mut doomed = Vec::new();
        let mut stack = vec![(window, false)];
        while let Some((w, expanded)) = stack.pop() {
            if expanded {
                doomed.push(w);
                continue;
            }
            stack.push((w, true));
            if let Some(state) = self.windows.get(&w) {
                stack.extend(state.children.iter().map(|c| (*c, false)));
            }
        }
        for w in doomed {
            if let Some(state) = self.windows.remove(&w) {
                if state.event_mask.contains(EventMask::STRUCTURE) {
                    self.deliver(w, serial, NativeEventKind::Destroy);
                }
            }
        }
    }

    pub fn reparent_window(&mut self, window: NativeWindow, parent: NativeWindow, x: i32, y: i32) {
        let serial = self.record(Request::ReparentWindow {
            window,
            parent,
            x,
            y,
        });
        if !self.check_window(serial, window, opcode::REPARENT_WINDOW)
            || !self.check_window(serial, parent, opcode::REPARENT_WINDOW)
        {
            return;
        }
        if window == ROOT || self.is_ancestor(window, parent) {
            self.refuse(serial, error_code::BAD_MATCH, opcode::REPARENT_WINDOW, window.0);
            return;
        }
        let old_parent = self.windows.get(&window).and_then(|w| w.parent);
        if let Some(old) = old_parent.and_then(|p| self.windows.get_mut(&p)) {
            old.children.retain(|c| *c != window);
        }
        if let Some(new) = self.windows.get_mut(&parent) {
            new.children.push(window);
        }
        if let Some(state) = self.windows.get_mut(&window) {
            state.parent = Some(parent);
            state.x = wrap_i16(x);
            state.y = wrap_i16(y);
        }
    }

    pub fn map_window(&mut self, window: NativeWindow) {
        let serial = self.record(Request::MapWindow { window });
        if !self.check_window(serial, window, opcode::MAP_WINDOW) {
            return;
        }
        if let Some(state) = self.windows.get_mut(&window) {
            if state.mapped {
                return;
            }
            state.mapped = true;
        }
        self.notify_structure(window, serial, NativeEventKind::Map);
    }

    pub fn unmap_window(&mut self, window: NativeWindow) {
        let serial = self.record(Request::UnmapWindow { window });
        if !self.check_window(serial, window, opcode::UNMAP_WINDOW) {
            return;
        }
        if let Some(state) = self.windows.get_mut(&window) {
            if !state.mapped || window == ROOT {
                return;
            }
            state.mapped = false;
        }
        self.notify_structure(window, serial, NativeEventKind::Unmap);
    }

    pub fn configure_window(
        &mut self,
        window: NativeWindow,
        x: Option<i32>,
        y: Option<i32>,
        width: Option<i32>,
        height: Option<i32>,
    ) {
        let serial = self.record(Request::ConfigureWindow {
            window,
            x,
            y,
            width,
            height,
        });
        if width.map_or(false, |w| w <= 0) || height.map_or(false, |h| h <= 0) {
            self.refuse(serial, error_code::BAD_VALUE, opcode::CONFIGURE_WINDOW, window.0);
            return;
        }
        let Some(state) = self.windows.get_mut(&window) else {
            self.refuse(serial, error_code::BAD_WINDOW, opcode::CONFIGURE_WINDOW, window.0);
            return;
        };
        let old = (state.x, state.y, state.width, state.height);
        state.x = x.map_or(state.x, wrap_i16);
        state.y = y.map_or(state.y, wrap_i16);
        state.width = width.map_or(state.width, clamp_u16);
        state.height = height.map_or(state.height, clamp_u16);
        let new = (state.x, state.y, state.width, state.height);
        if new == old {
            return;
        }
        let notify = state.event_mask.contains(EventMask::STRUCTURE);
        let resized = (new.2, new.3) != (old.2, old.3);
        let children = if resized {
            state.children.clone()
        } else {
            Vec::new()
        };

        // On a resize, children with static window gravity keep their
        // position on the screen.
        let dx = new.0.wrapping_sub(old.0);
        let dy = new.1.wrapping_sub(old.1);
        for child in children {
            if let Some(child) = self.windows.get_mut(&child) {
                if child.win_gravity_static {
                    child.x = child.x.wrapping_sub(dx);
                    child.y = child.y.wrapping_sub(dy);
                }
            }
        }
        if notify {
            self.deliver(
                window,
                serial,
                NativeEventKind::Configure {
                    x: new.0 as i32,
                    y: new.1 as i32,
                    width: new.2 as i32,
                    height: new.3 as i32,
                },
            );
        }
    }

    pub fn restack_window(&mut self, window: NativeWindow, raise: bool) {
        let serial = self.record(Request::RestackWindow { window, raise });
        let Some(parent) = self.windows.get(&window).map(|w| w.parent) else {
            self.refuse(serial, error_code::BAD_WINDOW, opcode::CONFIGURE_WINDOW, window.0);
            return;
        };
        if let Some(parent) = parent.and_then(|p| self.windows.get_mut(&p)) {
            parent.children.retain(|c| *c != window);
            if raise {
                parent.children.push(window);
            } else {
                parent.children.insert(0, window);
            }
        }
    }

    fn change_window(
        &mut self,
        request: Request,
        window: NativeWindow,
        request_code: u8,
        f: impl FnOnce(&mut WindowState),
    ) {
        let serial = self.record(request);
        match self.windows.get_mut(&window) {
            Some(state) => f(state),
            None => self.refuse(serial, error_code::BAD_WINDOW, request_code, window.0),
        }
    }

    pub fn set_event_mask(&mut self, window: NativeWindow, mask: EventMask) {
        self.change_window(
            Request::SetEventMask { window, mask },
            window,
            opcode::CHANGE_WINDOW_ATTRIBUTES,
            |w| w.event_mask = mask,
        );
    }

    pub fn set_bit_gravity_static(&mut self, window: NativeWindow, on: bool) -> bool {
        if !self.config.static_gravity {
            return false;
        }
        self.change_window(
            Request::SetBitGravity {
                window,
                static_gravity: on,
            },
            window,
            opcode::CHANGE_WINDOW_ATTRIBUTES,
            |w| w.bit_gravity_static = on,
        );
        true
    }

    pub fn set_win_gravity_static(&mut self, window: NativeWindow, on: bool) -> bool {
        if !self.config.static_gravity {
            return false;
        }
        self.change_window(
            Request::SetWinGravity {
                window,
                static_gravity: on,
            },
            window,
            opcode::CHANGE_WINDOW_ATTRIBUTES,
            |w| w.win_gravity_static = on,
        );
        true
    }

    pub fn set_background(&mut self, window: NativeWindow, pixel: Option<u32>) {
        self.change_window(
            Request::SetBackground { window, pixel },
            window,
            opcode::CHANGE_WINDOW_ATTRIBUTES,
            |w| w.background = pixel,
        );
    }

    pub fn set_title(&mut self, window: NativeWindow, title: &str) {
        self.change_window(
            Request::SetTitle {
                window,
                title: title.to_owned(),
            },
            window,
            opcode::CHANGE_PROPERTY,
            |w| w.title = Some(title.to_owned()),
        );
    }

    pub fn window_geometry(&mut self, window: NativeWindow) -> Option<Rectangle> {
        self.record(Request::GetGeometry { window });
        self.windows.get(&window).map(WindowState::rect)
    }

    pub fn create_pixmap(
        &mut self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        depth: u8,
    ) -> Result<NativePixmap, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let pixmap = NativePixmap(self.alloc_id());
        self.record(Request::CreatePixmap {
            pixmap,
            drawable,
            width,
            height,
            depth,
        });
        let refused = |code| Error::Refused {
            code,
            request_code: opcode::CREATE_PIXMAP,
            resource: drawable.id(),
        };
        if !self.drawable_exists(drawable) {
            return Err(refused(error_code::BAD_DRAWABLE));
        }
        if width <= 0 || height <= 0 || width > u16::MAX as i32 || height > u16::MAX as i32 || depth == 0 {
            return Err(refused(error_code::BAD_VALUE));
        }
        self.pixmaps.insert(pixmap, PixmapState { width, height });
        Ok(pixmap)
    }

    pub fn create_bitmap_from_data(
        &mut self,
        drawable: NativeDrawable,
        width: i32,
        height: i32,
        data: &[u8],
    ) -> Result<NativePixmap, Error> {
        let stride = (width.max(0) as usize + 7) / 8;
        if data.len() < stride * height.max(0) as usize {
            return Err(Error::Refused {
                code: error_code::BAD_VALUE,
                request_code: opcode::PUT_IMAGE,
                resource: drawable.id(),
            });
        }
        let pixmap = self.create_pixmap(drawable, width, height, 1)?;
        self.record(Request::PutBitmap {
            pixmap,
            data: data.to_vec(),
        });
        Ok(pixmap)
    }

    pub fn free_pixmap(&mut self, pixmap: NativePixmap) {
        let serial = self.record(Request::FreePixmap { pixmap });
        if self.pixmaps.remove(&pixmap).is_none() {
            self.refuse(serial, error_code::BAD_PIXMAP, opcode::FREE_PIXMAP, pixmap.0);
        }
    }

    pub fn load_font(&mut self, name: &str) -> Result<(NativeFont, FontMetrics), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let font = NativeFont(self.alloc_id());
        self.record(Request::OpenFont {
            font,
            name: name.to_owned(),
        });
        if name.trim().is_empty() {
            return Err(Error::Refused {
                code: error_code::BAD_NAME,
                request_code: opcode::OPEN_FONT,
                resource: font.0,
            });
        }
        self.fonts.insert(font, name.to_owned());
        // Every font looks like "fixed".
        Ok((
            font,
            FontMetrics {
                ascent: 11,
                descent: 2,
            },
        ))
    }

    pub fn free_font(&mut self, font: NativeFont) {
        let serial = self.record(Request::CloseFont { font });
        if self.fonts.remove(&font).is_none() {
            self.refuse(serial, error_code::BAD_FONT, opcode::CLOSE_FONT, font.0);
        }
    }

    pub fn create_gc(&mut self, drawable: NativeDrawable) -> Result<NativeGc, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let gc = NativeGc(self.alloc_id());
        self.record(Request::CreateGc { gc, drawable });
        if !self.drawable_exists(drawable) {
            return Err(Error::Refused {
                code: error_code::BAD_DRAWABLE,
                request_code: opcode::CREATE_GC,
                resource: drawable.id(),
            });
        }
        self.gcs.insert(
            gc,
            GcState {
                graphics_exposures: true,
            },
        );
        Ok(gc)
    }

    pub fn free_gc(&mut self, gc: NativeGc) {
        let serial = self.record(Request::FreeGc { gc });
        if self.gcs.remove(&gc).is_none() {
            self.refuse(serial, error_code::BAD_GC, opcode::FREE_GC, gc.0);
        }
    }

    pub fn change_gc(&mut self, gc: NativeGc, values: &NativeGcValues, mask: GcValuesMask) {
        let serial = self.record(Request::ChangeGc {
            gc,
            values: Box::new(values.clone()),
            mask,
        });
        if !self.gcs.contains_key(&gc) {
            self.refuse(serial, error_code::BAD_GC, opcode::CHANGE_GC, gc.0);
            return;
        }
        if mask.contains(GcValuesMask::FONT) {
            if let Some(font) = values.font.filter(|f| !self.fonts.contains_key(f)) {
                self.refuse(serial, error_code::BAD_FONT, opcode::CHANGE_GC, font.0);
                return;
            }
        }
        let pixmaps = [
            (GcValuesMask::TILE, values.tile),
            (GcValuesMask::STIPPLE, values.stipple),
            (GcValuesMask::CLIP_MASK, values.clip_mask),
        ];
        for (flag, pixmap) in pixmaps {
            if let Some(pixmap) = pixmap {
                if mask.contains(flag) && !self.pixmaps.contains_key(&pixmap) {
                    self.refuse(serial, error_code::BAD_PIXMAP, opcode::CHANGE_GC, pixmap.0);
                    return;
                }
            }
        }
        if mask.contains(GcValuesMask::EXPOSURES) {
            if let Some(state) = self.gcs.get_mut(&gc) {
                state.graphics_exposures = values.graphics_exposures;
            }
        }
    }

    pub fn set_clip_rectangles(&mut self, gc: NativeGc, origin: Point, rects: Option<&[Rectangle]>) {
        let serial = self.record(Request::SetClipRectangles {
            gc,
            origin,
            rects: rects.map(<[Rectangle]>::to_vec),
        });
        if !self.gcs.contains_key(&gc) {
            self.refuse(serial, error_code::BAD_GC, opcode::SET_CLIP_RECTANGLES, gc.0);
        }
    }

    pub fn set_dashes(&mut self, gc: NativeGc, offset: i32, dashes: &[u8]) {
        let serial = self.record(Request::SetDashes {
            gc,
            offset,
            dashes: dashes.to_vec(),
        });
        if !self.gcs.contains_key(&gc) {
            self.refuse(serial, error_code::BAD_GC, opcode::SET_DASHES, gc.0);
        } else if dashes.is_empty() || dashes.contains(&0) {
            self.refuse(serial, error_code::BAD_VALUE, opcode::SET_DASHES, gc.0);
        }
    }

    fn check_target(&mut self, serial: Serial, drawable: NativeDrawable, gc: NativeGc, request_code: u8) -> bool {
        if !self.drawable_exists(drawable) {
            self.refuse(serial, error_code::BAD_DRAWABLE, request_code, drawable.id());
            false
        } else if !self.gcs.contains_key(&gc) {
            self.refuse(serial, error_code::BAD_GC, request_code, gc.0);
            false
        } else {
            true
        }
    }

    pub fn draw(&mut self, drawable: NativeDrawable, gc: NativeGc, op: &DrawOp) {
        let serial = self.record(Request::Draw {
            drawable,
            gc,
            op: op.clone(),
        });
        self.check_target(serial, drawable, gc, opcode::POLY_FILL_RECTANGLE);
    }

    /// Copies an area. Parts of the source that are outside it, or that
    /// belong to a window that is not viewable, come back as
    /// `GraphicsExpose` events on the destination when the GC asks for them.
    pub fn copy_area(
        &mut self,
        src: NativeDrawable,
        dst: NativeDrawable,
        gc: NativeGc,
        src_rect: Rectangle,
        dst_origin: Point,
    ) {
        let serial = self.record(Request::CopyArea {
            src,
            dst,
            gc,
            src_rect,
            dst_origin,
        });
        if !self.check_target(serial, src, gc, opcode::COPY_AREA)
            || !self.check_target(serial, dst, gc, opcode::COPY_AREA)
        {
            return;
        }
        let exposures = self.gcs.get(&gc).map_or(false, |g| g.graphics_exposures);
        let NativeDrawable::Window(dst_window) = dst else {
            return;
        };
        if !exposures {
            return;
        }

        let available = match src {
            NativeDrawable::Window(w) if !self.is_viewable(w) => Rectangle::default(),
            _ => {
                let (width, height) = self.drawable_size(src).unwrap_or((0, 0));
                Rectangle::new(0, 0, width, height)
            }
        };
        let mut lost = Region::from_rect(src_rect);
        lost.subtract_rect(available);
        lost.offset(dst_origin.x - src_rect.x, dst_origin.y - src_rect.y);

        let rects = lost.rects().to_vec();
        if rects.is_empty() {
            self.deliver(dst_window, serial, NativeEventKind::NoExpose);
            return;
        }
        let last = rects.len() as u32 - 1;
        for (i, area) in rects.into_iter().enumerate() {
            self.deliver(
                dst_window,
                serial,
                NativeEventKind::GraphicsExpose {
                    area,
                    count: last - i as u32,
                },
            );
        }
    }

    pub fn create_colormap(&mut self, visual: &Visual, private: bool) -> Result<NativeColormap, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let colormap = NativeColormap(self.alloc_id());
        self.record(Request::CreateColormap {
            colormap,
            visual: visual.id,
            private,
        });
        if private && !visual.has_palette() && visual.class != VisualClass::DirectColor {
            return Err(Error::Refused {
                code: error_code::BAD_MATCH,
                request_code: opcode::CREATE_COLORMAP,
                resource: visual.id as u64,
            });
        }
        self.colormaps
            .insert(colormap, ColormapState::new(visual, private, None));
        Ok(colormap)
    }

    pub fn free_colormap(&mut self, colormap: NativeColormap) {
        let serial = self.record(Request::FreeColormap { colormap });
        if colormap == SYSTEM_COLORMAP {
            return;
        }
        if self.colormaps.remove(&colormap).is_none() {
            self.refuse(serial, error_code::BAD_COLOR, opcode::FREE_COLORMAP, colormap.0);
        }
    }

    pub fn alloc_color(&mut self, colormap: NativeColormap, color: &Color) -> Option<Color> {
        self.record(Request::AllocColor {
            colormap,
            color: *color,
        });
        let state = self.colormaps.get_mut(&colormap)?;
        match state.visual.class {
            VisualClass::TrueColor | VisualClass::DirectColor => {
                let pixel = state.visual.pack_pixel(color.red, color.green, color.blue);
                Some(state.query(pixel))
            }
            VisualClass::StaticGray | VisualClass::StaticColor => state
                .cells
                .iter()
                .find(|c| c.color.same_rgb(color))
                .map(|c| c.color),
            VisualClass::PseudoColor | VisualClass::GrayScale => {
                if state.private {
                    return None;
                }
                if let Some(cell) = state
                    .cells
                    .iter_mut()
                    .find(|c| c.refs > 0 && !c.writeable && c.color.same_rgb(color))
                {
                    cell.refs += 1;
                    return Some(cell.color);
                }
                if state.allocated() >= state.capacity {
                    return None;
                }
                let (pixel, cell) = state
                    .cells
                    .iter_mut()
                    .enumerate()
                    .find(|(_, c)| c.is_free())?;
                cell.color = Color {
                    pixel: pixel as u32,
                    ..*color
                };
                cell.refs = 1;
                Some(cell.color)
            }
        }
    }

    pub fn alloc_color_cells(&mut self, colormap: NativeColormap, count: usize) -> Option<Vec<u32>> {
        self.record(Request::AllocColorCells { colormap, count });
        let state = self.colormaps.get_mut(&colormap)?;
        if state.private
            || !matches!(
                state.visual.class,
                VisualClass::PseudoColor | VisualClass::GrayScale
            )
            || state.allocated() + count > state.capacity
        {
            return None;
        }
        let pixels: Vec<u32> = state
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_free())
            .map(|(i, _)| i as u32)
            .take(count)
            .collect();
        if pixels.len() < count {
            return None;
        }
        for pixel in &pixels {
            state.cells[*pixel as usize].writeable = true;
        }
        Some(pixels)
    }

    pub fn free_colors(&mut self, colormap: NativeColormap, pixels: &[u32]) {
        let serial = self.record(Request::FreeColors {
            colormap,
            pixels: pixels.to_vec(),
        });
        let Some(state) = self.colormaps.get_mut(&colormap) else {
            self.refuse(serial, error_code::BAD_COLOR, opcode::FREE_COLORS, colormap.0);
            return;
        };
        if state.private {
            return;
        }
        for pixel in pixels {
            if let Some(cell) = state.cells.get_mut(*pixel as usize) {
                if cell.writeable {
                    cell.writeable = false;
                } else {
                    cell.refs = cell.refs.saturating_sub(1);
                }
            }
        }
    }

    pub fn store_colors(&mut self, colormap: NativeColormap, colors: &[Color]) {
        let serial = self.record(Request::StoreColors {
            colormap,
            colors: colors.to_vec(),
        });
        let Some(state) = self.colormaps.get_mut(&colormap) else {
            self.refuse(serial, error_code::BAD_COLOR, opcode::STORE_COLORS, colormap.0);
            return;
        };
        match state.visual.class {
            // Ramps are not modelled.
            VisualClass::DirectColor => {}
            VisualClass::PseudoColor | VisualClass::GrayScale => {
                let mut bad = None;
                for color in colors {
                    match state.cells.get_mut(color.pixel as usize) {
                        Some(cell) => cell.color = *color,
                        None => bad = bad.or(Some(color.pixel)),
                    }
                }
                if let Some(pixel) = bad {
                    self.refuse(serial, error_code::BAD_VALUE, opcode::STORE_COLORS, pixel as u64);
                }
            }
            _ => self.refuse(serial, error_code::BAD_MATCH, opcode::STORE_COLORS, colormap.0),
        }
    }

    pub fn query_colors(&mut self, colormap: NativeColormap, pixels: &[u32]) -> Vec<Color> {
        self.record(Request::QueryColors {
            colormap,
            pixels: pixels.to_vec(),
        });
        match self.colormaps.get(&colormap) {
            Some(state) => pixels.iter().map(|p| state.query(*p)).collect(),
            None => Vec::new(),
        }
    }

    pub fn intern_atom(&mut self, name: &str, only_if_exists: bool) -> Option<Atom> {
        self.record(Request::InternAtom {
            name: name.to_owned(),
            only_if_exists,
        });
        if let Some(index) = self.atoms.iter().position(|a| a == name) {
            return Some(Atom(index as u32 + 1));
        }
        if only_if_exists || name.is_empty() {
            return None;
        }
        self.atoms.push(name.to_owned());
        Some(Atom(self.atoms.len() as u32))
    }

    pub fn atom_name(&mut self, atom: Atom) -> Option<String> {
        self.record(Request::GetAtomName { atom });
        let index = (atom.0 as usize).checked_sub(1)?;
        self.atoms.get(index).cloned()
    }

    pub fn bell(&mut self) {
        self.record(Request::Bell);
    }

    pub fn sync(&mut self) {
        self.record(Request::Sync);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowType;

    fn attrs(x: i32, y: i32, width: i32, height: i32) -> NativeWindowAttributes {
        NativeWindowAttributes {
            x,
            y,
            width,
            height,
            class: WindowClass::InputOutput,
            window_type: WindowType::Child,
            depth: 24,
            colormap: None,
            background: None,
            event_mask: EventMask::STRUCTURE,
            override_redirect: false,
            title: None,
            wmclass: None,
        }
    }

    #[test]
    fn positions_wrap_and_sizes_clamp() {
        let mut server = Server::new(HeadlessConfig::default());
        let w = server.create_window(ROOT, &attrs(0, 0, 10, 10)).unwrap();
        server.configure_window(w, Some(40000), Some(-40000), Some(100000), None);
        let state = server.window(w).unwrap();
        assert_eq!((state.x, state.y), (40000i32 as i16, -40000i32 as i16));
        assert_eq!((state.width, state.height), (u16::MAX, 10));
        assert!(matches!(
            server.pop_event(),
            Some(NativeEvent::Window {
                kind: NativeEventKind::Configure { .. },
                ..
            })
        ));
    }

    #[test]
    fn static_gravity_children_stay_on_screen() {
        let mut server = Server::new(HeadlessConfig::default());
        let parent = server.create_window(ROOT, &attrs(0, 0, 100, 100)).unwrap();
        let pinned = server.create_window(parent, &attrs(10, 10, 5, 5)).unwrap();
        let loose = server.create_window(parent, &attrs(10, 10, 5, 5)).unwrap();
        assert!(server.set_win_gravity_static(pinned, true));

        server.configure_window(parent, Some(-20), Some(0), Some(120), Some(100));
        assert_eq!(server.window(pinned).map(|w| (w.x, w.y)), Some((30, 10)));
        assert_eq!(server.window(loose).map(|w| (w.x, w.y)), Some((10, 10)));

        // A plain move takes every child along.
        server.configure_window(parent, Some(0), Some(0), None, None);
        assert_eq!(server.window(pinned).map(|w| (w.x, w.y)), Some((30, 10)));
    }

    #[test]
    fn destroy_reports_children_first() {
        let mut server = Server::new(HeadlessConfig::default());
        let parent = server.create_window(ROOT, &attrs(0, 0, 100, 100)).unwrap();
        let child = server.create_window(parent, &attrs(0, 0, 10, 10)).unwrap();
        server.destroy_window(parent);
        let destroyed: Vec<NativeWindow> = std::iter::from_fn(|| server.pop_event())
            .filter_map(|e| match e {
                NativeEvent::Window {
                    window,
                    kind: NativeEventKind::Destroy,
                    ..
                } => Some(window),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, vec![child, parent]);
        assert!(server.window(child).is_none());
        assert!(server.window(ROOT).unwrap().children.is_empty());
    }

    #[test]
    fn unknown_resources_report_errors() {
        let mut server = Server::new(HeadlessConfig::default());
        server.map_window(NativeWindow(0xdead));
        let serial = server.last_serial();
        assert_eq!(
            server.pop_event(),
            Some(NativeEvent::Error(ProtocolError {
                serial,
                code: error_code::BAD_WINDOW,
                request_code: opcode::MAP_WINDOW,
                resource: 0xdead,
            }))
        );
        assert!(server.create_gc(NativeDrawable::Pixmap(NativePixmap(1))).is_err());
    }

    #[test]
    fn copies_from_outside_the_source_are_exposed() {
        let mut server = Server::new(HeadlessConfig::default());
        let w = server.create_window(ROOT, &attrs(0, 0, 100, 100)).unwrap();
        server.map_window(w);
        let gc = server.create_gc(NativeDrawable::Window(w)).unwrap();
        while server.pop_event().is_some() {}

        let target = NativeDrawable::Window(w);
        server.copy_area(target, target, gc, Rectangle::new(0, 20, 100, 80), Point::new(0, 0));
        assert_eq!(
            server.pop_event().map(|e| match e {
                NativeEvent::Window { kind, .. } => kind,
                _ => NativeEventKind::Other { code: 0 },
            }),
            Some(NativeEventKind::NoExpose)
        );

        server.copy_area(target, target, gc, Rectangle::new(0, -20, 100, 100), Point::new(0, 0));
        assert_eq!(
            server.pop_event().map(|e| match e {
                NativeEvent::Window { kind, .. } => kind,
                _ => NativeEventKind::Other { code: 0 },
            }),
            Some(NativeEventKind::GraphicsExpose {
                area: Rectangle::new(0, 0, 100, 20),
                count: 0
            })
        );
    }

    #[test]
    fn shared_cells_are_counted() {
        let mut server = Server::new(HeadlessConfig {
            visual: Visual::indexed(0x21, VisualClass::PseudoColor, 2),
            shared_cell_capacity: Some(2),
            ..HeadlessConfig::default()
        });
        let red = Color::rgb(0xffff, 0, 0);
        let a = server.alloc_color(SYSTEM_COLORMAP, &red).unwrap();
        let b = server.alloc_color(SYSTEM_COLORMAP, &red).unwrap();
        assert_eq!(a.pixel, b.pixel);
        assert!(server.alloc_color_cells(SYSTEM_COLORMAP, 2).is_none());
        let cells = server.alloc_color_cells(SYSTEM_COLORMAP, 1).unwrap();
        assert!(server
            .alloc_color(SYSTEM_COLORMAP, &Color::rgb(0, 0, 0xffff))
            .is_none());

        server.free_colors(SYSTEM_COLORMAP, &cells);
        assert!(server
            .alloc_color(SYSTEM_COLORMAP, &Color::rgb(0, 0, 0xffff))
            .is_some());
    }
}
