// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Windows: the arena that owns every window record, and the public window
//! operations.
//!
//! Windows are addressed by [`WindowId`], a generational index into the
//! display's arena. Parents own their children through the id lists; a
//! child refers back to its parent by id only. Destroying a window frees
//! its slot, so every later use of the old id is detected and ignored.

use bitflags::bitflags;

use crate::backend::{Backend, NativeWindow, NativeWindowAttributes};
use crate::colormap::{Color, Colormap};
use crate::display::Display;
use crate::error::Error;
use crate::event::{Event, Filter, FilterId};
use crate::geometry::{Point, Rectangle};
use crate::position::PositionInfo;
use crate::region::Region;

bitflags! {
    /// The events a window wants to receive.
    pub struct EventMask: u32 {
        const EXPOSURE = 1 << 1;
        const POINTER_MOTION = 1 << 2;
        const POINTER_MOTION_HINT = 1 << 3;
        const BUTTON_MOTION = 1 << 4;
        const BUTTON1_MOTION = 1 << 5;
        const BUTTON2_MOTION = 1 << 6;
        const BUTTON3_MOTION = 1 << 7;
        const BUTTON_PRESS = 1 << 8;
        const BUTTON_RELEASE = 1 << 9;
        const KEY_PRESS = 1 << 10;
        const KEY_RELEASE = 1 << 11;
        const ENTER_NOTIFY = 1 << 12;
        const LEAVE_NOTIFY = 1 << 13;
        const FOCUS_CHANGE = 1 << 14;
        const STRUCTURE = 1 << 15;
        const PROPERTY_CHANGE = 1 << 16;
        const VISIBILITY_NOTIFY = 1 << 17;
        const PROXIMITY_IN = 1 << 18;
        const PROXIMITY_OUT = 1 << 19;
        const SUBSTRUCTURE = 1 << 20;
        const SCROLL = 1 << 21;
        const ALL_EVENTS = 0x3f_fffe;
    }
}

/// Events the core always selects natively, whatever the window asked for.
pub(crate) const NATIVE_EVENTS: EventMask = EventMask::from_bits_truncate(
    EventMask::EXPOSURE.bits() | EventMask::STRUCTURE.bits(),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    Root,
    Toplevel,
    Child,
    Dialog,
    /// An override-redirect popup.
    Temp,
    /// A window created by another client.
    Foreign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowClass {
    InputOutput,
    InputOnly,
}

/// A handle to a window.
///
/// Ids are never reused: once the window is destroyed its id stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId {
    index: u32,
    generation: u32,
}

/// Parameters for [`Display::create_window`].
pub struct WindowAttributes<B: Backend> {
    pub window_type: WindowType,
    pub class: WindowClass,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub event_mask: EventMask,
    /// Defaults to the parent's colormap.
    pub colormap: Option<Colormap<B>>,
    /// Background pixel, or `None` for no background.
    pub background: Option<u32>,
    pub override_redirect: bool,
    pub title: Option<String>,
    pub wmclass: Option<(String, String)>,
}

impl<B: Backend> Default for WindowAttributes<B> {
    fn default() -> Self {
        WindowAttributes {
            window_type: WindowType::Child,
            class: WindowClass::InputOutput,
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            event_mask: EventMask::empty(),
            colormap: None,
            background: Some(0),
            override_redirect: false,
            title: None,
            wmclass: None,
        }
    }
}

/// Everything the core knows about one window.
pub(crate) struct WindowRecord<B: Backend> {
    pub native: NativeWindow,
    pub window_type: WindowType,
    pub parent: Option<WindowId>,
    /// Stacking order, topmost first.
    pub children: Vec<WindowId>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub depth: u8,
    pub colormap: Option<Colormap<B>>,
    pub event_mask: EventMask,
    /// Whether the toolkit considers the window shown.
    pub mapped: bool,
    pub input_only: bool,
    pub guffaw_gravity: bool,
    pub background: Option<u32>,
    pub position: PositionInfo,
    pub update_area: Option<Region>,
    pub filters: Vec<(FilterId, Filter)>,
    pub title: Option<String>,
    /// Native unmaps and maps issued by the big-window engine whose
    /// notifications are still to be swallowed.
    pub virtual_unmaps: u32,
    pub virtual_maps: u32,
}

impl<B: Backend> WindowRecord<B> {
    pub fn rect(&self) -> Rectangle {
        Rectangle::new(self.x, self.y, self.width, self.height)
    }
}

struct Slot<B: Backend> {
    generation: u32,
    record: Option<WindowRecord<B>>,
}

/// Generational arena of window records.
pub(crate) struct WindowTree<B: Backend> {
    slots: Vec<Slot<B>>,
    free: Vec<u32>,
}

impl<B: Backend> WindowTree<B> {
    pub fn new() -> Self {
        WindowTree {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, record: WindowRecord<B>) -> WindowId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            WindowId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            WindowId {
                index,
                generation: 0,
            }
        }
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowRecord<B>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord<B>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_mut()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.get(id).is_some()
    }

    /// Frees the slot. The generation bump invalidates every copy of `id`.
    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord<B>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(record)
    }
}

impl<B: Backend> Display<B> {
    /// Creates a window.
    ///
    /// `parent` defaults to the root window. Toplevels, dialogs and temp
    /// windows always live directly under the root window. Fails if the
    /// parent has been destroyed.
    pub fn create_window(
        &mut self,
        parent: Option<WindowId>,
        attrs: &WindowAttributes<B>,
    ) -> Result<WindowId, Error> {
        if self.closed {
            return Err(Error::DisplayClosed);
        }
        let parent = match attrs.window_type {
            WindowType::Child => parent.unwrap_or(self.root),
            WindowType::Toplevel | WindowType::Dialog | WindowType::Temp => self.root,
            WindowType::Root | WindowType::Foreign => {
                return Err(Error::InvalidInput(format!(
                    "cannot create a window of type {:?}",
                    attrs.window_type
                )));
            }
        };
        let Some(parent_record) = self.windows.get(parent) else {
            tracing::warn!("create_window: parent {:?} has been destroyed", parent);
            return Err(Error::WindowDestroyed);
        };
        let parent_native = parent_record.native;
        let parent_guffaw = parent_record.guffaw_gravity;
        let parent_colormap = parent_record.colormap.clone();

        let width = clamp_extent("width", attrs.width);
        let height = clamp_extent("height", attrs.height);
        let input_only = attrs.class == WindowClass::InputOnly;
        let (colormap, depth) = if input_only {
            (None, 0)
        } else {
            let colormap = attrs
                .colormap
                .clone()
                .or(parent_colormap)
                .unwrap_or_else(|| self.system_colormap.clone());
            let depth = colormap.visual().depth;
            (Some(colormap), depth)
        };
        let background = if input_only { None } else { attrs.background };

        let rect = Rectangle::new(attrs.x, attrs.y, width, height);
        let pp = self.parent_pos(Some(parent));
        let position = crate::position::compute_position(
            &self.backend.limits(),
            attrs.window_type == WindowType::Child,
            rect,
            &pp,
        );

        let native_attrs = NativeWindowAttributes {
            x: position.x,
            y: position.y,
            width: position.width,
            height: position.height,
            class: attrs.class,
            window_type: attrs.window_type,
            depth,
            colormap: colormap.as_ref().map(|c| c.native()),
            background,
            event_mask: attrs.event_mask | NATIVE_EVENTS,
            override_redirect: attrs.override_redirect || attrs.window_type == WindowType::Temp,
            title: attrs.title.clone(),
            wmclass: attrs
                .wmclass
                .clone()
                .or_else(|| Some((self.config.program_name(), self.config.program_class()))),
        };
        let native = self.backend.create_window(parent_native, &native_attrs)?;
        if parent_guffaw {
            self.backend.set_win_gravity_static(native, true);
        }

        let id = self.windows.insert(WindowRecord {
            native,
            window_type: attrs.window_type,
            parent: Some(parent),
            children: Vec::new(),
            x: attrs.x,
            y: attrs.y,
            width,
            height,
            depth,
            colormap,
            event_mask: attrs.event_mask,
            mapped: false,
            input_only,
            guffaw_gravity: false,
            background,
            position,
            update_area: None,
            filters: Vec::new(),
            title: attrs.title.clone(),
            virtual_unmaps: 0,
            virtual_maps: 0,
        });
        if let Some(parent) = self.windows.get_mut(parent) {
            parent.children.insert(0, id);
        }
        self.handles.insert(native, id);
        note!(
            self.config.debug_flags,
            MISC,
            "created {:?} window {:?} ({:?}) at {:?}",
            attrs.window_type,
            id,
            native,
            rect
        );
        self.sync_if_synchronous();
        Ok(id)
    }

    /// Wraps a window created by another client.
    pub fn foreign_new(&mut self, native: NativeWindow) -> Option<WindowId> {
        if let Some(id) = self.handles.get(&native) {
            return Some(*id);
        }
        let geometry = self.backend.window_geometry(native)?;
        let id = self.windows.insert(WindowRecord {
            native,
            window_type: WindowType::Foreign,
            parent: Some(self.root),
            children: Vec::new(),
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            depth: 0,
            colormap: None,
            event_mask: EventMask::empty(),
            mapped: true,
            input_only: false,
            guffaw_gravity: false,
            background: None,
            position: PositionInfo::unvirtualized(geometry),
            update_area: None,
            filters: Vec::new(),
            title: None,
            virtual_unmaps: 0,
            virtual_maps: 0,
        });
        if let Some(root) = self.windows.get_mut(self.root) {
            root.children.insert(0, id);
        }
        self.handles.insert(native, id);
        Some(id)
    }

    /// Destroys a window and all its descendants.
    ///
    /// Destroying an already destroyed window does nothing.
    pub fn destroy_window(&mut self, id: WindowId) {
        if id == self.root {
            tracing::warn!("the root window cannot be destroyed");
            return;
        }
        let Some(record) = self.windows.get(id) else {
            tracing::debug!("destroy_window: {:?} is already destroyed", id);
            return;
        };
        if record.window_type != WindowType::Foreign {
            self.backend.destroy_window(record.native);
        }
        self.forget_window(id);
    }

    /// Drops the records of `id` and its descendants without touching the
    /// native windows.
    pub(crate) fn forget_window(&mut self, id: WindowId) {
        if let Some(parent) = self.windows.get(id).and_then(|r| r.parent) {
            if let Some(parent) = self.windows.get_mut(parent) {
                parent.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            if let Some(record) = self.windows.get(id) {
                stack.extend(record.children.iter().copied());
                order.push(id);
            }
        }
        // Children go first, the way the server reports them.
        for id in order.into_iter().rev() {
            if let Some(record) = self.windows.remove(id) {
                self.handles.remove(&record.native);
                self.update_windows.retain(|w| *w != id);
                if record.event_mask.contains(EventMask::STRUCTURE) {
                    self.events.push(Event::Destroy { window: id });
                }
            }
        }
        let windows = &self.windows;
        self.translate_queue.forget(|w| !windows.contains(w));
    }

    /// Shows the window.
    pub fn show(&mut self, id: WindowId) {
        let Some(record) = self.windows.get_mut(id) else {
            tracing::warn!("show: {:?} has been destroyed", id);
            return;
        };
        if record.mapped {
            return;
        }
        record.mapped = true;
        if record.position.mapped {
            self.backend.map_window(record.native);
        }
    }

    /// Hides the window.
    pub fn hide(&mut self, id: WindowId) {
        let Some(record) = self.windows.get_mut(id) else {
            tracing::warn!("hide: {:?} has been destroyed", id);
            return;
        };
        if !record.mapped {
            return;
        }
        record.mapped = false;
        if record.position.mapped {
            self.backend.unmap_window(record.native);
        }
    }

    pub fn move_window(&mut self, id: WindowId, x: i32, y: i32) {
        let Some(rect) = self.windows.get(id).map(|r| r.rect()) else {
            tracing::warn!("move_window: {:?} has been destroyed", id);
            return;
        };
        self.move_resize(id, x, y, rect.width, rect.height);
    }

    pub fn resize(&mut self, id: WindowId, width: i32, height: i32) {
        let Some(rect) = self.windows.get(id).map(|r| r.rect()) else {
            tracing::warn!("resize: {:?} has been destroyed", id);
            return;
        };
        self.move_resize(id, rect.x, rect.y, width, height);
    }

    /// Moves and resizes a window in logical coordinates, which may lie far
    /// outside what the native system can represent.
    pub fn move_resize(&mut self, id: WindowId, x: i32, y: i32, width: i32, height: i32) {
        let width = clamp_extent("width", width);
        let height = clamp_extent("height", height);
        let Some(record) = self.windows.get(id) else {
            tracing::warn!("move_resize: {:?} has been destroyed", id);
            return;
        };
        match record.window_type {
            WindowType::Root => tracing::warn!("the root window cannot be moved"),
            WindowType::Child => self.move_resize_child(id, x, y, width, height),
            _ => {
                let native = record.native;
                if let Some(record) = self.windows.get_mut(id) {
                    record.x = x;
                    record.y = y;
                    record.width = width;
                    record.height = height;
                }
                self.init_position(id);
                if let Some(record) = self.windows.get(id) {
                    let pos = record.position;
                    self.backend.move_resize_window(
                        native,
                        Rectangle::new(pos.x, pos.y, pos.width, pos.height),
                    );
                }
            }
        }
        self.sync_if_synchronous();
    }

    /// Moves `id` under `new_parent` at `(x, y)`.
    pub fn reparent(&mut self, id: WindowId, new_parent: Option<WindowId>, x: i32, y: i32) {
        let new_parent = new_parent.unwrap_or(self.root);
        if id == self.root || !self.windows.contains(id) || !self.windows.contains(new_parent) {
            tracing::warn!("reparent: invalid window {:?} or parent {:?}", id, new_parent);
            return;
        }
        if self.is_ancestor(id, new_parent) {
            tracing::warn!("reparent: {:?} cannot become its own descendant", id);
            return;
        }
        let old_parent = self.windows.get(id).and_then(|r| r.parent);
        if let Some(old) = old_parent.and_then(|p| self.windows.get_mut(p)) {
            old.children.retain(|c| *c != id);
        }
        let parent_native = match self.windows.get_mut(new_parent) {
            Some(parent) => {
                parent.children.insert(0, id);
                parent.native
            }
            None => return,
        };
        let to_root = new_parent == self.root;
        let Some(record) = self.windows.get_mut(id) else {
            return;
        };
        record.parent = Some(new_parent);
        record.x = x;
        record.y = y;
        record.window_type = match record.window_type {
            WindowType::Toplevel | WindowType::Dialog | WindowType::Temp if !to_root => {
                WindowType::Child
            }
            WindowType::Child if to_root => WindowType::Toplevel,
            other => other,
        };
        let native = record.native;

        let pp = self.parent_pos(Some(new_parent));
        let Some(info) = self.compute_window_position(id, &pp) else {
            return;
        };
        // The server keeps the map state across a reparent.
        self.backend
            .reparent_window(native, parent_native, info.x, info.y);
        self.refresh_position(id);
    }

    /// Puts the window on top of its siblings.
    pub fn raise(&mut self, id: WindowId) {
        self.restack(id, true);
    }

    /// Puts the window below its siblings.
    pub fn lower(&mut self, id: WindowId) {
        self.restack(id, false);
    }

    fn restack(&mut self, id: WindowId, raise: bool) {
        let Some((native, parent)) = self.windows.get(id).map(|r| (r.native, r.parent)) else {
            tracing::warn!("restack: {:?} has been destroyed", id);
            return;
        };
        if let Some(parent) = parent.and_then(|p| self.windows.get_mut(p)) {
            parent.children.retain(|c| *c != id);
            if raise {
                parent.children.insert(0, id);
            } else {
                parent.children.push(id);
            }
        }
        self.backend.restack_window(native, raise);
    }

    /// Sets the background to an allocated color.
    pub fn set_background(&mut self, id: WindowId, color: &Color) {
        let Some(record) = self.windows.get_mut(id) else {
            tracing::warn!("set_background: {:?} has been destroyed", id);
            return;
        };
        if record.input_only {
            tracing::warn!("set_background: {:?} is input-only", id);
            return;
        }
        record.background = Some(color.pixel);
        if !record.position.no_bg {
            self.backend.set_background(record.native, Some(color.pixel));
        }
    }

    pub fn set_events(&mut self, id: WindowId, mask: EventMask) {
        let Some(record) = self.windows.get_mut(id) else {
            tracing::warn!("set_events: {:?} has been destroyed", id);
            return;
        };
        record.event_mask = mask;
        let native = record.native;
        let native_mask = if id == self.root {
            mask
        } else {
            mask | NATIVE_EVENTS
        };
        self.backend.set_event_mask(native, native_mask);
    }

    pub fn get_events(&self, id: WindowId) -> EventMask {
        self.windows
            .get(id)
            .map(|r| r.event_mask)
            .unwrap_or_else(EventMask::empty)
    }

    pub fn set_title(&mut self, id: WindowId, title: &str) {
        let Some(record) = self.windows.get_mut(id) else {
            tracing::warn!("set_title: {:?} has been destroyed", id);
            return;
        };
        record.title = Some(title.to_owned());
        self.backend.set_title(record.native, title);
    }

    pub fn title(&self, id: WindowId) -> Option<&str> {
        self.windows.get(id).and_then(|r| r.title.as_deref())
    }

    /// Position and size in the parent's logical coordinates.
    pub fn get_geometry(&self, id: WindowId) -> Option<Rectangle> {
        self.windows.get(id).map(|r| r.rect())
    }

    pub fn get_position(&self, id: WindowId) -> Option<(i32, i32)> {
        self.windows.get(id).map(|r| (r.x, r.y))
    }

    /// The window's origin relative to the root window.
    pub fn get_origin(&self, id: WindowId) -> Option<Point> {
        let mut record = self.windows.get(id)?;
        let mut origin = Point::new(0, 0);
        loop {
            if record.window_type == WindowType::Root {
                return Some(origin);
            }
            origin = origin.translate(record.x, record.y);
            match record.parent.and_then(|p| self.windows.get(p)) {
                Some(parent) => record = parent,
                None => return Some(origin),
            }
        }
    }

    /// Children in stacking order, topmost first.
    pub fn children(&self, id: WindowId) -> Vec<WindowId> {
        self.windows
            .get(id)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: WindowId) -> Option<WindowId> {
        self.windows.get(id)?.parent
    }

    /// The closest ancestor (or `id` itself) that is not a child window.
    pub fn toplevel(&self, id: WindowId) -> Option<WindowId> {
        let mut current = id;
        loop {
            let record = self.windows.get(current)?;
            if record.window_type != WindowType::Child {
                return Some(current);
            }
            current = record.parent?;
        }
    }

    pub fn window_type(&self, id: WindowId) -> Option<WindowType> {
        self.windows.get(id).map(|r| r.window_type)
    }

    pub fn native_window(&self, id: WindowId) -> Option<NativeWindow> {
        self.windows.get(id).map(|r| r.native)
    }

    pub fn is_destroyed(&self, id: WindowId) -> bool {
        !self.windows.contains(id)
    }

    /// Whether the window has been shown.
    pub fn is_visible(&self, id: WindowId) -> bool {
        self.windows.get(id).map(|r| r.mapped).unwrap_or(false)
    }

    /// Whether the window and all its ancestors are shown.
    pub fn is_viewable(&self, id: WindowId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(record) = self.windows.get(id) else {
                return false;
            };
            if record.window_type == WindowType::Root {
                return true;
            }
            if !record.mapped {
                return false;
            }
            current = record.parent;
        }
        false
    }

    /// The translation from native to logical coordinates.
    ///
    /// Input coordinates get these added; drawing subtracts them.
    pub fn get_offsets(&self, id: WindowId) -> (i32, i32) {
        self.windows
            .get(id)
            .map(|r| (r.position.x_offset, r.position.y_offset))
            .unwrap_or((0, 0))
    }

    /// The virtualization state of a window.
    pub fn position_info(&self, id: WindowId) -> Option<PositionInfo> {
        self.windows.get(id).map(|r| r.position)
    }

    /// Adds `rect` (the whole window if `None`) to the window's update area.
    pub fn invalidate_rect(&mut self, id: WindowId, rect: Option<Rectangle>, recurse: bool) {
        let Some(record) = self.windows.get(id) else {
            return;
        };
        let rect = rect.unwrap_or_else(|| Rectangle::new(0, 0, record.width, record.height));
        self.invalidate_region(id, &Region::from_rect(rect), recurse);
    }

    /// Adds `region` to the window's update area, and with `recurse` to the
    /// update areas of the mapped children it covers.
    pub fn invalidate_region(&mut self, id: WindowId, region: &Region, recurse: bool) {
        let Some(record) = self.windows.get(id) else {
            return;
        };
        if !record.mapped || record.input_only {
            return;
        }
        let visible = if record.window_type == WindowType::Child {
            record.position.clip_rect
        } else {
            Rectangle::new(0, 0, record.width, record.height)
        };
        let mut visible_region = region.clone();
        visible_region.intersect_with_rect(visible);

        if recurse {
            let children: Vec<(WindowId, Rectangle)> = record
                .children
                .iter()
                .filter_map(|c| {
                    let child = self.windows.get(*c)?;
                    (child.mapped && !child.input_only).then(|| (*c, child.rect()))
                })
                .collect();
            for (child, rect) in children {
                let mut child_region = visible_region.clone();
                child_region.intersect_with_rect(rect);
                if !child_region.is_empty() {
                    child_region.offset(-rect.x, -rect.y);
                    self.invalidate_region(child, &child_region, true);
                }
            }
        }

        if visible_region.is_empty() {
            return;
        }
        let Some(record) = self.windows.get_mut(id) else {
            return;
        };
        match &mut record.update_area {
            Some(area) => area.union_with(&visible_region),
            None => {
                record.update_area = Some(visible_region);
                self.update_windows.push(id);
            }
        }
    }

    /// Takes the pending update area, if any, without painting it.
    pub fn get_update_area(&mut self, id: WindowId) -> Option<Region> {
        let area = self.windows.get_mut(id)?.update_area.take();
        if area.is_some() {
            self.update_windows.retain(|w| *w != id);
        }
        area
    }

    /// Turns the window's update area into an [`Event::Expose`].
    ///
    /// Expose events are delivered whatever the window's event mask.
    pub fn process_updates(&mut self, id: WindowId, update_children: bool) {
        if self.update_windows.contains(&id) {
            self.update_windows.retain(|w| *w != id);
            self.process_updates_internal(id);
        }
        if update_children {
            for child in self.children(id) {
                self.process_updates(child, true);
            }
        }
    }

    /// Processes the update areas of every window, in invalidation order.
    pub fn process_all_updates(&mut self) {
        let windows = std::mem::take(&mut self.update_windows);
        for id in windows {
            self.process_updates_internal(id);
        }
    }

    fn process_updates_internal(&mut self, id: WindowId) {
        let Some(area) = self.windows.get_mut(id).and_then(|r| r.update_area.take()) else {
            return;
        };
        if area.is_empty() {
            return;
        }
        // Native exposes already queued for this area are stale once it is painted.
        self.queue_antiexpose(id, area.clone());
        self.events.push(Event::Expose {
            window: id,
            area: area.clipbox(),
            region: area,
            count: 0,
        });
    }

    fn is_ancestor(&self, ancestor: WindowId, mut id: WindowId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.windows.get(id).and_then(|r| r.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }
}

fn clamp_extent(what: &str, value: i32) -> i32 {
    if value < 1 {
        tracing::warn!("window {} {} is not positive, using 1", what, value);
        1
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::Headless;

    fn record(native: u64) -> WindowRecord<Headless> {
        WindowRecord {
            native: NativeWindow(native),
            window_type: WindowType::Child,
            parent: None,
            children: Vec::new(),
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            depth: 24,
            colormap: None,
            event_mask: EventMask::empty(),
            mapped: false,
            input_only: false,
            guffaw_gravity: false,
            background: None,
            position: PositionInfo::unvirtualized(Rectangle::new(0, 0, 1, 1)),
            update_area: None,
            filters: Vec::new(),
            title: None,
            virtual_unmaps: 0,
            virtual_maps: 0,
        }
    }

    #[test]
    fn stale_ids_are_rejected() {
        let mut tree = WindowTree::new();
        let a = tree.insert(record(1));
        assert!(tree.contains(a));
        assert!(tree.remove(a).is_some());
        assert!(!tree.contains(a));

        // The slot is reused under a new generation.
        let b = tree.insert(record(2));
        assert_ne!(a, b);
        assert!(tree.get(a).is_none());
        assert_eq!(tree.get(b).map(|r| r.native), Some(NativeWindow(2)));
        assert!(tree.remove(a).is_none());
        assert!(tree.contains(b));
    }

    #[test]
    fn event_mask_covers_all_events() {
        assert!(EventMask::ALL_EVENTS.contains(EventMask::SCROLL | EventMask::EXPOSURE));
        assert!(NATIVE_EVENTS.contains(EventMask::STRUCTURE));
    }
}
