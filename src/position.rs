// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Big-window emulation.
//!
//! Logical window geometry is unbounded, but native windows can only be
//! placed within a 16-bit coordinate space. Every window therefore carries a
//! [`PositionInfo`] describing where its native window actually sits, and the
//! offset between native and logical coordinates.
//!
//! When a geometry change shifts that offset, the native window is moved in
//! several steps with static gravity so that visible content and children
//! stay put while the offset changes under them. Exposes the server reports
//! for the state before such a move are corrected through the translation
//! queue before they reach the window's update area.

use std::collections::VecDeque;

use crate::backend::{Backend, CoordinateLimits, NativeDrawable, NativeEvent, NativeEventKind, NativeGc, Serial};
use crate::display::Display;
use crate::geometry::{Point, Rectangle};
use crate::region::Region;
use crate::window::{WindowId, WindowType};

/// Translation queue length at which old entries are evicted.
pub(crate) const MAX_QUEUE_LEN: usize = 64;

/// A clip rectangle that does not clip anything.
pub const UNCLIPPED: Rectangle = Rectangle::new(i32::MIN / 2, i32::MIN / 2, i32::MAX, i32::MAX);

/// Where a window's native window sits, and how native coordinates map to
/// logical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionInfo {
    /// Native position relative to the native parent.
    pub x: i32,
    pub y: i32,
    /// Native size, at most the backend's size limit.
    pub width: i32,
    pub height: i32,
    /// Logical coordinates are native coordinates plus these.
    pub x_offset: i32,
    pub y_offset: i32,
    /// The visible part of the window in its own logical coordinates.
    pub clip_rect: Rectangle,
    /// The logical size exceeds the native size limit.
    pub big: bool,
    /// The native window can be mapped without wrapping into view.
    pub mapped: bool,
    /// The background is suspended during a geometry change.
    pub no_bg: bool,
}

impl PositionInfo {
    /// Position info for a window whose native geometry is its logical one.
    pub fn unvirtualized(rect: Rectangle) -> PositionInfo {
        PositionInfo {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            x_offset: 0,
            y_offset: 0,
            clip_rect: Rectangle::new(0, 0, rect.width, rect.height),
            big: false,
            mapped: true,
            no_bg: false,
        }
    }

    pub fn native_rect(&self) -> Rectangle {
        Rectangle::new(self.x, self.y, self.width, self.height)
    }
}

/// Accumulated position of a window's ancestors, up to the first
/// non-child window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentPos {
    /// Logical origin of the parent relative to the toplevel.
    pub x: i32,
    pub y: i32,
    /// Native origin of the parent relative to the toplevel.
    pub native_x: i32,
    pub native_y: i32,
    /// The ancestors' visible area in the parent's logical coordinates.
    pub clip_rect: Rectangle,
}

impl ParentPos {
    /// The position of a toplevel's children.
    pub const ORIGIN: ParentPos = ParentPos {
        x: 0,
        y: 0,
        native_x: 0,
        native_y: 0,
        clip_rect: UNCLIPPED,
    };

    /// The position children of a window at logical `(x, y)` see.
    fn descend(&self, x: i32, y: i32, info: &PositionInfo) -> ParentPos {
        ParentPos {
            x: self.x.wrapping_add(x),
            y: self.y.wrapping_add(y),
            native_x: self.native_x.wrapping_add(info.x),
            native_y: self.native_y.wrapping_add(info.y),
            clip_rect: info.clip_rect,
        }
    }
}

/// Places one axis: returns the native position and size, and whether the
/// logical size had to be cut down.
fn compute_axis(
    limits: &CoordinateLimits,
    pos: i32,
    size: i32,
    parent: i32,
    parent_native: i32,
) -> (i32, i32, bool) {
    let logical = parent as i64 + pos as i64;
    let parent_native = parent_native as i64;
    if size <= limits.size_limit {
        return ((logical - parent_native) as i32, size, false);
    }
    let native_size = limits.size_limit as i64;
    let native = if logical < limits.low as i64 {
        if logical + (size as i64) < limits.high as i64 {
            // Keep the right edge where it belongs.
            logical + size as i64 - native_size - parent_native
        } else {
            limits.low as i64 - parent_native
        }
    } else {
        logical - parent_native
    };
    (native as i32, limits.size_limit, true)
}

/// Computes the native placement of a window with logical geometry `rect`
/// under a parent at `pp`.
pub fn compute_position(
    limits: &CoordinateLimits,
    is_child: bool,
    rect: Rectangle,
    pp: &ParentPos,
) -> PositionInfo {
    let (x, width, big_x) = compute_axis(limits, rect.x, rect.width, pp.x, pp.native_x);
    let (y, height, big_y) = compute_axis(limits, rect.y, rect.height, pp.y, pp.native_y);

    let parent_x_offset = pp.native_x.wrapping_sub(pp.x);
    let parent_y_offset = pp.native_y.wrapping_sub(pp.y);
    let x_offset = parent_x_offset.wrapping_add(x).wrapping_sub(rect.x);
    let y_offset = parent_y_offset.wrapping_add(y).wrapping_sub(rect.y);

    let mut mapped = true;
    if pp.clip_rect.width != i32::MAX {
        let clip = pp.clip_rect;
        let wrap = limits.wrap as i64;
        let left = x as i64 + parent_x_offset as i64;
        let top = y as i64 + parent_y_offset as i64;
        if left < clip.x as i64 + clip.width as i64 - wrap
            || left + width as i64 > clip.x as i64 + wrap
            || top < clip.y as i64 + clip.height as i64 - wrap
            || top + height as i64 > clip.y as i64 + wrap
        {
            mapped = false;
        }
    }

    let clip_rect = if is_child {
        let clip = rect.intersect_or_empty(&pp.clip_rect);
        if clip.is_empty() {
            Rectangle::default()
        } else {
            clip.translate(rect.x.saturating_neg(), rect.y.saturating_neg())
        }
    } else {
        Rectangle::new(0, 0, rect.width, rect.height)
    };

    PositionInfo {
        x,
        y,
        width,
        height,
        x_offset,
        y_offset,
        clip_rect,
        big: big_x || big_y,
        mapped,
        no_bg: false,
    }
}

/// The native frame covering both the old and the new visible range while
/// the offset changes by `(dx, dy)`.
pub(crate) fn intermediate_frame(old: &PositionInfo, new: &PositionInfo, dx: i32, dy: i32) -> Rectangle {
    let axis = |old_pos: i32, old_size: i32, new_size: i32, d: i32| {
        if d < 0 {
            (old_pos + d, old_pos + old_size)
        } else {
            (old_pos, old_pos + new_size + d)
        }
    };
    let (x0, x1) = axis(old.x, old.width, new.width, dx);
    let (y0, y1) = axis(old.y, old.height, new.height, dy);
    Rectangle::from_edges(x0, y0, x1, y1)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum QueueKind {
    /// Stale exposes inside `area` (everywhere if `None`) move by `(dx, dy)`.
    Translate {
        area: Option<Region>,
        dx: i32,
        dy: i32,
    },
    /// Stale exposes inside the area have already been painted.
    AntiExpose(Region),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueueItem {
    pub window: WindowId,
    /// Serial of the first request the item's state applies to.
    pub serial: Serial,
    pub kind: QueueKind,
}

/// Pending corrections for exposes the server may still deliver.
#[derive(Debug, Default)]
pub(crate) struct TranslateQueue {
    items: VecDeque<QueueItem>,
}

impl TranslateQueue {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn push(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    fn retain(&mut self, f: impl FnMut(&QueueItem) -> bool) {
        self.items.retain(f);
    }

    /// Drops the items of windows that no longer exist.
    pub fn forget(&mut self, stale: impl Fn(WindowId) -> bool) {
        self.items.retain(|item| !stale(item.window));
    }
}

impl<B: Backend> Display<B> {
    /// Accumulates the position of `parent` and its child-window ancestors.
    pub(crate) fn parent_pos(&self, parent: Option<WindowId>) -> ParentPos {
        let mut pp = ParentPos::ORIGIN;
        let mut current = parent;
        while let Some(id) = current {
            let Some(record) = self.windows.get(id) else {
                break;
            };
            if record.window_type != WindowType::Child {
                break;
            }
            let bounds = Rectangle::new(
                pp.x.saturating_neg(),
                pp.y.saturating_neg(),
                record.width,
                record.height,
            );
            pp.clip_rect = pp.clip_rect.intersect_or_empty(&bounds);
            pp.x = pp.x.wrapping_add(record.x);
            pp.y = pp.y.wrapping_add(record.y);
            pp.native_x = pp.native_x.wrapping_add(record.position.x);
            pp.native_y = pp.native_y.wrapping_add(record.position.y);
            current = record.parent;
        }
        pp
    }

    pub(crate) fn compute_window_position(&self, id: WindowId, pp: &ParentPos) -> Option<PositionInfo> {
        let record = self.windows.get(id)?;
        Some(compute_position(
            &self.backend.limits(),
            record.window_type == WindowType::Child,
            record.rect(),
            pp,
        ))
    }

    /// Recomputes the position of `id` without touching the native window.
    pub(crate) fn init_position(&mut self, id: WindowId) {
        let parent = self.windows.get(id).and_then(|r| r.parent);
        let pp = self.parent_pos(parent);
        if let Some(info) = self.compute_window_position(id, &pp) {
            if let Some(record) = self.windows.get_mut(id) {
                record.position = info;
            }
        }
    }

    /// Recomputes the position of `id` and its descendants from scratch and
    /// moves the native windows there directly.
    pub(crate) fn refresh_position(&mut self, id: WindowId) {
        let parent = self.windows.get(id).and_then(|r| r.parent);
        let pp = self.parent_pos(parent);
        self.refresh_position_under(id, &pp);
    }

    fn refresh_position_under(&mut self, id: WindowId, pp: &ParentPos) {
        let Some(record) = self.windows.get(id) else {
            return;
        };
        let (native, old, children, x, y) = (
            record.native,
            record.position,
            record.children.clone(),
            record.x,
            record.y,
        );
        let Some(new_info) = self.compute_window_position(id, pp) else {
            return;
        };
        self.clip_changed(id, old.clip_rect, new_info.clip_rect);
        if old.native_rect() != new_info.native_rect() {
            self.backend.move_resize_window(native, new_info.native_rect());
        }
        if old.mapped && !new_info.mapped {
            self.virtual_unmap(id);
        }
        self.finish_move(id, new_info);
        let this_pos = pp.descend(x, y, &new_info);
        for child in children {
            self.refresh_position_under(child, &this_pos);
        }
    }

    /// Moves and resizes a child window in logical coordinates.
    pub(crate) fn move_resize_child(&mut self, id: WindowId, x: i32, y: i32, width: i32, height: i32) {
        let Some(record) = self.windows.get_mut(id) else {
            return;
        };
        let dx = x.wrapping_sub(record.x);
        let dy = y.wrapping_sub(record.y);
        let is_move = dx != 0 || dy != 0;
        let is_resize = record.width != width || record.height != height;
        if !is_move && !is_resize {
            return;
        }
        record.x = x;
        record.y = y;
        record.width = width;
        record.height = height;
        let (native, parent, old, children) = (
            record.native,
            record.parent,
            record.position,
            record.children.clone(),
        );

        let pp = self.parent_pos(parent);
        let Some(new_info) = self.compute_window_position(id, &pp) else {
            return;
        };
        note!(
            self.config.debug_flags,
            GEOMETRY,
            "move_resize {:?} to {:?}: native {:?} offset ({}, {}) mapped {}",
            id,
            Rectangle::new(x, y, width, height),
            new_info.native_rect(),
            new_info.x_offset,
            new_info.y_offset,
            new_info.mapped
        );
        self.clip_changed(id, old.clip_rect, new_info.clip_rect);
        let this_pos = pp.descend(x, y, &new_info);

        if old.mapped && !new_info.mapped {
            self.virtual_unmap(id);
        }

        let d_x = new_info.x_offset.wrapping_sub(old.x_offset);
        let d_y = new_info.y_offset.wrapping_sub(old.y_offset);
        if d_x != 0 || d_y != 0 {
            self.set_static_gravities(id, true);
            if d_x < 0 || d_y < 0 {
                self.queue_translation(id, None, -d_x.min(0), -d_y.min(0));
            }
            let frame = intermediate_frame(&old, &new_info, d_x, d_y);
            self.backend.move_resize_window(native, frame);
            for child in &children {
                self.premove(*child, &this_pos);
            }
            self.backend
                .move_window(native, frame.x.wrapping_add(dx), frame.y.wrapping_add(dy));
            if d_x > 0 || d_y > 0 {
                self.queue_translation(id, None, -d_x.max(0), -d_y.max(0));
            }
            self.backend.move_resize_window(native, new_info.native_rect());
            self.finish_move(id, new_info);
            for child in &children {
                self.postmove(*child, &this_pos);
            }
        } else {
            if is_move && is_resize {
                self.set_static_gravities(id, false);
            }
            for child in &children {
                self.premove(*child, &this_pos);
            }
            if is_resize {
                self.backend.move_resize_window(native, new_info.native_rect());
            } else {
                self.backend.move_window(native, new_info.x, new_info.y);
            }
            for child in &children {
                self.postmove(*child, &this_pos);
            }
            self.finish_move(id, new_info);
        }
    }

    /// First half of repositioning a descendant of a moved window: unmap it
    /// if it left the representable range and open up its native frame.
    fn premove(&mut self, id: WindowId, pp: &ParentPos) {
        let Some(record) = self.windows.get(id) else {
            return;
        };
        let (native, old, children, x, y) = (
            record.native,
            record.position,
            record.children.clone(),
            record.x,
            record.y,
        );
        let Some(new_info) = self.compute_window_position(id, pp) else {
            return;
        };
        self.clip_changed(id, old.clip_rect, new_info.clip_rect);
        let this_pos = pp.descend(x, y, &new_info);

        if old.mapped && !new_info.mapped {
            self.virtual_unmap(id);
        }

        let d_x = new_info.x_offset.wrapping_sub(old.x_offset);
        let d_y = new_info.y_offset.wrapping_sub(old.y_offset);
        if d_x != 0 || d_y != 0 {
            self.set_static_gravities(id, true);
            if d_x < 0 || d_y < 0 {
                self.queue_translation(id, None, -d_x.min(0), -d_y.min(0));
            }
            let frame = intermediate_frame(&old, &new_info, d_x, d_y);
            self.backend.move_resize_window(native, frame);
        }

        for child in children {
            self.premove(child, &this_pos);
        }
    }

    /// Second half: close the frame down to the final native geometry.
    fn postmove(&mut self, id: WindowId, pp: &ParentPos) {
        let Some(record) = self.windows.get(id) else {
            return;
        };
        let (native, old, children, x, y) = (
            record.native,
            record.position,
            record.children.clone(),
            record.x,
            record.y,
        );
        let Some(new_info) = self.compute_window_position(id, pp) else {
            return;
        };
        let this_pos = pp.descend(x, y, &new_info);

        let d_x = new_info.x_offset.wrapping_sub(old.x_offset);
        let d_y = new_info.y_offset.wrapping_sub(old.y_offset);
        if d_x != 0 || d_y != 0 {
            if d_x > 0 || d_y > 0 {
                self.queue_translation(id, None, -d_x.max(0), -d_y.max(0));
            }
            self.backend.move_resize_window(native, new_info.native_rect());
        }
        self.finish_move(id, new_info);

        for child in children {
            self.postmove(child, &this_pos);
        }
    }

    /// Restores the background, maps the window if it came back into
    /// range, and stores its new position.
    fn finish_move(&mut self, id: WindowId, new_info: PositionInfo) {
        let Some(record) = self.windows.get(id) else {
            return;
        };
        let old = record.position;
        let toolkit_mapped = record.mapped;
        if old.no_bg {
            self.tmp_reset_bg(id);
        }
        if !old.mapped && new_info.mapped && toolkit_mapped {
            if let Some(record) = self.windows.get_mut(id) {
                record.virtual_maps += 1;
                self.backend.map_window(record.native);
            }
        }
        if let Some(record) = self.windows.get_mut(id) {
            record.position = new_info;
        }
    }

    fn virtual_unmap(&mut self, id: WindowId) {
        if let Some(record) = self.windows.get_mut(id) {
            if record.mapped {
                record.virtual_unmaps += 1;
                self.backend.unmap_window(record.native);
            }
        }
    }

    /// Updates the clip rectangle, trims the update area to it and
    /// invalidates whatever became visible.
    fn clip_changed(&mut self, id: WindowId, old_clip: Rectangle, new_clip: Rectangle) {
        let Some(record) = self.windows.get_mut(id) else {
            return;
        };
        if record.input_only {
            return;
        }
        record.position.clip_rect = new_clip;
        if let Some(area) = &mut record.update_area {
            area.intersect_with_rect(new_clip);
        }

        let mut exposed = Region::from_rect(new_clip);
        exposed.subtract_rect(old_clip);
        if !exposed.is_empty() {
            self.tmp_unset_bg(id);
            self.invalidate_region(id, &exposed, false);
        }
    }

    /// Suspends the background so the server does not clear areas that
    /// are about to be repainted anyway.
    fn tmp_unset_bg(&mut self, id: WindowId) {
        if let Some(record) = self.windows.get_mut(id) {
            record.position.no_bg = true;
            if record.background.is_some() {
                self.backend.set_background(record.native, None);
            }
        }
    }

    fn tmp_reset_bg(&mut self, id: WindowId) {
        if let Some(record) = self.windows.get_mut(id) {
            record.position.no_bg = false;
            if let Some(pixel) = record.background {
                self.backend.set_background(record.native, Some(pixel));
            }
        }
    }

    /// Switches static bit gravity for the window and static window
    /// gravity for its children.
    ///
    /// Returns `false` if static gravity was requested but the server does
    /// not support it.
    pub fn set_static_gravities(&mut self, id: WindowId, use_static: bool) -> bool {
        let Some(record) = self.windows.get(id) else {
            return false;
        };
        if record.guffaw_gravity == use_static {
            return true;
        }
        if use_static && !self.backend.supports_static_gravity() {
            return false;
        }
        let native = record.native;
        let children: Vec<_> = record
            .children
            .iter()
            .filter_map(|c| self.windows.get(*c).map(|r| r.native))
            .collect();
        if let Some(record) = self.windows.get_mut(id) {
            record.guffaw_gravity = use_static;
        }
        self.backend.set_bit_gravity_static(native, use_static);
        for child in children {
            self.backend.set_win_gravity_static(child, use_static);
        }
        true
    }

    /// Scrolls the window's content and children by `(dx, dy)`.
    ///
    /// Areas scrolled into view are invalidated. When the window covers its
    /// parent along every scrolled axis the children are moved with the
    /// native window's gravity, otherwise the pixels are copied and the
    /// children moved one by one.
    pub fn scroll(&mut self, id: WindowId, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let Some(record) = self.windows.get_mut(id) else {
            tracing::warn!("scroll: {:?} has been destroyed", id);
            return;
        };
        if let Some(area) = &mut record.update_area {
            area.offset(dx, dy);
        }
        let src = if record.window_type == WindowType::Child {
            record.position.clip_rect
        } else {
            Rectangle::new(0, 0, record.width, record.height)
        };
        let native = record.native;
        let (x_offset, y_offset) = (record.position.x_offset, record.position.y_offset);
        let children = record.children.clone();

        let dest = src.translate(dx, dy).intersect_or_empty(&src);
        let mut invalid = Region::from_rect(src);
        if !dest.is_empty() {
            invalid.subtract_rect(dest);
        }
        self.invalidate_region(id, &invalid, true);

        if self.can_guffaw_scroll(id, dx, dy) {
            self.guffaw_scroll(id, dx, dy);
            return;
        }

        for child in children {
            if let Some((cx, cy)) = self.get_position(child) {
                self.move_window(child, cx.wrapping_add(dx), cy.wrapping_add(dy));
            }
        }
        if !dest.is_empty() {
            self.queue_translation(id, None, dx, dy);
            if let Some(gc) = self.scratch_gc() {
                let drawable = NativeDrawable::Window(native);
                self.backend.copy_area(
                    drawable,
                    drawable,
                    gc,
                    dest.translate(-dx - x_offset, -dy - y_offset),
                    Point::new(dest.x - x_offset, dest.y - y_offset),
                );
            }
        }
    }

    fn can_guffaw_scroll(&self, id: WindowId, dx: i32, dy: i32) -> bool {
        if !self.backend.supports_static_gravity() {
            return false;
        }
        let Some(record) = self.windows.get(id) else {
            return false;
        };
        if record.window_type != WindowType::Child || record.children.is_empty() {
            return false;
        }
        let Some(parent) = record.parent.and_then(|p| self.windows.get(p)) else {
            return false;
        };
        let spans = |d: i32, pos: i32, size: i32, parent_size: i32| {
            d == 0 || (pos <= 0 && pos as i64 + size as i64 >= parent_size as i64)
        };
        spans(dx, record.x, record.width, parent.width)
            && spans(dy, record.y, record.height, parent.height)
    }

    /// Scrolls by moving the native window under static gravity, so the
    /// server moves content and children in one go.
    fn guffaw_scroll(&mut self, id: WindowId, dx: i32, dy: i32) {
        let d_x = -dx;
        let d_y = -dy;
        let Some(record) = self.windows.get(id) else {
            return;
        };
        let (native, parent, old, children, x, y) = (
            record.native,
            record.parent,
            record.position,
            record.children.clone(),
            record.x,
            record.y,
        );
        let pp = self.parent_pos(parent);
        let Some(new_info) = self.compute_window_position(id, &pp) else {
            return;
        };
        let this_pos = pp.descend(x, y, &new_info);

        self.tmp_unset_bg(id);
        if d_x < 0 || d_y < 0 {
            self.queue_translation(id, None, -d_x.min(0), -d_y.min(0));
        }
        self.set_static_gravities(id, true);

        let frame = intermediate_frame(&old, &new_info, d_x, d_y);
        self.backend.move_resize_window(native, frame);
        for child in &children {
            if let Some(record) = self.windows.get_mut(*child) {
                record.x = record.x.wrapping_sub(d_x);
                record.y = record.y.wrapping_sub(d_y);
            }
            self.premove(*child, &this_pos);
        }
        self.backend
            .move_window(native, frame.x.wrapping_sub(d_x), frame.y.wrapping_sub(d_y));
        if d_x > 0 || d_y > 0 {
            self.queue_translation(id, None, -d_x.max(0), -d_y.max(0));
        }
        self.backend.move_resize_window(native, old.native_rect());
        self.finish_move(id, new_info);
        for child in &children {
            self.postmove(*child, &this_pos);
        }
    }

    /// Moves the content inside `region` by `(dx, dy)`, carrying any
    /// pending invalid area along and invalidating what is left behind.
    pub fn move_region(&mut self, id: WindowId, region: &Region, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let Some(record) = self.windows.get(id) else {
            tracing::warn!("move_region: {:?} has been destroyed", id);
            return;
        };
        let clip = if record.window_type == WindowType::Child {
            record.position.clip_rect
        } else {
            Rectangle::new(0, 0, record.width, record.height)
        };
        let native = record.native;
        let (x_offset, y_offset) = (record.position.x_offset, record.position.y_offset);

        let mut src = region.clone();
        src.intersect_with_rect(clip);
        let mut dest = src.translated(dx, dy);
        dest.intersect_with_rect(clip);

        let moving_invalid = record.update_area.as_ref().map(|area| {
            let mut moving = area.clone();
            moving.intersect_with(&src);
            moving.offset(dx, dy);
            moving
        });

        self.invalidate_region(id, &src, false);
        if let Some(area) = self.windows.get_mut(id).and_then(|r| r.update_area.as_mut()) {
            area.subtract(&dest);
        }
        if let Some(moving) = moving_invalid {
            if !moving.is_empty() {
                self.invalidate_region(id, &moving, false);
            }
        }

        if dest.is_empty() {
            return;
        }
        self.queue_translation(id, Some(src.clone()), dx, dy);

        let copy_rect = src
            .clipbox()
            .intersect(&dest.clipbox().translate(-dx, -dy));
        let (Some(copy_rect), Some(gc)) = (copy_rect, self.scratch_gc()) else {
            return;
        };
        let drawable = NativeDrawable::Window(native);
        let origin = Point::new(-x_offset, -y_offset);
        self.backend
            .set_clip_rectangles(gc, origin, Some(dest.rects()));
        self.backend.copy_area(
            drawable,
            drawable,
            gc,
            copy_rect.translate(-x_offset, -y_offset),
            Point::new(copy_rect.x + dx - x_offset, copy_rect.y + dy - y_offset),
        );
        self.backend
            .set_clip_rectangles(gc, Point::new(0, 0), None);
    }

    /// A GC used for the engine's own copies, created on first use.
    fn scratch_gc(&mut self) -> Option<NativeGc> {
        if self.scratch_gc.is_none() {
            let root = self.windows.get(self.root)?.native;
            match self.backend.create_gc(NativeDrawable::Window(root)) {
                Ok(gc) => self.scratch_gc = Some(gc),
                Err(err) => {
                    tracing::warn!("cannot create a GC for copying: {}", err);
                    return None;
                }
            }
        }
        self.scratch_gc
    }

    pub(crate) fn queue_translation(&mut self, id: WindowId, area: Option<Region>, dx: i32, dy: i32) {
        self.queue_item(id, QueueKind::Translate { area, dx, dy });
    }

    pub(crate) fn queue_antiexpose(&mut self, id: WindowId, area: Region) {
        self.queue_item(id, QueueKind::AntiExpose(area));
    }

    fn queue_item(&mut self, id: WindowId, kind: QueueKind) {
        if self.translate_queue.len() >= MAX_QUEUE_LEN {
            let cutoff = self.find_current_serial();
            let windows = &self.windows;
            self.translate_queue
                .retain(|item| !item.serial.is_before(cutoff) && windows.contains(item.window));
        }
        // Someone is not processing events; translations must stay, anti-exposes may go.
        if self.translate_queue.len() >= MAX_QUEUE_LEN {
            self.translate_queue
                .retain(|item| !matches!(item.kind, QueueKind::AntiExpose(_)));
        }
        let serial = self.backend.next_request_serial();
        self.translate_queue.push(QueueItem {
            window: id,
            serial,
            kind,
        });
    }

    /// The oldest serial an expose still to be processed can carry.
    fn find_current_serial(&mut self) -> Serial {
        let mut serial = self.backend.next_request_serial();
        while let Some(event) = self.backend.poll_event() {
            self.events.pending_native.push_back(event);
        }
        for event in &self.events.pending_native {
            if let NativeEvent::Window {
                serial: event_serial,
                kind: NativeEventKind::Expose { .. } | NativeEventKind::GraphicsExpose { .. },
                ..
            } = event
            {
                if event_serial.is_before(serial) {
                    serial = *event_serial;
                }
            }
        }
        serial
    }

    /// Feeds an expose of `area` (logical coordinates) reported with
    /// `serial` into the window's update area, correcting it for geometry
    /// changes the server had not yet seen when it generated the expose.
    pub(crate) fn process_expose(&mut self, id: WindowId, serial: Serial, area: Rectangle) {
        let mut invalid = Region::from_rect(area);
        self.translate_queue.retain(|item| {
            if !serial.is_before(item.serial) {
                return false;
            }
            if item.window == id {
                match &item.kind {
                    QueueKind::Translate {
                        area: Some(moved),
                        dx,
                        dy,
                    } => {
                        let mut intersection = invalid.clone();
                        intersection.intersect_with(moved);
                        invalid.subtract(&intersection);
                        intersection.offset(*dx, *dy);
                        invalid.union_with(&intersection);
                    }
                    QueueKind::Translate { area: None, dx, dy } => invalid.offset(*dx, *dy),
                    QueueKind::AntiExpose(painted) => invalid.subtract(painted),
                }
            }
            true
        });

        let Some(record) = self.windows.get(id) else {
            return;
        };
        invalid.intersect_with_rect(record.position.clip_rect);
        if !invalid.is_empty() {
            self.invalidate_region(id, &invalid, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: CoordinateLimits = CoordinateLimits::X11;

    fn clipped(width: i32, height: i32) -> ParentPos {
        ParentPos {
            clip_rect: Rectangle::new(0, 0, width, height),
            ..ParentPos::ORIGIN
        }
    }

    #[test]
    fn small_windows_map_one_to_one() {
        let pp = ParentPos {
            x: 120,
            y: -40,
            native_x: 100,
            native_y: -40,
            clip_rect: Rectangle::new(0, 0, 500, 500),
        };
        let info = compute_position(&LIMITS, true, Rectangle::new(30, 50, 200, 100), &pp);
        assert!(!info.big);
        assert_eq!((info.width, info.height), (200, 100));
        assert_eq!(info.x + pp.native_x, 30 + pp.x);
        assert_eq!(info.y + pp.native_y, 50 + pp.y);
        assert_eq!((info.x_offset, info.y_offset), (0, 0));
        assert_eq!(info.clip_rect, Rectangle::new(0, 0, 200, 100));
    }

    #[test]
    fn forty_thousand_square_under_a_toplevel() {
        let info = compute_position(
            &LIMITS,
            true,
            Rectangle::new(0, 0, 40000, 40000),
            &ParentPos::ORIGIN,
        );
        assert!(info.big && info.mapped);
        assert_eq!((info.width, info.height), (LIMITS.size_limit, LIMITS.size_limit));
        // The visible part of the toplevel maps onto the same pixels both ways.
        for logical in [0, 799] {
            let native = logical - info.x_offset;
            assert!((0..info.width).contains(&native));
            assert_eq!(info.x + native, logical);
        }
    }

    #[test]
    fn big_window_keeps_visible_range() {
        let pp = clipped(800, 600);
        let info = compute_position(&LIMITS, true, Rectangle::new(-50000, 0, 100000, 50), &pp);
        assert!(info.big && info.mapped);
        assert_eq!(info.x, LIMITS.low);
        assert_eq!(info.x_offset, 50000 + LIMITS.low);
        assert_eq!(info.clip_rect, Rectangle::new(50000, 0, 800, 50));
        // Native pixels for the visible range land where the logical ones would.
        for parent_x in [0, 400, 799] {
            let logical = parent_x + 50000;
            let native = logical - info.x_offset;
            assert!((0..info.width).contains(&native));
            assert_eq!(info.x + native, parent_x);
        }
    }

    #[test]
    fn right_edge_anchors_when_left_edge_is_out_of_range() {
        let info = compute_position(
            &LIMITS,
            true,
            Rectangle::new(-30000, 0, 40000, 10),
            &clipped(800, 600),
        );
        assert_eq!(info.x + info.width, 10000);
        assert_eq!(info.x_offset, info.x + 30000);
    }

    #[test]
    fn wrapped_windows_unmap_and_come_back() {
        let pp = clipped(800, 600);
        let near = Rectangle::new(-50000, 0, 100000, 50);
        let far = Rectangle::new(-200000, 0, 100000, 50);
        assert!(compute_position(&LIMITS, true, near, &pp).mapped);
        assert!(!compute_position(&LIMITS, true, far, &pp).mapped);
        assert_eq!(
            compute_position(&LIMITS, true, near, &pp),
            compute_position(&LIMITS, true, near, &pp)
        );

        let small_far = Rectangle::new(70000, 0, 100, 100);
        assert!(!compute_position(&LIMITS, true, small_far, &pp).mapped);
        // Children of toplevels are never clipped, so never unmapped.
        assert!(compute_position(&LIMITS, true, small_far, &ParentPos::ORIGIN).mapped);
    }

    #[test]
    fn toplevels_clip_to_their_own_size() {
        let info = compute_position(&LIMITS, false, Rectangle::new(-10, -10, 300, 200), &ParentPos::ORIGIN);
        assert_eq!(info.clip_rect, Rectangle::new(0, 0, 300, 200));
    }

    #[test]
    fn win32_limits_differ() {
        let info = compute_position(
            &CoordinateLimits::WIN32,
            true,
            Rectangle::new(0, 0, 32768, 10),
            &ParentPos::ORIGIN,
        );
        assert!(info.big);
        assert_eq!(info.width, 32767);
        let info = compute_position(&LIMITS, true, Rectangle::new(0, 0, 32768, 10), &ParentPos::ORIGIN);
        assert!(!info.big);
    }

    #[test]
    fn intermediate_frame_covers_both_ranges() {
        let old = PositionInfo::unvirtualized(Rectangle::new(10, 20, 100, 50));
        let new = PositionInfo::unvirtualized(Rectangle::new(0, 0, 120, 50));
        assert_eq!(
            intermediate_frame(&old, &new, -30, 0),
            Rectangle::new(-20, 20, 130, 50)
        );
        assert_eq!(
            intermediate_frame(&old, &new, 30, 5),
            Rectangle::new(10, 20, 150, 55)
        );
    }
}
