// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Integer geometry primitives.
//!
//! All coordinates are 32-bit even though the underlying protocols are
//! limited to 16 bits; translating between the two is the job of the
//! window position engine.

/// A point in integer pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Point {
        Point { x, y }
    }

    pub fn translate(self, dx: i32, dy: i32) -> Point {
        Point::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Point {
        Point::new(x, y)
    }
}

/// A line segment between two points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Segment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Segment {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Segment {
        Segment { x1, y1, x2, y2 }
    }

    pub fn translate(self, dx: i32, dy: i32) -> Segment {
        Segment::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }
}

/// An elliptical arc inscribed in a bounding box.
///
/// Angles are in 1/64ths of a degree, counter-clockwise from three o'clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Arc {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub angle1: i32,
    pub angle2: i32,
}

impl Arc {
    pub fn translate(self, dx: i32, dy: i32) -> Arc {
        Arc {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// An axis-aligned rectangle.
///
/// A rectangle with a non-positive width or height is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Rectangle {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle spanning `(x1, y1)` inclusive to `(x2, y2)` exclusive.
    pub fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Rectangle {
        Rectangle::new(
            x1,
            y1,
            clamp_extent(x2 as i64 - x1 as i64),
            clamp_extent(y2 as i64 - y1 as i64),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// The exclusive right edge.
    pub fn x2(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// The exclusive bottom edge.
    pub fn y2(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rectangle {
        Rectangle::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_empty() && x >= self.x && x < self.x2() && y >= self.y && y < self.y2()
    }

    /// The overlap of two rectangles, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Rectangle) -> Option<Rectangle> {
        let x1 = self.x.max(other.x) as i64;
        let y1 = self.y.max(other.y) as i64;
        let x2 = (self.x as i64 + self.width as i64).min(other.x as i64 + other.width as i64);
        let y2 = (self.y as i64 + self.height as i64).min(other.y as i64 + other.height as i64);
        if x2 > x1 && y2 > y1 {
            Some(Rectangle::new(
                x1 as i32,
                y1 as i32,
                clamp_extent(x2 - x1),
                clamp_extent(y2 - y1),
            ))
        } else {
            None
        }
    }

    /// Like [`intersect`](Self::intersect) but yields an empty rectangle instead of `None`.
    pub fn intersect_or_empty(&self, other: &Rectangle) -> Rectangle {
        self.intersect(other).unwrap_or_default()
    }

    /// The smallest rectangle containing both; empty inputs are ignored.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        Rectangle::from_edges(x1, y1, x2, y2)
    }
}

fn clamp_extent(v: i64) -> i32 {
    v.clamp(0, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_disjoint() {
        let a = Rectangle::new(0, 0, 10, 10);
        let b = Rectangle::new(10, 0, 10, 10);
        assert_eq!(a.intersect(&b), None);
        assert!(a.intersect_or_empty(&b).is_empty());
    }

    #[test]
    fn intersect_unbounded_clip() {
        let clip = Rectangle::new(-5, -5, i32::MAX, i32::MAX);
        let r = Rectangle::new(100, 200, 30, 40);
        assert_eq!(clip.intersect(&r), Some(r));
    }

    #[test]
    fn union_ignores_empty() {
        let a = Rectangle::new(5, 5, 0, 10);
        let b = Rectangle::new(1, 2, 3, 4);
        assert_eq!(a.union(&b), b);
        assert_eq!(
            b.union(&Rectangle::new(10, 10, 2, 2)),
            Rectangle::new(1, 2, 11, 10)
        );
    }
}
