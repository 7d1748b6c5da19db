// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Regions: arbitrary areas described as unions of rectangles.
//!
//! A [`Region`] is always kept in canonical y-x banded form. The rectangles
//! are grouped into horizontal bands sorted top to bottom; inside a band all
//! rectangles share the same top and bottom edge and are sorted left to right
//! without touching. Vertically adjacent bands with identical spans are merged.
//! Because the form is canonical, two regions covering the same pixels compare
//! equal.

use crate::geometry::{Point, Rectangle};

/// A union of rectangles, used to describe clip areas and areas that need repainting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rectangle>,
}

/// The rule deciding which pixels a self-intersecting polygon covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// A pixel is inside if a ray from it crosses an odd number of edges.
    EvenOdd,
    /// A pixel is inside if the edges wind around it a non-zero number of times.
    Winding,
}

/// How a rectangle relates to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapType {
    /// The rectangle lies entirely inside the region.
    In,
    /// The rectangle does not touch the region.
    Out,
    /// The rectangle is partially inside.
    Part,
}

/// A horizontal run of pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub x: i32,
    pub y: i32,
    pub width: i32,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Union,
    Intersect,
    Subtract,
    Xor,
}

impl Op {
    fn keep(self, in_a: bool, in_b: bool) -> bool {
        match self {
            Op::Union => in_a || in_b,
            Op::Intersect => in_a && in_b,
            Op::Subtract => in_a && !in_b,
            Op::Xor => in_a != in_b,
        }
    }
}

impl Region {
    /// The empty region.
    pub const EMPTY: Region = Region { rects: Vec::new() };

    /// Creates an empty region.
    pub fn new() -> Region {
        Region::EMPTY
    }

    /// A region covering a single rectangle. Empty rectangles give an empty region.
    pub fn from_rect(rect: Rectangle) -> Region {
        if rect.is_empty() {
            Region::EMPTY
        } else {
            Region { rects: vec![rect] }
        }
    }

    /// The union of an arbitrary collection of rectangles.
    pub fn from_rects(rects: impl IntoIterator<Item = Rectangle>) -> Region {
        let mut parts: Vec<Region> = rects.into_iter().map(Region::from_rect).collect();
        // Pairwise merging keeps the intermediate regions small.
        while parts.len() > 1 {
            let mut merged = Vec::with_capacity((parts.len() + 1) / 2);
            let mut iter = parts.into_iter();
            while let Some(mut a) = iter.next() {
                if let Some(b) = iter.next() {
                    a.union_with(&b);
                }
                merged.push(a);
            }
            parts = merged;
        }
        parts.pop().unwrap_or_default()
    }

    /// Scan-converts a closed polygon.
    ///
    /// Pixels are sampled at their centers. Fewer than three points give an
    /// empty region.
    pub fn polygon(points: &[Point], fill_rule: FillRule) -> Region {
        if points.len() < 3 {
            tracing::warn!(
                "polygon region needs at least 3 points, got {}",
                points.len()
            );
            return Region::EMPTY;
        }

        struct Edge {
            y_top: f64,
            y_bottom: f64,
            x_top: f64,
            slope: f64,
            dir: i32,
        }

        let mut edges = Vec::with_capacity(points.len());
        for (i, p1) in points.iter().enumerate() {
            let p2 = &points[(i + 1) % points.len()];
            if p1.y == p2.y {
                continue;
            }
            let (top, bottom, dir) = if p1.y < p2.y {
                (p1, p2, 1)
            } else {
                (p2, p1, -1)
            };
            edges.push(Edge {
                y_top: top.y as f64,
                y_bottom: bottom.y as f64,
                x_top: top.x as f64,
                slope: (bottom.x as f64 - top.x as f64) / (bottom.y as f64 - top.y as f64),
                dir,
            });
        }

        let y_min = points.iter().map(|p| p.y).min().unwrap_or(0);
        let y_max = points.iter().map(|p| p.y).max().unwrap_or(0);

        let mut builder = BandBuilder::default();
        let mut crossings: Vec<(f64, i32)> = Vec::new();
        let mut spans: Vec<(i32, i32)> = Vec::new();
        for y in y_min..y_max {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for e in &edges {
                if yc >= e.y_top && yc < e.y_bottom {
                    crossings.push((e.x_top + (yc - e.y_top) * e.slope, e.dir));
                }
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            spans.clear();
            match fill_rule {
                FillRule::EvenOdd => {
                    for pair in crossings.chunks_exact(2) {
                        push_pixel_span(&mut spans, pair[0].0, pair[1].0);
                    }
                }
                FillRule::Winding => {
                    let mut winding = 0;
                    let mut start = 0.0;
                    for &(x, dir) in &crossings {
                        if winding == 0 {
                            start = x;
                        }
                        winding += dir;
                        if winding == 0 {
                            push_pixel_span(&mut spans, start, x);
                        }
                    }
                }
            }
            builder.push_band(y, y + 1, &spans);
        }
        builder.finish()
    }

    /// Returns the rectangles making up this region, in banded order.
    #[inline]
    pub fn rects(&self) -> &[Rectangle] {
        &self.rects
    }

    /// Returns `true` if this region is empty.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Sets this region to the empty region.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// The smallest rectangle containing the whole region.
    pub fn clipbox(&self) -> Rectangle {
        let (first, last) = match (self.rects.first(), self.rects.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Rectangle::default(),
        };
        let x1 = self.rects.iter().map(|r| r.x).min().unwrap_or(0);
        let x2 = self.rects.iter().map(|r| r.x2()).max().unwrap_or(0);
        Rectangle::from_edges(x1, first.y, x2, last.y2())
    }

    /// Moves the region by the given distance.
    pub fn offset(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.translate(dx, dy);
        }
    }

    /// Returns a copy of this region moved by the given distance.
    pub fn translated(&self, dx: i32, dy: i32) -> Region {
        let mut region = self.clone();
        region.offset(dx, dy);
        region
    }

    /// Modifies this region by including everything in the other region.
    pub fn union_with(&mut self, other: &Region) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.rects.clone_from(&other.rects);
            return;
        }
        self.rects = combine(&self.rects, &other.rects, Op::Union);
    }

    /// Modifies this region by including the given rectangle.
    pub fn union_with_rect(&mut self, rect: Rectangle) {
        self.union_with(&Region::from_rect(rect));
    }

    /// Modifies this region by keeping only what is also in the other region.
    pub fn intersect_with(&mut self, other: &Region) {
        if self.is_empty() || other.is_empty() {
            self.clear();
            return;
        }
        self.rects = combine(&self.rects, &other.rects, Op::Intersect);
    }

    /// Modifies this region by intersecting it with the given rectangle.
    pub fn intersect_with_rect(&mut self, rect: Rectangle) {
        self.intersect_with(&Region::from_rect(rect));
    }

    /// Modifies this region by removing everything in the other region.
    pub fn subtract(&mut self, other: &Region) {
        if self.is_empty() || other.is_empty() {
            return;
        }
        self.rects = combine(&self.rects, &other.rects, Op::Subtract);
    }

    /// Modifies this region by removing the given rectangle.
    pub fn subtract_rect(&mut self, rect: Rectangle) {
        self.subtract(&Region::from_rect(rect));
    }

    /// Modifies this region to cover what exactly one of the two regions covers.
    pub fn xor(&mut self, other: &Region) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.rects.clone_from(&other.rects);
            return;
        }
        self.rects = combine(&self.rects, &other.rects, Op::Xor);
    }

    /// Shrinks the region by `dx` horizontally and `dy` vertically on each side.
    ///
    /// Negative values grow the region instead.
    pub fn shrink(&mut self, dx: i32, dy: i32) {
        if self.is_empty() {
            return;
        }
        if dx > 0 {
            self.erode(dx, 0);
        } else if dx < 0 {
            self.dilate(dx.saturating_neg(), 0);
        }
        if dy > 0 {
            self.erode(0, dy);
        } else if dy < 0 {
            self.dilate(0, dy.saturating_neg());
        }
    }

    fn dilate(&mut self, gx: i32, gy: i32) {
        let grown = self.rects.iter().map(|r| grow_rect(r, gx, gy));
        *self = Region::from_rects(grown);
    }

    fn erode(&mut self, sx: i32, sy: i32) {
        let frame = grow_rect(&self.clipbox(), sx.saturating_add(1), sy.saturating_add(1));
        let mut outside = Region::from_rect(frame);
        outside.subtract(self);
        outside.dilate(sx, sy);
        self.subtract(&outside);
    }

    /// Returns `true` if the point lies inside the region.
    pub fn point_in(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    /// Returns `true` if this region has a non-empty intersection with the given rectangle.
    pub fn intersects(&self, rect: Rectangle) -> bool {
        self.rects.iter().any(|r| r.intersect(&rect).is_some())
    }

    /// Classifies a rectangle against this region.
    pub fn rect_in(&self, rect: Rectangle) -> OverlapType {
        if rect.is_empty() || !self.intersects(rect) {
            return OverlapType::Out;
        }
        let mut rest = Region::from_rect(rect);
        rest.subtract(self);
        if rest.is_empty() {
            OverlapType::In
        } else {
            OverlapType::Part
        }
    }

    /// Calls `f` for every part of `spans` that lies inside the region.
    ///
    /// When `sorted` is set the spans are known to be ordered by `y`, which
    /// lets the search skip bands that are already passed.
    pub fn spans_intersect_foreach(&self, spans: &[Span], sorted: bool, mut f: impl FnMut(Span)) {
        let mut band_start = 0;
        for span in spans {
            if span.width <= 0 {
                continue;
            }
            let start = if sorted { band_start } else { 0 };
            let x2 = span.x.saturating_add(span.width);
            for (i, r) in self.rects.iter().enumerate().skip(start) {
                if r.y > span.y {
                    break;
                }
                if r.y2() <= span.y {
                    if sorted {
                        band_start = i + 1;
                    }
                    continue;
                }
                let x = span.x.max(r.x);
                let end = x2.min(r.x2());
                if end > x {
                    f(Span {
                        x,
                        y: span.y,
                        width: end - x,
                    });
                }
            }
        }
    }
}

impl From<Rectangle> for Region {
    fn from(rect: Rectangle) -> Region {
        Region::from_rect(rect)
    }
}

macro_rules! region_op {
    ($trait:ident, $method:ident, $in_place:ident) => {
        impl std::ops::$trait<&Region> for &Region {
            type Output = Region;

            fn $method(self, other: &Region) -> Region {
                let mut out = self.clone();
                out.$in_place(other);
                out
            }
        }
    };
}

region_op!(BitOr, bitor, union_with);
region_op!(BitAnd, bitand, intersect_with);
region_op!(Sub, sub, subtract);
region_op!(BitXor, bitxor, xor);

/// `r` grown by `gx` on the left and right and `gy` on the top and bottom.
///
/// Growth stops where the size would no longer fit in an `i32`, and edges
/// saturate at the ends of the coordinate space, so the result always
/// contains `r`.
fn grow_rect(r: &Rectangle, gx: i32, gy: i32) -> Rectangle {
    let gx = gx.min((i32::MAX - r.width.max(0)) / 2);
    let gy = gy.min((i32::MAX - r.height.max(0)) / 2);
    Rectangle::from_edges(
        r.x.saturating_sub(gx),
        r.y.saturating_sub(gy),
        r.x2().saturating_add(gx),
        r.y2().saturating_add(gy),
    )
}

fn push_pixel_span(spans: &mut Vec<(i32, i32)>, x0: f64, x1: f64) {
    let start = (x0 - 0.5).ceil() as i32;
    let end = (x1 - 0.5).ceil() as i32;
    if end <= start {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if start <= last.1 {
            last.1 = last.1.max(end);
            return;
        }
    }
    spans.push((start, end));
}

struct Band<'a> {
    y1: i32,
    y2: i32,
    rects: &'a [Rectangle],
}

fn bands(rects: &[Rectangle]) -> Vec<Band<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < rects.len() {
        let head = rects[start];
        let mut end = start + 1;
        while end < rects.len() && rects[end].y == head.y && rects[end].height == head.height {
            end += 1;
        }
        out.push(Band {
            y1: head.y,
            y2: head.y2(),
            rects: &rects[start..end],
        });
        start = end;
    }
    out
}

#[derive(Default)]
struct BandBuilder {
    rects: Vec<Rectangle>,
    last_band: usize,
}

impl BandBuilder {
    fn push_band(&mut self, y1: i32, y2: i32, spans: &[(i32, i32)]) {
        if spans.is_empty() || y2 <= y1 {
            return;
        }
        let prev = &mut self.rects[self.last_band..];
        let coalesce = !prev.is_empty()
            && prev[0].y2() == y1
            && prev.len() == spans.len()
            && prev
                .iter()
                .zip(spans)
                .all(|(r, &(x1, x2))| r.x == x1 && r.x2() == x2);
        if coalesce {
            for r in prev {
                *r = Rectangle::from_edges(r.x, r.y, r.x2(), y2);
            }
            return;
        }
        self.last_band = self.rects.len();
        self.rects.extend(
            spans
                .iter()
                .map(|&(x1, x2)| Rectangle::from_edges(x1, y1, x2, y2)),
        );
    }

    fn finish(self) -> Region {
        Region { rects: self.rects }
    }
}

fn combine_spans(a: &[(i32, i32)], b: &[(i32, i32)], op: Op, out: &mut Vec<(i32, i32)>) {
    out.clear();
    let mut xs: Vec<i32> = a.iter().chain(b).flat_map(|&(x1, x2)| [x1, x2]).collect();
    xs.sort_unstable();
    xs.dedup();
    let (mut ia, mut ib) = (0, 0);
    for w in xs.windows(2) {
        let (x1, x2) = (w[0], w[1]);
        while ia < a.len() && a[ia].1 <= x1 {
            ia += 1;
        }
        while ib < b.len() && b[ib].1 <= x1 {
            ib += 1;
        }
        let in_a = ia < a.len() && a[ia].0 <= x1;
        let in_b = ib < b.len() && b[ib].0 <= x1;
        if !op.keep(in_a, in_b) {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.1 == x1 => last.1 = x2,
            _ => out.push((x1, x2)),
        }
    }
}

fn combine(a: &[Rectangle], b: &[Rectangle], op: Op) -> Vec<Rectangle> {
    let bands_a = bands(a);
    let bands_b = bands(b);
    let mut ys: Vec<i32> = bands_a
        .iter()
        .chain(&bands_b)
        .flat_map(|band| [band.y1, band.y2])
        .collect();
    ys.sort_unstable();
    ys.dedup();

    let spans_of = |band: &Band| -> Vec<(i32, i32)> {
        band.rects.iter().map(|r| (r.x, r.x2())).collect()
    };

    let mut builder = BandBuilder::default();
    let (mut ia, mut ib) = (0, 0);
    let mut out = Vec::new();
    for w in ys.windows(2) {
        let (y1, y2) = (w[0], w[1]);
        while ia < bands_a.len() && bands_a[ia].y2 <= y1 {
            ia += 1;
        }
        while ib < bands_b.len() && bands_b[ib].y2 <= y1 {
            ib += 1;
        }
        let spans_a = match bands_a.get(ia) {
            Some(band) if band.y1 <= y1 => spans_of(band),
            _ => Vec::new(),
        };
        let spans_b = match bands_b.get(ib) {
            Some(band) if band.y1 <= y1 => spans_of(band),
            _ => Vec::new(),
        };
        combine_spans(&spans_a, &spans_b, op, &mut out);
        builder.push_band(y1, y2, &out);
    }
    builder.rects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle {
        Rectangle::new(x, y, w, h)
    }

    fn area(region: &Region) -> i64 {
        region
            .rects()
            .iter()
            .map(|r| r.width as i64 * r.height as i64)
            .sum()
    }

    #[test]
    fn union_coalesces_horizontally_and_vertically() {
        let mut r = Region::from_rect(rect(0, 0, 10, 10));
        r.union_with_rect(rect(10, 0, 10, 10));
        assert_eq!(r.rects(), &[rect(0, 0, 20, 10)]);

        let mut r = Region::from_rect(rect(0, 0, 10, 10));
        r.union_with_rect(rect(0, 10, 10, 10));
        assert_eq!(r.rects(), &[rect(0, 0, 10, 20)]);
    }

    #[test]
    fn canonical_form_is_independent_of_construction() {
        let mut a = Region::from_rect(rect(0, 0, 20, 10));
        a.union_with_rect(rect(0, 10, 10, 10));
        let mut b = Region::from_rect(rect(0, 0, 10, 20));
        b.union_with_rect(rect(10, 0, 10, 10));
        assert_eq!(a, b);
        assert_eq!(a.rects().len(), 2);
    }

    #[test]
    fn subtract_hole() {
        let mut r = Region::from_rect(rect(0, 0, 30, 30));
        r.subtract_rect(rect(10, 10, 10, 10));
        assert_eq!(
            r.rects(),
            &[
                rect(0, 0, 30, 10),
                rect(0, 10, 10, 10),
                rect(20, 10, 10, 10),
                rect(0, 20, 30, 10),
            ]
        );
        assert_eq!(area(&r), 800);
        assert!(!r.point_in(15, 15));
    }

    #[test]
    fn subtract_self_is_empty() {
        let mut r = Region::from_rect(rect(3, 4, 5, 6));
        r.union_with_rect(rect(20, 20, 2, 2));
        let copy = r.clone();
        r.subtract(&copy);
        assert!(r.is_empty());
        assert_eq!(r.clipbox(), Rectangle::default());
    }

    #[test]
    fn xor_splits() {
        let mut r = Region::from_rect(rect(0, 0, 10, 10));
        r.xor(&Region::from_rect(rect(5, 0, 10, 10)));
        assert_eq!(r.rects(), &[rect(0, 0, 5, 10), rect(10, 0, 5, 10)]);
    }

    #[test]
    fn intersect_and_union_commute() {
        let a = Region::from_rects([rect(0, 0, 10, 10), rect(15, 5, 10, 20)]);
        let b = Region::from_rects([rect(5, 5, 20, 3), rect(-5, 8, 8, 8)]);

        assert_eq!(&a | &b, &b | &a);
        let ab = &a & &b;
        assert_eq!(ab, &b & &a);
        assert_eq!(area(&ab), 5 * 3 + 10 * 3 + 3 * 2);
        assert!((&a & &Region::new()).is_empty());
        assert!((&a - &a).is_empty());
        // Operands are left alone.
        assert_eq!(a, Region::from_rects([rect(0, 0, 10, 10), rect(15, 5, 10, 20)]));
        assert_eq!(&a ^ &b, &(&a | &b) - &ab);
    }

    #[test]
    fn empty_rectangles_are_ignored() {
        assert!(Region::from_rect(rect(0, 0, 0, 10)).is_empty());
        let mut r = Region::new();
        r.union_with_rect(rect(1, 1, 10, -3));
        assert!(r.is_empty());
    }

    #[test]
    fn offset_and_clipbox() {
        let mut r = Region::from_rects([rect(0, 0, 10, 10), rect(20, 30, 5, 5)]);
        assert_eq!(r.clipbox(), rect(0, 0, 25, 35));
        r.offset(-5, 7);
        assert_eq!(r.clipbox(), rect(-5, 7, 25, 35));
    }

    #[test]
    fn rectangular_polygon_matches_rectangle() {
        let points = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        let expected = Region::from_rect(rect(0, 0, 10, 10));
        assert_eq!(Region::polygon(&points, FillRule::EvenOdd), expected);
        assert_eq!(Region::polygon(&points, FillRule::Winding), expected);
    }

    #[test]
    fn triangle_samples_pixel_centers() {
        let points = [Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)];
        let r = Region::polygon(&points, FillRule::EvenOdd);
        assert_eq!(area(&r), 45);
        assert!(r.point_in(0, 0));
        assert!(r.point_in(8, 0));
        assert!(!r.point_in(9, 0));
        assert!(!r.point_in(0, 9));
    }

    #[test]
    fn fill_rules_differ_on_doubled_outline() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        let doubled: Vec<Point> = square.iter().chain(square.iter()).copied().collect();
        assert!(Region::polygon(&doubled, FillRule::EvenOdd).is_empty());
        assert_eq!(
            Region::polygon(&doubled, FillRule::Winding),
            Region::from_rect(rect(0, 0, 10, 10))
        );
    }

    #[test]
    fn degenerate_polygon_is_empty() {
        let points = [Point::new(0, 0), Point::new(10, 10)];
        assert!(Region::polygon(&points, FillRule::Winding).is_empty());
    }

    #[test]
    fn shrink_and_grow() {
        let mut r = Region::from_rect(rect(0, 0, 10, 10));
        r.shrink(2, 3);
        assert_eq!(r, Region::from_rect(rect(2, 3, 6, 4)));

        let mut r = Region::from_rect(rect(0, 0, 10, 10));
        r.shrink(-2, -1);
        assert_eq!(r, Region::from_rect(rect(-2, -1, 14, 12)));

        let mut r = Region::from_rect(rect(0, 0, 4, 4));
        r.shrink(2, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn shrink_erodes_inner_corners() {
        // An L shape loses a column next to its inner edge too.
        let mut r = Region::from_rects([rect(0, 0, 20, 10), rect(0, 10, 10, 10)]);
        r.shrink(1, 0);
        assert_eq!(
            r,
            Region::from_rects([rect(1, 0, 18, 10), rect(1, 10, 8, 10)])
        );
    }

    #[test]
    fn shrink_saturates_at_the_coordinate_limits() {
        let mut r = Region::from_rect(rect(i32::MIN, 0, 10, 10));
        r.shrink(-5, 0);
        assert_eq!(r, Region::from_rect(rect(i32::MIN, 0, 15, 10)));

        // Nothing lies left of i32::MIN, so only the right edge erodes.
        let mut r = Region::from_rect(rect(i32::MIN, 0, 100, 10));
        r.shrink(1, 0);
        assert_eq!(r, Region::from_rect(rect(i32::MIN, 0, 99, 10)));

        // Growing stops where the width no longer fits.
        let mut r = Region::from_rect(rect(0, 0, 10, 10));
        r.shrink(i32::MIN, 0);
        let grown = (i32::MAX - 10) / 2;
        assert_eq!(r, Region::from_rect(rect(-grown, 0, 10 + 2 * grown, 10)));
        assert!(r.point_in(0, 5) && r.point_in(9, 5));
    }

    #[test]
    fn polygon_edges_wider_than_i32() {
        // Both slanted edges cross almost the whole x axis in two rows.
        let points = [
            Point::new(i32::MIN, 0),
            Point::new(i32::MIN + 10, 0),
            Point::new(i32::MAX, 2),
            Point::new(i32::MAX - 10, 2),
        ];
        let r = Region::polygon(&points, FillRule::EvenOdd);
        assert_eq!(
            r,
            Region::from_rects([
                rect(-1_073_741_827, 0, 10, 1),
                rect(1_073_741_816, 1, 10, 1),
            ])
        );
        assert_eq!(area(&r), 20);
    }

    #[test]
    fn rect_in_classification() {
        let r = Region::from_rect(rect(0, 0, 10, 10));
        assert_eq!(r.rect_in(rect(2, 2, 3, 3)), OverlapType::In);
        assert_eq!(r.rect_in(rect(20, 20, 5, 5)), OverlapType::Out);
        assert_eq!(r.rect_in(rect(5, 5, 10, 10)), OverlapType::Part);
        assert_eq!(r.rect_in(rect(2, 2, 0, 3)), OverlapType::Out);
    }

    #[test]
    fn spans_are_clipped() {
        let r = Region::from_rects([rect(0, 0, 10, 10), rect(20, 0, 10, 10)]);
        let spans = [
            Span {
                x: -5,
                y: 3,
                width: 40,
            },
            Span {
                x: 0,
                y: 12,
                width: 40,
            },
        ];
        for sorted in [false, true] {
            let mut out = Vec::new();
            r.spans_intersect_foreach(&spans, sorted, |s| out.push(s));
            assert_eq!(
                out,
                vec![
                    Span {
                        x: 0,
                        y: 3,
                        width: 10
                    },
                    Span {
                        x: 20,
                        y: 3,
                        width: 10
                    },
                ]
            );
        }
    }
}
