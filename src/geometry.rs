//! Geometry primitives: rectangles, coarse collision shapes, cubic
//! beziers and the rendered curve path.
//!
//! Everything works in page units with y growing downward, matching the
//! engraving coordinate convention used by the score model.

use glam::{DAffine2, DVec2, dvec2};

/// An axis-aligned rectangle stored as min/max corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        min: DVec2::ZERO,
        max: DVec2::ZERO,
    };

    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect {
            min: dvec2(x0, y0),
            max: dvec2(x1, y1),
        }
    }

    /// Build a normalized rectangle from two arbitrary corner points.
    pub fn from_corners(a: DVec2, b: DVec2) -> Rect {
        Rect {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn top(&self) -> f64 {
        self.min.y
    }

    pub fn bottom(&self) -> f64 {
        self.max.y
    }

    pub fn left(&self) -> f64 {
        self.min.x
    }

    pub fn right(&self) -> f64 {
        self.max.x
    }

    /// Grow symmetrically in y by `d` on each side.
    pub fn expand_vertical(&mut self, d: f64) {
        self.min.y -= d;
        self.max.y += d;
    }

    pub fn translated(&self, by: DVec2) -> Rect {
        Rect {
            min: self.min + by,
            max: self.max + by,
        }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Horizontal ranges overlap, regardless of vertical position.
    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.min.x < other.max.x && other.min.x < self.max.x
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// A coarse occupied-area approximation: an ordered list of small
/// rectangles. Used only for collision testing, never for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    rects: Vec<Rect>,
}

impl Shape {
    pub fn new() -> Shape {
        Shape::default()
    }

    pub fn add(&mut self, r: Rect) {
        self.rects.push(r);
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn translated(&self, by: DVec2) -> Shape {
        Shape {
            rects: self.rects.iter().map(|r| r.translated(by)).collect(),
        }
    }

    /// Bounding box of all member rectangles.
    pub fn bbox(&self) -> Rect {
        let mut it = self.rects.iter();
        let Some(first) = it.next() else {
            return Rect::ZERO;
        };
        it.fold(*first, |acc, r| acc.union(r))
    }

    /// Any pair of member rectangles overlaps.
    pub fn intersects(&self, other: &Shape) -> bool {
        self.rects
            .iter()
            .any(|a| other.rects.iter().any(|b| a.intersects(b)))
    }

    /// Minimum vertical distance this shape (above) must move up so that
    /// no rectangle reaches below the top of any horizontally-overlapping
    /// rectangle of `below`.
    ///
    /// Returns negative infinity when nothing overlaps horizontally; the
    /// caller's margin arithmetic keeps that non-actionable.
    pub fn min_vertical_distance(&self, below: &Shape) -> f64 {
        let mut dist = f64::NEG_INFINITY;
        for a in &self.rects {
            for b in &below.rects {
                if a.overlaps_horizontally(b) {
                    dist = dist.max(a.bottom() - b.top());
                }
            }
        }
        dist
    }
}

/// A cubic bezier in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub p0: DVec2,
    pub p1: DVec2,
    pub p2: DVec2,
    pub p3: DVec2,
}

impl CubicBezier {
    pub fn new(p0: DVec2, p1: DVec2, p2: DVec2, p3: DVec2) -> CubicBezier {
        CubicBezier { p0, p1, p2, p3 }
    }

    /// Evaluate the curve at parameter `t` in `[0, 1]` (Bernstein form).
    pub fn eval(&self, t: f64) -> DVec2 {
        let mt = 1.0 - t;
        self.p0 * (mt * mt * mt)
            + self.p1 * (3.0 * mt * mt * t)
            + self.p2 * (3.0 * mt * t * t)
            + self.p3 * (t * t * t)
    }

    /// Tight bounding box, including interior extrema of both axes.
    pub fn bounding_rect(&self) -> Rect {
        let mut bbox = Rect::from_corners(self.p0, self.p3);
        for t in self.extrema() {
            let p = self.eval(t);
            bbox = bbox.union(&Rect::from_corners(p, p));
        }
        bbox
    }

    /// Parameters in `(0, 1)` where dx/dt or dy/dt vanishes.
    fn extrema(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(4);
        let mut axis = |p0: f64, p1: f64, p2: f64, p3: f64| {
            // derivative coefficients of a t^2 + b t + c
            let a = 3.0 * (-p0 + 3.0 * p1 - 3.0 * p2 + p3);
            let b = 6.0 * (p0 - 2.0 * p1 + p2);
            let c = 3.0 * (p1 - p0);
            if a.abs() < 1e-12 {
                if b.abs() > 1e-12 {
                    let t = -c / b;
                    if t > 0.0 && t < 1.0 {
                        out.push(t);
                    }
                }
                return;
            }
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return;
            }
            let sqrt = disc.sqrt();
            for t in [(-b + sqrt) / (2.0 * a), (-b - sqrt) / (2.0 * a)] {
                if t > 0.0 && t < 1.0 {
                    out.push(t);
                }
            }
        };
        axis(self.p0.x, self.p1.x, self.p2.x, self.p3.x);
        axis(self.p0.y, self.p1.y, self.p2.y, self.p3.y);
        out
    }
}

/// A rendered curve path: a start point followed by cubic segments.
///
/// A solid connector holds two cubics (the forward arc and the tapered
/// return arc); dotted and dashed styles hold only the forward arc.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BezierPath {
    pub start: DVec2,
    pub curves: Vec<[DVec2; 3]>,
}

impl BezierPath {
    pub fn new(start: DVec2) -> BezierPath {
        BezierPath {
            start,
            curves: Vec::new(),
        }
    }

    pub fn cubic_to(&mut self, c1: DVec2, c2: DVec2, end: DVec2) {
        self.curves.push([c1, c2, end]);
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Apply an affine transform to every point of the path.
    pub fn transformed(&self, t: &DAffine2) -> BezierPath {
        BezierPath {
            start: t.transform_point2(self.start),
            curves: self
                .curves
                .iter()
                .map(|[a, b, c]| {
                    [
                        t.transform_point2(*a),
                        t.transform_point2(*b),
                        t.transform_point2(*c),
                    ]
                })
                .collect(),
        }
    }

    /// Tight bounding box over all cubic segments.
    pub fn bounding_rect(&self) -> Rect {
        let mut bbox: Option<Rect> = None;
        let mut prev = self.start;
        for [c1, c2, end] in &self.curves {
            let seg = CubicBezier::new(prev, *c1, *c2, *end).bounding_rect();
            bbox = Some(match bbox {
                Some(b) => b.union(&seg),
                None => seg,
            });
            prev = *end;
        }
        bbox.unwrap_or(Rect::ZERO)
    }

    /// SVG path-data string (`M ... C ...`) for renderers.
    pub fn to_svg_path(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        if self.is_empty() {
            return out;
        }
        let _ = write!(out, "M{},{}", fmt_coord(self.start.x), fmt_coord(self.start.y));
        for [c1, c2, end] in &self.curves {
            let _ = write!(
                out,
                " C{},{} {},{} {},{}",
                fmt_coord(c1.x),
                fmt_coord(c1.y),
                fmt_coord(c2.x),
                fmt_coord(c2.y),
                fmt_coord(end.x),
                fmt_coord(end.y)
            );
        }
        out
    }
}

/// Trim trailing zeros so path output stays stable across platforms.
fn fmt_coord(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}
