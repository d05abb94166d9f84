//! Survey ribbons and coverage accounting
//!
//! A ribbon is a linear survey segment of nonzero width. Coverage is
//! recorded as merged sub-intervals of the ribbon's arc length, so partial
//! passes shrink the remaining work without splitting the ribbon into new
//! objects.

pub mod manager;

pub use manager::{Heuristic, RibbonManager};

use crate::common::{Point2D, State};

/// Default coverage width in meters, overridden through `set_configuration`
pub const DEFAULT_RIBBON_WIDTH: f64 = 2.0;

/// One survey line with its covered sub-intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct Ribbon {
    start: Point2D,
    end: Point2D,
    width: f64,
    /// Sorted, merged, non-overlapping intervals of [0, length]
    covered: Vec<(f64, f64)>,
}

impl Ribbon {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, width: f64) -> Self {
        Self {
            start: Point2D::new(x1, y1),
            end: Point2D::new(x2, y2),
            width,
            covered: Vec::new(),
        }
    }

    pub fn start(&self) -> Point2D {
        self.start
    }

    pub fn end(&self) -> Point2D {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Heading along the ribbon from start to end
    pub fn direction(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }

    /// Point at arc-length parameter `t` in [0, length]
    pub fn point_at(&self, t: f64) -> Point2D {
        let len = self.length();
        let frac = if len > 1e-9 { (t / len).clamp(0.0, 1.0) } else { 0.0 };
        Point2D::new(
            self.start.x + (self.end.x - self.start.x) * frac,
            self.start.y + (self.end.y - self.start.y) * frac,
        )
    }

    /// Projection of (x, y) onto the segment: (clamped arc-length parameter,
    /// distance from the point to the clamped projection)
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        let len = self.length();
        if len < 1e-9 {
            return (0.0, self.start.distance(&Point2D::new(x, y)));
        }
        let dx = (self.end.x - self.start.x) / len;
        let dy = (self.end.y - self.start.y) / len;
        let t = ((x - self.start.x) * dx + (y - self.start.y) * dy).clamp(0.0, len);
        let p = self.point_at(t);
        (t, p.distance(&Point2D::new(x, y)))
    }

    /// Mark [a, b] (clamped to the ribbon) as covered, merging intervals
    pub fn cover_interval(&mut self, a: f64, b: f64) {
        let len = self.length();
        let (mut a, mut b) = (a.max(0.0), b.min(len));
        if b <= a {
            return;
        }
        let mut merged = Vec::with_capacity(self.covered.len() + 1);
        for &(s, e) in &self.covered {
            if e < a {
                merged.push((s, e));
            } else if s > b {
                if b > a {
                    merged.push((a, b));
                    a = f64::INFINITY;
                    b = f64::NEG_INFINITY;
                }
                merged.push((s, e));
            } else {
                a = a.min(s);
                b = b.max(e);
            }
        }
        if b > a {
            merged.push((a, b));
        }
        self.covered = merged;
    }

    /// Cover around the projection of (x, y) when it lies within width/2.
    /// Returns whether anything was covered.
    pub fn cover_point(&mut self, x: f64, y: f64) -> bool {
        let (t, dist) = self.project(x, y);
        if dist <= self.width / 2.0 {
            self.cover_interval(t - self.width / 2.0, t + self.width / 2.0);
            true
        } else {
            false
        }
    }

    pub fn covered_length(&self) -> f64 {
        self.covered.iter().map(|(s, e)| e - s).sum()
    }

    pub fn remaining_length(&self) -> f64 {
        (self.length() - self.covered_length()).max(0.0)
    }

    pub fn done(&self) -> bool {
        self.remaining_length() < 1e-6
    }

    /// Maximal uncovered runs as (start, end) arc-length intervals
    pub fn uncovered_intervals(&self) -> Vec<(f64, f64)> {
        let len = self.length();
        let mut out = Vec::new();
        let mut cursor = 0.0;
        for &(s, e) in &self.covered {
            if s > cursor + 1e-9 {
                out.push((cursor, s));
            }
            cursor = cursor.max(e);
        }
        if cursor < len - 1e-9 {
            out.push((cursor, len));
        }
        out
    }
}

/// An uncovered straight run, extracted from ribbons for heuristic work.
#[derive(Debug, Clone, Copy)]
pub struct UncoveredSegment {
    pub start: Point2D,
    pub end: Point2D,
}

impl UncoveredSegment {
    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    pub fn direction(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }

    /// Candidate state at parameter `t`, heading toward whichever end has
    /// the longer remaining run
    pub fn state_at(&self, t: f64) -> State {
        let len = self.length();
        let frac = if len > 1e-9 { (t / len).clamp(0.0, 1.0) } else { 0.0 };
        let x = self.start.x + (self.end.x - self.start.x) * frac;
        let y = self.start.y + (self.end.y - self.start.y) * frac;
        let heading = if len - t >= t {
            self.direction()
        } else {
            self.direction() + std::f64::consts::PI
        };
        State::new(x, y, heading, 0.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_point_within_width() {
        let mut r = Ribbon::new(0.0, 0.0, 10.0, 0.0, 2.0);
        assert!(r.cover_point(5.0, 0.5));
        assert!(!r.cover_point(5.0, 3.0));
        assert!((r.covered_length() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cover_interval_merges() {
        let mut r = Ribbon::new(0.0, 0.0, 10.0, 0.0, 2.0);
        r.cover_interval(1.0, 3.0);
        r.cover_interval(6.0, 8.0);
        assert_eq!(r.uncovered_intervals().len(), 3);
        r.cover_interval(2.0, 7.0);
        assert_eq!(r.uncovered_intervals().len(), 2);
        assert!((r.covered_length() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_done_after_full_cover() {
        let mut r = Ribbon::new(0.0, 0.0, 4.0, 0.0, 2.0);
        assert!(!r.done());
        r.cover_interval(0.0, 4.0);
        assert!(r.done());
        assert!(r.uncovered_intervals().is_empty());
    }

    #[test]
    fn test_project_clamps_to_segment() {
        let r = Ribbon::new(0.0, 0.0, 10.0, 0.0, 2.0);
        let (t, dist) = r.project(-3.0, 4.0);
        assert!(t.abs() < 1e-9);
        assert!((dist - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_state_heading_points_along_longer_run() {
        let seg = UncoveredSegment {
            start: Point2D::new(0.0, 0.0),
            end: Point2D::new(10.0, 0.0),
        };
        let near_start = seg.state_at(1.0);
        assert!(near_start.heading.abs() < 1e-9);
        let near_end = seg.state_at(9.0);
        assert!((near_end.heading - std::f64::consts::PI).abs() < 1e-9);
    }
}
