//! Dubins shortest paths between oriented states
//!
//! A Dubins path is the shortest path for a vehicle with a minimum turning
//! radius that can only move forward. It is composed of at most three
//! segments, each a circular arc (L/R) or a straight line (S). This module
//! computes the shortest of the six candidate words (LSL, RSR, LSR, RSL,
//! RLR, LRL) and materializes it as timed arcs for the planner.

pub mod plan;

pub use plan::{DubinsArc, DubinsPlan};

use crate::common::State;
use std::f64::consts::PI;

/// Segment curvature sense within a Dubins word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Left,
    Straight,
    Right,
}

impl Turn {
    fn curvature(self, rho: f64) -> f64 {
        match self {
            Turn::Left => 1.0 / rho,
            Turn::Straight => 0.0,
            Turn::Right => -1.0 / rho,
        }
    }
}

fn mod2pi(a: f64) -> f64 {
    let mut a = a % (2.0 * PI);
    if a < 0.0 {
        a += 2.0 * PI;
    }
    a
}

/// One feasible word in the normalized frame (segment lengths are in units
/// of the turning radius).
#[derive(Debug, Clone, Copy)]
struct Word {
    lengths: [f64; 3],
    turns: [Turn; 3],
}

impl Word {
    fn total(&self) -> f64 {
        self.lengths[0] + self.lengths[1] + self.lengths[2]
    }
}

fn lsl(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let p_sq = 2.0 + d * d - 2.0 * (alpha - beta).cos() + 2.0 * d * (sa - sb);
    if p_sq < 0.0 {
        return None;
    }
    let tmp = (cb - ca).atan2(d + sa - sb);
    Some(Word {
        lengths: [mod2pi(tmp - alpha), p_sq.sqrt(), mod2pi(beta - tmp)],
        turns: [Turn::Left, Turn::Straight, Turn::Left],
    })
}

fn rsr(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let p_sq = 2.0 + d * d - 2.0 * (alpha - beta).cos() + 2.0 * d * (sb - sa);
    if p_sq < 0.0 {
        return None;
    }
    let tmp = (ca - cb).atan2(d - sa + sb);
    Some(Word {
        lengths: [mod2pi(alpha - tmp), p_sq.sqrt(), mod2pi(tmp - beta)],
        turns: [Turn::Right, Turn::Straight, Turn::Right],
    })
}

fn lsr(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let p_sq = -2.0 + d * d + 2.0 * (alpha - beta).cos() + 2.0 * d * (sa + sb);
    if p_sq < 0.0 {
        return None;
    }
    let p = p_sq.sqrt();
    let tmp = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
    Some(Word {
        lengths: [mod2pi(tmp - alpha), p, mod2pi(tmp - mod2pi(beta))],
        turns: [Turn::Left, Turn::Straight, Turn::Right],
    })
}

fn rsl(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let p_sq = -2.0 + d * d + 2.0 * (alpha - beta).cos() - 2.0 * d * (sa + sb);
    if p_sq < 0.0 {
        return None;
    }
    let p = p_sq.sqrt();
    let tmp = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
    Some(Word {
        lengths: [mod2pi(alpha - tmp), p, mod2pi(beta - tmp)],
        turns: [Turn::Right, Turn::Straight, Turn::Left],
    })
}

fn rlr(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let tmp = (6.0 - d * d + 2.0 * (alpha - beta).cos() + 2.0 * d * (sa - sb)) / 8.0;
    if tmp.abs() > 1.0 {
        return None;
    }
    let phi = (ca - cb).atan2(d - sa + sb);
    let p = mod2pi(2.0 * PI - tmp.acos());
    let t = mod2pi(alpha - phi + mod2pi(p / 2.0));
    Some(Word {
        lengths: [t, p, mod2pi(alpha - beta - t + mod2pi(p))],
        turns: [Turn::Right, Turn::Left, Turn::Right],
    })
}

fn lrl(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let tmp = (6.0 - d * d + 2.0 * (alpha - beta).cos() + 2.0 * d * (sb - sa)) / 8.0;
    if tmp.abs() > 1.0 {
        return None;
    }
    let phi = (ca - cb).atan2(d + sa - sb);
    let p = mod2pi(2.0 * PI - tmp.acos());
    let t = mod2pi(-alpha - phi + p / 2.0);
    Some(Word {
        lengths: [t, p, mod2pi(mod2pi(beta) - alpha - t + mod2pi(p))],
        turns: [Turn::Left, Turn::Right, Turn::Left],
    })
}

fn shortest_word(d: f64, alpha: f64, beta: f64) -> Option<Word> {
    let candidates = [
        lsl(d, alpha, beta),
        rsr(d, alpha, beta),
        lsr(d, alpha, beta),
        rsl(d, alpha, beta),
        rlr(d, alpha, beta),
        lrl(d, alpha, beta),
    ];
    candidates
        .into_iter()
        .flatten()
        .min_by(|a, b| a.total().partial_cmp(&b.total()).unwrap_or(std::cmp::Ordering::Equal))
}

fn normalize(from_x: f64, from_y: f64, from_h: f64, to_x: f64, to_y: f64, to_h: f64, rho: f64) -> (f64, f64, f64) {
    let dx = to_x - from_x;
    let dy = to_y - from_y;
    let d = (dx * dx + dy * dy).sqrt() / rho;
    let phi = dy.atan2(dx);
    (d, mod2pi(from_h - phi), mod2pi(to_h - phi))
}

/// Length in meters of the shortest Dubins path between two oriented points
pub fn path_length(from_x: f64, from_y: f64, from_h: f64, to_x: f64, to_y: f64, to_h: f64, rho: f64) -> f64 {
    let (d, alpha, beta) = normalize(from_x, from_y, from_h, to_x, to_y, to_h, rho);
    match shortest_word(d, alpha, beta) {
        Some(word) => word.total() * rho,
        None => f64::INFINITY,
    }
}

/// Build the timed arcs of the shortest Dubins connection from `from` to the
/// oriented point (x, y, heading), traversed at `from.speed`.
///
/// Arc times chain from `from.time`. Zero-length segments are dropped.
pub fn connect(from: &State, x: f64, y: f64, heading: f64, rho: f64) -> Option<Vec<DubinsArc>> {
    let (d, alpha, beta) = normalize(from.x, from.y, from.heading, x, y, heading, rho);
    let word = shortest_word(d, alpha, beta)?;
    let mut arcs = Vec::with_capacity(3);
    let mut cursor = *from;
    for i in 0..3 {
        let length = word.lengths[i] * rho;
        if length < 1e-9 {
            continue;
        }
        let arc = DubinsArc {
            start: cursor,
            curvature: word.turns[i].curvature(rho),
            length,
        };
        cursor = arc.end_state();
        arcs.push(arc);
    }
    Some(arcs)
}
