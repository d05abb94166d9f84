//! Ribbon bookkeeping and the coverage distance heuristics

use itertools::Itertools;

use crate::common::{Point2D, State};
use crate::dubins;
use crate::ribbons::{Ribbon, UncoveredSegment, DEFAULT_RIBBON_WIDTH};

/// Above this many uncovered runs the exhaustive TSP heuristics are
/// downgraded to their K-nearest counterparts
const TSP_SEGMENT_LIMIT: usize = 6;

/// Coverage distance heuristics, in the order exposed to configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    MaxDistance,
    TspPointNoSplitAllRibbons,
    TspPointNoSplitKRibbons,
    TspDubinsNoSplitAllRibbons,
    TspDubinsNoSplitKRibbons,
}

impl Heuristic {
    /// Map a configuration index to a heuristic. Unknown indices yield None.
    pub fn from_index(index: i32) -> Option<Heuristic> {
        match index {
            0 => Some(Heuristic::MaxDistance),
            1 => Some(Heuristic::TspPointNoSplitAllRibbons),
            2 => Some(Heuristic::TspPointNoSplitKRibbons),
            3 => Some(Heuristic::TspDubinsNoSplitAllRibbons),
            4 => Some(Heuristic::TspDubinsNoSplitKRibbons),
            _ => None,
        }
    }
}

/// The set of uncovered survey ribbons plus the heuristic used to estimate
/// the remaining tour length from a query state.
///
/// The manager is deep-copied (`Clone`) into every planning iteration; the
/// search mutates coverage on its own copies only.
#[derive(Debug, Clone)]
pub struct RibbonManager {
    ribbons: Vec<Ribbon>,
    heuristic: Heuristic,
    /// Turning radius used by the Dubins-metric heuristics
    turning_radius: f64,
    /// Branch limit for the K-ribbons heuristics
    k: usize,
    ribbon_width: f64,
}

impl RibbonManager {
    pub fn new(heuristic: Heuristic, turning_radius: f64, k: usize) -> Self {
        Self {
            ribbons: Vec::new(),
            heuristic,
            turning_radius,
            k: k.max(1),
            ribbon_width: DEFAULT_RIBBON_WIDTH,
        }
    }

    pub fn add(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let ribbon = Ribbon::new(x1, y1, x2, y2, self.ribbon_width);
        if ribbon.length() < 1e-6 {
            log::warn!("Ignoring zero-length ribbon at ({}, {})", x1, y1);
            return;
        }
        self.ribbons.push(ribbon);
    }

    pub fn ribbons(&self) -> &[Ribbon] {
        &self.ribbons
    }

    pub fn done(&self) -> bool {
        self.ribbons.iter().all(|r| r.done())
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    pub fn set_heuristic(&mut self, heuristic: Heuristic) {
        self.heuristic = heuristic;
    }

    pub fn turning_radius(&self) -> f64 {
        self.turning_radius
    }

    pub fn set_turning_radius(&mut self, radius: f64) {
        self.turning_radius = radius;
    }

    pub fn ribbon_width(&self) -> f64 {
        self.ribbon_width
    }

    pub fn set_ribbon_width(&mut self, width: f64) {
        self.ribbon_width = width;
        for ribbon in &mut self.ribbons {
            ribbon.set_width(width);
        }
    }

    /// Keep the heuristic evaluation bounded: the exhaustive TSP variants
    /// blow up factorially, so past the segment limit they drop to the
    /// K-nearest versions.
    pub fn change_heuristic_if_too_many_ribbons(&mut self) {
        if self.uncovered_segments().len() <= TSP_SEGMENT_LIMIT {
            return;
        }
        match self.heuristic {
            Heuristic::TspPointNoSplitAllRibbons => {
                self.heuristic = Heuristic::TspPointNoSplitKRibbons;
            }
            Heuristic::TspDubinsNoSplitAllRibbons => {
                self.heuristic = Heuristic::TspDubinsNoSplitKRibbons;
            }
            _ => {}
        }
    }

    /// Mark (x, y) covered on the nearest ribbon whose corridor contains it
    pub fn cover(&mut self, x: f64, y: f64) {
        let mut nearest: Option<(usize, f64)> = None;
        for (i, ribbon) in self.ribbons.iter().enumerate() {
            if ribbon.done() {
                continue;
            }
            let (_, dist) = ribbon.project(x, y);
            if nearest.map_or(true, |(_, best)| dist < best) {
                nearest = Some((i, dist));
            }
        }
        if let Some((i, _)) = nearest {
            self.ribbons[i].cover_point(x, y);
        }
        self.ribbons.retain(|r| !r.done());
    }

    /// Sweep coverage along the segment from (x1, y1) to (x2, y2)
    pub fn cover_between(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let length = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        let step = (self.ribbon_width / 4.0).max(1e-3);
        let steps = (length / step).ceil() as usize;
        for i in 0..=steps {
            let frac = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            self.cover(x1 + (x2 - x1) * frac, y1 + (y2 - y1) * frac);
        }
    }

    pub fn total_uncovered_length(&self) -> f64 {
        self.ribbons.iter().map(|r| r.remaining_length()).sum()
    }

    /// All maximal uncovered runs across ribbons
    pub fn uncovered_segments(&self) -> Vec<UncoveredSegment> {
        let mut segments = Vec::new();
        for ribbon in &self.ribbons {
            for (a, b) in ribbon.uncovered_intervals() {
                segments.push(UncoveredSegment {
                    start: ribbon.point_at(a),
                    end: ribbon.point_at(b),
                });
            }
        }
        segments
    }

    /// Heading-aligned candidate states where the circle of `radius` around
    /// `state` crosses an uncovered run
    pub fn find_states_on_ribbons_on_circle(&self, state: &State, radius: f64) -> Vec<State> {
        let mut states = Vec::new();
        if radius <= 0.0 {
            return states;
        }
        for seg in self.uncovered_segments() {
            let len = seg.length();
            if len < 1e-9 {
                continue;
            }
            let ux = (seg.end.x - seg.start.x) / len;
            let uy = (seg.end.y - seg.start.y) / len;
            let wx = seg.start.x - state.x;
            let wy = seg.start.y - state.y;
            let b = wx * ux + wy * uy;
            let c = wx * wx + wy * wy - radius * radius;
            let disc = b * b - c;
            if disc < 0.0 {
                continue;
            }
            let sqrt_disc = disc.sqrt();
            for t in [-b - sqrt_disc, -b + sqrt_disc] {
                if t >= 0.0 && t <= len {
                    states.push(seg.state_at(t));
                }
            }
        }
        states
    }

    /// Candidate states at the nearest uncovered point of each run within
    /// `radius` of `state`
    pub fn find_near_states_on_ribbons(&self, state: &State, radius: f64) -> Vec<State> {
        let mut states = Vec::new();
        if radius <= 0.0 {
            return states;
        }
        for seg in self.uncovered_segments() {
            let len = seg.length();
            if len < 1e-9 {
                continue;
            }
            let ux = (seg.end.x - seg.start.x) / len;
            let uy = (seg.end.y - seg.start.y) / len;
            let t = ((state.x - seg.start.x) * ux + (state.y - seg.start.y) * uy).clamp(0.0, len);
            let candidate = seg.state_at(t);
            if state.distance(&candidate) <= radius {
                states.push(candidate);
            }
        }
        states
    }

    /// Estimated distance remaining to cover every ribbon, starting from the
    /// given pose. This is the search's h, in meters.
    pub fn approximate_distance_until_done(&self, x: f64, y: f64, heading: f64) -> f64 {
        let segments = self.uncovered_segments();
        if segments.is_empty() {
            return 0.0;
        }
        match self.heuristic {
            Heuristic::MaxDistance => Self::max_distance(&segments, x, y),
            Heuristic::TspPointNoSplitAllRibbons => {
                self.tsp_point(&segments, 0, Point2D::new(x, y))
            }
            Heuristic::TspPointNoSplitKRibbons => {
                let near = Self::k_nearest(&segments, Point2D::new(x, y), self.k);
                self.tsp_point(&near, 0, Point2D::new(x, y))
            }
            Heuristic::TspDubinsNoSplitAllRibbons => self.tsp_dubins(&segments, 0, x, y, heading),
            Heuristic::TspDubinsNoSplitKRibbons => {
                let near = Self::k_nearest(&segments, Point2D::new(x, y), self.k);
                self.tsp_dubins(&near, 0, x, y, heading)
            }
        }
    }

    fn max_distance(segments: &[UncoveredSegment], x: f64, y: f64) -> f64 {
        let query = Point2D::new(x, y);
        segments
            .iter()
            .flat_map(|s| [s.start, s.end])
            .map(|p| p.distance(&query))
            .fold(0.0, f64::max)
    }

    /// The K runs nearest to `from` by closest endpoint; the tour is solved
    /// exhaustively on this truncated set
    fn k_nearest(segments: &[UncoveredSegment], from: Point2D, k: usize) -> Vec<UncoveredSegment> {
        segments
            .iter()
            .copied()
            .sorted_by(|a, b| {
                let da = a.start.distance(&from).min(a.end.distance(&from));
                let db = b.start.distance(&from).min(b.end.distance(&from));
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .take(k)
            .collect()
    }

    /// Exhaustive tour over uncovered runs under the straight-line metric,
    /// choosing the entry endpoint per run
    fn tsp_point(&self, segments: &[UncoveredSegment], visited: u64, from: Point2D) -> f64 {
        let mut best = f64::INFINITY;
        let mut exhausted = true;
        for (i, seg) in segments.iter().enumerate() {
            if visited & (1u64 << i) != 0 {
                continue;
            }
            exhausted = false;
            for (entry, exit) in [(seg.start, seg.end), (seg.end, seg.start)] {
                let cost = from.distance(&entry)
                    + seg.length()
                    + self.tsp_point(segments, visited | (1u64 << i), exit);
                if cost < best {
                    best = cost;
                }
            }
        }
        if exhausted {
            0.0
        } else {
            best
        }
    }

    /// Same tour, but legs are priced with the Dubins metric at the
    /// manager's turning radius so heading matters
    fn tsp_dubins(
        &self,
        segments: &[UncoveredSegment],
        visited: u64,
        x: f64,
        y: f64,
        heading: f64,
    ) -> f64 {
        let mut best = f64::INFINITY;
        let mut exhausted = true;
        for (i, seg) in segments.iter().enumerate() {
            if visited & (1u64 << i) != 0 {
                continue;
            }
            exhausted = false;
            let forward = seg.direction();
            let backward = forward + std::f64::consts::PI;
            for (entry, exit, entry_heading) in [
                (seg.start, seg.end, forward),
                (seg.end, seg.start, backward),
            ] {
                let leg = dubins::path_length(
                    x,
                    y,
                    heading,
                    entry.x,
                    entry.y,
                    entry_heading,
                    self.turning_radius.max(1e-3),
                );
                let cost = leg
                    + seg.length()
                    + self.tsp_dubins(segments, visited | (1u64 << i), exit.x, exit.y, entry_heading);
                if cost < best {
                    best = cost;
                }
            }
        }
        if exhausted {
            0.0
        } else {
            best
        }
    }
}

impl Default for RibbonManager {
    fn default() -> Self {
        Self::new(Heuristic::TspPointNoSplitKRibbons, 8.0, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RibbonManager {
        RibbonManager::new(Heuristic::MaxDistance, 8.0, 2)
    }

    #[test]
    fn test_empty_manager_is_done() {
        assert!(manager().done());
        assert!((manager().approximate_distance_until_done(0.0, 0.0, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn test_cover_removes_finished_ribbons() {
        let mut m = manager();
        m.add(0.0, 0.0, 1.0, 0.0);
        m.cover(0.5, 0.0);
        assert!(m.done());
        assert!(m.ribbons().is_empty());
    }

    #[test]
    fn test_cover_only_touches_nearest_ribbon() {
        let mut m = manager();
        m.add(0.0, 0.0, 10.0, 0.0);
        m.add(0.0, 1.5, 10.0, 1.5);
        m.cover(5.0, 0.25);
        let uncovered: f64 = m.total_uncovered_length();
        // one width-sized bite out of twenty meters
        assert!((uncovered - (20.0 - DEFAULT_RIBBON_WIDTH)).abs() < 1e-6);
    }

    #[test]
    fn test_cover_between_sweeps_whole_run() {
        let mut m = manager();
        m.add(0.0, 0.0, 10.0, 0.0);
        m.cover_between(-1.0, 0.0, 11.0, 0.0);
        assert!(m.done());
    }

    #[test]
    fn test_done_monotonic_between_mutations() {
        let mut m = manager();
        m.add(0.0, 0.0, 2.0, 0.0);
        m.cover_between(0.0, 0.0, 2.0, 0.0);
        assert!(m.done());
        assert!(m.done());
        m.add(5.0, 5.0, 6.0, 5.0);
        assert!(!m.done());
    }

    #[test]
    fn test_heuristic_from_index_roundtrip() {
        for i in 0..5 {
            let h = Heuristic::from_index(i).unwrap();
            let mut m = manager();
            m.set_heuristic(h);
            assert_eq!(m.heuristic(), h);
        }
        assert!(Heuristic::from_index(5).is_none());
        assert!(Heuristic::from_index(-1).is_none());
    }

    #[test]
    fn test_max_distance_heuristic_value() {
        let mut m = manager();
        m.add(3.0, 4.0, 6.0, 8.0);
        let h = m.approximate_distance_until_done(0.0, 0.0, 0.0);
        assert!((h - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_tsp_point_single_ribbon() {
        let mut m = manager();
        m.set_heuristic(Heuristic::TspPointNoSplitAllRibbons);
        m.add(10.0, 0.0, 20.0, 0.0);
        // enter at the near endpoint, traverse the length
        let h = m.approximate_distance_until_done(0.0, 0.0, 0.0);
        assert!((h - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_tsp_point_orders_two_ribbons() {
        let mut m = manager();
        m.set_heuristic(Heuristic::TspPointNoSplitAllRibbons);
        m.add(2.0, 0.0, 4.0, 0.0);
        m.add(10.0, 0.0, 12.0, 0.0);
        // near first: 2 + 2 + 6 + 2 = 12
        let h = m.approximate_distance_until_done(0.0, 0.0, 0.0);
        assert!((h - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_tsp_dubins_at_least_point_metric() {
        let mut point = manager();
        point.set_heuristic(Heuristic::TspPointNoSplitAllRibbons);
        point.add(10.0, 5.0, 20.0, 5.0);
        let mut dub = point.clone();
        dub.set_heuristic(Heuristic::TspDubinsNoSplitAllRibbons);
        let hp = point.approximate_distance_until_done(0.0, 0.0, 0.0);
        let hd = dub.approximate_distance_until_done(0.0, 0.0, 0.0);
        assert!(hd >= hp - 1e-9);
    }

    #[test]
    fn test_heuristic_downgrades_when_crowded() {
        let mut m = manager();
        m.set_heuristic(Heuristic::TspDubinsNoSplitAllRibbons);
        for i in 0..8 {
            m.add(0.0, i as f64 * 3.0, 10.0, i as f64 * 3.0);
        }
        m.change_heuristic_if_too_many_ribbons();
        assert_eq!(m.heuristic(), Heuristic::TspDubinsNoSplitKRibbons);
    }

    #[test]
    fn test_states_on_circle_horizontal_ribbon() {
        let mut m = manager();
        m.add(-10.0, 0.0, 10.0, 0.0);
        let query = State::new(0.0, 0.0, 0.0, 0.0, 0.0);
        let states = m.find_states_on_ribbons_on_circle(&query, 5.0);
        assert_eq!(states.len(), 2);
        for s in &states {
            assert!((s.distance(&query) - 5.0).abs() < 1e-6);
            assert!(s.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_near_states_within_radius_only() {
        let mut m = manager();
        m.add(0.0, 3.0, 10.0, 3.0);
        let query = State::new(5.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(m.find_near_states_on_ribbons(&query, 4.0).len(), 1);
        assert!(m.find_near_states_on_ribbons(&query, 2.0).is_empty());
    }

    #[test]
    fn test_clone_isolated_from_original() {
        let mut m = manager();
        m.add(0.0, 0.0, 10.0, 0.0);
        let snapshot = m.clone();
        m.cover_between(0.0, 0.0, 10.0, 0.0);
        assert!(m.done());
        assert!(!snapshot.done());
    }
}
