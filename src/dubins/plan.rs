//! Timed Dubins arcs and the plans built from them

use crate::common::State;

/// How far into the future plans extend, in seconds. The planner samples
/// candidate states inside the disc reachable within this horizon.
pub const TIME_HORIZON: f64 = 30.0;

/// Spacing of the display samples produced by `DubinsPlan::half_second_samples`
const DISPLAY_SAMPLE_PERIOD: f64 = 0.5;

/// A single constant-curvature segment traversed at constant speed.
///
/// Curvature is signed radians per meter, positive turning left; zero is a
/// straight segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DubinsArc {
    pub start: State,
    pub curvature: f64,
    pub length: f64,
}

impl DubinsArc {
    pub fn duration(&self) -> f64 {
        if self.start.speed > 1e-9 {
            self.length / self.start.speed
        } else {
            f64::INFINITY
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start.time
    }

    pub fn end_time(&self) -> f64 {
        self.start.time + self.duration()
    }

    /// State after traveling `s` meters along the arc from its start
    pub fn state_at_length(&self, s: f64) -> State {
        let h0 = self.start.heading;
        if self.curvature.abs() < 1e-9 {
            State::new(
                self.start.x + h0.cos() * s,
                self.start.y + h0.sin() * s,
                h0,
                self.start.speed,
                self.start.time + s / self.start.speed.max(1e-9),
            )
        } else {
            let h1 = h0 + self.curvature * s;
            State::new(
                self.start.x + (h1.sin() - h0.sin()) / self.curvature,
                self.start.y - (h1.cos() - h0.cos()) / self.curvature,
                h1,
                self.start.speed,
                self.start.time + s / self.start.speed.max(1e-9),
            )
        }
    }

    /// State at absolute time `t`, which must lie within the arc's interval
    pub fn state_at_time(&self, t: f64) -> State {
        self.state_at_length((t - self.start.time) * self.start.speed)
    }

    pub fn end_state(&self) -> State {
        self.state_at_length(self.length)
    }

    pub fn contains_time(&self, t: f64) -> bool {
        t >= self.start.time - 1e-9 && t <= self.end_time() + 1e-9
    }
}

/// An ordered sequence of timed arcs, chained end-to-start.
#[derive(Debug, Clone, Default)]
pub struct DubinsPlan {
    arcs: Vec<DubinsArc>,
}

impl DubinsPlan {
    pub fn new() -> Self {
        Self { arcs: Vec::new() }
    }

    pub fn empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn get(&self) -> &[DubinsArc] {
        &self.arcs
    }

    pub fn append(&mut self, arc: DubinsArc) {
        self.arcs.push(arc);
    }

    pub fn extend(&mut self, arcs: impl IntoIterator<Item = DubinsArc>) {
        self.arcs.extend(arcs);
    }

    pub fn start_time(&self) -> f64 {
        self.arcs.first().map_or(-1.0, |a| a.start.time)
    }

    pub fn end_time(&self) -> f64 {
        self.arcs.last().map_or(-1.0, |a| a.end_time())
    }

    pub fn total_length(&self) -> f64 {
        self.arcs.iter().map(|a| a.length).sum()
    }

    /// Fill `state`'s position, heading and speed from the plan at
    /// `state.time`. Returns false when that time falls outside the plan,
    /// meaning the plan cannot be followed from the given state.
    pub fn sample(&self, state: &mut State) -> bool {
        let t = state.time;
        for arc in &self.arcs {
            if arc.contains_time(t) {
                let s = arc.state_at_time(t.clamp(arc.start.time, arc.end_time()));
                state.x = s.x;
                state.y = s.y;
                state.heading = s.heading;
                state.speed = s.speed;
                return true;
            }
        }
        false
    }

    /// Drop every arc entirely in the past of `t` and truncate the arc
    /// containing `t` so the plan starts there. A `t` at or before the plan
    /// start leaves the plan unchanged.
    pub fn change_into_suffix(&mut self, t: f64) {
        if self.empty() || t <= self.start_time() {
            return;
        }
        self.arcs.retain(|a| a.end_time() > t);
        if let Some(first) = self.arcs.first_mut() {
            if first.start.time < t {
                let consumed = (t - first.start.time) * first.start.speed;
                let new_start = first.state_at_length(consumed);
                first.length -= consumed;
                first.start = new_start;
            }
        }
    }

    /// Evenly spaced display samples, one every half second of plan time
    pub fn half_second_samples(&self) -> Vec<State> {
        let mut samples = Vec::new();
        if self.empty() {
            return samples;
        }
        let mut t = self.start_time();
        let end = self.end_time();
        while t < end {
            let mut s = State { time: t, ..State::default() };
            if self.sample(&mut s) {
                samples.push(s);
            }
            t += DISPLAY_SAMPLE_PERIOD;
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dubins::connect;

    fn straight_plan() -> DubinsPlan {
        let from = State::new(0.0, 0.0, 0.0, 2.0, 100.0);
        let mut plan = DubinsPlan::new();
        plan.extend(connect(&from, 20.0, 0.0, 0.0, 5.0).unwrap());
        plan
    }

    #[test]
    fn test_sample_at_start_returns_start() {
        let plan = straight_plan();
        let mut s = State { time: 100.0, ..State::default() };
        assert!(plan.sample(&mut s));
        assert!(s.distance_to(0.0, 0.0) < 1e-9);
        assert!(s.heading.abs() < 1e-9);
    }

    #[test]
    fn test_times_strictly_increase() {
        let from = State::new(0.0, 0.0, 1.0, 2.0, 7.0);
        let mut plan = DubinsPlan::new();
        plan.extend(connect(&from, 15.0, 12.0, 4.0, 4.0).unwrap());
        for pair in plan.get().windows(2) {
            assert!(pair[1].start.time >= pair[0].end_time() - 1e-9);
            assert!(pair[1].start.time > pair[0].start.time);
        }
        assert!((plan.start_time() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_suffix_noop_before_start() {
        let plan = straight_plan();
        let mut truncated = plan.clone();
        truncated.change_into_suffix(50.0);
        assert_eq!(truncated.get().len(), plan.get().len());
        assert!((truncated.total_length() - plan.total_length()).abs() < 1e-9);
        // idempotent at exactly the start time too
        truncated.change_into_suffix(plan.start_time());
        assert!((truncated.total_length() - plan.total_length()).abs() < 1e-9);
    }

    #[test]
    fn test_suffix_truncates_mid_arc() {
        let mut plan = straight_plan();
        // 20 m at 2 m/s starting at t=100 ends at t=110
        plan.change_into_suffix(105.0);
        assert!((plan.start_time() - 105.0).abs() < 1e-9);
        assert!((plan.total_length() - 10.0).abs() < 1e-9);
        let first = plan.get()[0];
        assert!((first.start.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_suffix_past_end_empties_plan() {
        let mut plan = straight_plan();
        plan.change_into_suffix(200.0);
        assert!(plan.empty());
    }

    #[test]
    fn test_half_second_samples_spacing() {
        let plan = straight_plan();
        let samples = plan.half_second_samples();
        assert_eq!(samples.len(), 20);
        assert!((samples[1].time - samples[0].time - 0.5).abs() < 1e-9);
        // samples advance along the heading
        assert!(samples[1].x > samples[0].x);
    }
}
