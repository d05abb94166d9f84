//! Anytime Dubins A* search over sampled states

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::{PlannerResult, State};
use crate::dubins::plan::TIME_HORIZON;
use crate::dubins::DubinsPlan;
use crate::planner::config::PlannerConfig;
use crate::planner::vertex::{self, Vertex};
use crate::planner::INITIAL_SAMPLES;
use crate::ribbons::RibbonManager;

/// Min-f entry for the open set; ties break toward the smaller h
#[derive(Debug)]
struct QueueEntry {
    f: OrderedFloat<f64>,
    h: OrderedFloat<f64>,
    index: usize,
}

impl Eq for QueueEntry {}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.h == other.h
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other.f.cmp(&self.f).then(other.h.cmp(&self.h))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Uniform sampler over the disc of states reachable within the planning
/// horizon, deterministic for a given seed
struct StateGenerator {
    rng: StdRng,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    speed: f64,
}

impl StateGenerator {
    fn new(center: &State, magnitude: f64, speed: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min_x: center.x - magnitude,
            max_x: center.x + magnitude,
            min_y: center.y - magnitude,
            max_y: center.y + magnitude,
            speed,
        }
    }

    fn generate(&mut self) -> State {
        State::new(
            self.rng.gen_range(self.min_x..=self.max_x),
            self.rng.gen_range(self.min_y..=self.max_y),
            self.rng.gen_range(0.0..std::f64::consts::TAU),
            self.speed,
            -1.0,
        )
    }
}

/// Anytime Dubins A* planner. Scratch state lives on the struct so a
/// long-lived planner reuses its allocations across iterations.
#[derive(Default)]
pub struct AStarPlanner {
    arena: Vec<Vertex>,
    samples: Vec<State>,
    open: BinaryHeap<QueueEntry>,
    best: Option<usize>,
    expanded_count: usize,
}

impl AStarPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search for the best trajectory reachable before the deadline.
    ///
    /// Returns an empty plan only when no feasible goal-reaching path was
    /// found in time. A non-empty `previous_plan` that is still feasible
    /// under the current obstacles and map seeds the search as a warm
    /// start.
    pub fn plan(
        &mut self,
        ribbons: RibbonManager,
        start: &State,
        config: PlannerConfig,
        previous_plan: &DubinsPlan,
        time_remaining: f64,
    ) -> PlannerResult<DubinsPlan> {
        config.validate()?;
        let end_time = config.now() + time_remaining;

        let mut ribbons = ribbons;
        ribbons.change_heuristic_if_too_many_ribbons();
        ribbons.set_turning_radius(if config.coverage_turning_radius > 0.0 {
            config.coverage_turning_radius
        } else {
            config.turning_radius
        });

        self.arena.clear();
        self.samples.clear();
        self.open.clear();
        self.best = None;
        self.expanded_count = 0;
        let mut iteration_count = 0usize;

        let magnitude = config.max_speed * TIME_HORIZON;
        let mut generator = StateGenerator::new(start, magnitude, config.max_speed, config.sample_seed);

        let start_index = Vertex::make_root(&mut self.arena, *start, ribbons.clone(), &config);
        let ribbon_samples =
            ribbons.find_states_on_ribbons_on_circle(start, config.coverage_turning_radius * 2.0 + 1.0);
        let near_samples = ribbons.find_near_states_on_ribbons(start, config.coverage_turning_radius);

        // collision check the old plan under the current world
        let mut last_plan_end = start_index;
        for arc in previous_plan.get() {
            match vertex::connect_arc(&mut self.arena, last_plan_end, *arc, &config) {
                Some(idx) => last_plan_end = idx,
                None => {
                    last_plan_end = start_index;
                    break;
                }
            }
        }

        while config.now() < end_time {
            self.open.clear();
            if let Some(best) = self.best {
                if self.arena[best].f() <= self.arena[start_index].f() {
                    log::debug!("Found best possible plan, assuming heuristic admissibility");
                    break;
                }
            }
            self.visualize(start_index, &config, "start");
            self.push(start_index);
            if last_plan_end != start_index {
                self.push(last_plan_end);
            }
            // expand the start manually toward states on nearby ribbons far
            // enough out that the vehicle does not have to loop around
            if config.coverage_turning_radius > 0.0 {
                for sample in ribbon_samples.iter().chain(near_samples.iter()) {
                    if let Some(child) = vertex::connect(
                        &mut self.arena,
                        start_index,
                        sample,
                        config.coverage_turning_radius,
                        true,
                        &config,
                    ) {
                        self.push(child);
                    }
                }
            }
            if self.samples.len() < INITIAL_SAMPLES {
                while self.samples.len() < INITIAL_SAMPLES {
                    self.samples.push(generator.generate());
                }
            } else {
                for _ in 0..INITIAL_SAMPLES {
                    self.samples.push(generator.generate());
                }
            }
            if let Some(found) = self.search(&config, end_time) {
                let improved = self
                    .best
                    .map_or(true, |best| self.arena[found].f() < self.arena[best].f());
                if improved {
                    self.best = Some(found);
                    self.visualize(found, &config, "goal");
                }
            }
            iteration_count += 1;
        }

        log::debug!(
            "{} total samples, {} expanded in {} iterations",
            self.samples.len(),
            self.expanded_count,
            iteration_count
        );
        match self.best {
            Some(best) => Ok(vertex::trace_plan(&self.arena, best)),
            None => {
                log::debug!("Failed to find a plan");
                Ok(DubinsPlan::new())
            }
        }
    }

    /// Inner A*: pop min-f vertices until the deadline, a goal better than
    /// the incumbent, or an empty queue
    fn search(&mut self, config: &PlannerConfig, end_time: f64) -> Option<usize> {
        let mut current = self.open.pop()?.index;
        while config.now() < end_time {
            let better_goal = self.arena[current].is_goal()
                && self
                    .best
                    .map_or(true, |best| self.arena[current].f() < self.arena[best].f());
            if better_goal {
                return Some(current);
            }
            self.expand(current, config);
            current = self.open.pop()?.index;
        }
        None
    }

    /// Produce children toward the K nearest samples, plus ribbon-directed
    /// coverage edges when coverage turns are enabled
    fn expand(&mut self, index: usize, config: &PlannerConfig) {
        self.expanded_count += 1;
        let state = self.arena[index].state;
        let mut nearest: Vec<(f64, usize)> = self
            .samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let d = state.distance(s);
                if d > 1e-3 {
                    Some((d, i))
                } else {
                    None
                }
            })
            .collect();
        nearest.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        nearest.truncate(config.branching_factor);
        for (_, sample_index) in nearest {
            let sample = self.samples[sample_index];
            if let Some(child) = vertex::connect(
                &mut self.arena,
                index,
                &sample,
                config.turning_radius,
                false,
                config,
            ) {
                self.push(child);
            }
        }
        if config.coverage_turning_radius > 0.0 {
            let radius = config.coverage_turning_radius * 2.0 + 1.0;
            let ribbons = &self.arena[index].ribbons;
            let mut ribbon_states = ribbons.find_states_on_ribbons_on_circle(&state, radius);
            ribbon_states.extend(ribbons.find_near_states_on_ribbons(&state, config.coverage_turning_radius));
            for sample in ribbon_states {
                if let Some(child) = vertex::connect(
                    &mut self.arena,
                    index,
                    &sample,
                    config.coverage_turning_radius,
                    true,
                    config,
                ) {
                    self.push(child);
                }
            }
        }
    }

    /// Push a vertex unless the incumbent already beats it
    fn push(&mut self, index: usize) {
        if let Some(best) = self.best {
            if self.arena[index].f() >= self.arena[best].f() {
                return;
            }
        }
        self.open.push(QueueEntry {
            f: OrderedFloat(self.arena[index].f()),
            h: OrderedFloat(self.arena[index].h),
            index,
        });
    }

    fn visualize(&self, index: usize, config: &PlannerConfig, tag: &str) {
        if !config.visualizations {
            return;
        }
        if let Some(visualizer) = &config.visualizer {
            if let Ok(mut viz) = visualizer.lock() {
                let v = &self.arena[index];
                viz.vertex(&v.state, v.g, v.h, tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{GridWorldMap, Map};
    use crate::ribbons::Heuristic;
    use std::sync::Arc;
    use std::time::Instant;

    fn manager() -> RibbonManager {
        RibbonManager::new(Heuristic::TspPointNoSplitKRibbons, 8.0, 2)
    }

    #[test]
    fn test_plan_single_ribbon_is_timed_and_ordered() {
        let mut ribbons = manager();
        ribbons.add(5.0, 0.0, 15.0, 0.0);
        let config = PlannerConfig::default();
        let start = State::new(0.0, 0.0, 0.0, config.max_speed, 50.0);
        let mut planner = AStarPlanner::new();
        let plan = planner
            .plan(ribbons, &start, config, &DubinsPlan::new(), 2.0)
            .unwrap();
        assert!(!plan.empty());
        assert!((plan.start_time() - 50.0).abs() < 1e-6);
        for pair in plan.get().windows(2) {
            assert!(pair[1].start.time >= pair[0].end_time() - 1e-6);
        }
    }

    #[test]
    fn test_plan_respects_deadline() {
        let mut ribbons = manager();
        for i in 0..4 {
            ribbons.add(10.0 + 5.0 * i as f64, 10.0, 10.0 + 5.0 * i as f64, 30.0);
        }
        let config = PlannerConfig::default();
        let start = State::new(0.0, 0.0, 0.0, config.max_speed, 0.0);
        let mut planner = AStarPlanner::new();
        let begin = Instant::now();
        let _ = planner
            .plan(ribbons, &start, config, &DubinsPlan::new(), 1.0)
            .unwrap();
        // one expansion of overrun is allowed, a multiple is not
        assert!(begin.elapsed().as_secs_f64() < 3.0);
    }

    #[test]
    fn test_plan_empty_when_everything_blocked() {
        let mut ribbons = manager();
        ribbons.add(2.0, 2.0, 8.0, 2.0);
        let mut config = PlannerConfig::default();
        let grid = GridWorldMap::parse("1\n##########\n##########\n##########\n##########\n").unwrap();
        config.map = Arc::new(Map::GridWorld(grid));
        let start = State::new(1.0, 1.0, 0.0, config.max_speed, 0.0);
        let mut planner = AStarPlanner::new();
        let plan = planner
            .plan(ribbons, &start, config, &DubinsPlan::new(), 0.5)
            .unwrap();
        assert!(plan.empty());
    }

    #[test]
    fn test_plan_rejects_invalid_config() {
        let mut config = PlannerConfig::default();
        config.max_speed = 0.0;
        let start = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let mut planner = AStarPlanner::new();
        assert!(planner
            .plan(manager(), &start, config, &DubinsPlan::new(), 0.5)
            .is_err());
    }

    #[test]
    fn test_warm_start_from_previous_plan() {
        let mut ribbons = manager();
        ribbons.add(5.0, 0.0, 15.0, 0.0);
        let config = PlannerConfig::default();
        let start = State::new(0.0, 0.0, 0.0, config.max_speed, 0.0);
        let mut planner = AStarPlanner::new();
        let first = planner
            .plan(ribbons.clone(), &start, config.clone(), &DubinsPlan::new(), 2.0)
            .unwrap();
        assert!(!first.empty());
        let again = planner
            .plan(ribbons, &start, config, &first, 2.0)
            .unwrap();
        assert!(!again.empty());
        assert!((again.start_time() - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_live_manager_mutation_does_not_affect_search() {
        let mut live = manager();
        live.add(5.0, 0.0, 15.0, 0.0);
        let snapshot = live.clone();
        let config = PlannerConfig::default();
        let start = State::new(0.0, 0.0, 0.0, config.max_speed, 0.0);
        let mut planner = AStarPlanner::new();
        // mutate the live manager mid-"iteration"; the snapshot is isolated
        live.cover_between(5.0, 0.0, 15.0, 0.0);
        assert!(live.done());
        let plan = planner
            .plan(snapshot, &start, config, &DubinsPlan::new(), 2.0)
            .unwrap();
        assert!(!plan.empty());
    }
}
