//! The planning supervisor
//!
//! The Executive owns the shared mission state (ribbons, telemetry,
//! obstacles, map) and drives one planning iteration per cycle on a
//! dedicated thread, publishing each trajectory to the controller and
//! replanning as the world changes. Producer threads (telemetry ingest,
//! obstacle ingest, operator commands) mutate the shared state through the
//! thread-safe methods here.

pub mod publisher;

pub use publisher::TrajectoryPublisher;

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::common::State;
use crate::dubins::DubinsPlan;
use crate::mapping::{self, Map};
use crate::obstacles::{Distribution, DynamicObstaclesManager};
use crate::planner::config::system_clock;
use crate::planner::{Planner, PlannerConfig};
use crate::ribbons::{Heuristic, RibbonManager};
use crate::utils::Visualizer;

/// Length of one planning cycle; the planner gets whatever is left of this
/// after bookkeeping
pub const PLANNING_TIME_SECONDS: f64 = 1.0;

/// Heading rate (rad/s) above which telemetry is not trusted for coverage
pub const COVERAGE_HEADING_RATE_MAX: f64 = 0.1;

/// Whether the previous plan seeds the next iteration
pub const REUSE_PLAN_ENABLED: bool = true;

/// Experimental turning-radius shrink between iterations
pub const RADIUS_SHRINK_ENABLED: bool = false;
pub const RADIUS_SHRINK_AMOUNT: f64 = 1e-6;

/// Obstacle estimates older than this many seconds are aged out
const OBSTACLE_AGE_SECONDS: f64 = 30.0;

/// Per-axis agreement required between the controller's reported start
/// state and the sampled plan
const COLOCATION_POSITION_TOLERANCE: f64 = 0.5;
const COLOCATION_HEADING_TOLERANCE: f64 = 0.1;

/// How long cancellation and initialization are given before giving up
const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// K used when re-creating the ribbon manager
const RIBBON_MANAGER_K: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Inactive,
    Running,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
struct Telemetry {
    last_state: State,
    last_heading: f64,
    last_update_time: f64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            last_state: State::default(),
            last_heading: 0.0,
            last_update_time: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct MapStaging {
    new_map: Option<Arc<Map>>,
    current_path: String,
}

struct Shared {
    publisher: Arc<dyn TrajectoryPublisher>,
    ribbons: Mutex<RibbonManager>,
    telemetry: Mutex<Telemetry>,
    obstacles: Mutex<DynamicObstaclesManager>,
    map: Mutex<MapStaging>,
    settings: Mutex<PlannerConfig>,
    planner_state: Mutex<PlannerState>,
    state_cv: Condvar,
}

/// Lock that shrugs off poisoning: a panicked planning thread must not
/// wedge telemetry or the destructor
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Executive {
    shared: Arc<Shared>,
    planning_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Executive {
    pub fn new(publisher: Arc<dyn TrajectoryPublisher>) -> Self {
        let mut settings = PlannerConfig::default();
        let clock_publisher = Arc::clone(&publisher);
        settings.set_clock(Arc::new(move || clock_publisher.get_time()));
        Self {
            shared: Arc::new(Shared {
                publisher,
                ribbons: Mutex::new(RibbonManager::default()),
                telemetry: Mutex::new(Telemetry::default()),
                obstacles: Mutex::new(DynamicObstaclesManager::new()),
                map: Mutex::new(MapStaging::default()),
                settings: Mutex::new(settings),
                planner_state: Mutex::new(PlannerState::Inactive),
                state_cv: Condvar::new(),
            }),
            planning_thread: Mutex::new(None),
        }
    }

    /// Wall-clock seconds, for callers without a publisher clock
    pub fn current_time() -> f64 {
        system_clock()
    }

    /// Ingest telemetry. The position earns coverage credit only while the
    /// vehicle is not turning hard; the rate gate measures the heading
    /// delta against the previous telemetry timestamp.
    pub fn update_covered(&self, x: f64, y: f64, speed: f64, heading: f64, t: f64) {
        let allow_cover = {
            let mut telemetry = lock(&self.shared.telemetry);
            let rate = (heading - telemetry.last_heading).abs() / telemetry.last_update_time;
            telemetry.last_update_time = t;
            telemetry.last_heading = heading;
            telemetry.last_state = State::new(x, y, heading, speed, t);
            rate <= COVERAGE_HEADING_RATE_MAX
        };
        if allow_cover {
            lock(&self.shared.ribbons).cover(x, y);
        }
    }

    /// Placeholder distribution synthesis for a raw tracked state: the
    /// observation now and its dead-reckoned position one second ahead,
    /// both with unit covariance
    pub fn update_dynamic_obstacle(&self, id: u32, observed: State) {
        let ahead = observed.push(1.0);
        let distributions = vec![
            Distribution::unit(observed.x, observed.y, observed.heading, observed.time),
            Distribution::unit(ahead.x, ahead.y, ahead.heading, ahead.time),
        ];
        self.update_dynamic_obstacle_distributions(id, distributions);
    }

    /// Stable tracker interface: replace an obstacle's timeline wholesale
    pub fn update_dynamic_obstacle_distributions(&self, id: u32, distributions: Vec<Distribution>) {
        let cutoff = distributions
            .iter()
            .map(Distribution::time)
            .fold(f64::NEG_INFINITY, f64::max)
            - OBSTACLE_AGE_SECONDS;
        let mut obstacles = lock(&self.shared.obstacles);
        obstacles.update(id, distributions);
        if cutoff.is_finite() {
            obstacles.prune(cutoff);
        }
    }

    pub fn add_ribbon(&self, x1: f64, y1: f64, x2: f64, y2: f64) {
        lock(&self.shared.ribbons).add(x1, y1, x2, y2);
    }

    /// Drop all ribbons, re-creating the manager at the configured
    /// heuristic and width
    pub fn clear_ribbons(&self) {
        let turning_radius = lock(&self.shared.settings).turning_radius;
        let mut ribbons = lock(&self.shared.ribbons);
        let heuristic = ribbons.heuristic();
        let width = ribbons.ribbon_width();
        *ribbons = RibbonManager::new(heuristic, turning_radius, RIBBON_MANAGER_K);
        ribbons.set_ribbon_width(width);
    }

    /// Update planner parameters. An unknown heuristic index is logged and
    /// ignored; the previous heuristic stays.
    pub fn set_configuration(
        &self,
        turning_radius: f64,
        coverage_turning_radius: f64,
        max_speed: f64,
        line_width: f64,
        k: usize,
        heuristic: i32,
    ) {
        {
            let mut settings = lock(&self.shared.settings);
            settings.turning_radius = turning_radius;
            settings.coverage_turning_radius = coverage_turning_radius;
            settings.max_speed = max_speed;
            settings.branching_factor = k;
        }
        let mut ribbons = lock(&self.shared.ribbons);
        ribbons.set_ribbon_width(line_width);
        match Heuristic::from_index(heuristic) {
            Some(h) => ribbons.set_heuristic(h),
            None => log::warn!("Unknown heuristic {}. Ignoring.", heuristic),
        }
    }

    /// Toggle planner search visualization to a log file
    pub fn set_visualization(&self, enabled: bool, path: &str) {
        let mut settings = lock(&self.shared.settings);
        if !enabled {
            settings.visualizations = false;
            settings.visualizer = None;
            return;
        }
        match Visualizer::create(Path::new(path)) {
            Ok(viz) => {
                settings.visualizations = true;
                settings.visualizer = Some(Arc::new(Mutex::new(viz)));
            }
            Err(e) => {
                log::error!("Could not open visualization file {}: {}", path, e);
                settings.visualizations = false;
            }
        }
    }

    /// Load a map file asynchronously and stage it for the planning loop.
    /// Never blocks the caller; failures are logged and leave the current
    /// map untouched.
    pub fn refresh_map(&self, path_to_map_file: &str, latitude: f64, longitude: f64) {
        let shared = Arc::clone(&self.shared);
        let path_string = path_to_map_file.to_string();
        thread::spawn(move || {
            let mut staging = lock(&shared.map);
            if staging.current_path == path_string {
                return;
            }
            match mapping::load_map(Path::new(&path_string), longitude, latitude) {
                Ok(map) => {
                    log::info!("Done loading map at path {}", path_string);
                    staging.new_map = Some(Arc::new(map));
                    staging.current_path = path_string;
                }
                Err(e) => {
                    log::error!(
                        "Encountered an error loading map at path {}. Map was not updated.",
                        path_string
                    );
                    log::debug!("Map load failure detail: {}", e);
                    staging.new_map = None;
                    staging.current_path.clear();
                }
            }
        });
    }

    pub fn planner_state(&self) -> PlannerState {
        *lock(&self.shared.planner_state)
    }

    pub fn planner_is_running(&self) -> bool {
        self.planner_state() == PlannerState::Running
    }

    /// Spawn the planning thread. A no-op while a previous planning thread
    /// is still running.
    pub fn start_planner(&self) {
        if self.planner_is_running() {
            log::warn!("Planner is already running; ignoring start request");
            return;
        }
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || plan_loop(shared));
        let mut slot = lock(&self.planning_thread);
        if let Some(old) = slot.take() {
            // reap a finished previous loop; a stuck one stays detached
            if old.is_finished() {
                let _ = old.join();
            }
        }
        *slot = Some(handle);
    }

    /// Ask the planning loop to stop. Cooperative: the loop observes the
    /// flag at its head and inside the search's deadline checks.
    pub fn cancel_planner(&self) {
        let mut state = lock(&self.shared.planner_state);
        if *state == PlannerState::Running {
            *state = PlannerState::Cancelled;
        }
        self.shared.state_cv.notify_all();
    }

    /// Cancel and wait up to the grace period for the planning thread
    pub fn terminate(&self) {
        self.cancel_planner();
        {
            let state = lock(&self.shared.planner_state);
            let (state, _timeout) = self
                .shared
                .state_cv
                .wait_timeout_while(state, GRACE_PERIOD, |s| *s != PlannerState::Inactive)
                .unwrap_or_else(PoisonError::into_inner);
            if *state != PlannerState::Inactive {
                log::warn!("Planning thread did not stop within the grace period; detaching it");
                drop(state);
                lock(&self.planning_thread).take();
                return;
            }
        }
        if let Some(handle) = lock(&self.planning_thread).take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Executive {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// One planning iteration per cycle until cancelled or the mission is done
fn plan_loop(shared: Arc<Shared>) {
    log::info!("Initializing planner");
    let mut planner = Planner::a_star();

    {
        let state = lock(&shared.planner_state);
        let (mut state, _timeout) = shared
            .state_cv
            .wait_timeout_while(state, GRACE_PERIOD, |s| *s == PlannerState::Cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        if *state == PlannerState::Cancelled {
            log::error!(
                "Planner initialization timed out; the cancel flag is still set from a previous \
                 planning failure. Restart the planner to keep using it."
            );
            return;
        }
        *state = PlannerState::Running;
    }

    let mut start_state = State::default();
    let mut plan = DubinsPlan::new();
    let mut radius_shrink = 0.0;

    loop {
        let cycle_start = shared.publisher.get_time();

        if *lock(&shared.planner_state) == PlannerState::Cancelled {
            break;
        }
        {
            let ribbons = lock(&shared.ribbons);
            if ribbons.done() {
                log::info!("Finished covering ribbons");
                drop(ribbons);
                shared.publisher.all_done();
                break;
            }
            shared.publisher.display_ribbons(&ribbons);
        }

        // install a staged map without waiting on a loader that may be
        // mid-Dijkstra; skip the swap when the staging mutex is held
        if let Ok(mut staging) = shared.map.try_lock() {
            if let Some(map) = staging.new_map.take() {
                lock(&shared.settings).map = map;
            }
        }

        let last_state = lock(&shared.telemetry).last_state;
        if !start_state.time_is_set() {
            // no confirmed start from the controller; dead-reckon one
            // planning quantum ahead of the last telemetry
            let now = shared.publisher.get_time();
            start_state = last_state.push(now + PLANNING_TIME_SECONDS - last_state.time);
        }

        if !REUSE_PLAN_ENABLED {
            plan = DubinsPlan::new();
        }
        if !plan.empty() {
            plan.change_into_suffix(start_state.time);
        }

        let mut config = {
            let mut settings = lock(&shared.settings);
            if RADIUS_SHRINK_ENABLED {
                settings.turning_radius -= RADIUS_SHRINK_AMOUNT;
                settings.coverage_turning_radius -= RADIUS_SHRINK_AMOUNT;
                radius_shrink += RADIUS_SHRINK_AMOUNT;
            }
            settings.clone()
        };
        config.obstacles = lock(&shared.obstacles).clone();
        config.start_state_time = start_state.time;

        let mut ribbons_copy = lock(&shared.ribbons).clone();
        // cover up to the state we are planning from
        ribbons_copy.cover_between(last_state.x, last_state.y, start_state.x, start_state.y);

        let time_remaining = cycle_start + PLANNING_TIME_SECONDS - shared.publisher.get_time();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            planner.plan(ribbons_copy, &start_state, config, &plan, time_remaining)
        }));
        match outcome {
            Ok(Ok(found)) => plan = found,
            Ok(Err(e)) => {
                log::error!("Exception thrown while planning: {}. Pausing.", e);
                cancel(&shared);
            }
            Err(payload) => {
                log::error!("Unknown exception thrown while planning; pausing");
                cancel(&shared);
                finish(&shared);
                panic::resume_unwind(payload);
            }
        }

        let elapsed = shared.publisher.get_time() - cycle_start;
        let sleep_seconds = (PLANNING_TIME_SECONDS - elapsed).max(0.0);
        thread::sleep(Duration::from_secs_f64(sleep_seconds));

        shared
            .publisher
            .display_trajectory(&plan.half_second_samples(), true);

        if !plan.empty() {
            start_state = shared.publisher.publish_plan(&plan);
            let mut expected = start_state;
            let on_plan = plan.sample(&mut expected);
            if !on_plan
                || !start_state.is_co_located(
                    &expected,
                    COLOCATION_POSITION_TOLERANCE,
                    COLOCATION_HEADING_TOLERANCE,
                )
            {
                // the controller cannot make our plan; drop it and replan
                plan = DubinsPlan::new();
                if RADIUS_SHRINK_ENABLED {
                    let mut settings = lock(&shared.settings);
                    settings.turning_radius += radius_shrink;
                    settings.coverage_turning_radius += radius_shrink;
                }
                radius_shrink = 0.0;
                log_start_state_mismatch(&start_state, &expected);
            } else {
                radius_shrink += RADIUS_SHRINK_AMOUNT;
            }
        } else {
            log::warn!("Planner returned empty trajectory.");
            start_state = State::default();
        }
    }

    finish(&shared);
}

fn cancel(shared: &Shared) {
    let mut state = lock(&shared.planner_state);
    if *state == PlannerState::Running {
        *state = PlannerState::Cancelled;
    }
    shared.state_cv.notify_all();
}

fn finish(shared: &Shared) {
    *lock(&shared.planner_state) = PlannerState::Inactive;
    shared.state_cv.notify_all();
}

fn log_start_state_mismatch(reported: &State, expected: &State) {
    log::warn!("Start state is not along previous plan; did the controller let us know?");
    let x_differs = (reported.x - expected.x).abs() > COLOCATION_POSITION_TOLERANCE;
    let y_differs = (reported.y - expected.y).abs() > COLOCATION_POSITION_TOLERANCE;
    if x_differs && y_differs {
        log::warn!(
            "Position is different: ({}, {}) vs ({}, {})",
            reported.x,
            reported.y,
            expected.x,
            expected.y
        );
    } else if x_differs {
        log::warn!("X is different: {} vs {}", reported.x, expected.x);
    } else if y_differs {
        log::warn!("Y is different: {} vs {}", reported.y, expected.y);
    }
    if reported.heading_difference(expected).abs() > COLOCATION_HEADING_TOLERANCE {
        log::warn!(
            "Headings are different: {} vs {}",
            reported.heading,
            expected.heading
        );
    }
}
