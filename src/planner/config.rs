//! Per-iteration planner configuration
//!
//! The Executive assembles a fresh `PlannerConfig` for every planning
//! iteration from its current settings, the staged map and a deep snapshot
//! of the dynamic obstacles.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::{PlannerError, PlannerResult};
use crate::mapping::Map;
use crate::obstacles::DynamicObstaclesManager;
use crate::utils::Visualizer;

/// Clock used by the planner's deadline checks; the Executive wires this to
/// the trajectory publisher's time source
pub type ClockFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Wall clock in seconds, the default when no publisher clock is installed
pub fn system_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Clone)]
pub struct PlannerConfig {
    pub max_speed: f64,
    pub turning_radius: f64,
    /// Radius used by coverage-credited edges; 0 disables coverage-directed
    /// expansions entirely
    pub coverage_turning_radius: f64,
    /// Samples expanded per vertex
    pub branching_factor: usize,
    /// Seed for the state sampler; fixed by default so runs replay
    pub sample_seed: u64,
    pub start_state_time: f64,
    pub obstacles: DynamicObstaclesManager,
    pub map: Arc<Map>,
    pub visualizations: bool,
    pub visualizer: Option<Arc<Mutex<Visualizer>>>,
    clock: ClockFn,
}

impl PlannerConfig {
    pub fn new(max_speed: f64, turning_radius: f64, coverage_turning_radius: f64, branching_factor: usize) -> Self {
        Self {
            max_speed,
            turning_radius,
            coverage_turning_radius,
            branching_factor,
            ..Self::default()
        }
    }

    pub fn now(&self) -> f64 {
        (self.clock)()
    }

    pub fn set_clock(&mut self, clock: ClockFn) {
        self.clock = clock;
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if self.max_speed <= 0.0 {
            return Err(PlannerError::InvalidParameter(format!(
                "max speed must be positive, got {}",
                self.max_speed
            )));
        }
        if self.turning_radius <= 0.0 {
            return Err(PlannerError::InvalidParameter(format!(
                "turning radius must be positive, got {}",
                self.turning_radius
            )));
        }
        if self.coverage_turning_radius < 0.0
            || (self.coverage_turning_radius > 0.0 && self.coverage_turning_radius < self.turning_radius)
        {
            return Err(PlannerError::InvalidParameter(format!(
                "coverage turning radius must be 0 or at least the turning radius, got {}",
                self.coverage_turning_radius
            )));
        }
        if self.branching_factor == 0 {
            return Err(PlannerError::InvalidParameter(
                "branching factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_speed: 2.5,
            turning_radius: 8.0,
            coverage_turning_radius: 16.0,
            branching_factor: 4,
            sample_seed: 7, // lucky seed
            start_state_time: -1.0,
            obstacles: DynamicObstaclesManager::new(),
            map: Arc::new(Map::Empty),
            visualizations: false,
            visualizer: None,
            clock: Arc::new(system_clock),
        }
    }
}
