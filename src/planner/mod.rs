//! The anytime coverage planner
//!
//! One planning iteration takes the current vehicle state, a snapshot of
//! the remaining ribbons, the obstacle model and a wall-clock budget, and
//! returns the best trajectory found before the deadline.

pub mod a_star;
pub mod config;
pub mod vertex;

pub use a_star::AStarPlanner;
pub use config::{ClockFn, PlannerConfig};

use crate::common::{PlannerResult, State};
use crate::dubins::DubinsPlan;
use crate::ribbons::RibbonManager;

/// Samples added to the pool on the first anytime iteration and again on
/// every following iteration (linear growth)
pub const INITIAL_SAMPLES: usize = 100;

/// Arc-length spacing of the edge cost integration, in meters
pub const DUBINS_INCREMENT: f64 = 0.1;

/// Sampled obstacle densities above this make an edge infeasible
pub const COLLISION_DENSITY_THRESHOLD: f64 = 0.1;

/// Scales sampled obstacle density into edge cost seconds
pub const COLLISION_PENALTY_WEIGHT: f64 = 100.0;

/// Planner strategy selection. Only the anytime A* strategy is in service;
/// new strategies slot in as variants sharing the vertex/edge machinery.
pub enum Planner {
    AStar(AStarPlanner),
}

impl Planner {
    pub fn a_star() -> Self {
        Planner::AStar(AStarPlanner::new())
    }

    pub fn plan(
        &mut self,
        ribbons: RibbonManager,
        start: &State,
        config: PlannerConfig,
        previous_plan: &DubinsPlan,
        time_remaining: f64,
    ) -> PlannerResult<DubinsPlan> {
        match self {
            Planner::AStar(planner) => planner.plan(ribbons, start, config, previous_plan, time_remaining),
        }
    }
}
