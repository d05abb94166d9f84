//! Contract between the Executive and the host node

use crate::common::State;
use crate::dubins::DubinsPlan;
use crate::ribbons::RibbonManager;

/// The transport the Executive publishes through. Implemented by the host
/// node in production and by stubs in tests.
pub trait TrajectoryPublisher: Send + Sync {
    /// Monotonic time in seconds; every planner deadline is measured on
    /// this clock
    fn get_time(&self) -> f64;

    /// Hand the controller a plan. The controller reports back the state it
    /// will actually start executing from.
    fn publish_plan(&self, plan: &DubinsPlan) -> State;

    /// Display samples of a trajectory; `is_plan` distinguishes the planned
    /// trajectory from other traces
    fn display_trajectory(&self, samples: &[State], is_plan: bool);

    /// Display the remaining ribbons
    fn display_ribbons(&self, ribbons: &RibbonManager);

    /// The mission is complete: every ribbon has been covered
    fn all_done(&self);
}
