//! Online coverage planning for an autonomous surface vehicle
//!
//! The crate plans short-horizon trajectories that trace a set of linear
//! survey segments ("ribbons") under Dubins kinematics while avoiding
//! static map obstacles and tracked vessels. The `executive` module hosts
//! the long-running supervisor; `planner` holds the anytime Dubins A*
//! search it drives each cycle.

pub mod common;
pub mod dubins;
pub mod executive;
pub mod mapping;
pub mod obstacles;
pub mod planner;
pub mod ribbons;
pub mod utils;
