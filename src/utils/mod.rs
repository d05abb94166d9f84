//! Utility modules for asv_planner

pub mod visualization;

pub use visualization::Visualizer;
