//! Common types and error definitions for asv_planner
//!
//! This module provides the foundational building blocks used across
//! the planning stack.

pub mod types;
pub mod error;

pub use types::*;
pub use error::*;
