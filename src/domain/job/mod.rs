//! Job aggregate - domain model and state transitions.
//!
//! This module contains the core domain logic for inference jobs:
//! - Job types and states (typestate pattern)
//! - State transition methods
//! - Failure reasons and terminal outcomes

pub mod state;
pub mod transitions;

// Re-export commonly used types
pub use state::*;
