//! Controller link state
//!
//! This module handles:
//! - The controller address, resolved fresh for every request
//! - The process-wide liveness gate
//! - The explicit health check that opens the gate

mod context;
pub mod health;

pub use context::{ConfigError, Endpoint, LivenessGate, RoverContext};
pub use health::{check, HealthReport};
