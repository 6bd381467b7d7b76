//! Periodic sensor and input sampling
//!
//! This module handles:
//! - The generic start/stop poller with liveness-aware ticks
//! - Bounded per-poller sample history
//! - Distance sampling and obstacle classification

mod distance;
mod history;
mod scheduler;

pub use distance::{DistanceSampler, Proximity};
pub use history::History;
pub use scheduler::{PollConfig, Poller, SampleSink, Sampler};
