//! Client for a network-attached rover controller
//!
//! Drive commands go through a coalescing, rate-limited dispatcher with
//! backoff and hard-disconnect escalation. Sensors and operator input are
//! sampled by start/stop pollers that feed bounded histories.

pub mod command;
pub mod config;
pub mod console;
pub mod connection;
pub mod input;
pub mod polling;
pub mod transport;

pub use config::RoverConfig;
