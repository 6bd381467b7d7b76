//! Startup configuration

use crate::polling::PollConfig;
use rover_shared::limits;
use rover_shared::state_machine::DispatchPolicy;
use std::time::Duration;

/// Environment variable overriding the controller address
pub const ENDPOINT_VAR: &str = "ROVER_ENDPOINT";

/// Configuration for the rover client
#[derive(Debug, Clone)]
pub struct RoverConfig {
    /// Initial controller address (host, host:port or http:// base)
    pub endpoint: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Rate limit, retry and escalation tuning, shared by all dispatchers
    pub dispatch: DispatchPolicy,
    pub distance: PollConfig,
    pub joystick: PollConfig,
    /// Samples kept per poller
    pub history_capacity: usize,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            endpoint: limits::DEFAULT_ENDPOINT.into(),
            request_timeout: Duration::from_millis(limits::REQUEST_TIMEOUT_MS),
            dispatch: DispatchPolicy::default(),
            distance: PollConfig::distance(),
            joystick: PollConfig::joystick(),
            history_capacity: limits::HISTORY_CAPACITY,
        }
    }
}

impl RoverConfig {
    /// Defaults with `ROVER_ENDPOINT` applied
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENDPOINT_VAR) {
            let endpoint = endpoint.trim();
            if !endpoint.is_empty() {
                config.endpoint = endpoint.to_string();
            }
        }
        config
    }
}
