//! Shared link context: endpoint address and liveness gate

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No controller address configured")]
    EmptyEndpoint,
}

/// Controller address, read fresh on every request
#[derive(Debug, Default)]
pub struct Endpoint {
    address: RwLock<String>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: RwLock::new(address.into()),
        }
    }

    pub fn set(&self, address: impl Into<String>) {
        *self.address.write() = address.into();
    }

    /// Current address, trimmed; errors when blank
    pub fn resolve(&self) -> Result<String, ConfigError> {
        let address = self.address.read().trim().to_string();
        if address.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        Ok(address)
    }
}

/// Whether the controller is currently believed reachable
///
/// Only the health check sets it; the health check or a dispatcher
/// escalation clears it. Every successful check bumps the epoch so
/// components can tell a fresh check apart from a flag that never dropped.
#[derive(Debug, Default)]
pub struct LivenessGate {
    connected: AtomicBool,
    epoch: AtomicU64,
}

impl LivenessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn mark_alive(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn mark_down(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Handle shared by the dispatcher, pollers and health check
#[derive(Debug, Clone)]
pub struct RoverContext {
    endpoint: Arc<Endpoint>,
    gate: Arc<LivenessGate>,
}

impl RoverContext {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            endpoint: Arc::new(Endpoint::new(address)),
            gate: Arc::new(LivenessGate::new()),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn gate(&self) -> &LivenessGate {
        &self.gate
    }
}
