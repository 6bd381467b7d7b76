//! Liveness check against the controller's `/ping` route

use super::context::{ConfigError, RoverContext};
use crate::transport::Transport;
use tracing::{info, warn};

/// Outcome of one check
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub endpoint: String,
    pub alive: bool,
    /// HTTP status, when a response arrived at all
    pub status: Option<u16>,
    pub detail: String,
}

/// Ping the controller and update the liveness gate
///
/// Any response below 500 counts as alive. A blank endpoint leaves the
/// gate untouched.
pub async fn check(
    transport: &dyn Transport,
    ctx: &RoverContext,
) -> Result<HealthReport, ConfigError> {
    let endpoint = ctx.endpoint().resolve()?;

    let report = match transport.get(&endpoint, "ping").await {
        Ok(response) => HealthReport {
            alive: response.status < 500,
            status: Some(response.status),
            detail: format!("HTTP {}", response.status),
            endpoint,
        },
        Err(e) => HealthReport {
            alive: false,
            status: None,
            detail: e.to_string(),
            endpoint,
        },
    };

    if report.alive {
        ctx.gate().mark_alive();
        info!("[HEALTH] Connected to {} ({})", report.endpoint, report.detail);
    } else {
        ctx.gate().mark_down();
        warn!("[HEALTH] {} not responding: {}", report.endpoint, report.detail);
    }

    Ok(report)
}
