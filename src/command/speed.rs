//! Motor duty control
//!
//! Duty updates go through their own dispatcher so a slider drag never
//! supersedes a pending motion command. Near-duplicate values are throttled
//! before they reach it.

use super::dispatcher::CommandDispatcher;
use crate::connection::RoverContext;
use parking_lot::Mutex;
use rover_shared::state_machine::SubmitResult;
use rover_shared::{limits, Command};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// What happened to a duty request
#[derive(Debug, Clone, PartialEq)]
pub enum DutyRequest {
    Forwarded(u8),
    /// Too close to the last forwarded duty, too soon
    Throttled,
    Disconnected,
    Rejected(&'static str),
}

/// Estimated ground speed for a duty value
pub fn estimate_speed_kmh(duty: u8) -> f64 {
    (duty as f64 / limits::MAX_DUTY as f64) * limits::TOP_SPEED_KMH
}

pub struct SpeedControl {
    dispatcher: CommandDispatcher,
    ctx: RoverContext,
    last: Mutex<Option<(u8, Instant)>>,
    dedupe_delta: u8,
    dedupe_window: Duration,
}

impl SpeedControl {
    pub fn new(dispatcher: CommandDispatcher, ctx: RoverContext) -> Self {
        Self {
            dispatcher,
            ctx,
            last: Mutex::new(None),
            dedupe_delta: limits::DUTY_DEDUPE_DELTA,
            dedupe_window: Duration::from_millis(limits::DUTY_DEDUPE_WINDOW_MS),
        }
    }

    /// Request a duty; out-of-range values are clamped
    ///
    /// The throttle compares against the last duty handed to the dispatcher,
    /// whether or not the controller has acknowledged it yet.
    pub fn request(&self, duty: i32) -> DutyRequest {
        if !self.ctx.gate().is_connected() {
            return DutyRequest::Disconnected;
        }
        let duty = duty.clamp(0, limits::MAX_DUTY as i32) as u8;
        let now = Instant::now();

        let mut last = self.last.lock();
        if let Some((prev, at)) = *last {
            let close = prev.abs_diff(duty) < self.dedupe_delta;
            if close && now.duration_since(at) < self.dedupe_window {
                debug!("[SPEED] Throttled duty {} (last {})", duty, prev);
                return DutyRequest::Throttled;
            }
        }

        match self.dispatcher.submit(Command::SetDuty(duty)) {
            SubmitResult::Rejected { reason } => DutyRequest::Rejected(reason),
            SubmitResult::Queued | SubmitResult::Replaced(_) => {
                *last = Some((duty, now));
                DutyRequest::Forwarded(duty)
            }
        }
    }

    /// Last forwarded duty, if any
    pub fn duty(&self) -> Option<u8> {
        self.last.lock().map(|(duty, _)| duty)
    }

    pub fn estimated_speed_kmh(&self) -> f64 {
        self.duty().map(estimate_speed_kmh).unwrap_or(0.0)
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }
}
