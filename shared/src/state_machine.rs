//! Command Dispatch State Machine
//!
//! Holds the single-slot pending command, the inflight send, the rate-limit
//! clock and the failure counter, and decides what the pump does next. Time
//! is passed in as milliseconds from an arbitrary origin so the rules can be
//! driven without a runtime.

use crate::{limits, Command};

/// Rate-limit and backoff tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub rate_limit_ms: u64,
    pub max_fails: u32,
    pub backoff_step_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            rate_limit_ms: limits::RATE_LIMIT_WINDOW_MS,
            max_fails: limits::MAX_FAILS,
            backoff_step_ms: limits::BACKOFF_STEP_MS,
            backoff_cap_ms: limits::BACKOFF_CAP_MS,
        }
    }
}

impl DispatchPolicy {
    /// Linear, capped backoff after `failures` consecutive failures
    pub fn backoff_ms(&self, failures: u32) -> u64 {
        (failures as u64)
            .saturating_mul(self.backoff_step_ms)
            .min(self.backoff_cap_ms)
    }
}

/// What the pump should do next
#[derive(Debug, Clone, PartialEq)]
pub enum PumpStep {
    /// Nothing to send, or a send is already in flight
    Idle,
    /// A command is pending but may not go out for this many milliseconds
    Wait(u64),
    /// Perform this send now; the machine is marked inflight
    Send(Command),
    /// Shut down for good
    Halted,
}

/// Result of one transport call, as seen by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// HTTP 200
    Delivered,
    /// Transport error or any other status
    Failed { reason: String },
    /// Not attempted, e.g. no endpoint configured; does not count as a failure
    Skipped { reason: String },
}

/// Result of a submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    Queued,
    /// Queued, discarding an older pending command
    Replaced(Command),
    Rejected { reason: &'static str },
}

/// Advisory events for the surrounding application
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// A send failed; a retry is scheduled
    SoftError {
        failures: u32,
        max_fails: u32,
        message: String,
    },
    /// Too many consecutive failures; sending stops until connectivity is re-established
    HardDisconnect { message: String },
}

/// Point-in-time view for status inspection
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchStatus {
    pub pending: Option<Command>,
    pub inflight: bool,
    pub failure_count: u32,
    pub escalated: bool,
    pub shutdown: bool,
}

#[derive(Debug)]
pub struct DispatchStateMachine {
    policy: DispatchPolicy,
    pending: Option<Command>,
    inflight: Option<Command>,
    /// Completion time of the last delivered send
    last_sent_ms: Option<u64>,
    retry_not_before_ms: Option<u64>,
    failure_count: u32,
    escalated: bool,
    shutdown: bool,
}

impl Default for DispatchStateMachine {
    fn default() -> Self {
        Self::new(DispatchPolicy::default())
    }
}

impl DispatchStateMachine {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            pending: None,
            inflight: None,
            last_sent_ms: None,
            retry_not_before_ms: None,
            failure_count: 0,
            escalated: false,
            shutdown: false,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn pending(&self) -> Option<&Command> {
        self.pending.as_ref()
    }

    pub fn is_inflight(&self) -> bool {
        self.inflight.is_some()
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn status(&self) -> DispatchStatus {
        DispatchStatus {
            pending: self.pending.clone(),
            inflight: self.is_inflight(),
            failure_count: self.failure_count,
            escalated: self.escalated,
            shutdown: self.shutdown,
        }
    }

    /// Overwrite the pending slot (last writer wins)
    pub fn submit(&mut self, command: Command) -> SubmitResult {
        if self.shutdown {
            return SubmitResult::Rejected {
                reason: "dispatcher shut down",
            };
        }
        if self.escalated {
            return SubmitResult::Rejected {
                reason: "hard disconnect; waiting for a health check",
            };
        }

        // Backoff only holds back the retry of a failed command
        self.retry_not_before_ms = None;
        match self.pending.replace(command) {
            Some(old) => SubmitResult::Replaced(old),
            None => SubmitResult::Queued,
        }
    }

    /// Drop whatever is pending without sending it
    pub fn discard_pending(&mut self) -> Option<Command> {
        self.pending.take()
    }

    /// Decide the next pump action at `now_ms`
    pub fn poll(&mut self, now_ms: u64) -> PumpStep {
        if self.shutdown {
            return PumpStep::Halted;
        }
        if self.inflight.is_some() || self.escalated || self.pending.is_none() {
            return PumpStep::Idle;
        }

        let rate_ready = self
            .last_sent_ms
            .map(|t| t.saturating_add(self.policy.rate_limit_ms))
            .unwrap_or(0);
        let ready_at = rate_ready.max(self.retry_not_before_ms.unwrap_or(0));
        if now_ms < ready_at {
            return PumpStep::Wait(ready_at - now_ms);
        }

        match self.pending.take() {
            Some(command) => {
                self.inflight = Some(command.clone());
                PumpStep::Send(command)
            }
            None => PumpStep::Idle,
        }
    }

    /// Record the outcome of the inflight send
    pub fn complete(&mut self, outcome: SendOutcome, now_ms: u64) -> Option<DispatchEvent> {
        let command = self.inflight.take();

        if self.shutdown {
            return None;
        }

        match outcome {
            SendOutcome::Delivered => {
                self.failure_count = 0;
                self.last_sent_ms = Some(now_ms);
                self.retry_not_before_ms = None;
                None
            }
            SendOutcome::Skipped { .. } => None,
            SendOutcome::Failed { reason } => self.register_failure(command, reason, now_ms),
        }
    }

    fn register_failure(
        &mut self,
        command: Option<Command>,
        reason: String,
        now_ms: u64,
    ) -> Option<DispatchEvent> {
        self.failure_count = self.failure_count.saturating_add(1);
        let failures = self.failure_count;
        let max_fails = self.policy.max_fails;

        if failures < max_fails {
            // A newer submission wins over the retry and is not delayed
            if self.pending.is_none() {
                self.pending = command;
                self.retry_not_before_ms = Some(now_ms + self.policy.backoff_ms(failures));
            }
            return Some(DispatchEvent::SoftError {
                failures,
                max_fails,
                message: format!("Send failed ({}/{}): {}", failures, max_fails, reason),
            });
        }

        if self.escalated {
            return None;
        }
        self.escalated = true;
        self.pending = None;
        self.retry_not_before_ms = None;
        Some(DispatchEvent::HardDisconnect {
            message: format!("Repeated send failures ({}): {}", failures, reason),
        })
    }

    /// Clear the failure counter and escalation latch after connectivity is re-established
    pub fn reset_failures(&mut self) {
        self.failure_count = 0;
        self.escalated = false;
        self.retry_not_before_ms = None;
    }

    /// Enter the terminal state. Returns false if already shut down.
    pub fn shutdown(&mut self) -> bool {
        self.pending = None;
        if self.shutdown {
            return false;
        }
        self.shutdown = true;
        true
    }
}
