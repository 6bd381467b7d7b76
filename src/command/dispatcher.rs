//! Command dispatcher: coalescing, rate limit, retry and escalation
//!
//! `submit` only touches the pending slot and wakes the pump. One pump task
//! per dispatcher performs every send, so at most one request is ever in
//! flight. The state lock is never held across a network call.

use crate::connection::RoverContext;
use crate::transport::Transport;
use parking_lot::Mutex;
use rover_shared::state_machine::{
    DispatchEvent, DispatchPolicy, DispatchStateMachine, DispatchStatus, PumpStep, SendOutcome,
    SubmitResult,
};
use rover_shared::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub type DispatchEventReceiver = mpsc::UnboundedReceiver<DispatchEvent>;

struct PumpState {
    machine: DispatchStateMachine,
    /// Liveness epoch last seen; a newer one means a fresh health check
    seen_epoch: u64,
}

impl PumpState {
    fn sync_epoch(&mut self, epoch: u64) {
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.machine.reset_failures();
        }
    }
}

struct Shared {
    name: &'static str,
    state: Mutex<PumpState>,
    wake: Notify,
    ctx: RoverContext,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<DispatchEvent>,
    origin: Instant,
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    async fn send(&self, command: &Command) -> SendOutcome {
        let endpoint = match self.ctx.endpoint().resolve() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("[DISPATCH:{}] Dropping {}: {}", self.name, command, e);
                return SendOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        debug!("[DISPATCH:{}] Sending {} to {}", self.name, command, endpoint);
        match self.transport.get(&endpoint, &command.path()).await {
            Ok(response) if response.is_ok() => SendOutcome::Delivered,
            Ok(response) => SendOutcome::Failed {
                reason: format!("HTTP {}", response.status),
            },
            Err(e) => SendOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Handle to a dispatcher; clones share the same pump
#[derive(Clone)]
pub struct CommandDispatcher {
    shared: Arc<Shared>,
}

impl CommandDispatcher {
    /// Create a dispatcher and start its pump task
    pub fn new(
        name: &'static str,
        ctx: RoverContext,
        transport: Arc<dyn Transport>,
        policy: DispatchPolicy,
    ) -> (Self, DispatchEventReceiver) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let seen_epoch = ctx.gate().epoch();

        let shared = Arc::new(Shared {
            name,
            state: Mutex::new(PumpState {
                machine: DispatchStateMachine::new(policy),
                seen_epoch,
            }),
            wake: Notify::new(),
            ctx,
            transport,
            events: event_tx,
            origin: Instant::now(),
        });

        let pump = shared.clone();
        tokio::spawn(async move {
            pump_loop(pump).await;
        });

        (Self { shared }, event_rx)
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Replace the pending command; never blocks on the network
    pub fn submit(&self, command: impl Into<Command>) -> SubmitResult {
        let command = command.into();
        let gate = self.shared.ctx.gate();

        let result = {
            let mut state = self.shared.state.lock();
            if state.machine.is_shutdown() {
                state.machine.submit(command)
            } else if !gate.is_connected() {
                SubmitResult::Rejected {
                    reason: "controller not connected",
                }
            } else {
                state.sync_epoch(gate.epoch());
                state.machine.submit(command)
            }
        };

        match &result {
            SubmitResult::Rejected { reason } => {
                debug!("[DISPATCH:{}] Submit rejected: {}", self.shared.name, reason);
            }
            SubmitResult::Replaced(old) => {
                debug!("[DISPATCH:{}] Superseded {}", self.shared.name, old);
                self.shared.wake.notify_one();
            }
            SubmitResult::Queued => self.shared.wake.notify_one(),
        }
        result
    }

    /// Stop for good; an inflight send may still finish but its result is ignored
    pub fn shutdown(&self) {
        let changed = self.shared.state.lock().machine.shutdown();
        if changed {
            info!("[DISPATCH:{}] Shut down", self.shared.name);
        }
        self.shared.wake.notify_one();
    }

    pub fn status(&self) -> DispatchStatus {
        self.shared.state.lock().machine.status()
    }
}

async fn pump_loop(shared: Arc<Shared>) {
    loop {
        let step = {
            let gate = shared.ctx.gate();
            let mut state = shared.state.lock();
            state.sync_epoch(gate.epoch());
            if !gate.is_connected() {
                if let Some(dropped) = state.machine.discard_pending() {
                    debug!(
                        "[DISPATCH:{}] Controller not connected, dropping {}",
                        shared.name, dropped
                    );
                }
            }
            state.machine.poll(shared.now_ms())
        };

        match step {
            PumpStep::Halted => break,
            PumpStep::Idle => shared.wake.notified().await,
            PumpStep::Wait(ms) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            PumpStep::Send(command) => {
                let outcome = shared.send(&command).await;
                let event = shared
                    .state
                    .lock()
                    .machine
                    .complete(outcome, shared.now_ms());

                if let Some(event) = event {
                    match &event {
                        DispatchEvent::SoftError { message, .. } => {
                            warn!("[DISPATCH:{}] {}", shared.name, message);
                        }
                        DispatchEvent::HardDisconnect { message } => {
                            error!("[DISPATCH:{}] HARD DISCONNECT: {}", shared.name, message);
                            shared.ctx.gate().mark_down();
                        }
                    }
                    let _ = shared.events.send(event);
                }
            }
        }
    }

    debug!("[DISPATCH:{}] Pump stopped", shared.name);
}
