//! Command dispatch to the controller
//!
//! This module handles:
//! - Coalescing submissions into a single pending slot
//! - Rate limiting, retry with linear backoff, hard-disconnect escalation
//! - Throttled motor duty updates on a dedicated dispatcher

mod dispatcher;
mod speed;

pub use dispatcher::{CommandDispatcher, DispatchEventReceiver};
pub use speed::{estimate_speed_kmh, DutyRequest, SpeedControl};
