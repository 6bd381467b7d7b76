//! Rover Shared Types
//!
//! This crate provides the command vocabulary, tuning limits, response body
//! codec and dispatch state machine shared by the controller client and the
//! development simulator. Nothing in here touches the network or a runtime.

pub mod codec;
pub mod state_machine;

use std::fmt;
use std::str::FromStr;

/// Tuning limits for the controller link
pub mod limits {
    /// Timeout applied to every HTTP request
    pub const REQUEST_TIMEOUT_MS: u64 = 1500;

    /// Minimum spacing between the starts of two consecutive sends
    pub const RATE_LIMIT_WINDOW_MS: u64 = 160;

    /// Consecutive send failures that escalate to a hard disconnect
    pub const MAX_FAILS: u32 = 4;

    /// Linear backoff increment per consecutive failure
    pub const BACKOFF_STEP_MS: u64 = 200;

    /// Upper bound on the backoff delay
    pub const BACKOFF_CAP_MS: u64 = 2000;

    /// Distance sampling cadence
    pub const DISTANCE_POLL_MS: u64 = 180;

    /// Delay before the first distance sample after start
    pub const DISTANCE_FIRST_TICK_MS: u64 = 40;

    /// Joystick sampling cadence
    pub const JOYSTICK_POLL_MS: u64 = 50;

    /// Delay before the first joystick sample after start
    pub const JOYSTICK_FIRST_TICK_MS: u64 = 200;

    /// Samples retained per history
    pub const HISTORY_CAPACITY: usize = 120;

    /// Largest duty value the motor driver accepts
    pub const MAX_DUTY: u8 = 255;

    /// Estimated ground speed at full duty
    pub const TOP_SPEED_KMH: f64 = 12.0;

    /// Duty changes smaller than this are throttled...
    pub const DUTY_DEDUPE_DELTA: u8 = 6;

    /// ...when they arrive within this window of the last forwarded duty
    pub const DUTY_DEDUPE_WINDOW_MS: u64 = 250;

    /// Distances at or below this are reported as an obstacle
    pub const OBSTACLE_THRESHOLD_CM: f64 = 25.0;

    /// Address used when nothing else is configured
    pub const DEFAULT_ENDPOINT: &str = "192.168.0.101";
}

/// Discrete drive actions understood by the controller firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl Motion {
    /// Path token the firmware routes on
    pub fn token(&self) -> &'static str {
        match self {
            Motion::Forward => "adelante",
            Motion::Backward => "atras",
            Motion::TurnLeft => "girar_izquierda",
            Motion::TurnRight => "girar_derecha",
            Motion::Stop => "detener",
        }
    }

    pub const ALL: [Motion; 5] = [
        Motion::Forward,
        Motion::Backward,
        Motion::TurnLeft,
        Motion::TurnRight,
        Motion::Stop,
    ];
}

impl FromStr for Motion {
    type Err = UnknownMotion;

    /// Accepts both the firmware tokens and short English aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adelante" | "forward" | "fwd" => Ok(Motion::Forward),
            "atras" | "back" | "backward" => Ok(Motion::Backward),
            "girar_izquierda" | "left" => Ok(Motion::TurnLeft),
            "girar_derecha" | "right" => Ok(Motion::TurnRight),
            "detener" | "stop" => Ok(Motion::Stop),
            other => Err(UnknownMotion(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown motion: {0}")]
pub struct UnknownMotion(pub String);

/// One actuator intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Motion(Motion),
    /// Motor duty cycle, `0..=limits::MAX_DUTY`
    SetDuty(u8),
    /// Opaque token sent verbatim as the request path
    Raw(String),
}

impl Command {
    /// Request path (without leading slash) for this command
    pub fn path(&self) -> String {
        match self {
            Command::Motion(m) => m.token().to_string(),
            Command::SetDuty(v) => format!("velocidad?v={}", v),
            Command::Raw(token) => token.trim_start_matches('/').to_string(),
        }
    }
}

impl From<Motion> for Command {
    fn from(m: Motion) -> Self {
        Command::Motion(m)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// A single optional reading; `None` means no data this tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample(pub Option<f64>);

impl Sample {
    pub const ABSENT: Sample = Sample(None);

    pub fn value(v: f64) -> Self {
        Sample(Some(v))
    }

    pub fn get(&self) -> Option<f64> {
        self.0
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

impl From<Option<f64>> for Sample {
    fn from(v: Option<f64>) -> Self {
        Sample(v)
    }
}
