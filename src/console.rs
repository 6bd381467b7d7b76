//! Line-oriented operator commands

use rover_shared::Motion;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Drive(Motion),
    Pwm(i32),
    Ping,
    Endpoint(String),
    DistanceStart,
    DistanceStop,
    JoystickStart,
    JoystickStop,
    /// Hold the console stick at `(x, y)`, each in `[0, 1]`
    Stick(f64, f64),
    StickRelease,
    History,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ConsoleError::Usage("help"));
        };
        let arg = words.next();
        let arg2 = words.next();

        let command = match head.to_ascii_lowercase().as_str() {
            "pwm" | "duty" => {
                let value = arg
                    .and_then(|v| v.parse::<i32>().ok())
                    .ok_or(ConsoleError::Usage("pwm <0-255>"))?;
                ConsoleCommand::Pwm(value)
            }
            "ping" | "connect" => ConsoleCommand::Ping,
            "endpoint" | "ip" => {
                let address = arg.ok_or(ConsoleError::Usage("endpoint <address>"))?;
                ConsoleCommand::Endpoint(address.to_string())
            }
            "distance" => match arg {
                Some("start") => ConsoleCommand::DistanceStart,
                Some("stop") => ConsoleCommand::DistanceStop,
                _ => return Err(ConsoleError::Usage("distance start|stop")),
            },
            "joystick" => match arg {
                Some("start") => ConsoleCommand::JoystickStart,
                Some("stop") => ConsoleCommand::JoystickStop,
                _ => return Err(ConsoleError::Usage("joystick start|stop")),
            },
            "stick" => match (arg, arg2) {
                (Some("off"), None) => ConsoleCommand::StickRelease,
                (Some(x), Some(y)) => {
                    let axis = |v: &str| {
                        v.parse::<f64>()
                            .ok()
                            .filter(|v| (0.0..=1.0).contains(v))
                            .ok_or(ConsoleError::Usage("stick <x 0-1> <y 0-1> | stick off"))
                    };
                    ConsoleCommand::Stick(axis(x)?, axis(y)?)
                }
                _ => return Err(ConsoleError::Usage("stick <x 0-1> <y 0-1> | stick off")),
            },
            "history" => ConsoleCommand::History,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => other
                .parse::<Motion>()
                .map(ConsoleCommand::Drive)
                .map_err(|_| ConsoleError::Unknown(head.to_string()))?,
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  forward | back | left | right | stop    drive (raw tokens also accepted)
  pwm <0-255>                             set motor duty
  ping                                    health check, starts distance polling
  endpoint <address>                      change controller address
  distance start|stop                     control distance polling
  joystick start|stop                     control joystick polling
  stick <x> <y> | stick off               hold the console stick (0.5 0.5 is center)
  history                                 show recent distance samples
  status                                  dispatcher and link state
  quit";
