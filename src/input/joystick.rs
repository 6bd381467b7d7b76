//! Analog joystick to drive-command mixing

use crate::command::{CommandDispatcher, SpeedControl};
use crate::polling::Sampler;
use async_trait::async_trait;
use parking_lot::Mutex;
use rover_shared::{limits, Motion, Sample};
use std::sync::Arc;
use tracing::debug;

/// Axis readings below this (after centering) count as centered
pub const DEAD_ZONE: f64 = 0.08;

/// Stick deflection below which no command is issued
pub const MIN_MAGNITUDE: f64 = 0.05;

/// Duty issued at the smallest useful deflection
pub const BASE_DUTY: u8 = 120;

/// Raw analog stick; each axis reads in `[0, 1]` with 0.5 at rest
pub trait JoystickSource: Send + Sync {
    /// `(x, y)`, or `None` when the device has nothing to report
    fn read_axes(&self) -> Option<(Option<f64>, Option<f64>)>;
}

/// Stick position set by hand, e.g. from the console
#[derive(Debug, Default)]
pub struct ManualStick {
    axes: Mutex<Option<(f64, f64)>>,
}

impl ManualStick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the stick at `(x, y)`, each in `[0, 1]`
    pub fn set(&self, x: f64, y: f64) {
        *self.axes.lock() = Some((x, y));
    }

    /// Let go; the source reports nothing until set again
    pub fn release(&self) {
        *self.axes.lock() = None;
    }
}

impl JoystickSource for ManualStick {
    fn read_axes(&self) -> Option<(Option<f64>, Option<f64>)> {
        self.axes.lock().map(|(x, y)| (Some(x), Some(y)))
    }
}

/// Map a `[0, 1]` reading to `[-1, 1]`, rescaled past the dead zone
pub fn normalize_axis(value: Option<f64>, dead_zone: f64) -> f64 {
    let Some(v) = value else {
        return 0.0;
    };
    if !v.is_finite() {
        return 0.0;
    }

    let centered = (v.clamp(0.0, 1.0) - 0.5) * 2.0;
    if centered.abs() < dead_zone {
        return 0.0;
    }
    let scaled = if centered > 0.0 {
        (centered - dead_zone) / (1.0 - dead_zone)
    } else {
        (centered + dead_zone) / (1.0 - dead_zone)
    };
    scaled.clamp(-1.0, 1.0)
}

/// Direction and duty for one stick position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveIntent {
    pub motion: Motion,
    pub duty: u8,
    pub magnitude: f64,
}

/// Single-stick arcade mixing. Ties between axes go to forward/backward.
pub fn arcade_mix(x: f64, y: f64) -> Option<DriveIntent> {
    let magnitude = x.abs().max(y.abs());
    if magnitude < MIN_MAGNITUDE {
        return None;
    }

    let motion = if y.abs() >= x.abs() {
        if y > 0.0 {
            Motion::Forward
        } else {
            Motion::Backward
        }
    } else if x > 0.0 {
        Motion::TurnRight
    } else {
        Motion::TurnLeft
    };

    let span = (limits::MAX_DUTY - BASE_DUTY) as f64;
    let duty = (BASE_DUTY as f64 + span * magnitude) as u8;
    Some(DriveIntent {
        motion,
        duty,
        magnitude,
    })
}

/// Poller sampler that turns stick positions into drive commands
pub struct JoystickSampler {
    source: Arc<dyn JoystickSource>,
    dispatcher: CommandDispatcher,
    speed: Arc<SpeedControl>,
}

impl JoystickSampler {
    pub fn new(
        source: Arc<dyn JoystickSource>,
        dispatcher: CommandDispatcher,
        speed: Arc<SpeedControl>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            speed,
        }
    }
}

#[async_trait]
impl Sampler for JoystickSampler {
    async fn sample(&self) -> Sample {
        let Some((x, y)) = self.source.read_axes() else {
            return Sample::ABSENT;
        };
        let x = normalize_axis(x, DEAD_ZONE);
        let y = normalize_axis(y, DEAD_ZONE);

        match arcade_mix(x, y) {
            Some(intent) => {
                debug!(
                    "[JOYSTICK] {} at duty {} (x={:.2}, y={:.2})",
                    intent.motion.token(),
                    intent.duty,
                    x,
                    y
                );
                self.dispatcher.submit(intent.motion);
                self.speed.request(intent.duty as i32);
                Sample::value(intent.magnitude)
            }
            None => Sample::value(x.abs().max(y.abs())),
        }
    }

    fn name(&self) -> &'static str {
        "joystick"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RoverContext;
    use crate::polling::{PollConfig, Poller, SampleSink};
    use crate::transport::mock::ScriptedTransport;
    use rover_shared::state_machine::DispatchPolicy;
    use std::time::Duration;
    use tokio::time::Instant;

    struct FixedSource {
        axes: Mutex<Option<(Option<f64>, Option<f64>)>>,
    }

    impl FixedSource {
        fn new(axes: Option<(Option<f64>, Option<f64>)>) -> Arc<Self> {
            Arc::new(Self {
                axes: Mutex::new(axes),
            })
        }
    }

    impl JoystickSource for FixedSource {
        fn read_axes(&self) -> Option<(Option<f64>, Option<f64>)> {
            *self.axes.lock()
        }
    }

    #[test]
    fn test_normalize_axis() {
        assert_eq!(normalize_axis(None, DEAD_ZONE), 0.0);
        assert_eq!(normalize_axis(Some(0.5), DEAD_ZONE), 0.0);
        // Inside the dead zone: |0.53 - 0.5| * 2 = 0.06
        assert_eq!(normalize_axis(Some(0.53), DEAD_ZONE), 0.0);
        assert_eq!(normalize_axis(Some(1.0), DEAD_ZONE), 1.0);
        assert_eq!(normalize_axis(Some(0.0), DEAD_ZONE), -1.0);
        assert_eq!(normalize_axis(Some(7.0), DEAD_ZONE), 1.0);
        assert_eq!(normalize_axis(Some(f64::NAN), DEAD_ZONE), 0.0);

        let half = normalize_axis(Some(0.75), DEAD_ZONE);
        assert!((half - (0.5 - 0.08) / 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_arcade_mix_directions() {
        assert_eq!(arcade_mix(0.0, 0.0), None);
        assert_eq!(arcade_mix(0.04, -0.03), None);

        assert_eq!(arcade_mix(0.2, 0.9).map(|i| i.motion), Some(Motion::Forward));
        assert_eq!(arcade_mix(0.2, -0.9).map(|i| i.motion), Some(Motion::Backward));
        assert_eq!(arcade_mix(0.9, 0.2).map(|i| i.motion), Some(Motion::TurnRight));
        assert_eq!(arcade_mix(-0.9, 0.2).map(|i| i.motion), Some(Motion::TurnLeft));
        // Tie goes to the y axis
        assert_eq!(arcade_mix(0.5, 0.5).map(|i| i.motion), Some(Motion::Forward));
    }

    #[test]
    fn test_arcade_mix_duty() {
        assert_eq!(arcade_mix(0.0, 1.0).map(|i| i.duty), Some(255));
        assert_eq!(arcade_mix(0.0, -0.5).map(|i| i.duty), Some(187));
        assert_eq!(arcade_mix(0.05, 0.0).map(|i| i.duty), Some(126));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_submits_motion_and_duty() {
        let ctx = RoverContext::new("10.0.0.2");
        ctx.gate().mark_alive();
        let transport = Arc::new(ScriptedTransport::new());
        let (motion, _motion_events) = CommandDispatcher::new(
            "motion",
            ctx.clone(),
            transport.clone(),
            DispatchPolicy::default(),
        );
        let (duty, _duty_events) = CommandDispatcher::new(
            "duty",
            ctx.clone(),
            transport.clone(),
            DispatchPolicy::default(),
        );
        let speed = Arc::new(SpeedControl::new(duty, ctx.clone()));

        let source = FixedSource::new(Some((Some(0.5), Some(1.0))));
        let sampler = JoystickSampler::new(source.clone(), motion, speed.clone());

        assert_eq!(sampler.sample().await, Sample::value(1.0));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut paths = transport.paths();
        paths.sort();
        assert_eq!(paths, vec!["adelante", "velocidad?v=255"]);
        assert_eq!(speed.duty(), Some(255));

        // Centered stick issues nothing
        *source.axes.lock() = Some((Some(0.5), Some(0.5)));
        assert_eq!(sampler.sample().await, Sample::value(0.0));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.call_count(), 2);

        *source.axes.lock() = None;
        assert_eq!(sampler.sample().await, Sample::ABSENT);
    }

    #[test]
    fn test_manual_stick() {
        let stick = ManualStick::new();
        assert_eq!(stick.read_axes(), None);
        stick.set(0.5, 1.0);
        assert_eq!(stick.read_axes(), Some((Some(0.5), Some(1.0))));
        stick.release();
        assert_eq!(stick.read_axes(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_joystick_poller_cadence_and_coalescing() {
        let ctx = RoverContext::new("10.0.0.2");
        ctx.gate().mark_alive();
        let motion_link = Arc::new(ScriptedTransport::new());
        let duty_link = Arc::new(ScriptedTransport::new());
        let (motion, _motion_events) = CommandDispatcher::new(
            "motion",
            ctx.clone(),
            motion_link.clone(),
            DispatchPolicy::default(),
        );
        let (duty, _duty_events) = CommandDispatcher::new(
            "duty",
            ctx.clone(),
            duty_link.clone(),
            DispatchPolicy::default(),
        );
        let speed = Arc::new(SpeedControl::new(duty, ctx.clone()));

        let stick = Arc::new(ManualStick::new());
        stick.set(0.5, 1.0);
        let sampler = Arc::new(JoystickSampler::new(stick.clone(), motion, speed));
        let poller = Poller::new("joystick", ctx.clone(), 64);
        let sink: SampleSink = Arc::new(|_| {});
        let origin = Instant::now();
        assert!(poller.start(PollConfig::joystick(), sampler, sink));

        tokio::time::sleep(Duration::from_millis(190)).await;
        assert!(poller.history().is_empty());
        assert_eq!(motion_link.call_count(), 0);

        // Ticks at 200, 250, ..., 950
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(poller.history().len(), 16);
        assert_eq!(poller.history().last(), Some(Sample::value(1.0)));

        let calls = motion_link.calls();
        assert!(calls[0].at - origin >= Duration::from_millis(200));
        assert!(calls.iter().all(|c| c.path == "adelante"));
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(160));
        }
        // One tick per 50 ms, at most one send per window
        assert!(calls.len() >= 4 && calls.len() < 16);

        let duty_calls = duty_link.call_count();
        assert!(duty_calls >= 2 && duty_calls < 16);
        assert!(duty_link.paths().iter().all(|p| p == "velocidad?v=255"));

        // The last coalesced motion still drains, then nothing more
        assert!(poller.stop().await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let sent = motion_link.call_count();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(motion_link.call_count(), sent);
        assert_eq!(poller.history().len(), 16);
    }
}
