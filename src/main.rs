use pico_rover::command::{CommandDispatcher, DispatchEventReceiver, DutyRequest, SpeedControl};
use pico_rover::config::RoverConfig;
use pico_rover::connection::{self, RoverContext};
use pico_rover::console::{ConsoleCommand, HELP};
use pico_rover::input::{JoystickSampler, ManualStick};
use pico_rover::polling::{DistanceSampler, Poller, Proximity, SampleSink, Sampler};
use pico_rover::transport::{HttpTransport, Transport};
use parking_lot::Mutex;
use rover_shared::state_machine::{DispatchEvent, SubmitResult};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct Rover {
    ctx: RoverContext,
    transport: Arc<dyn Transport>,
    motion: CommandDispatcher,
    speed: Arc<SpeedControl>,
    distance: Poller,
    distance_sampler: Arc<dyn Sampler>,
    joystick: Poller,
    joystick_sampler: Arc<dyn Sampler>,
    stick: Arc<ManualStick>,
    config: RoverConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = RoverConfig::from_env();
    info!("Rover client starting");
    info!("  Controller: {}", config.endpoint);
    info!("  Request timeout: {:?}", config.request_timeout);

    let ctx = RoverContext::new(config.endpoint.clone());
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.request_timeout)?);

    let (motion, mut motion_events) =
        CommandDispatcher::new("motion", ctx.clone(), transport.clone(), config.dispatch);
    let (duty, mut duty_events) =
        CommandDispatcher::new("duty", ctx.clone(), transport.clone(), config.dispatch);
    let speed = Arc::new(SpeedControl::new(duty, ctx.clone()));
    let stick = Arc::new(ManualStick::new());

    let rover = Rover {
        distance: Poller::new("distance", ctx.clone(), config.history_capacity),
        distance_sampler: Arc::new(DistanceSampler::new(ctx.clone(), transport.clone())),
        joystick: Poller::new("joystick", ctx.clone(), config.history_capacity),
        joystick_sampler: Arc::new(JoystickSampler::new(
            stick.clone(),
            motion.clone(),
            speed.clone(),
        )),
        stick,
        ctx,
        transport,
        motion,
        speed,
        config,
    };

    rover.health_check().await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Main event loop
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line.parse::<ConsoleCommand>() {
                            Ok(ConsoleCommand::Quit) => break,
                            Ok(command) => rover.handle(command).await,
                            Err(e) => println!("{}", e),
                        }
                    }
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            Some(event) = motion_events.recv() => {
                report_event("motion", event);
            }
            Some(event) = duty_events.recv() => {
                report_event("duty", event);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    rover.shutdown(&mut motion_events, &mut duty_events).await;
    Ok(())
}

impl Rover {
    async fn health_check(&self) {
        match connection::check(self.transport.as_ref(), &self.ctx).await {
            Ok(report) if report.alive => {
                self.start_distance();
            }
            Ok(_) => {}
            Err(e) => warn!("Health check skipped: {}", e),
        }
    }

    fn start_distance(&self) {
        let last = Arc::new(Mutex::new(Proximity::Unknown));
        let sink: SampleSink = Arc::new(move |sample| {
            let proximity = Proximity::classify(sample);
            let mut last = last.lock();
            if *last != proximity {
                match proximity {
                    Proximity::Obstacle => warn!("[DISTANCE] Obstacle at {:?} cm", sample.get()),
                    Proximity::Clear => info!("[DISTANCE] Path clear"),
                    Proximity::Unknown => debug!("[DISTANCE] No reading"),
                }
                *last = proximity;
            }
        });
        self.distance
            .start(self.config.distance, self.distance_sampler.clone(), sink);
    }

    async fn handle(&self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Drive(motion) => match self.motion.submit(motion) {
                SubmitResult::Queued => debug!("Queued {}", motion.token()),
                SubmitResult::Replaced(previous) => {
                    debug!("Queued {} (replaced {})", motion.token(), previous)
                }
                SubmitResult::Rejected { reason } => println!("Dropped: {}", reason),
            },
            ConsoleCommand::Pwm(value) => match self.speed.request(value) {
                DutyRequest::Forwarded(duty) => println!(
                    "Duty {} (~{:.1} km/h)",
                    duty,
                    self.speed.estimated_speed_kmh()
                ),
                DutyRequest::Throttled => debug!("Duty {} throttled", value),
                DutyRequest::Disconnected => println!("Not connected; run `ping` first"),
                DutyRequest::Rejected(reason) => println!("Dropped: {}", reason),
            },
            ConsoleCommand::Ping => self.health_check().await,
            ConsoleCommand::Endpoint(address) => {
                self.ctx.endpoint().set(address.clone());
                info!("Controller address set to {}", address);
            }
            ConsoleCommand::DistanceStart => {
                if !self.ctx.gate().is_connected() {
                    println!("Not connected; samples will be empty until `ping` succeeds");
                }
                self.start_distance();
            }
            ConsoleCommand::DistanceStop => {
                self.distance.stop().await;
            }
            ConsoleCommand::JoystickStart => {
                let sink: SampleSink = Arc::new(|sample| {
                    debug!("[JOYSTICK] Deflection {:?}", sample.get());
                });
                self.joystick
                    .start(self.config.joystick, self.joystick_sampler.clone(), sink);
            }
            ConsoleCommand::JoystickStop => {
                self.joystick.stop().await;
                self.stick.release();
            }
            ConsoleCommand::Stick(x, y) => {
                self.stick.set(x, y);
                if !self.joystick.is_running() {
                    println!("Stick set; run `joystick start` to drive with it");
                }
            }
            ConsoleCommand::StickRelease => self.stick.release(),
            ConsoleCommand::History => {
                let history = self.distance.history();
                let recent: Vec<String> = history
                    .snapshot()
                    .iter()
                    .rev()
                    .take(20)
                    .map(|s| match s.get() {
                        Some(cm) => format!("{:.1}", cm),
                        None => "-".into(),
                    })
                    .collect();
                println!(
                    "{} samples, min {:?} cm, newest first: {}",
                    history.len(),
                    history.min_value(),
                    recent.join(" ")
                );
            }
            ConsoleCommand::Status => {
                println!(
                    "connected={} motion={:?} duty={:?} distance_polling={} joystick_polling={}",
                    self.ctx.gate().is_connected(),
                    self.motion.status(),
                    self.speed.dispatcher().status(),
                    self.distance.is_running(),
                    self.joystick.is_running()
                );
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
    }

    async fn shutdown(
        &self,
        motion_events: &mut DispatchEventReceiver,
        duty_events: &mut DispatchEventReceiver,
    ) {
        info!("Shutting down");
        self.joystick.stop().await;
        self.distance.stop().await;
        self.motion.shutdown();
        self.speed.dispatcher().shutdown();

        while let Ok(event) = motion_events.try_recv() {
            report_event("motion", event);
        }
        while let Ok(event) = duty_events.try_recv() {
            report_event("duty", event);
        }
    }
}

fn report_event(name: &str, event: DispatchEvent) {
    match event {
        DispatchEvent::SoftError { message, .. } => {
            println!("[{}] {}", name, message);
        }
        DispatchEvent::HardDisconnect { message } => {
            println!("[{}] Disconnected: {}", name, message);
            println!("Run `ping` to reconnect");
        }
    }
}
