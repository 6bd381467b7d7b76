//! Ultrasonic distance sampling

use super::scheduler::Sampler;
use crate::connection::RoverContext;
use crate::transport::Transport;
use async_trait::async_trait;
use rover_shared::codec::{decode_reading, Reading};
use rover_shared::{limits, Sample};
use std::sync::Arc;
use tracing::debug;

/// Reads `/distancia` once per call
pub struct DistanceSampler {
    ctx: RoverContext,
    transport: Arc<dyn Transport>,
}

impl DistanceSampler {
    pub fn new(ctx: RoverContext, transport: Arc<dyn Transport>) -> Self {
        Self { ctx, transport }
    }
}

#[async_trait]
impl Sampler for DistanceSampler {
    async fn sample(&self) -> Sample {
        let endpoint = match self.ctx.endpoint().resolve() {
            Ok(endpoint) => endpoint,
            Err(_) => return Sample::ABSENT,
        };

        match self.transport.get(&endpoint, "distancia").await {
            Ok(response) if response.is_ok() => match decode_reading(&response.body) {
                Reading::Malformed(e) => {
                    debug!("[DISTANCE] Unreadable body: {}", e);
                    Sample::ABSENT
                }
                reading => reading.into_sample(),
            },
            Ok(response) => {
                debug!("[DISTANCE] HTTP {}", response.status);
                Sample::ABSENT
            }
            Err(e) => {
                debug!("[DISTANCE] {}", e);
                Sample::ABSENT
            }
        }
    }

    fn name(&self) -> &'static str {
        "distance"
    }
}

/// Obstacle classification of a distance sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    Obstacle,
    Clear,
    Unknown,
}

impl Proximity {
    pub fn classify(sample: Sample) -> Self {
        match sample.get() {
            Some(cm) if cm <= limits::OBSTACLE_THRESHOLD_CM => Proximity::Obstacle,
            Some(_) => Proximity::Clear,
            None => Proximity::Unknown,
        }
    }
}
