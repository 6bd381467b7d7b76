//! Periodic sampling driver
//!
//! Runs a background task that takes one sample per tick, records it in the
//! poller's history and hands it to the consumer. A failed or skipped sample
//! is recorded as absent; the schedule itself never stops on its own.

use super::history::History;
use crate::connection::RoverContext;
use async_trait::async_trait;
use parking_lot::Mutex;
use rover_shared::{limits, Sample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Produces one reading per call; must not fail past the poller
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self) -> Sample;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;
}

/// Receives every recorded sample, present or absent
pub type SampleSink = Arc<dyn Fn(Sample) + Send + Sync>;

/// Tick timing for one poller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Delay before the first tick
    pub first_tick: Duration,
}

impl PollConfig {
    pub fn distance() -> Self {
        Self {
            interval: Duration::from_millis(limits::DISTANCE_POLL_MS),
            first_tick: Duration::from_millis(limits::DISTANCE_FIRST_TICK_MS),
        }
    }

    pub fn joystick() -> Self {
        Self {
            interval: Duration::from_millis(limits::JOYSTICK_POLL_MS),
            first_tick: Duration::from_millis(limits::JOYSTICK_FIRST_TICK_MS),
        }
    }
}

struct PollRun {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollRun {
    fn abort(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }

    /// Abort and wait until the task has fully exited
    async fn cancel(self) {
        self.abort();
        let _ = self.task.await;
    }
}

pub struct Poller {
    name: &'static str,
    ctx: RoverContext,
    history: Arc<History>,
    run: Mutex<Option<PollRun>>,
}

impl Poller {
    pub fn new(name: &'static str, ctx: RoverContext, capacity: usize) -> Self {
        Self {
            name,
            ctx,
            history: Arc::new(History::new(capacity)),
            run: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn history(&self) -> Arc<History> {
        self.history.clone()
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().is_some()
    }

    /// Start sampling. Returns false, changing nothing, if already running.
    pub fn start(
        &self,
        config: PollConfig,
        sampler: Arc<dyn Sampler>,
        on_sample: SampleSink,
    ) -> bool {
        let mut run = self.run.lock();
        if run.is_some() {
            return false;
        }

        let active = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(poll_loop(
            self.name,
            config,
            self.ctx.clone(),
            sampler.clone(),
            self.history.clone(),
            on_sample,
            active.clone(),
        ));

        info!(
            "[POLL:{}] Started {} every {:?}",
            self.name,
            sampler.name(),
            config.interval
        );
        *run = Some(PollRun { active, task });
        true
    }

    /// Stop sampling. Returns false if it was not running.
    ///
    /// Once this returns the sampler is never called again and a sample
    /// that was in flight has been dropped.
    pub async fn stop(&self) -> bool {
        let run = self.run.lock().take();
        match run {
            Some(run) => {
                run.cancel().await;
                info!("[POLL:{}] Stopped", self.name);
                true
            }
            None => false,
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.abort();
        }
    }
}

async fn poll_loop(
    name: &'static str,
    config: PollConfig,
    ctx: RoverContext,
    sampler: Arc<dyn Sampler>,
    history: Arc<History>,
    on_sample: SampleSink,
    active: Arc<AtomicBool>,
) {
    tokio::time::sleep(config.first_tick).await;

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !active.load(Ordering::SeqCst) {
            break;
        }

        let sample = if ctx.gate().is_connected() {
            sampler.sample().await
        } else {
            Sample::ABSENT
        };

        // Stopped while sampling: discard
        if !active.load(Ordering::SeqCst) {
            break;
        }
        history.push(sample);
        on_sample(sample);
    }

    debug!("[POLL:{}] Loop exited", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    struct CountingSampler {
        calls: AtomicUsize,
    }

    impl CountingSampler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sampler for CountingSampler {
        async fn sample(&self) -> Sample {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Sample::value(n as f64)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(100),
            first_tick: Duration::from_millis(10),
        }
    }

    fn collecting_sink() -> (SampleSink, Arc<Mutex<Vec<Sample>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: SampleSink = Arc::new(move |s| sink_seen.lock().push(s));
        (sink, seen)
    }

    fn connected_ctx() -> RoverContext {
        let ctx = RoverContext::new("10.0.0.2");
        ctx.gate().mark_alive();
        ctx
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_at_fixed_interval() {
        let poller = Poller::new("test", connected_ctx(), 16);
        let sampler = CountingSampler::new();
        let (sink, seen) = collecting_sink();

        assert!(poller.start(config(), sampler.clone(), sink));
        // Ticks at 10, 110, 210, 310, 410
        sleep(Duration::from_millis(450)).await;

        assert_eq!(sampler.calls(), 5);
        assert_eq!(poller.history().len(), 5);
        assert_eq!(seen.lock().len(), 5);
        assert_eq!(poller.history().last(), Some(Sample::value(4.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let poller = Poller::new("test", connected_ctx(), 16);
        let sampler = CountingSampler::new();
        let (sink, _seen) = collecting_sink();

        assert!(poller.start(config(), sampler.clone(), sink.clone()));
        assert!(!poller.start(config(), sampler.clone(), sink));
        sleep(Duration::from_millis(450)).await;

        assert_eq!(sampler.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_sampling() {
        let poller = Poller::new("test", connected_ctx(), 16);
        let sampler = CountingSampler::new();
        let (sink, _seen) = collecting_sink();

        poller.start(config(), sampler.clone(), sink.clone());
        sleep(Duration::from_millis(250)).await;
        assert!(poller.stop().await);
        assert!(!poller.stop().await);
        assert!(!poller.is_running());

        let after_stop = sampler.calls();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(sampler.calls(), after_stop);

        // Restartable
        assert!(poller.start(config(), sampler.clone(), sink));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sampler.calls(), after_stop + 1);
    }

    struct SlowSampler {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl Sampler for SlowSampler {
        async fn sample(&self) -> Sample {
            self.started.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(200)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Sample::value(1.0)
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_inflight_sample() {
        let poller = Poller::new("test", connected_ctx(), 16);
        let sampler = Arc::new(SlowSampler {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        let (sink, seen) = collecting_sink();

        poller.start(config(), sampler.clone(), sink);
        // First sample starts at 10 and would finish at 210
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sampler.started.load(Ordering::SeqCst), 1);

        assert!(poller.stop().await);
        sleep(Duration::from_secs(1)).await;

        assert_eq!(sampler.started.load(Ordering::SeqCst), 1);
        assert_eq!(sampler.finished.load(Ordering::SeqCst), 0);
        assert!(poller.history().is_empty());
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_sample_after_stop_returns() {
        let fast = PollConfig {
            interval: Duration::from_millis(1),
            first_tick: Duration::ZERO,
        };
        for _ in 0..20 {
            let poller = Poller::new("test", connected_ctx(), 16);
            let sampler = CountingSampler::new();
            let (sink, _seen) = collecting_sink();

            poller.start(fast, sampler.clone(), sink);
            sleep(Duration::from_millis(3)).await;
            poller.stop().await;

            let after_stop = sampler.calls();
            sleep(Duration::from_millis(10)).await;
            assert_eq!(sampler.calls(), after_stop);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_ticks_record_absent() {
        let ctx = RoverContext::new("10.0.0.2");
        let poller = Poller::new("test", ctx.clone(), 16);
        let sampler = CountingSampler::new();
        let (sink, seen) = collecting_sink();

        poller.start(config(), sampler.clone(), sink);
        sleep(Duration::from_millis(250)).await;

        assert_eq!(sampler.calls(), 0);
        assert_eq!(*seen.lock(), vec![Sample::ABSENT; 3]);

        // The schedule kept running and picks up once connected
        ctx.gate().mark_alive();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sampler.calls(), 1);
        assert_eq!(poller.history().last(), Some(Sample::value(0.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded() {
        let poller = Poller::new("test", connected_ctx(), 4);
        let sampler = CountingSampler::new();
        let (sink, _seen) = collecting_sink();

        poller.start(config(), sampler.clone(), sink);
        sleep(Duration::from_millis(1000)).await;

        let history = poller.history();
        assert_eq!(sampler.calls(), 10);
        assert_eq!(history.len(), 4);
        assert_eq!(history.snapshot()[0], Sample::value(6.0));
        assert_eq!(history.last(), Some(Sample::value(9.0)));
    }
}
