//! Scripted in-memory transport for tests

use crate::transport::traits::{HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub base: String,
    pub path: String,
}

/// Answers from a queue of scripted results, then from a fallback
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    fallback: Mutex<Result<HttpResponse, TransportError>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Each call takes `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(HttpResponse::new(200, "ok"))),
            calls: Mutex::new(Vec::new()),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, result: Result<HttpResponse, TransportError>) {
        self.script.lock().push_back(result);
    }

    pub fn set_fallback(&self, result: Result<HttpResponse, TransportError>) {
        *self.fallback.lock() = result;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.path.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of calls observed in flight at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, base: &str, path: &str) -> Result<HttpResponse, TransportError> {
        self.calls.lock().push(RecordedCall {
            at: Instant::now(),
            base: base.to_string(),
            path: path.to_string(),
        });
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self.script.lock().pop_front();
        self.active.fetch_sub(1, Ordering::SeqCst);
        result.unwrap_or_else(|| self.fallback.lock().clone())
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}
