//! Fixed-capacity sample history
//!
//! Written by one poller, read by any number of consumers.

use parking_lot::Mutex;
use rover_shared::Sample;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct History {
    samples: Mutex<VecDeque<Sample>>,
    capacity: usize,
}

impl History {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append, evicting and returning the oldest sample when full
    pub fn push(&self, sample: Sample) -> Option<Sample> {
        let mut samples = self.samples.lock();
        let evicted = if samples.len() == self.capacity {
            samples.pop_front()
        } else {
            None
        };
        samples.push_back(sample);
        evicted
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.lock().iter().copied().collect()
    }

    pub fn last(&self) -> Option<Sample> {
        self.samples.lock().back().copied()
    }

    /// Smallest present reading in the window
    pub fn min_value(&self) -> Option<f64> {
        self.samples
            .lock()
            .iter()
            .filter_map(Sample::get)
            .reduce(f64::min)
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
