//! Interval-based progress logging for long calling runs.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

/// Thread-safe progress tracker that logs when the running count crosses
/// interval boundaries. Sites are independent, so the host may drive one
/// tracker from several workers.
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with a default interval of 10,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 10_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the logging interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds to the count, logging each interval boundary crossed.
    pub fn add(&self, additional: u64) {
        if additional == 0 {
            return;
        }
        let previous = self.count.fetch_add(additional, Ordering::Relaxed);
        let current = previous + additional;
        for crossed in (previous / self.interval + 1)..=(current / self.interval) {
            info!("{} {}", self.message, format_milestone(crossed * self.interval));
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Logs the final count when it did not land on an interval boundary.
    pub fn log_final(&self) {
        let count = self.count();
        if count % self.interval != 0 {
            info!("{} {} (complete)", self.message, format_milestone(count));
        }
    }
}

fn format_milestone(count: u64) -> String {
    crate::logging::format_count(count)
}
