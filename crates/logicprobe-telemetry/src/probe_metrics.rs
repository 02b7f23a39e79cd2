use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared counters for cross-context monitoring of the acquisition
/// pipeline. Capture and communication contexts both update these with
/// relaxed atomics; values are advisory and never drive control flow.
#[derive(Clone, Default)]
pub struct ProbeMetrics {
    // Capture side
    pub halves_captured: Arc<AtomicU64>,
    pub runs_started: Arc<AtomicU64>,
    pub runs_completed: Arc<AtomicU64>,
    pub overruns: Arc<AtomicU64>,

    // Delivery side
    pub halves_sent: Arc<AtomicU64>,
    pub slices_sent: Arc<AtomicU64>,
    pub bytes_sent: Arc<AtomicU64>,
    pub responses_sent: Arc<AtomicU64>,

    // Command channel
    pub commands_accepted: Arc<AtomicU64>,
    pub commands_rejected: Arc<AtomicU64>,

    pub last_slice_time: Arc<RwLock<Option<Instant>>>,
}

impl ProbeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_halves_captured(&self) {
        self.halves_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_overruns(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_halves_sent(&self) {
        self.halves_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_slices_sent(&self, count: u64) {
        self.slices_sent.fetch_add(count, Ordering::Relaxed);
        *self.last_slice_time.write() = Some(Instant::now());
    }

    pub fn add_bytes_sent(&self, count: u64) {
        self.bytes_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_responses_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commands_accepted(&self) {
        self.commands_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commands_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = ProbeMetrics::new();
        let other = metrics.clone();
        metrics.add_slices_sent(10);
        other.add_slices_sent(5);
        assert_eq!(metrics.slices_sent.load(Ordering::Relaxed), 15);
        assert!(metrics.last_slice_time.read().is_some());
    }
}
