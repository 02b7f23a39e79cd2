use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Cross-context run state for the single acquisition session.
///
/// There is no mutual exclusion here; correctness rests on a
/// single-writer-per-field discipline with acquire/release pairs so a
/// write on one context is visible to the other:
///
/// - `armed` — written by the communication context (arm / reset).
/// - `sampling` — set by the communication context at `start`, cleared
///   only by the capture context when the run terminates.
/// - `continuous` — written by the communication context while unarmed.
/// - `aborted` — set by the communication context (host stop/abort) or
///   by the capture context (overrun); never cleared during a run.
/// - `overrun` — written only by the capture context.
/// - `response_pending` — set by the parser, cleared by the transmitter.
/// - `samples_remaining` — written only by the capture context.
/// - `samples_sent` — written only by the communication context
///   (transmitter) as slices are delivered.
///
/// All flag stores use `Release` and loads use `Acquire`.
#[derive(Debug, Default)]
pub struct SessionState {
    armed: AtomicBool,
    sampling: AtomicBool,
    continuous: AtomicBool,
    aborted: AtomicBool,
    overrun: AtomicBool,
    response_pending: AtomicBool,
    run_active: AtomicBool,
    samples_remaining: AtomicU64,
    samples_sent: AtomicU64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run reset: clear run flags and counters, configuration untouched.
    /// Idempotent.
    pub fn run_reset(&self) {
        self.armed.store(false, Ordering::Release);
        self.sampling.store(false, Ordering::Release);
        self.continuous.store(false, Ordering::Release);
        self.aborted.store(false, Ordering::Release);
        self.overrun.store(false, Ordering::Release);
        self.response_pending.store(false, Ordering::Release);
        self.run_active.store(false, Ordering::Release);
        self.samples_remaining.store(0, Ordering::Release);
        self.samples_sent.store(0, Ordering::Release);
        tracing::debug!("run state cleared");
    }

    /// Prime the counters for a new run.
    pub fn begin_run(&self, sample_limit: u64, continuous: bool) {
        tracing::info!(sample_limit, continuous, "run starting");
        self.continuous.store(continuous, Ordering::Release);
        self.aborted.store(false, Ordering::Release);
        self.overrun.store(false, Ordering::Release);
        self.samples_remaining.store(sample_limit, Ordering::Release);
        self.samples_sent.store(0, Ordering::Release);
        self.run_active.store(true, Ordering::Release);
        self.sampling.store(true, Ordering::Release);
    }

    /// True between `begin_run` and the transmitter's end-of-run
    /// report. Both transitions happen on the communication context.
    pub fn is_run_active(&self) -> bool {
        self.run_active.load(Ordering::Acquire)
    }

    pub fn clear_run_active(&self) {
        self.run_active.store(false, Ordering::Release);
    }

    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.load(Ordering::Acquire)
    }

    /// Capture context only: the run has terminated.
    pub fn stop_sampling(&self) {
        self.sampling.store(false, Ordering::Release);
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous.load(Ordering::Acquire)
    }

    pub fn set_aborted(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Capture context only: record an overrun, distinct from a plain
    /// host abort.
    pub fn set_overrun(&self) {
        self.overrun.store(true, Ordering::Release);
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_overrun(&self) -> bool {
        self.overrun.load(Ordering::Acquire)
    }

    pub fn set_response_pending(&self) {
        self.response_pending.store(true, Ordering::Release);
    }

    pub fn is_response_pending(&self) -> bool {
        self.response_pending.load(Ordering::Acquire)
    }

    pub fn clear_response_pending(&self) {
        self.response_pending.store(false, Ordering::Release);
    }

    pub fn samples_remaining(&self) -> u64 {
        self.samples_remaining.load(Ordering::Acquire)
    }

    /// Capture context only. Returns the count left after this half.
    pub fn consume_samples(&self, count: u64) -> u64 {
        let before = self.samples_remaining.load(Ordering::Acquire);
        let after = before.saturating_sub(count);
        self.samples_remaining.store(after, Ordering::Release);
        after
    }

    pub fn add_samples_sent(&self, count: u64) {
        self.samples_sent.fetch_add(count, Ordering::AcqRel);
    }

    pub fn samples_sent(&self) -> u64 {
        self.samples_sent.load(Ordering::Acquire)
    }
}
