use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use logicprobe_foundation::{AcquisitionConfig, ProbeError};
use logicprobe_telemetry::ProbeMetrics;

use crate::buffer::{CaptureBuffers, HalfIndex};
use crate::session::Session;
use crate::source::SampleSource;

const IDLE_POLL: Duration = Duration::from_millis(1);

/// Result of one half-buffer period on the capture context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// Half published, capture continues on the other half.
    Continue,
    /// Bounded sample count reached (or the source ran dry); run over.
    Completed,
    /// Host abort observed at the swap boundary.
    Aborted,
    /// The half about to become active was still awaiting drain.
    Overrun,
}

impl HandoffOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HandoffOutcome::Continue)
    }
}

/// Capture-side half of the engine, driven once per half-buffer fill.
///
/// Owns the active-half cursor for the duration of one run. The only
/// state it shares with the communication context are the ready flags,
/// the run flags and the remaining-sample countdown, all per the
/// single-writer contract on `SessionState`.
pub struct SampleProducer<'s> {
    session: Arc<Session>,
    buffers: Arc<CaptureBuffers>,
    config: AcquisitionConfig,
    source: &'s mut dyn SampleSource,
    active: HalfIndex,
    metrics: Option<Arc<ProbeMetrics>>,
}

impl<'s> SampleProducer<'s> {
    pub fn new(
        session: Arc<Session>,
        buffers: Arc<CaptureBuffers>,
        source: &'s mut dyn SampleSource,
        metrics: Option<Arc<ProbeMetrics>>,
    ) -> Self {
        let config = session.config();
        Self {
            session,
            buffers,
            config,
            source,
            active: HalfIndex::A,
            metrics,
        }
    }

    /// One half-buffer period: fill the active half from the source,
    /// then hand it off. Terminal outcomes clear `sampling`.
    pub fn capture_half(&mut self) -> HandoffOutcome {
        if self.session.state.is_aborted() {
            return self.finish(HandoffOutcome::Aborted);
        }
        if !self.session.state.is_sampling() {
            // Run reset from the communication context.
            return self.finish(HandoffOutcome::Aborted);
        }

        let bounded = !self.session.state.is_continuous();
        let samples_per_half = self.buffers.geometry().samples_per_half;
        let mut want = samples_per_half;
        if bounded {
            want = want.min(self.session.state.samples_remaining() as usize);
        }

        let stride = self.config.analog_count as usize;
        let produced = {
            let half = self.buffers.half(self.active);
            let mut digital = half.digital();
            let mut analog = half.analog();
            let digital_len = want.min(digital.len());
            self.source.fill(
                &mut digital[..digital_len],
                &mut analog[..want * stride],
                want,
                stride,
            )
        };

        self.complete_half(produced, want, bounded)
    }

    /// Buffer-fill completion: publish, swap, count down, and apply the
    /// overrun rule.
    fn complete_half(&mut self, produced: usize, want: usize, bounded: bool) -> HandoffOutcome {
        self.buffers.half(self.active).publish(produced);
        if let Some(m) = &self.metrics {
            m.increment_halves_captured();
        }

        let remaining = if bounded {
            self.session.state.consume_samples(produced as u64)
        } else {
            u64::MAX
        };

        // New ready half for the transmitter.
        self.session.notifier.notify();

        if self.session.state.is_aborted() {
            return self.finish(HandoffOutcome::Aborted);
        }
        if bounded && remaining == 0 {
            return self.finish(HandoffOutcome::Completed);
        }
        if produced < want {
            tracing::info!(produced, want, "sample source exhausted, ending run");
            return self.finish(HandoffOutcome::Completed);
        }

        let next = self.active.other();
        if self.buffers.half(next).is_ready() {
            // The transmitter has not drained the other half yet: data
            // would be overwritten. Halt capture rather than corrupt.
            self.session.state.set_overrun();
            if let Some(m) = &self.metrics {
                m.increment_overruns();
            }
            tracing::error!(
                samples_sent = self.session.state.samples_sent(),
                "half-buffer overrun, aborting run"
            );
            return self.finish(HandoffOutcome::Overrun);
        }

        self.active = next;
        HandoffOutcome::Continue
    }

    fn finish(&mut self, outcome: HandoffOutcome) -> HandoffOutcome {
        self.session.state.stop_sampling();
        if outcome == HandoffOutcome::Completed {
            if let Some(m) = &self.metrics {
                m.increment_runs_completed();
            }
        }
        tracing::info!(?outcome, "capture run ended");
        self.session.notifier.notify();
        outcome
    }
}

/// Handle to the dedicated capture thread, the process's stand-in for
/// the second core of the reference hardware.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureThread {
    pub fn spawn(
        session: Arc<Session>,
        mut source: Box<dyn SampleSource>,
        metrics: Option<Arc<ProbeMetrics>>,
    ) -> Result<Self, ProbeError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                tracing::info!("capture thread started");
                while !thread_shutdown.load(Ordering::Relaxed) {
                    if !session.state.is_sampling() {
                        thread::sleep(IDLE_POLL);
                        continue;
                    }
                    let Some(buffers) = session.buffers() else {
                        thread::sleep(IDLE_POLL);
                        continue;
                    };

                    let rate = session.config().sample_rate;
                    let samples_per_half = buffers.geometry().samples_per_half;
                    let half_period =
                        Duration::from_secs_f64(samples_per_half as f64 / rate as f64);
                    let mut producer = SampleProducer::new(
                        Arc::clone(&session),
                        buffers,
                        source.as_mut(),
                        metrics.clone(),
                    );
                    tracing::info!(rate, samples_per_half, "capture run loop entered");

                    while !thread_shutdown.load(Ordering::Relaxed) {
                        let started = Instant::now();
                        let outcome = producer.capture_half();
                        if outcome.is_terminal() {
                            break;
                        }
                        // Pace fills to the configured rate, as the DMA
                        // completion interrupt would.
                        let elapsed = started.elapsed();
                        if elapsed < half_period {
                            thread::sleep(half_period - elapsed);
                        }
                    }
                }
                tracing::info!("capture thread shutting down");
            })
            .map_err(|e| ProbeError::Fatal(format!("Failed to spawn capture thread: {}", e)))?;

        Ok(Self { handle, shutdown })
    }

    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}
