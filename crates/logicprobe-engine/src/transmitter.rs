use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use logicprobe_foundation::TransportError;
use logicprobe_telemetry::ProbeMetrics;

use crate::buffer::{CaptureBuffers, HalfIndex};
use crate::session::Session;
use crate::transport::Transport;
use crate::wire;

/// Delivery-side half of the engine.
///
/// Drains ready half-buffers in capture order, packs them into the
/// wire sample format, and forwards the bytes to the transport's
/// non-blocking write. Also flushes staged protocol responses and the
/// end-of-run report. Never blocks and never signals the capture
/// context; if the transport cannot keep up, the producer's overrun
/// rule is the backpressure outcome.
pub struct SampleTransmitter {
    session: Arc<Session>,
    transport: Arc<dyn Transport>,
    metrics: Option<Arc<ProbeMetrics>>,
    current: Option<Arc<CaptureBuffers>>,
    next: HalfIndex,
    pending: Vec<u8>,
}

impl SampleTransmitter {
    pub fn new(session: Arc<Session>, transport: Arc<dyn Transport>) -> Self {
        Self {
            session,
            transport,
            metrics: None,
            current: None,
            next: HalfIndex::A,
            pending: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ProbeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// One drain pass. Safe to call spuriously; wakeups coalesce and
    /// carry no payload, so everything is re-derived from session state.
    pub fn pump(&mut self) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            return Err(TransportError::Disconnected);
        }

        self.flush_response()?;
        self.sync_buffers();
        self.drain_ready()?;

        if self.session.state.is_run_active() && !self.session.state.is_sampling() {
            // The producer publishes its final half before clearing
            // `sampling` (release/acquire), so one more drain pass
            // observes everything it handed off.
            self.drain_ready()?;
            self.finish_run()?;
        }
        Ok(())
    }

    fn flush_response(&mut self) -> Result<(), TransportError> {
        if let Some(bytes) = self.session.drain_response() {
            tracing::debug!(response = %String::from_utf8_lossy(&bytes), "flushing response");
            self.pending.extend_from_slice(&bytes);
            if let Some(m) = &self.metrics {
                m.increment_responses_sent();
            }
        }
        self.flush_pending()
    }

    /// A re-arm installs fresh buffers; restart the drain cursor.
    fn sync_buffers(&mut self) {
        let buffers = self.session.buffers();
        let changed = match (&self.current, &buffers) {
            (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        if changed {
            self.current = buffers;
            self.next = HalfIndex::A;
        }
    }

    fn drain_ready(&mut self) -> Result<(), TransportError> {
        let Some(buffers) = self.current.clone() else {
            return Ok(());
        };
        let cfg = self.session.config();
        let stride = cfg.analog_count as usize;

        loop {
            self.flush_pending()?;
            if !self.pending.is_empty() {
                // Transport saturated; retry on the next wakeup.
                tracing::trace!(queued = self.pending.len(), "transport busy");
                return Ok(());
            }
            let half = buffers.half(self.next);
            if !half.is_ready() {
                return Ok(());
            }

            let valid = half.valid_samples();
            {
                let digital = half.digital();
                let analog = half.analog();
                wire::pack_slices(&cfg, &digital, &analog[..valid * stride], valid, &mut self.pending);
            }
            half.retire();
            self.session.state.add_samples_sent(valid as u64);
            if let Some(m) = &self.metrics {
                m.increment_halves_sent();
                m.add_slices_sent(valid as u64);
            }
            self.next = self.next.other();
        }
    }

    /// Emit the end-of-run marker and sample-count report once all
    /// halves of the finished run are drained.
    fn finish_run(&mut self) -> Result<(), TransportError> {
        let Some(buffers) = self.current.clone() else {
            return self.emit_trailer();
        };
        if buffers.half(HalfIndex::A).is_ready() || buffers.half(HalfIndex::B).is_ready() {
            return Ok(());
        }
        self.emit_trailer()
    }

    fn emit_trailer(&mut self) -> Result<(), TransportError> {
        self.flush_pending()?;
        if !self.pending.is_empty() {
            return Ok(());
        }
        let sent = self.session.state.samples_sent();
        self.pending.push(wire::END_OF_RUN);
        self.pending.extend_from_slice(&wire::run_trailer(sent));
        self.session.state.clear_run_active();
        self.next = HalfIndex::A;
        tracing::info!(
            samples_sent = sent,
            aborted = self.session.state.is_aborted(),
            overrun = self.session.state.is_overrun(),
            "run delivery finished"
        );
        self.flush_pending()
    }

    fn flush_pending(&mut self) -> Result<(), TransportError> {
        while !self.pending.is_empty() {
            let accepted = self.transport.try_write(&self.pending)?;
            if accepted == 0 {
                return Ok(());
            }
            self.pending.drain(..accepted);
            if let Some(m) = &self.metrics {
                m.add_bytes_sent(accepted as u64);
            }
        }
        Ok(())
    }
}

/// Async wrapper driving a [`SampleTransmitter`] off the session
/// notifier, one task per transport connection. The worker lives
/// exactly as long as its transport: transport disconnect is the one
/// exit path.
pub struct TransmitWorker {
    transmitter: SampleTransmitter,
    session: Arc<Session>,
}

impl TransmitWorker {
    pub fn new(transmitter: SampleTransmitter, session: Arc<Session>) -> Self {
        Self {
            transmitter,
            session,
        }
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("transmit worker started");
            loop {
                // The periodic branch guards against a wakeup lost to
                // task startup ordering; pump is idempotent.
                tokio::select! {
                    _ = self.session.notifier.notified() => {}
                    _ = time::sleep(Duration::from_millis(5)) => {}
                }
                match self.transmitter.pump() {
                    Ok(()) => {}
                    Err(TransportError::Disconnected) => {
                        tracing::warn!("host connection lost, run reset");
                        self.session.run_reset();
                        break;
                    }
                }
            }
            tracing::info!("transmit worker stopped");
        })
    }
}
