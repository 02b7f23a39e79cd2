//! Acquisition engine integration tests.
//!
//! The capture context is driven by hand (one `capture_half` call per
//! half-buffer period) so buffer-discipline properties are exercised
//! deterministically, without thread timing.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use logicprobe_engine::{
    AcquisitionController, HandoffOutcome, MemoryTransport, PatternSource, SampleProducer,
    SampleTransmitter, Session, TransmitWorker,
};
use logicprobe_telemetry::ProbeMetrics;

fn setup() -> (Arc<Session>, AcquisitionController, Arc<ProbeMetrics>) {
    let session = Arc::new(Session::new());
    let metrics = Arc::new(ProbeMetrics::new());
    let controller =
        AcquisitionController::new(Arc::clone(&session)).with_metrics(Arc::clone(&metrics));
    (session, controller, metrics)
}

fn producer<'s>(
    session: &Arc<Session>,
    metrics: &Arc<ProbeMetrics>,
    source: &'s mut PatternSource,
) -> SampleProducer<'s> {
    SampleProducer::new(
        Arc::clone(session),
        session.buffers().expect("session is armed"),
        source,
        Some(Arc::clone(metrics)),
    )
}

fn transmitter(
    session: &Arc<Session>,
    metrics: &Arc<ProbeMetrics>,
    transport: &Arc<MemoryTransport>,
) -> SampleTransmitter {
    SampleTransmitter::new(Arc::clone(session), transport.clone()).with_metrics(Arc::clone(metrics))
}

/// Split a drained byte stream into (sample bytes, end-of-run report).
fn split_stream(bytes: &[u8]) -> (&[u8], &[u8]) {
    let bang = bytes
        .iter()
        .position(|&b| b == b'!')
        .expect("end-of-run marker");
    (&bytes[..bang], &bytes[bang + 1..])
}

#[test]
fn bounded_run_delivers_exact_sample_count() {
    let (session, controller, metrics) = setup();
    controller.configure(1_000_000, 0, 0xFF, 1000, false).unwrap();
    controller.arm().unwrap();
    controller.start().unwrap();

    let transport = MemoryTransport::unbounded();
    let mut tx = transmitter(&session, &metrics, &transport);
    let mut source = PatternSource::new();
    let mut prod = producer(&session, &metrics, &mut source);

    // Transmitter faster than producer: pump after every half.
    loop {
        let outcome = prod.capture_half();
        tx.pump().unwrap();
        if outcome.is_terminal() {
            assert_eq!(outcome, HandoffOutcome::Completed);
            break;
        }
    }
    tx.pump().unwrap();

    assert!(!session.state.is_aborted());
    assert!(!session.state.is_overrun());
    assert_eq!(session.state.samples_sent(), 1000);

    let bytes = transport.take();
    let (samples, trailer) = split_stream(&bytes);
    // 8 digital channels -> two wire bytes per slice.
    assert_eq!(samples.len(), 1000 * 2);
    assert!(samples.iter().all(|b| b & 0x80 != 0));
    assert_eq!(trailer, b"$1000+");
    // Counting pattern: slice 0 is word 0, slice 1 is word 1.
    assert_eq!(&samples[..4], &[0x80, 0x80, 0x81, 0x80]);
}

#[test]
fn bounded_run_spanning_halves_records_partial_final_half() {
    let (session, controller, metrics) = setup();
    // Digital only: samples_per_half = 100_000 / (2 * 4) = 12_500.
    let limit = 2 * 12_500 + 7;
    controller
        .configure(1_000_000, 0, 0xFF, limit as u64, false)
        .unwrap();
    controller.start().unwrap();
    assert_eq!(
        session.buffers().unwrap().geometry().samples_per_half,
        12_500
    );

    let transport = MemoryTransport::unbounded();
    let mut tx = transmitter(&session, &metrics, &transport);
    let mut source = PatternSource::new();
    let mut prod = producer(&session, &metrics, &mut source);

    assert_eq!(prod.capture_half(), HandoffOutcome::Continue);
    tx.pump().unwrap();
    assert_eq!(prod.capture_half(), HandoffOutcome::Continue);
    tx.pump().unwrap();
    // Final half holds only the 7 remaining samples.
    assert_eq!(prod.capture_half(), HandoffOutcome::Completed);
    tx.pump().unwrap();

    assert_eq!(session.state.samples_sent(), limit as u64);
    let bytes = transport.take();
    let (samples, trailer) = split_stream(&bytes);
    assert_eq!(samples.len(), limit * 2);
    assert_eq!(trailer, format!("${limit}+").into_bytes());
    assert_eq!(metrics.halves_captured.load(Ordering::Relaxed), 3);
    assert_eq!(metrics.halves_sent.load(Ordering::Relaxed), 3);
}

#[test]
fn stalled_transmitter_trips_overrun_exactly_once() {
    let (session, controller, metrics) = setup();
    controller.configure(1_000_000, 0, 0xFF, 0, true).unwrap();
    controller.start().unwrap();

    let mut source = PatternSource::new();
    let mut prod = producer(&session, &metrics, &mut source);

    // Both halves fill without a single drain: the third period finds
    // its target half still ready.
    assert_eq!(prod.capture_half(), HandoffOutcome::Continue);
    assert_eq!(prod.capture_half(), HandoffOutcome::Overrun);

    assert!(session.state.is_aborted());
    assert!(session.state.is_overrun());
    assert!(!session.state.is_sampling());
    assert_eq!(metrics.overruns.load(Ordering::Relaxed), 1);

    // Capture stays halted; no second overrun is recorded.
    assert_eq!(prod.capture_half(), HandoffOutcome::Aborted);
    assert_eq!(metrics.overruns.load(Ordering::Relaxed), 1);

    // Both published halves are still intact and drain normally.
    let transport = MemoryTransport::unbounded();
    let mut tx = transmitter(&session, &metrics, &transport);
    tx.pump().unwrap();
    let bytes = transport.take();
    let (samples, trailer) = split_stream(&bytes);
    assert_eq!(samples.len(), 2 * 12_500 * 2);
    assert_eq!(trailer, b"$25000+");
}

#[test]
fn continuous_mode_ignores_sample_limit() {
    let (session, controller, metrics) = setup();
    // A limit is configured but continuous mode must ignore it.
    controller.configure(1_000_000, 0, 0xFF, 1000, true).unwrap();
    controller.start().unwrap();

    let transport = MemoryTransport::unbounded();
    let mut tx = transmitter(&session, &metrics, &transport);
    let mut source = PatternSource::new();
    let mut prod = producer(&session, &metrics, &mut source);

    for _ in 0..3 {
        assert_eq!(prod.capture_half(), HandoffOutcome::Continue);
        tx.pump().unwrap();
    }
    assert!(session.state.is_sampling());
    assert!(session.state.samples_sent() > 1000);

    // Only an explicit stop ends the run.
    controller.stop();
    assert_eq!(prod.capture_half(), HandoffOutcome::Aborted);
    tx.pump().unwrap();

    assert!(!session.state.is_sampling());
    assert!(!session.state.is_overrun());
    let bytes = transport.take();
    let (_, trailer) = split_stream(&bytes);
    assert_eq!(
        trailer,
        format!("${}+", session.state.samples_sent()).into_bytes()
    );
}

#[test]
fn saturated_transport_delivers_in_order_across_pumps() {
    let (session, controller, metrics) = setup();
    controller.configure(1_000_000, 0, 0x7F, 100, false).unwrap();
    controller.start().unwrap();

    // Narrow outbound queue: 16 unread bytes at a time.
    let transport = MemoryTransport::with_capacity(16);
    let mut tx = transmitter(&session, &metrics, &transport);
    let mut source = PatternSource::new();
    let mut prod = producer(&session, &metrics, &mut source);

    assert_eq!(prod.capture_half(), HandoffOutcome::Completed);

    let mut delivered = Vec::new();
    for _ in 0..64 {
        tx.pump().unwrap();
        delivered.extend(transport.take());
    }
    // 7 digital channels -> one byte per slice.
    let (samples, trailer) = split_stream(&delivered);
    assert_eq!(samples.len(), 100);
    assert_eq!(trailer, b"$100+");
    assert_eq!(samples[0], 0x80);
    assert_eq!(samples[1], 0x81);
}

#[test]
fn responses_precede_sample_data() {
    let (session, controller, metrics) = setup();
    controller.configure(1_000_000, 0, 0x01, 10, false).unwrap();
    controller.start().unwrap();

    let transport = MemoryTransport::unbounded();
    let mut tx = transmitter(&session, &metrics, &transport);

    session.queue_response(b"*").unwrap();
    let mut source = PatternSource::new();
    let mut prod = producer(&session, &metrics, &mut source);
    assert_eq!(prod.capture_half(), HandoffOutcome::Completed);
    tx.pump().unwrap();

    let bytes = transport.take();
    assert_eq!(bytes[0], b'*');
    let (samples, trailer) = split_stream(&bytes[1..]);
    assert_eq!(samples.len(), 10);
    assert_eq!(trailer, b"$10+");
}

#[tokio::test]
async fn disconnect_triggers_run_reset() {
    let (session, controller, metrics) = setup();
    controller.configure(1_000_000, 0, 0xFF, 1000, false).unwrap();
    controller.start().unwrap();
    {
        let mut source = PatternSource::new();
        let mut prod = producer(&session, &metrics, &mut source);
        prod.capture_half();
    }

    let transport = MemoryTransport::unbounded();
    let tx = transmitter(&session, &metrics, &transport);
    let worker = TransmitWorker::new(tx, Arc::clone(&session));
    let handle = worker.spawn();

    transport.disconnect();
    session.notifier.notify();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("worker exits on disconnect")
        .unwrap();

    // Disconnection acts as an implicit run reset: flags and buffers
    // cleared, configuration preserved.
    assert!(!session.state.is_sampling());
    assert!(!session.state.is_armed());
    assert!(session.buffers().is_none());
    assert_eq!(session.config().digital_mask, 0xFF);
}
