//! End-to-end command conversations against the acquisition engine,
//! with capture driven by hand for determinism.

use std::sync::Arc;

use logicprobe_engine::{
    AcquisitionController, MemoryTransport, PatternSource, SampleProducer, SampleTransmitter,
    Session,
};
use logicprobe_protocol::ProtocolHandler;
use logicprobe_telemetry::ProbeMetrics;

struct Host {
    session: Arc<Session>,
    handler: ProtocolHandler,
    transmitter: SampleTransmitter,
    transport: Arc<MemoryTransport>,
    metrics: Arc<ProbeMetrics>,
}

impl Host {
    fn connect() -> Self {
        let session = Arc::new(Session::new());
        let metrics = Arc::new(ProbeMetrics::new());
        let controller = AcquisitionController::new(Arc::clone(&session))
            .with_metrics(Arc::clone(&metrics));
        let handler = ProtocolHandler::new(controller).with_metrics(Arc::clone(&metrics));
        let transport = MemoryTransport::unbounded();
        let transmitter = SampleTransmitter::new(Arc::clone(&session), transport.clone())
            .with_metrics(Arc::clone(&metrics));
        Self {
            session,
            handler,
            transmitter,
            transport,
            metrics,
        }
    }

    /// Send one command line and read back its response.
    fn command(&mut self, line: &[u8]) -> Vec<u8> {
        self.handler.on_bytes(line).unwrap();
        self.transmitter.pump().unwrap();
        self.transport.take()
    }

    /// Fill half-buffers until the run terminates, pumping in between.
    fn run_capture(&mut self) -> Vec<u8> {
        let mut source = PatternSource::new();
        let mut producer = SampleProducer::new(
            Arc::clone(&self.session),
            self.session.buffers().expect("run armed the session"),
            &mut source,
            None,
        );
        loop {
            let outcome = producer.capture_half();
            self.transmitter.pump().unwrap();
            if outcome.is_terminal() {
                break;
            }
        }
        self.transmitter.pump().unwrap();
        self.transport.take()
    }
}

#[test]
fn startup_conversation_and_bounded_run() {
    let mut host = Host::connect();

    // Driver startup: reset, identify, probe the analog bank.
    assert_eq!(host.command(b"*i\n"), b"SRPICO,A031D08,02");
    assert_eq!(host.command(b"a0\n"), b"25700x0");

    assert_eq!(host.command(b"R1000000\n"), b"*");
    assert_eq!(host.command(b"L50\n"), b"*");
    assert_eq!(host.command(b"D10\n"), b"*");
    assert_eq!(host.command(b"D11\n"), b"*");

    // Bounded run: no ack, just samples and the end-of-run report.
    assert_eq!(host.command(b"F\n"), b"");
    let stream = host.run_capture();

    // Two digital channels pack into one wire byte per slice.
    assert_eq!(stream.len(), 50 + 1 + 4);
    assert!(stream[..50].iter().all(|b| b & 0x80 != 0));
    assert_eq!(&stream[50..], b"!$50+");
    assert_eq!(host.session.state.samples_sent(), 50);
}

#[test]
fn second_run_starts_clean_after_the_first_completes() {
    let mut host = Host::connect();
    host.command(b"L30\nD10\n");
    host.command(b"F\n");
    let first = host.run_capture();
    assert_eq!(&first[30..], b"!$30+");

    host.command(b"F\n");
    let second = host.run_capture();
    assert_eq!(&second[30..], b"!$30+");
    assert_eq!(host.session.state.samples_sent(), 30);
    assert_eq!(
        host.metrics
            .runs_started
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[test]
fn abort_during_continuous_run_reports_delivered_count() {
    let mut host = Host::connect();
    host.command(b"D10\nD11\nD12\n");
    assert_eq!(host.command(b"C\n"), b"");
    assert!(host.session.state.is_sampling());

    let mut source = PatternSource::new();
    let mut producer = SampleProducer::new(
        Arc::clone(&host.session),
        host.session.buffers().unwrap(),
        &mut source,
        None,
    );
    assert!(!producer.capture_half().is_terminal());
    host.transmitter.pump().unwrap();

    // Host abort lands between halves.
    host.handler.on_bytes(b"+").unwrap();
    assert!(producer.capture_half().is_terminal());
    host.transmitter.pump().unwrap();

    let stream = host.transport.take();
    let sent = host.session.state.samples_sent();
    assert!(sent >= 12_500);
    let trailer = format!("!${sent}+");
    assert!(stream.ends_with(trailer.as_bytes()));
}
