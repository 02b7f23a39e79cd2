use std::io;
use std::sync::Arc;

use tokio::net::TcpStream;

use logicprobe_engine::{
    AcquisitionController, CaptureThread, SampleSource, SampleTransmitter, Session, TransmitWorker,
};
use logicprobe_protocol::ProtocolHandler;
use logicprobe_telemetry::ProbeMetrics;

use crate::net::TcpTransport;

/// Serve one host connection until it closes.
///
/// Each connection gets its own session, capture thread and transmit
/// worker; the probe talks to a single host at a time. Returns once the
/// peer disconnects and the pipeline has been torn down.
pub async fn serve_connection(
    stream: TcpStream,
    source: Box<dyn SampleSource>,
    metrics: Arc<ProbeMetrics>,
) -> anyhow::Result<()> {
    let stream = Arc::new(stream);
    let session = Arc::new(Session::new());
    let controller =
        AcquisitionController::new(Arc::clone(&session)).with_metrics(Arc::clone(&metrics));
    controller.initialize();
    let mut handler = ProtocolHandler::new(controller).with_metrics(Arc::clone(&metrics));

    let capture = CaptureThread::spawn(Arc::clone(&session), source, Some(Arc::clone(&metrics)))?;

    let transport = Arc::new(TcpTransport::new(Arc::clone(&stream)));
    let transmitter = SampleTransmitter::new(Arc::clone(&session), transport.clone())
        .with_metrics(Arc::clone(&metrics));
    let worker = TransmitWorker::new(transmitter, Arc::clone(&session)).spawn();

    let mut buf = [0u8; 512];
    loop {
        stream.readable().await?;
        match stream.try_read(&mut buf) {
            Ok(0) => break,
            Ok(n) => handler.on_bytes(&buf[..n])?,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                tracing::warn!(error = %e, "host read failed");
                break;
            }
        }
    }

    // Peer gone: stop any run, let the transmit worker observe the
    // disconnect, and join the capture thread.
    transport.shutdown();
    session.run_reset();
    capture.stop();
    let _ = worker.await;
    Ok(())
}
