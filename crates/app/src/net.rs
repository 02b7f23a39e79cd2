use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;

use logicprobe_engine::Transport;
use logicprobe_foundation::TransportError;

/// Non-blocking outbound transport over one host TCP connection.
///
/// `try_write` maps a full socket buffer to an accepted count of zero,
/// which the transmit side treats as saturation and retries later; the
/// overrun rule in the capture path is the only backpressure escalation.
pub struct TcpTransport {
    stream: Arc<TcpStream>,
    connected: AtomicBool,
}

impl TcpTransport {
    pub fn new(stream: Arc<TcpStream>) -> Self {
        Self {
            stream,
            connected: AtomicBool::new(true),
        }
    }

    /// Mark the connection closed; all further writes report disconnect.
    pub fn shutdown(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl Transport for TcpTransport {
    fn try_write(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        match self.stream.try_write(bytes) {
            Ok(written) => Ok(written),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                tracing::warn!(error = %e, "host write failed");
                self.shutdown();
                Err(TransportError::Disconnected)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
