use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logicprobe_foundation::TransportError;

/// External serial/CDC transport seam.
///
/// `try_write` queues bytes for transmission without ever blocking the
/// caller; it may accept only a prefix (or nothing) when the outbound
/// queue is saturated. Completion is implicit — the engine retries the
/// remainder on the next wakeup. There is no flow-control signal back
/// to the capture context: a transport that stays saturated eventually
/// trips the producer's overrun rule.
pub trait Transport: Send + Sync {
    fn try_write(&self, bytes: &[u8]) -> Result<usize, TransportError>;

    fn is_connected(&self) -> bool;
}

/// In-memory transport with an optional outbound-queue capacity.
///
/// Backs the engine tests and the loopback mode of the bridge binary.
/// With a capacity set, `try_write` accepts bytes only up to the
/// unread-queue limit, emulating a slow host; `take` drains the queue
/// the way a completed USB transfer would.
pub struct MemoryTransport {
    sink: Mutex<Vec<u8>>,
    capacity: Option<usize>,
    connected: AtomicBool,
}

impl MemoryTransport {
    pub fn unbounded() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(Vec::new()),
            capacity: None,
            connected: AtomicBool::new(true),
        })
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(Vec::new()),
            capacity: Some(capacity),
            connected: AtomicBool::new(true),
        })
    }

    /// Drain everything queued so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.sink.lock())
    }

    pub fn queued(&self) -> usize {
        self.sink.lock().len()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl Transport for MemoryTransport {
    fn try_write(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let mut sink = self.sink.lock();
        let accepted = match self.capacity {
            Some(capacity) => bytes.len().min(capacity.saturating_sub(sink.len())),
            None => bytes.len(),
        };
        sink.extend_from_slice(&bytes[..accepted]);
        Ok(accepted)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
