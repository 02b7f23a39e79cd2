use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use std::sync::Arc;

use logicprobe_foundation::{
    AcquisitionConfig, BoundedBuf, Notifier, ProtocolError, SessionState, RESPONSE_BUF_CAPACITY,
};

use crate::buffer::CaptureBuffers;

/// The single acquisition session: configuration, run state, the
/// cross-context notifier, the installed capture buffers, and the
/// staged protocol response.
///
/// One instance exists for the life of the process, built explicitly at
/// startup and threaded through the controller, producer, transmitter
/// and parser. Configuration is written only by the communication
/// context while unarmed; run state follows the per-flag contract on
/// [`SessionState`].
pub struct Session {
    config: RwLock<AcquisitionConfig>,
    pub state: SessionState,
    pub notifier: Notifier,
    buffers: RwLock<Option<Arc<CaptureBuffers>>>,
    response: Mutex<BoundedBuf<RESPONSE_BUF_CAPACITY>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(AcquisitionConfig::default()),
            state: SessionState::new(),
            notifier: Notifier::new(),
            buffers: RwLock::new(None),
            response: Mutex::new(BoundedBuf::new()),
        }
    }

    /// Snapshot of the current configuration. Stable for the duration
    /// of a run since configuration is locked while armed.
    pub fn config(&self) -> AcquisitionConfig {
        self.config.read().clone()
    }

    pub(crate) fn config_mut(&self) -> RwLockWriteGuard<'_, AcquisitionConfig> {
        self.config.write()
    }

    pub fn buffers(&self) -> Option<Arc<CaptureBuffers>> {
        self.buffers.read().clone()
    }

    pub(crate) fn install_buffers(&self, buffers: Arc<CaptureBuffers>) {
        *self.buffers.write() = Some(buffers);
    }

    pub(crate) fn clear_buffers(&self) {
        *self.buffers.write() = None;
    }

    /// Run reset: stop any active run and clear run state, leaving the
    /// configuration untouched. Also invoked on host disconnect.
    pub fn run_reset(&self) {
        self.state.run_reset();
        self.clear_buffers();
        {
            let mut response = self.response.lock();
            response.clear();
        }
        self.notifier.notify();
    }

    /// Stage a protocol response and wake the transmitter. Replaces any
    /// response not yet flushed; the host issues commands one at a time.
    pub fn queue_response(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        {
            let mut response = self.response.lock();
            response.clear();
            response.extend_from_slice(bytes)?;
        }
        self.state.set_response_pending();
        self.notifier.notify();
        Ok(())
    }

    /// Transmitter: take the staged response, clearing the pending flag.
    pub fn drain_response(&self) -> Option<Vec<u8>> {
        if !self.state.is_response_pending() {
            return None;
        }
        let mut response = self.response.lock();
        let bytes = response.as_slice().to_vec();
        response.clear();
        self.state.clear_response_pending();
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_round_trip_clears_pending() {
        let session = Session::new();
        assert!(session.drain_response().is_none());

        session.queue_response(b"*").unwrap();
        assert!(session.state.is_response_pending());
        assert!(session.notifier.try_take());

        assert_eq!(session.drain_response().unwrap(), b"*");
        assert!(!session.state.is_response_pending());
        assert!(session.drain_response().is_none());
    }

    #[test]
    fn oversized_response_is_rejected() {
        let session = Session::new();
        let too_long = [b'x'; RESPONSE_BUF_CAPACITY + 1];
        assert!(session.queue_response(&too_long).is_err());
    }
}
