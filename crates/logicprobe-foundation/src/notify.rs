use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// One-shot wake signal from the capture context to the communication
/// context, meaning "re-evaluate session state".
///
/// Carries no payload: multiple `notify` calls coalesce, so a receiver
/// must re-derive what changed from `SessionState` rather than count
/// wakeups. `notify` is safe from any thread, including non-async ones.
#[derive(Debug, Default)]
pub struct Notifier {
    inner: Notify,
    pending: AtomicBool,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
        self.inner.notify_one();
    }

    /// Wait for the next wake. Returns immediately if a notification
    /// arrived since the last wait.
    pub async fn notified(&self) {
        self.inner.notified().await;
        self.pending.store(false, Ordering::Release);
    }

    /// Synchronous check-and-clear, for harnesses that drive the
    /// communication context by hand.
    pub fn try_take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}
