use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{BridgeResult, ErrorKind};
use crate::forward::{Destination, RecordSender};

/// [`RecordSender`] that keeps every payload instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<(Destination, Vec<u8>)>>>,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail while `fail` is set.
    pub async fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Returns the delivered payloads in send order.
    pub async fn sent(&self) -> Vec<(Destination, Vec<u8>)> {
        self.sent.lock().await.clone()
    }
}

impl RecordSender for RecordingSender {
    async fn send(&self, destination: &Destination, payload: &[u8]) -> BridgeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            bail!(ErrorKind::ForwardFailed, "Sender is closed");
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            bail!(
                ErrorKind::ForwardFailed,
                "Forwarding failed",
                format!("injected failure for {destination}")
            );
        }

        self.sent
            .lock()
            .await
            .push((destination.clone(), payload.to_vec()));

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
