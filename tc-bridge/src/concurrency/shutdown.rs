//! Process-wide shutdown signal shared by the listeners and background workers.

use tokio::sync::watch;

/// Error returned when no receiver is left to observe the shutdown signal.
pub type ShutdownError = watch::error::SendError<bool>;

/// Sending half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Signals shutdown to every receiver. Calling it again has no further effect.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        self.0.send(true)
    }

    /// Creates a new receiver observing this signal.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// Receiving half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been signalled.
    ///
    /// Also resolves when the sender is dropped, a dropped sender can never cancel shutdown.
    pub async fn wait_for_shutdown(&mut self) {
        let _ = self.0.wait_for(|shutdown| *shutdown).await;
    }
}

/// Creates a new shutdown channel in the running state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn receivers_observe_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        let mut late_rx = tx.subscribe();
        assert!(!rx.is_shutdown());

        tx.shutdown().unwrap();

        tokio::time::timeout(Duration::from_secs(1), rx.wait_for_shutdown())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), late_rx.wait_for_shutdown())
            .await
            .unwrap();
        assert!(rx.is_shutdown());
        assert!(tx.is_shutdown());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_sender_releases_waiters() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), rx.wait_for_shutdown())
            .await
            .unwrap();
    }
}
