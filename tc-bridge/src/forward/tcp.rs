use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tc_config::shared::ForwardingConfig;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::bail;
use crate::error::{BridgeResult, ErrorKind};
use crate::forward::sender::{Destination, RecordSender};

/// [`RecordSender`] opening one TCP connection per payload.
///
/// The payload is written as is and the connection is closed right after, the end of the
/// stream delimits the message.
#[derive(Debug, Clone)]
pub struct TcpSender {
    connect_timeout: Duration,
    write_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl TcpSender {
    pub fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &ForwardingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.write_timeout_ms),
        )
    }
}

impl RecordSender for TcpSender {
    async fn send(&self, destination: &Destination, payload: &[u8]) -> BridgeResult<()> {
        if self.closed.load(Ordering::Acquire) {
            bail!(
                ErrorKind::ForwardFailed,
                "Sender is closed",
                format!("payload for {destination} not sent")
            );
        }

        let address = (destination.host.as_str(), destination.port);
        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => bail!(
                ErrorKind::ForwardFailed,
                "Downstream connection failed",
                format!("could not connect to {destination}"),
                source: err
            ),
            Err(_) => bail!(
                ErrorKind::ForwardFailed,
                "Downstream connection timed out",
                format!(
                    "no connection to {destination} within {}ms",
                    self.connect_timeout.as_millis()
                )
            ),
        };

        let write = async {
            stream.write_all(payload).await?;
            stream.shutdown().await
        };

        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => bail!(
                ErrorKind::ForwardFailed,
                "Downstream write failed",
                format!("could not write {} bytes to {destination}", payload.len()),
                source: err
            ),
            Err(_) => bail!(
                ErrorKind::ForwardFailed,
                "Downstream write timed out",
                format!(
                    "write to {destination} did not complete within {}ms",
                    self.write_timeout.as_millis()
                )
            ),
        }

        debug!(destination = %destination, bytes = payload.len(), "payload forwarded");

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("outbound sender closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    fn sender() -> TcpSender {
        TcpSender::new(Duration::from_secs(1), Duration::from_secs(1))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn payload_is_delivered_verbatim() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let receiver = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        sender()
            .send(&Destination::new("127.0.0.1", port), b"4003,L1,1,0,d,t,,185")
            .await
            .unwrap();

        assert_eq!(receiver.await.unwrap(), b"4003,L1,1,0,d,t,,185");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refused_connection_is_a_forward_failure() {
        // Bind then drop to obtain a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = sender()
            .send(&Destination::new("127.0.0.1", port), b"4003")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ForwardFailed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_sender_rejects_sends() {
        let sender = sender();
        sender.close().await;

        assert!(!sender.is_healthy());
        let err = sender
            .send(&Destination::new("127.0.0.1", 9), b"4003")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ForwardFailed);
    }
}
