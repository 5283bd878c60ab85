use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;

use metrics::counter;
use tc_config::shared::{ListenerConfig, ListenerRole};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::bridge_error;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{BridgeError, BridgeResult, ErrorKind};
use crate::forward::RecordSender;
use crate::metrics::{LISTENER_LABEL, TC_RECORDS_REJECTED_TOTAL};
use crate::pipeline::IngestionPipeline;
use crate::store::{CacheStore, DurableStore};

/// Handle to a running [`ListenerWorker`].
#[derive(Debug)]
pub struct ListenerHandle {
    name: String,
    local_addr: SocketAddr,
    join_handle: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits until the listener stopped accepting and all its connections finished.
    pub async fn wait(self) -> BridgeResult<()> {
        self.join_handle.await.map_err(|err| {
            bridge_error!(
                ErrorKind::InvalidState,
                "Listener task failed",
                format!("listener `{}` panicked", self.name),
                source: err
            )
        })
    }
}

/// A single message read from an inbound connection.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// `lossy` is set when invalid UTF-8 had to be replaced.
    Message { text: String, lossy: bool },
    TooLong,
    Closed,
}

/// Reads the next newline terminated message, at most `max_message_bytes` long.
///
/// Data left at the end of the stream without a terminator is returned as a last message.
async fn read_frame<R>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
    max_message_bytes: usize,
) -> std::io::Result<Frame>
where
    R: tokio::io::AsyncRead + Unpin,
{
    buf.clear();
    let limit = max_message_bytes as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Frame::Closed);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_message_bytes {
        return Ok(Frame::TooLong);
    }

    let text = String::from_utf8_lossy(buf);
    let lossy = matches!(text, Cow::Owned(_));

    Ok(Frame::Message {
        text: text.into_owned(),
        lossy,
    })
}

/// Accepts TCP connections on one configured endpoint and hands every message to the
/// pipeline.
///
/// Each connection is served by its own task. On shutdown the listener stops accepting,
/// connections stop reading after the message in flight and the listener completes once
/// every connection task has finished.
pub struct ListenerWorker<C, D, S> {
    config: ListenerConfig,
    pipeline: Arc<IngestionPipeline<C, D, S>>,
    shutdown_rx: ShutdownRx,
}

impl<C, D, S> ListenerWorker<C, D, S>
where
    C: CacheStore + Send + Sync + 'static,
    D: DurableStore + Send + Sync + 'static,
    S: RecordSender + Send + Sync + 'static,
{
    pub fn new(
        config: ListenerConfig,
        pipeline: Arc<IngestionPipeline<C, D, S>>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            config,
            pipeline,
            shutdown_rx,
        }
    }

    /// Binds the configured address and starts accepting connections.
    pub async fn start(self) -> BridgeResult<ListenerHandle> {
        let bind_address = self.config.bind_address();
        let listener = TcpListener::bind(&bind_address).await.map_err(|err| {
            bridge_error!(
                ErrorKind::ListenerBindFailed,
                "Listener could not be bound",
                format!("listener `{}` on {bind_address}", self.config.name),
                source: err
            )
        })?;
        let local_addr = listener.local_addr().map_err(BridgeError::from)?;

        info!(
            listener = %self.config.name,
            role = %self.config.role,
            address = %local_addr,
            "listener started"
        );

        let name = self.config.name.clone();
        let join_handle = tokio::spawn(self.run(listener));

        Ok(ListenerHandle {
            name,
            local_addr,
            join_handle,
        })
    }

    async fn run(mut self, listener: TcpListener) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!(listener = %self.config.name, "listener stopped accepting due to shutdown");
                    break;
                }

                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = result {
                        error!(listener = %self.config.name, error = %err, "connection task failed");
                    }
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(listener = %self.config.name, peer = %peer, "accepted connection");
                            connections.spawn(Connection {
                                config: self.config.clone(),
                                pipeline: self.pipeline.clone(),
                                shutdown_rx: self.shutdown_rx.clone(),
                                peer,
                            }.serve(stream));
                        }
                        Err(err) => {
                            warn!(listener = %self.config.name, error = %err, "failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);

        let in_flight = connections.len();
        if in_flight > 0 {
            info!(listener = %self.config.name, connections = in_flight, "waiting for connections to finish");
        }
        while let Some(result) = connections.join_next().await {
            if let Err(err) = result {
                error!(listener = %self.config.name, error = %err, "connection task failed");
            }
        }

        info!(listener = %self.config.name, "listener stopped");
    }
}

/// State of one accepted inbound connection.
struct Connection<C, D, S> {
    config: ListenerConfig,
    pipeline: Arc<IngestionPipeline<C, D, S>>,
    shutdown_rx: ShutdownRx,
    peer: SocketAddr,
}

impl<C, D, S> Connection<C, D, S>
where
    C: CacheStore + Send + Sync + 'static,
    D: DurableStore + Send + Sync + 'static,
    S: RecordSender + Send + Sync + 'static,
{
    async fn serve(mut self, stream: TcpStream) {
        let source_label = format!("{}_{}", self.config.name, self.peer);
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            let frame = tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    debug!(source = %source_label, "closing connection due to shutdown");
                    return;
                }

                frame = read_frame(&mut reader, &mut buf, self.config.max_message_bytes) => frame,
            };

            match frame {
                Ok(Frame::Message { text, lossy }) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    if lossy {
                        warn!(
                            source = %source_label,
                            "message is not valid UTF-8, invalid bytes were replaced"
                        );
                    }
                    self.handle_message(&text, &source_label).await;
                }
                Ok(Frame::TooLong) => {
                    counter!(TC_RECORDS_REJECTED_TOTAL, LISTENER_LABEL => self.config.name.clone())
                        .increment(1);
                    warn!(
                        source = %source_label,
                        max_message_bytes = self.config.max_message_bytes,
                        "message exceeds the size limit, closing connection"
                    );
                    return;
                }
                Ok(Frame::Closed) => {
                    debug!(source = %source_label, "connection closed by peer");
                    return;
                }
                Err(err) => {
                    warn!(source = %source_label, error = %err, "failed to read from connection");
                    return;
                }
            }
        }
    }

    async fn handle_message(&self, message: &str, source_label: &str) {
        match self.config.role {
            ListenerRole::Telemetry => {
                self.pipeline.process(message, source_label).await;
            }
            ListenerRole::Acknowledgement => {
                debug!(source = source_label, message, "received acknowledgement");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> Frame {
        Frame::Message {
            text: text.to_string(),
            lossy: false,
        }
    }

    async fn frames(input: &[u8], max_message_bytes: usize) -> Vec<Frame> {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();
        let mut frames = Vec::new();
        loop {
            let frame = read_frame(&mut reader, &mut buf, max_message_bytes)
                .await
                .unwrap();
            let done = matches!(frame, Frame::Closed | Frame::TooLong);
            frames.push(frame);
            if done {
                return frames;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn messages_are_split_on_newlines() {
        let frames = frames(b"4003,a\r\n\n4000,b\n4001,c", 64).await;

        assert_eq!(
            frames,
            vec![
                message("4003,a"),
                message(""),
                message("4000,b"),
                message("4001,c"),
                Frame::Closed,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_message_stops_reading() {
        let frames = frames(b"1234\n123456789\n12\n", 5).await;

        assert_eq!(frames, vec![message("1234"), Frame::TooLong]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_of_exactly_the_limit_is_accepted() {
        let frames = frames(b"12345\n", 5).await;

        assert_eq!(frames, vec![message("12345"), Frame::Closed]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_utf8_is_replaced_and_flagged() {
        let frames = frames(b"4003,L1,\xff\n4003,L1\n", 64).await;

        assert_eq!(
            frames,
            vec![
                Frame::Message {
                    text: "4003,L1,\u{FFFD}".to_string(),
                    lossy: true,
                },
                message("4003,L1"),
                Frame::Closed,
            ]
        );
    }
}
