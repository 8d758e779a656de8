use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::error::PaintError;

/// What the reader side of a socket reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// One binary delivery, possibly several concatenated frames.
    Message(Bytes),
    /// The socket is gone. Carries a human-readable reason.
    Closed(String),
}

/// The single canvas socket.
///
/// A writer task and a reader task own the two halves of the stream;
/// this handle talks to them through channels. Dropping it makes both
/// tasks wind down, so a replaced connection goes inert.
#[derive(Debug)]
pub struct Connection {
    // Outbound frames to the background writer task
    tx: mpsc::UnboundedSender<Bytes>,
    // Inbound events from the background reader task
    rx: mpsc::Receiver<SocketEvent>,
    // Bytes handed to the writer but not yet written
    buffered: Arc<AtomicUsize>,
}

impl Connection {
    pub fn new<S>(stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut net_writer, mut net_reader) = stream.split();

        // Frames queued by the agent
        let (user_tx, mut network_rx) = mpsc::unbounded_channel::<Bytes>();

        // Deliveries and close notices for the agent
        let (network_tx, user_rx) = mpsc::channel(1024);

        let buffered = Arc::new(AtomicUsize::new(0));

        // Writer: drains queued frames onto the socket
        let writer_buffered = Arc::clone(&buffered);
        let writer_events = network_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = network_rx.recv().await {
                let len = frame.len();
                let result = net_writer.send(Message::Binary(frame)).await;
                writer_buffered.fetch_sub(len, Ordering::AcqRel);
                if let Err(e) = result {
                    tracing::debug!("socket write error: {e}");
                    let _ = writer_events
                        .send(SocketEvent::Closed(format!("write failed: {e}")))
                        .await;
                    break;
                }
            }
            let _ = net_writer.close().await;
        });

        // Reader: forwards binary deliveries until the socket closes
        tokio::spawn(async move {
            let reason = loop {
                match net_reader.next().await {
                    Some(Ok(Message::Binary(data))) => {
                        if network_tx.send(SocketEvent::Message(data)).await.is_err() {
                            // Connection dropped
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(f) => format!("{}: {}", u16::from(f.code), f.reason.as_str()),
                            None => "closed without reason".to_string(),
                        };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_string(),
                }
            };
            let _ = network_tx.send(SocketEvent::Closed(reason)).await;
        });

        Self {
            tx: user_tx,
            rx: user_rx,
            buffered,
        }
    }

    /// Build a connection from raw channel ends, for in-memory peers.
    pub fn from_parts(
        tx: mpsc::UnboundedSender<Bytes>,
        rx: mpsc::Receiver<SocketEvent>,
    ) -> Self {
        Self {
            tx,
            rx,
            buffered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue one binary frame for the writer.
    pub fn send(&self, frame: Bytes) -> Result<(), PaintError> {
        let len = frame.len();
        self.buffered.fetch_add(len, Ordering::AcqRel);
        if self.tx.send(frame).is_err() {
            self.buffered.fetch_sub(len, Ordering::AcqRel);
            return Err(PaintError::ConnectionClosed("writer stopped".into()));
        }
        Ok(())
    }

    /// Next inbound event. `None` means both tasks are gone.
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.rx.recv().await
    }

    /// Bytes accepted by [`send`](Self::send) but not yet written.
    pub fn buffered_amount(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }
}

// ── Connector ────────────────────────────────────────────────────

/// Establishes canvas sockets.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Connection, PaintError>;
}

/// Connects to a `ws://` or `wss://` endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, PaintError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        Ok(Connection::new(stream))
    }
}
