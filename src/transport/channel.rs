//! In-memory transport.
//!
//! [`ChannelTransport::pair`] returns a transport for the connection and
//! a [`RemoteEnd`] that plays the remote runtime: it observes outbound
//! frames and injects inbound ones. Used by tests, benches, and
//! embedders that already own a message pipe.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::{FrameSink, FrameSource, Transport};

// ============================================================================
// ChannelTransport
// ============================================================================

/// Local side of an in-memory frame pipe.
pub struct ChannelTransport {
    /// Frames written by the connection.
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Frames injected by the remote end.
    inbound_rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Creates a connected transport / remote-end pair.
    #[must_use]
    pub fn pair() -> (Self, RemoteEnd) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        (
            Self {
                outbound_tx,
                inbound_rx,
            },
            RemoteEnd {
                outbound_rx,
                inbound_tx: Some(inbound_tx),
            },
        )
    }
}

impl Transport for ChannelTransport {
    type Sink = ChannelSink;
    type Source = ChannelSource;

    fn split(self) -> (Self::Sink, Self::Source) {
        (
            ChannelSink {
                tx: Some(self.outbound_tx),
            },
            ChannelSource {
                rx: self.inbound_rx,
            },
        )
    }
}

/// Outbound half of a [`ChannelTransport`].
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(frame).map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

/// Inbound half of a [`ChannelTransport`].
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }
}

// ============================================================================
// RemoteEnd
// ============================================================================

/// Remote side of an in-memory frame pipe.
///
/// Dropping it, or calling [`RemoteEnd::close`], ends the connection's
/// inbound sequence.
pub struct RemoteEnd {
    outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: Option<mpsc::UnboundedSender<String>>,
}

impl RemoteEnd {
    /// Waits for the next frame written by the connection.
    ///
    /// Returns `None` once the connection has closed its sink.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// Waits for the next frame and parses it as JSON.
    ///
    /// Returns `None` once the connection has closed its sink or if the
    /// frame is not JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let frame = self.recv_frame().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Returns the next already-written frame without waiting.
    pub fn try_recv_frame(&mut self) -> Option<String> {
        self.outbound_rx.try_recv().ok()
    }

    /// Injects an inbound text frame.
    ///
    /// Returns `false` if the connection is gone or the remote end was
    /// closed.
    pub fn push_frame(&self, frame: impl Into<String>) -> bool {
        self.inbound_tx
            .as_ref()
            .is_some_and(|tx| tx.send(frame.into()).is_ok())
    }

    /// Injects an inbound JSON frame.
    pub fn push_json(&self, value: &Value) -> bool {
        self.push_frame(value.to_string())
    }

    /// Closes the inbound direction, as if the peer hung up.
    pub fn close(&mut self) {
        self.inbound_tx = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
