//! Transport layer.
//!
//! A transport is a duplex channel of text frames. The engine only needs
//! two halves: a [`FrameSink`] that writes one frame at a time and a
//! [`FrameSource`] that yields inbound frames until the peer goes away.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Connection     │                              │  Remote runtime │
//! │  (event loop)   │      text frames (JSON)      │  (browser, ...) │
//! │   FrameSink   ──┼─────────────────────────────►│                 │
//! │   FrameSource ◄─┼──────────────────────────────┤                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Implementations
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WebSocketTransport`] | `tokio-tungstenite` WebSocket stream |
//! | [`ChannelTransport`] | In-memory pair, paired with a [`RemoteEnd`] |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory transport.
pub mod channel;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelSink, ChannelSource, ChannelTransport, RemoteEnd};
pub use websocket::{WebSocketSink, WebSocketSource, WebSocketTransport};

// ============================================================================
// Traits
// ============================================================================

/// Outbound half of a transport.
///
/// The connection's event loop is the only writer, so frames are never
/// interleaved.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Writes one complete text frame.
    async fn send_frame(&mut self, frame: String) -> Result<()>;

    /// Closes the outbound half.
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of a transport.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Waits for the next inbound text frame.
    ///
    /// Returns `None` once the peer has closed the channel. Must be
    /// cancel-safe: the event loop drops the future when an outbound
    /// command wins the race.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

/// A duplex frame channel that can be split into its two halves.
pub trait Transport: Send + 'static {
    /// Outbound half.
    type Sink: FrameSink;
    /// Inbound half.
    type Source: FrameSource;

    /// Splits the transport.
    fn split(self) -> (Self::Sink, Self::Source);
}
