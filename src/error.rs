//! Error types for the multiplexing engine.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use devtools_mux::{Error, Result};
//!
//! async fn example(client: &SessionClient) -> Result<()> {
//!     match client.send("Runtime.enable", json!({})).await {
//!         Err(Error::Protocol { code, message, .. }) => eprintln!("{code}: {message}"),
//!         other => { other?; }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Session | [`Error::SessionClosed`], [`Error::UnknownSession`] |
//! | Protocol | [`Error::Protocol`], [`Error::MalformedMessage`] |
//! | Flow control | [`Error::TooManyPending`], [`Error::RequestTimeout`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{CommandId, SessionId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument supplied by the caller.
    ///
    /// Returned when command params are not a JSON object.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out while establishing the transport.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The connection closed before the operation completed.
    ///
    /// Delivered exactly once to every command still pending when the
    /// transport terminates or [`Connection::close`] is called.
    ///
    /// [`Connection::close`]: crate::Connection::close
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The owning session closed before the operation completed.
    #[error("Session closed: {session_id}")]
    SessionClosed {
        /// The session that was closed.
        session_id: SessionId,
    },

    /// An inbound message referenced a session not in the registry.
    #[error("Unknown session: {session_id}")]
    UnknownSession {
        /// The unrecognized session ID.
        session_id: SessionId,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote end rejected a command.
    ///
    /// Surfaced only to the caller that issued the command.
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Remote error code.
        code: i64,
        /// Remote error message.
        message: String,
        /// Optional extra data attached by the remote end.
        data: Option<Value>,
    },

    /// An inbound frame could not be decoded.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Why the frame was rejected.
        message: String,
    },

    // ========================================================================
    // Flow Control Errors
    // ========================================================================
    /// Too many commands awaiting a response.
    #[error("Too many pending commands (limit {limit})")]
    TooManyPending {
        /// Configured pending-command limit.
        limit: usize,
    },

    /// A caller-imposed deadline expired before the response arrived.
    #[error("Command {id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The command ID that timed out.
        id: CommandId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout: Duration) -> Self {
        Self::ConnectionTimeout {
            timeout_ms: saturating_millis(timeout),
        }
    }

    /// Creates a session closed error.
    #[inline]
    pub fn session_closed(session_id: SessionId) -> Self {
        Self::SessionClosed { session_id }
    }

    /// Creates an unknown session error.
    #[inline]
    pub fn unknown_session(session_id: SessionId) -> Self {
        Self::UnknownSession { session_id }
    }

    /// Creates a protocol error from a remote error payload.
    #[inline]
    pub fn protocol(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a too-many-pending error.
    #[inline]
    pub fn too_many_pending(limit: usize) -> Self {
        Self::TooManyPending { limit }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(id: CommandId, timeout: Duration) -> Self {
        Self::RequestTimeout {
            id,
            timeout_ms: saturating_millis(timeout),
        }
    }
}

/// Whole milliseconds in `duration`, capped at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the owning connection or session closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::SessionClosed { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the remote end rejected the command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
