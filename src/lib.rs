//! DevTools Mux - connection and session multiplexing for DevTools protocols.
//!
//! This library drives one duplex connection to a remote debugging
//! endpoint (Chrome DevTools Protocol and look-alikes) and multiplexes
//! many logical sessions over it.
//!
//! # Architecture
//!
//! Every frame is a JSON envelope:
//!
//! - **Command** (local to remote): `id`, `method`, `params`, optional `sessionId`
//! - **Response** (remote to local): `id` plus exactly one of `result` / `error`
//! - **Event** (remote to local): `method`, `params`, optional `sessionId`
//!
//! Key design principles:
//!
//! - One event loop task per [`Connection`] is the only reader and writer
//! - Responses complete commands by `id` only, in any order
//! - Events are delivered only to subscribers of their own session
//! - Closing a session fails its commands and ends its subscriptions,
//!   recursively through child sessions
//!
//! # Quick Start
//!
//! ```no_run
//! use devtools_mux::{Connection, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::builder()
//!         .target_lifecycle()
//!         .connect("ws://127.0.0.1:9222/devtools/browser/abc")
//!         .await?;
//!
//!     let root = connection.root();
//!     let mut targets = connection.subscribe(&root, "Target.*")?;
//!     connection
//!         .send("Target.setDiscoverTargets", json!({"discover": true}), &root)
//!         .await?;
//!
//!     while let Some(event) = targets.recv().await {
//!         println!("{}: {:?}", event.method, event.params);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`Connection`], builder, options, event loop |
//! | [`session`] | [`Session`] tree, lifecycle hook, [`SessionClient`] |
//! | [`events`] | Per-session event hub and [`Subscription`] |
//! | [`tracker`] | Pending-command correlation |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope types and codec |
//! | [`transport`] | WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Connection handle and event loop.
///
/// Use [`Connection::builder()`] to configure a connection.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event filters, hub and subscriptions.
pub mod events;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing command ids, session ids and
/// subscription ids.
pub mod identifiers;

/// Protocol envelopes and the JSON codec.
pub mod protocol;

/// Session handles, tree and lifecycle.
pub mod session;

/// Pending-command correlation.
pub mod tracker;

/// Frame transports.
///
/// The connection is generic over [`transport::Transport`]; WebSocket
/// and in-memory implementations are provided.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{Connection, ConnectionBuilder, ConnectionOptions, ConnectionState};

// Session types
pub use session::{
    LifecycleChange, LifecycleHook, Session, SessionClient, SessionRegistry,
    target_lifecycle_hook,
};

// Event types
pub use events::{EventBuffer, EventFilter, EventHub, Subscription};

// Protocol types
pub use protocol::{Event, Request, Response, ResponseError};

// Tracker types
pub use tracker::RequestTracker;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, SessionId, SubscriptionId};

// Transport types
pub use transport::{ChannelTransport, RemoteEnd, Transport, WebSocketTransport};
