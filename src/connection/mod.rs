//! Connection module.
//!
//! Entry point of the crate: a [`Connection`] drives one transport,
//! correlates commands with responses, and routes events to sessions.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connection`] | Handle to the event loop |
//! | [`ConnectionBuilder`] | Fluent configuration builder |
//! | [`ConnectionOptions`] | Limits, buffering and timeouts |
//! | [`ConnectionState`] | `Open` / `Closing` / `Closed` |
//!
//! # Example
//!
//! ```no_run
//! use devtools_mux::{Connection, Result};
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! let connection = Connection::builder()
//!     .target_lifecycle()
//!     .connect("ws://127.0.0.1:9222/devtools/browser/abc")
//!     .await?;
//!
//! let browser = connection.root_client();
//! browser
//!     .send("Target.setAutoAttach", json!({"autoAttach": true, "flatten": true, "waitForDebuggerOnStart": false}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for connections.
pub mod builder;

/// Connection handle and event loop.
pub mod core;

/// Connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use core::{Connection, ConnectionState};
pub use options::{ConnectionOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_PENDING};
