//! Builder for connection configuration.
//!
//! # Example
//!
//! ```no_run
//! use devtools_mux::Connection;
//!
//! # async fn example() -> devtools_mux::Result<()> {
//! let connection = Connection::builder()
//!     .max_pending(512)
//!     .target_lifecycle()
//!     .connect("ws://127.0.0.1:9222/devtools/browser/abc")
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::events::EventBuffer;
use crate::session::{LifecycleHook, target_lifecycle_hook};
use crate::transport::{Transport, WebSocketTransport};

use super::core::Connection;
use super::options::ConnectionOptions;

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create one.
#[derive(Default)]
pub struct ConnectionBuilder {
    options: ConnectionOptions,
    lifecycle_hook: Option<LifecycleHook>,
}

impl ConnectionBuilder {
    /// Creates a builder with default options and no lifecycle hook.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the in-flight command limit.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, limit: usize) -> Self {
        self.options.max_pending = Some(limit);
        self
    }

    /// Removes the in-flight command limit.
    #[inline]
    #[must_use]
    pub fn no_pending_limit(mut self) -> Self {
        self.options.max_pending = None;
        self
    }

    /// Sets the per-subscriber event queue policy.
    #[inline]
    #[must_use]
    pub fn event_buffer(mut self, buffer: EventBuffer) -> Self {
        self.options.event_buffer = buffer;
        self
    }

    /// Applies a deadline to every [`Connection::send`].
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.options.command_timeout = Some(timeout);
        self
    }

    /// Sets the WebSocket handshake deadline.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Installs a lifecycle hook.
    #[inline]
    #[must_use]
    pub fn lifecycle_hook(mut self, hook: LifecycleHook) -> Self {
        self.lifecycle_hook = Some(hook);
        self
    }

    /// Installs [`target_lifecycle_hook`].
    #[inline]
    #[must_use]
    pub fn target_lifecycle(self) -> Self {
        self.lifecycle_hook(target_lifecycle_hook())
    }

    /// Builds a connection over an existing transport.
    ///
    /// Must be called within a tokio runtime; the event loop is spawned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn build<T: Transport>(self, transport: T) -> Result<Connection> {
        self.options.validate().map_err(Error::config)?;
        Ok(Connection::new(transport, self.options, self.lifecycle_hook))
    }

    /// Opens a WebSocket to `url` and builds a connection over it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid or `url` is not a
    ///   `ws://` or `wss://` URL
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds the deadline
    /// - [`Error::Connection`] if the handshake fails
    pub async fn connect(self, url: &str) -> Result<Connection> {
        self.options.validate().map_err(Error::config)?;
        let transport = WebSocketTransport::connect(url, self.options.connect_timeout).await?;
        Ok(Connection::new(transport, self.options, self.lifecycle_hook))
    }
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("options", &self.options)
            .field("lifecycle_hook", &self.lifecycle_hook.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::ChannelTransport;

    #[test]
    fn test_builder_collects_options() {
        let builder = ConnectionBuilder::new()
            .max_pending(3)
            .event_buffer(EventBuffer::Bounded(16))
            .command_timeout(Duration::from_secs(1))
            .connect_timeout(Duration::from_secs(2))
            .target_lifecycle();

        assert_eq!(builder.options.max_pending, Some(3));
        assert_eq!(builder.options.event_buffer, EventBuffer::Bounded(16));
        assert_eq!(builder.options.command_timeout, Some(Duration::from_secs(1)));
        assert_eq!(builder.options.connect_timeout, Duration::from_secs(2));
        assert!(builder.lifecycle_hook.is_some());
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_options() {
        let (transport, _remote) = ChannelTransport::pair();
        let result = ConnectionBuilder::new().max_pending(0).build(transport);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_connect_rejects_non_websocket_url() {
        let result = ConnectionBuilder::new().connect("http://localhost:9222").await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_debug_hides_hook() {
        let debug = format!("{:?}", ConnectionBuilder::new().target_lifecycle());
        assert!(debug.contains("lifecycle_hook: true"));
    }
}
