//! Connection configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use devtools_mux::{ConnectionOptions, EventBuffer};
//!
//! let options = ConnectionOptions::new()
//!     .with_max_pending(256)
//!     .with_event_buffer(EventBuffer::Bounded(1024))
//!     .with_command_timeout(Duration::from_secs(10));
//! assert!(options.validate().is_ok());
//! ```

use std::time::Duration;

use crate::events::EventBuffer;

// ============================================================================
// Constants
// ============================================================================

/// Default cap on commands awaiting a response.
pub const DEFAULT_MAX_PENDING: usize = 4096;

/// Default time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Tunables for one multiplexed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Maximum commands in flight. `None` disables the limit.
    pub max_pending: Option<usize>,

    /// Per-subscriber event queue policy.
    pub event_buffer: EventBuffer,

    /// Deadline applied by [`crate::Connection::send`].
    ///
    /// `None` (the default) waits until a response or a close.
    pub command_timeout: Option<Duration>,

    /// Deadline for establishing a WebSocket connection.
    pub connect_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_pending: Some(DEFAULT_MAX_PENDING),
            event_buffer: EventBuffer::Unbounded,
            command_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectionOptions {
    /// Creates options with defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the in-flight command limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, limit: usize) -> Self {
        self.max_pending = Some(limit);
        self
    }

    /// Removes the in-flight command limit.
    #[inline]
    #[must_use]
    pub fn without_pending_limit(mut self) -> Self {
        self.max_pending = None;
        self
    }

    /// Sets the event queue policy.
    #[inline]
    #[must_use]
    pub fn with_event_buffer(mut self, buffer: EventBuffer) -> Self {
        self.event_buffer = buffer;
        self
    }

    /// Sets a default per-command deadline.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Sets the handshake deadline.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Checks the options for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pending == Some(0) {
            return Err("max_pending must be at least 1".to_string());
        }

        if self.event_buffer == EventBuffer::Bounded(0) {
            return Err("bounded event buffer needs a capacity of at least 1".to_string());
        }

        if self.command_timeout == Some(Duration::ZERO) {
            return Err("command_timeout must be non-zero".to_string());
        }

        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be non-zero".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.max_pending, Some(DEFAULT_MAX_PENDING));
        assert_eq!(options.event_buffer, EventBuffer::Unbounded);
        assert_eq!(options.command_timeout, None);
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let options = ConnectionOptions::new()
            .without_pending_limit()
            .with_event_buffer(EventBuffer::Bounded(8))
            .with_command_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(5));

        assert_eq!(options.max_pending, None);
        assert_eq!(options.event_buffer, EventBuffer::Bounded(8));
        assert_eq!(options.command_timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(ConnectionOptions::new().with_max_pending(0).validate().is_err());
        assert!(
            ConnectionOptions::new()
                .with_event_buffer(EventBuffer::Bounded(0))
                .validate()
                .is_err()
        );
        assert!(
            ConnectionOptions::new()
                .with_command_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ConnectionOptions::new()
                .with_connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
