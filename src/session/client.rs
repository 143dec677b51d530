//! Session-bound client.
//!
//! A [`SessionClient`] pairs a [`Connection`] with one [`Session`] so
//! callers do not repeat the session on every call, and adds serde-typed
//! variants of send and subscribe.
//!
//! # Example
//!
//! ```no_run
//! use devtools_mux::Connection;
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Version {
//!     product: String,
//! }
//!
//! # async fn example(connection: Connection) -> devtools_mux::Result<()> {
//! let browser = connection.root_client();
//! let version: Version = browser.call("Browser.getVersion", &json!({})).await?;
//! println!("{}", version.product);
//! # Ok(())
//! # }
//! ```

use futures_util::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::connection::Connection;
use crate::error::Result;
use crate::events::{EventFilter, Subscription};
use crate::identifiers::SessionId;

use super::handle::Session;

// ============================================================================
// SessionClient
// ============================================================================

/// A [`Connection`] bound to one [`Session`].
#[derive(Debug, Clone)]
pub struct SessionClient {
    connection: Connection,
    session: Session,
}

impl SessionClient {
    pub(crate) fn new(connection: Connection, session: Session) -> Self {
        Self {
            connection,
            session,
        }
    }

    /// Returns the bound session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session id (`None` for the root session).
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.id()
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Sends a command with raw JSON params.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`].
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.connection.send(method, params, &self.session).await
    }

    /// Sends a command with typed params and decodes a typed result.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`]; also [`crate::Error::Json`] if `params`
    /// cannot be serialized or the result does not match `R`.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let result = self.send(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Subscribes to events on the bound session.
    ///
    /// # Errors
    ///
    /// Returns the session's closed error if it is already closed.
    pub fn subscribe(&self, filter: impl Into<EventFilter>) -> Result<Subscription> {
        self.connection.subscribe(&self.session, filter)
    }

    /// Subscribes to one event and decodes its params as `T`.
    ///
    /// # Errors
    ///
    /// Returns the session's closed error if it is already closed.
    pub fn typed_events<T: DeserializeOwned>(
        &self,
        method: &str,
    ) -> Result<impl Stream<Item = Result<T>> + Send + Unpin + use<T>> {
        Ok(self.subscribe(EventFilter::method(method))?.typed::<T>())
    }

    /// Registers a child session of the bound session and returns its client.
    ///
    /// # Errors
    ///
    /// Returns the session's closed error if it is already closed.
    pub fn attach(&self, session_id: impl Into<SessionId>) -> Result<SessionClient> {
        let child = self.connection.attach_session(&self.session, session_id)?;
        Ok(Self::new(self.connection.clone(), child))
    }

    /// Closes the bound session and its descendants.
    ///
    /// Does nothing for the root session; close the connection instead.
    pub fn detach(&self) -> usize {
        self.session
            .id()
            .map_or(0, |id| self.connection.detach_session(id))
    }
}

// ============================================================================
// Tests
// ============================================================================
