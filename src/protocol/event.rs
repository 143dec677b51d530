//! Event message type.
//!
//! Events are notifications pushed by the remote end. They carry no id
//! and are routed by their optional `sessionId`.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::SessionId;

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... },
///   "sessionId": "optional"
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    pub params: Map<String, Value>,

    /// Session the event was emitted on (`None` for the root session).
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Map<String, Value>,
        session_id: Option<SessionId>,
    ) -> Self {
        Self {
            method: method.into(),
            params,
            session_id,
        }
    }

    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Network.requestWillBeSent", Map::new(), None);
    /// assert_eq!(event.domain(), "Network");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        split_method(&self.method).0
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        split_method(&self.method).1
    }

    /// Deserializes the params into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the params do not match `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.params.clone()))?)
    }

    /// Gets a string param.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Splits `Domain.name` into its two halves.
///
/// A method without a dot is treated as a bare domain.
#[inline]
pub(crate) fn split_method(method: &str) -> (&str, &str) {
    method.split_once('.').unwrap_or((method, ""))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_domain_and_event_name() {
        let event = Event::new("Page.loadEventFired", Map::new(), None);
        assert_eq!(event.domain(), "Page");
        assert_eq!(event.event_name(), "loadEventFired");
    }

    #[test]
    fn test_method_without_dot() {
        let event = Event::new("Inspector", Map::new(), None);
        assert_eq!(event.domain(), "Inspector");
        assert_eq!(event.event_name(), "");
    }

    #[test]
    fn test_params_as_typed_record() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct StorageItemAdded {
            key: String,
            new_value: String,
        }

        let event = Event::new(
            "DOMStorage.domStorageItemAdded",
            params(json!({"key": "theme", "newValue": "dark", "storageId": {}})),
            Some(SessionId::new("S1")),
        );

        let typed: StorageItemAdded = event.params_as().expect("typed params");
        assert_eq!(typed.key, "theme");
        assert_eq!(typed.new_value, "dark");
        assert_eq!(event.get_str("key"), Some("theme"));
        assert_eq!(event.get_str("missing"), None);
    }

    #[test]
    fn test_params_as_mismatch() {
        let event = Event::new("Foo.baz", params(json!({"v": "not a number"})), None);
        assert!(event.params_as::<u32>().is_err());
    }
}
