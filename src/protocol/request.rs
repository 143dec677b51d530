//! Command and response envelopes.
//!
//! Defines the message format for commands sent to the remote end and
//! the responses correlated back to them.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

// ============================================================================
// Request
// ============================================================================

/// A command envelope from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "Domain.methodName",
///   "params": { ... },
///   "sessionId": "optional"
/// }
/// ```
///
/// Commands on the root session omit `sessionId`.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation id, unique among outstanding commands.
    pub id: CommandId,

    /// Fully qualified method name.
    pub method: String,

    /// Command parameters.
    pub params: Map<String, Value>,

    /// Routing tag for the target session.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(
        id: CommandId,
        method: impl Into<String>,
        params: Map<String, Value>,
        session_id: Option<SessionId>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session_id,
        }
    }
}

/// Converts caller-supplied params into the envelope's object form.
///
/// `null` becomes an empty object; anything other than an object is
/// rejected.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for non-object params.
pub fn params_object(params: Value) -> Result<Map<String, Value>> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::invalid_argument(format!(
            "command params must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Short name of a JSON value's kind, for diagnostics.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1, "result": { ... }, "sessionId": "optional" }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "error": { "code": -32000, "message": "...", "data": "..." } }
/// ```
///
/// The codec guarantees exactly one of `result` / `error` is set.
#[derive(Debug, Clone)]
pub struct Response {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Result object (if success).
    pub result: Option<Map<String, Value>>,

    /// Error payload (if error).
    pub error: Option<ResponseError>,

    /// Session the response was routed through, if any.
    pub session_id: Option<SessionId>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the remote end rejected the command.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(Value::Object(self.result.unwrap_or_default())),
        }
    }
}

// ============================================================================
// ResponseError
// ============================================================================

/// Error payload of a rejected command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Remote error code.
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Optional detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<ResponseError> for Error {
    fn from(error: ResponseError) -> Self {
        Error::protocol(error.code, error.message, error.data)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_request_omits_session_id() {
        let request = Request::new(CommandId::new(1), "Foo.bar", Map::new(), None);
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json, json!({"id": 1, "method": "Foo.bar", "params": {}}));
    }

    #[test]
    fn test_session_request_carries_tag() {
        let params = params_object(json!({"expression": "1 + 1"})).expect("object");
        let request = Request::new(
            CommandId::new(9),
            "Runtime.evaluate",
            params,
            Some(SessionId::new("S1")),
        );
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["sessionId"], "S1");
        assert_eq!(json["params"]["expression"], "1 + 1");
    }

    #[test]
    fn test_params_object_accepts_null() {
        assert!(params_object(Value::Null).expect("null is empty").is_empty());
    }

    #[test]
    fn test_params_object_rejects_array() {
        let err = params_object(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_into_result_error() {
        let response = Response {
            id: CommandId::new(3),
            result: None,
            error: Some(ResponseError {
                code: -32000,
                message: "No node with given id".into(),
                data: None,
            }),
            session_id: None,
        };

        assert!(response.is_error());
        match response.into_result() {
            Err(Error::Protocol { code, message, .. }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "No node with given id");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_into_result_success() {
        let mut result = Map::new();
        result.insert("x".into(), json!(5));
        let response = Response {
            id: CommandId::new(1),
            result: Some(result),
            error: None,
            session_id: None,
        };

        assert!(response.is_success());
        assert_eq!(response.into_result().expect("success"), json!({"x": 5}));
    }
}
