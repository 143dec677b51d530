//! Wire codec for envelopes.
//!
//! Encodes outbound [`Request`]s to JSON text and classifies inbound
//! text frames as a [`Response`] or an [`Event`]. Shape is validated at
//! decode time; anything that does not fit fails with
//! [`Error::MalformedMessage`].
//!
//! # Classification
//!
//! | Frame | Result |
//! |-------|--------|
//! | has `id`, exactly one of `result` / `error` | [`Message::Response`] |
//! | has a numeric `id`, any other shape | [`Message::MalformedResponse`] |
//! | has `method`, no `id` | [`Message::Event`] |
//! | anything else | [`Error::MalformedMessage`] |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

use super::event::Event;
use super::request::{Request, Response, ResponseError, json_kind};

// ============================================================================
// Message
// ============================================================================

/// A decoded inbound frame.
#[derive(Debug)]
pub enum Message {
    /// Reply to a previously sent command.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
    /// Carries a usable `id` but is otherwise not a valid response.
    ///
    /// The command it answers can still be failed.
    MalformedResponse {
        /// Id of the command the frame answers.
        id: CommandId,
        /// Why the frame was rejected.
        error: Error,
    },
}

/// Loose view of an inbound frame before validation.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Map<String, Value>>,
    #[serde(default)]
    result: Option<Map<String, Value>>,
    #[serde(default)]
    error: Option<ResponseError>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encodes a command envelope to wire text.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
#[inline]
pub fn encode(request: &Request) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

/// Decodes one inbound text frame.
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the frame is not valid JSON or
/// does not have the shape of a response or an event. A bad frame whose
/// `id` is still readable decodes as [`Message::MalformedResponse`]
/// instead.
pub fn decode(text: &str) -> Result<Message> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(Error::malformed(format!(
            "frame must be a JSON object, got {}",
            json_kind(&value)
        )));
    }
    let id = value.get("id").and_then(Value::as_u64).map(CommandId::new);
    let raw = match RawFrame::deserialize(value) {
        Ok(raw) => raw,
        Err(e) => {
            let error = Error::malformed(e.to_string());
            return match id {
                Some(id) => Ok(Message::MalformedResponse { id, error }),
                None => Err(error),
            };
        }
    };

    let session_id = raw.session_id.map(SessionId::from);

    if let Some(id) = id {
        let malformed = |message: String| -> Result<Message> {
            Ok(Message::MalformedResponse {
                id,
                error: Error::malformed(message),
            })
        };
        return match (raw.result, raw.error) {
            (Some(_), Some(_)) => malformed(format!("response {id} carries both result and error")),
            (None, None) => malformed(format!("response {id} carries neither result nor error")),
            (result, error) => Ok(Message::Response(Response {
                id,
                result,
                error,
                session_id,
            })),
        };
    }

    match raw.method {
        Some(method) if !method.is_empty() => Ok(Message::Event(Event {
            method,
            params: raw.params.unwrap_or_default(),
            session_id,
        })),
        _ => Err(Error::malformed("frame has neither id nor method")),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expect_response(text: &str) -> Response {
        match decode(text).expect("decode") {
            Message::Response(response) => response,
            other => panic!("expected response, got {other:?}"),
        }
    }

    fn expect_event(text: &str) -> Event {
        match decode(text).expect("decode") {
            Message::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    fn assert_malformed(text: &str) {
        match decode(text) {
            Err(Error::MalformedMessage { .. }) => {}
            other => panic!("expected malformed for {text}, got {other:?}"),
        }
    }

    fn assert_malformed_response(text: &str, expected: u64) {
        match decode(text) {
            Ok(Message::MalformedResponse {
                id,
                error: Error::MalformedMessage { .. },
            }) => assert_eq!(id, CommandId::new(expected)),
            other => panic!("expected malformed response for {text}, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_root_command() {
        let mut params = Map::new();
        params.insert("type".into(), json!("keyDown"));
        let request = Request::new(CommandId::new(1), "Input.dispatchKeyEvent", params, None);

        let text = encode(&request).expect("encode");
        let value: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(
            value,
            json!({"id": 1, "method": "Input.dispatchKeyEvent", "params": {"type": "keyDown"}})
        );
    }

    #[test]
    fn test_decode_success_response() {
        let response = expect_response(r#"{"id":1,"result":{"x":5}}"#);
        assert_eq!(response.id, CommandId::new(1));
        assert_eq!(response.into_result().expect("ok"), json!({"x": 5}));
    }

    #[test]
    fn test_decode_error_response() {
        let response = expect_response(
            r#"{"id":4,"error":{"code":-32601,"message":"'Nope.nope' wasn't found"},"sessionId":"S1"}"#,
        );
        assert!(response.is_error());
        assert_eq!(response.session_id, Some(SessionId::new("S1")));
        let error = response.error.expect("error payload");
        assert_eq!(error.code, -32601);
    }

    #[test]
    fn test_decode_event_with_session() {
        let event = expect_event(r#"{"method":"Foo.baz","params":{"v":1},"sessionId":"S1"}"#);
        assert_eq!(event.method, "Foo.baz");
        assert_eq!(event.params.get("v"), Some(&json!(1)));
        assert_eq!(event.session_id, Some(SessionId::new("S1")));
    }

    #[test]
    fn test_decode_event_without_params() {
        let event = expect_event(r#"{"method":"Inspector.detached"}"#);
        assert!(event.params.is_empty());
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert_malformed("not json");
        assert_malformed("[1,2,3]");
        assert_malformed("{}");
        assert_malformed(r#"{"id":"one","result":{}}"#);
        assert_malformed(r#"{"id":-1,"result":{}}"#);
        assert_malformed(r#"{"method":"Foo.bar","params":[1]}"#);
        assert_malformed(r#"{"method":"","params":{}}"#);
        assert_malformed(r#"{"method":"Foo.bar","sessionId":7}"#);
    }

    #[test]
    fn test_decode_keeps_id_of_bad_response() {
        assert_malformed_response(r#"{"id":1}"#, 1);
        assert_malformed_response(r#"{"id":1,"result":[1,2]}"#, 1);
        assert_malformed_response(r#"{"id":1,"result":{},"error":{"code":1,"message":"x"}}"#, 1);
        assert_malformed_response(r#"{"id":2,"error":{"message":"missing code"}}"#, 2);
        assert_malformed_response(r#"{"id":3,"result":{},"sessionId":7}"#, 3);
    }
}
