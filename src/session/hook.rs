//! Session lifecycle hook.
//!
//! The multiplexer does not know which events announce that a child
//! session attached or detached; that is a property of the remote
//! protocol. A [`LifecycleHook`] inspects every inbound event before it
//! is published and may report such a change. The connection applies
//! the change to the session tree first, then publishes the event.

use crate::identifiers::SessionId;
use crate::protocol::Event;

// ============================================================================
// Constants
// ============================================================================

/// Event announcing that a target session attached.
pub const TARGET_ATTACHED_EVENT: &str = "Target.attachedToTarget";

/// Event announcing that a target session detached.
pub const TARGET_DETACHED_EVENT: &str = "Target.detachedFromTarget";

// ============================================================================
// Types
// ============================================================================

/// A change to the session tree reported by a lifecycle hook.
///
/// Attached sessions become children of the session the event arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleChange {
    /// A new child session exists.
    Attached {
        /// Id of the new session.
        session_id: SessionId,
    },
    /// A session (and its descendants) went away.
    Detached {
        /// Id of the closed session.
        session_id: SessionId,
    },
}

/// Inspects an inbound event and optionally reports a lifecycle change.
///
/// Runs on the connection's event loop; keep it cheap. It is called
/// without holding any connection lock, so it may install or clear the
/// hook itself. A hook that panics reports no change for that event.
pub type LifecycleHook = Box<dyn Fn(&Event) -> Option<LifecycleChange> + Send + Sync>;

// ============================================================================
// Built-in Hooks
// ============================================================================

/// Hook for the Chrome DevTools `Target` domain.
///
/// Reads `params.sessionId` of `Target.attachedToTarget` and
/// `Target.detachedFromTarget`.
#[must_use]
pub fn target_lifecycle_hook() -> LifecycleHook {
    Box::new(|event| {
        let session_id = || event.get_str("sessionId").map(SessionId::new);

        match event.method.as_str() {
            TARGET_ATTACHED_EVENT => {
                session_id().map(|session_id| LifecycleChange::Attached { session_id })
            }
            TARGET_DETACHED_EVENT => {
                session_id().map(|session_id| LifecycleChange::Detached { session_id })
            }
            _ => None,
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn event(method: &str, params: serde_json::Value) -> Event {
        let params = params.as_object().cloned().unwrap_or_default();
        Event::new(method, params, None)
    }

    #[test]
    fn test_target_hook_attached() {
        let hook = target_lifecycle_hook();
        let change = hook(&event(
            TARGET_ATTACHED_EVENT,
            json!({"sessionId": "S1", "targetInfo": {"type": "page"}}),
        ));

        assert_eq!(
            change,
            Some(LifecycleChange::Attached {
                session_id: SessionId::new("S1")
            })
        );
    }

    #[test]
    fn test_target_hook_detached() {
        let hook = target_lifecycle_hook();
        let change = hook(&event(TARGET_DETACHED_EVENT, json!({"sessionId": "S1"})));

        assert_eq!(
            change,
            Some(LifecycleChange::Detached {
                session_id: SessionId::new("S1")
            })
        );
    }

    #[test]
    fn test_target_hook_ignores_other_events() {
        let hook = target_lifecycle_hook();
        assert_eq!(hook(&event("Page.loadEventFired", json!({}))), None);
        // Missing sessionId is not a change.
        assert_eq!(hook(&event(TARGET_ATTACHED_EVENT, json!({}))), None);
    }
}
