//! Session registry.
//!
//! Owns the tree of open sessions on one connection. The root session is
//! always present; child sessions hang off the session on which the
//! remote end reported their attachment.
//!
//! # Closing
//!
//! Closing a session closes its whole subtree: every session in it is
//! marked closed, every command sent through it fails with
//! [`Error::SessionClosed`], and every subscription on it ends. Closing
//! the root does the same for the entire connection, failing commands
//! with [`Error::ConnectionClosed`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::EventHub;
use crate::identifiers::SessionId;
use crate::tracker::RequestTracker;

use super::handle::Session;

// ============================================================================
// Types
// ============================================================================

/// An open child session and the ids of its direct children.
struct SessionNode {
    session: Session,
    children: Vec<SessionId>,
}

#[derive(Default)]
struct RegistryState {
    nodes: FxHashMap<SessionId, SessionNode>,
    root_children: Vec<SessionId>,
}

impl RegistryState {
    /// Child list of the session keyed by `parent` (`None` = root).
    fn children_of(&mut self, parent: Option<&SessionId>) -> Option<&mut Vec<SessionId>> {
        match parent {
            None => Some(&mut self.root_children),
            Some(id) => self.nodes.get_mut(id).map(|node| &mut node.children),
        }
    }
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// Tree of sessions multiplexed over one connection.
pub struct SessionRegistry {
    root: Session,
    state: RwLock<RegistryState>,
    tracker: Arc<RequestTracker>,
    hub: Arc<EventHub>,
}

impl SessionRegistry {
    /// Creates a registry holding only the root session.
    ///
    /// Closing sessions releases their commands in `tracker` and their
    /// subscriptions in `hub`.
    #[must_use]
    pub fn new(tracker: Arc<RequestTracker>, hub: Arc<EventHub>) -> Self {
        Self {
            root: Session::root(),
            state: RwLock::new(RegistryState::default()),
            tracker,
            hub,
        }
    }

    /// Returns the root session.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Session {
        &self.root
    }

    /// Registers a child session under `parent`.
    ///
    /// Idempotent: if `session_id` is already registered, the existing
    /// session is returned.
    ///
    /// # Errors
    ///
    /// Returns the parent's closed error if `parent` is already closed.
    pub fn create_child(&self, parent: &Session, session_id: SessionId) -> Result<Session> {
        let mut state = self.state.write();

        if parent.is_closed() {
            return Err(parent.closed_error());
        }

        if let Some(existing) = state.nodes.get(&session_id) {
            debug!(session = %session_id, "Session already attached");
            return Ok(existing.session.clone());
        }

        let Some(siblings) = state.children_of(parent.id()) else {
            // Parent handle is from another registry or was already removed.
            return Err(parent.closed_error());
        };
        siblings.push(session_id.clone());

        let session = Session::child(session_id.clone(), parent);
        state.nodes.insert(
            session_id.clone(),
            SessionNode {
                session: session.clone(),
                children: Vec::new(),
            },
        );

        debug!(session = %session_id, parent = ?parent.id(), "Session attached");
        Ok(session)
    }

    /// Closes a session and all of its descendants.
    ///
    /// Returns the number of sessions closed; `0` if the id is unknown or
    /// already closed.
    pub fn close(&self, session_id: &SessionId) -> usize {
        let closed: FxHashSet<SessionId> = {
            let mut state = self.state.write();

            let Some(node) = state.nodes.get(session_id) else {
                debug!(session = %session_id, "Close of unknown or closed session ignored");
                return 0;
            };
            let parent_id = node.session.parent().and_then(Session::id).cloned();

            if let Some(siblings) = state.children_of(parent_id.as_ref()) {
                siblings.retain(|id| id != session_id);
            }

            let mut closed = FxHashSet::default();
            let mut stack = vec![session_id.clone()];
            while let Some(id) = stack.pop() {
                if let Some(node) = state.nodes.remove(&id) {
                    node.session.mark_closed();
                    stack.extend(node.children);
                    closed.insert(id);
                }
            }
            closed
        };

        let cancelled = self.tracker.cancel_scope(&closed);
        let ended = self.hub.close_scopes(&closed);

        debug!(
            session = %session_id,
            sessions = closed.len(),
            cancelled,
            ended,
            "Session detached"
        );
        closed.len()
    }

    /// Closes the root session and therefore every session.
    ///
    /// Returns `false` if the root was already closed.
    pub fn close_root(&self) -> bool {
        let closed = {
            let mut state = self.state.write();
            if !self.root.mark_closed() {
                return false;
            }

            let closed = state.nodes.len();
            for (_, node) in state.nodes.drain() {
                node.session.mark_closed();
            }
            state.root_children.clear();
            closed
        };

        let cancelled = self.tracker.cancel_all();
        let ended = self.hub.close_all();

        debug!(sessions = closed, cancelled, ended, "Root session closed");
        true
    }

    /// Maps an inbound envelope's session id to its session.
    ///
    /// An absent id resolves to the root session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSession`] if the id is not registered.
    pub fn resolve(&self, session_id: Option<&SessionId>) -> Result<Session> {
        match session_id {
            None => Ok(self.root.clone()),
            Some(id) => self
                .get(id)
                .ok_or_else(|| Error::unknown_session(id.clone())),
        }
    }

    /// Looks up an open child session.
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.state
            .read()
            .nodes
            .get(session_id)
            .map(|node| node.session.clone())
    }

    /// Returns the number of open child sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state.read().nodes.len()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("root_closed", &self.root.is_closed())
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
