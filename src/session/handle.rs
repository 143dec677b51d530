//! Session handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::identifiers::SessionId;

// ============================================================================
// Session
// ============================================================================

/// A routing scope on a connection.
///
/// The root session is the physical connection itself and has no id.
/// Child sessions are created when the remote end attaches to a target
/// and are closed when it detaches or the connection goes away.
///
/// Handles are cheap to clone; all clones observe the same closed flag.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Option<SessionId>,
    parent: Option<Session>,
    closed: AtomicBool,
}

impl Session {
    /// Creates the root session.
    pub(crate) fn root() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: None,
                parent: None,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a child session under `parent`.
    pub(crate) fn child(id: SessionId, parent: &Session) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Some(id),
                parent: Some(parent.clone()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the session id (`None` for the root session).
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&SessionId> {
        self.inner.id.as_ref()
    }

    /// Returns `true` for the root session.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.inner.id.is_none()
    }

    /// Returns the parent session.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Session> {
        self.inner.parent.as_ref()
    }

    /// Returns `true` once the session has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Marks the session closed.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::AcqRel)
    }

    /// Error reported to operations on this session after it closed.
    pub(crate) fn closed_error(&self) -> Error {
        match &self.inner.id {
            Some(id) => Error::session_closed(id.clone()),
            None => Error::ConnectionClosed,
        }
    }

    /// Returns `true` if both handles refer to the same session.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("parent", &self.parent().map(|p| p.inner.id.clone()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
