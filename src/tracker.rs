//! Request tracker.
//!
//! Owns the command-id space of one connection and the table of commands
//! awaiting a response. Every [`PendingCommand`] leaves the table exactly
//! once: resolved, rejected, or cancelled because its scope closed.
//!
//! # Id Allocation
//!
//! Ids come from a monotonic counter starting at 1. Allocation and
//! table insertion happen under the same lock, so concurrent callers
//! never observe the same id.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};
use crate::protocol::Response;

// ============================================================================
// Types
// ============================================================================

/// Completion handle for one command.
pub type Completion = oneshot::Receiver<Result<Value>>;

/// First id handed out on a fresh connection.
const FIRST_COMMAND_ID: u64 = 1;

// ============================================================================
// PendingCommand
// ============================================================================

/// A command awaiting its response.
pub struct PendingCommand {
    id: CommandId,
    method: String,
    session_id: Option<SessionId>,
    response_tx: oneshot::Sender<Result<Value>>,
}

impl PendingCommand {
    /// Returns the command id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Returns the method name.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the session the command was sent through.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Delivers the outcome to the waiting caller.
    fn complete(self, outcome: Result<Value>) {
        // The caller may have stopped waiting; nothing else to do then.
        let _ = self.response_tx.send(outcome);
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RequestTracker
// ============================================================================

/// Correlates command ids with their waiting callers.
pub struct RequestTracker {
    /// Pending table plus the next id to hand out.
    state: Mutex<TrackerState>,
    /// Optional cap on outstanding commands.
    max_pending: Option<usize>,
}

struct TrackerState {
    next_id: u64,
    pending: FxHashMap<CommandId, PendingCommand>,
}

impl RequestTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                next_id: FIRST_COMMAND_ID,
                pending: FxHashMap::default(),
            }),
            max_pending,
        }
    }

    /// Allocates a fresh id and registers a pending command under it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyPending`] if the table is at its limit.
    pub fn allocate(
        &self,
        method: &str,
        session_id: Option<&SessionId>,
    ) -> Result<(CommandId, Completion)> {
        let mut state = self.state.lock();

        if let Some(limit) = self.max_pending
            && state.pending.len() >= limit
        {
            warn!(
                pending = state.pending.len(),
                max = limit,
                method = %method,
                "Too many pending commands"
            );
            return Err(Error::too_many_pending(limit));
        }

        let id = CommandId::new(state.next_id);
        state.next_id = state.next_id.wrapping_add(1);

        let (response_tx, response_rx) = oneshot::channel();
        state.pending.insert(
            id,
            PendingCommand {
                id,
                method: method.to_string(),
                session_id: session_id.cloned(),
                response_tx,
            },
        );

        trace!(id = %id, method = %method, "Command registered");
        Ok((id, response_rx))
    }

    /// Completes a command with its result.
    ///
    /// Returns `false` if the id is unknown.
    pub fn resolve(&self, id: CommandId, result: Value) -> bool {
        self.complete(id, Ok(result))
    }

    /// Completes a command with an error.
    ///
    /// Returns `false` if the id is unknown.
    pub fn reject(&self, id: CommandId, error: Error) -> bool {
        self.complete(id, Err(error))
    }

    /// Routes a decoded response to its command.
    pub fn complete_response(&self, response: Response) -> bool {
        let id = response.id;
        self.complete(id, response.into_result())
    }

    /// Removes a command without completing it.
    ///
    /// Used when the caller itself gives up (queueing failure, deadline).
    pub fn remove(&self, id: CommandId) -> Option<PendingCommand> {
        self.state.lock().pending.remove(&id)
    }

    /// Fails every pending command with [`Error::ConnectionClosed`].
    ///
    /// Returns the number of commands cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingCommand> = {
            let mut state = self.state.lock();
            state.pending.drain().map(|(_, command)| command).collect()
        };

        let count = drained.len();
        for command in drained {
            command.complete(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on connection close");
        }
        count
    }

    /// Fails every command sent through one of `sessions` with
    /// [`Error::SessionClosed`].
    ///
    /// Returns the number of commands cancelled.
    pub fn cancel_scope(&self, sessions: &FxHashSet<SessionId>) -> usize {
        if sessions.is_empty() {
            return 0;
        }

        let drained: Vec<(SessionId, PendingCommand)> = {
            let mut state = self.state.lock();
            let scoped: Vec<(CommandId, SessionId)> = state
                .pending
                .values()
                .filter_map(|command| {
                    command
                        .session_id
                        .as_ref()
                        .filter(|session_id| sessions.contains(*session_id))
                        .map(|session_id| (command.id, session_id.clone()))
                })
                .collect();

            scoped
                .into_iter()
                .filter_map(|(id, session_id)| {
                    state.pending.remove(&id).map(|command| (session_id, command))
                })
                .collect()
        };

        let count = drained.len();
        for (session_id, command) in drained {
            command.complete(Err(Error::session_closed(session_id)));
        }

        if count > 0 {
            debug!(count, sessions = sessions.len(), "Failed pending commands on session close");
        }
        count
    }

    /// Returns the number of pending commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Returns the ids of pending commands in ascending order.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<CommandId> {
        let mut ids: Vec<CommandId> = self.state.lock().pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns `true` if `id` is awaiting a response.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: CommandId) -> bool {
        self.state.lock().pending.contains_key(&id)
    }

    fn complete(&self, id: CommandId, outcome: Result<Value>) -> bool {
        let command = self.state.lock().pending.remove(&id);

        match command {
            Some(command) => {
                trace!(id = %id, method = %command.method, ok = outcome.is_ok(), "Command completed");
                command.complete(outcome);
                true
            }
            None => {
                warn!(id = %id, "Response for unknown command");
                false
            }
        }
    }
}

impl fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTracker")
            .field("pending", &self.pending_count())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
