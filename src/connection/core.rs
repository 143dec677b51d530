//! Connection and event loop.
//!
//! A [`Connection`] owns one transport and spawns a single tokio task
//! that is the only reader and the only writer of it. The task:
//!
//! - Writes encoded commands queued by callers
//! - Decodes inbound frames
//! - Completes pending commands by id
//! - Applies lifecycle changes, then publishes events to their session
//!
//! When the transport ends, fails, or the connection is closed, the task
//! closes the root session. That fails every pending command with
//! [`Error::ConnectionClosed`] and ends every subscription.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::events::{EventFilter, EventHub, Subscription};
use crate::identifiers::{CommandId, SessionId};
use crate::protocol::{Event, Message, Request, decode, encode, params_object};
use crate::session::{LifecycleChange, LifecycleHook, Session, SessionClient, SessionRegistry};
use crate::tracker::{Completion, RequestTracker};
use crate::transport::{FrameSink, FrameSource, Transport};

use super::builder::ConnectionBuilder;
use super::options::ConnectionOptions;

// ============================================================================
// Constants
// ============================================================================

/// Longest slice of a rejected frame written to the log.
const LOG_PREVIEW_BYTES: usize = 256;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Commands and events flow.
    Open,
    /// Shutdown started; new commands are rejected.
    Closing,
    /// Every command has completed and every subscription has ended.
    Closed,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write an encoded command.
    Write { id: CommandId, frame: String },
    /// Close the transport and stop.
    Shutdown,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared by every handle and the event loop.
struct Shared {
    tracker: Arc<RequestTracker>,
    hub: Arc<EventHub>,
    registry: SessionRegistry,
    lifecycle_hook: Mutex<Option<Arc<LifecycleHook>>>,
    state_tx: watch::Sender<ConnectionState>,
    options: ConnectionOptions,
}

impl Shared {
    /// Routes one inbound frame.
    fn handle_incoming_frame(&self, text: &str) {
        match decode(text) {
            Ok(Message::Response(response)) => {
                self.tracker.complete_response(response);
            }
            Ok(Message::Event(event)) => self.handle_event(event),
            Ok(Message::MalformedResponse { id, error }) => {
                warn!(id = %id, error = %error, frame = %log_preview(text), "Malformed response");
                self.tracker.reject(id, error);
            }
            Err(e) => {
                warn!(error = %e, frame = %log_preview(text), "Dropping malformed frame");
            }
        }
    }

    fn handle_event(&self, event: Event) {
        let session = match self.registry.resolve(event.session_id.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                debug!(method = %event.method, error = %e, "Dropping event");
                return;
            }
        };

        let change = self.run_lifecycle_hook(&event);

        match change {
            Some(LifecycleChange::Attached { session_id }) => {
                if let Err(e) = self.registry.create_child(&session, session_id) {
                    warn!(method = %event.method, error = %e, "Failed to attach session");
                }
            }
            Some(LifecycleChange::Detached { session_id }) => {
                self.registry.close(&session_id);
            }
            None => {}
        }

        let delivered = self.hub.publish(&session, event);
        trace!(session = ?session.id(), delivered, "Event dispatched");
    }

    /// Runs the hook outside the lock so it may replace itself.
    ///
    /// A panicking hook reports no change.
    fn run_lifecycle_hook(&self, event: &Event) -> Option<LifecycleChange> {
        let hook = self.lifecycle_hook.lock().clone()?;
        match panic::catch_unwind(AssertUnwindSafe(|| hook(event))) {
            Ok(change) => change,
            Err(_) => {
                error!(method = %event.method, "Lifecycle hook panicked");
                None
            }
        }
    }

    /// Moves `Open` to `Closing`. Returns `false` if already past `Open`.
    fn begin_close(&self) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// Final cascade once the event loop has stopped.
    fn finish(&self) {
        self.begin_close();
        self.registry.close_root();
        self.state_tx.send_replace(ConnectionState::Closed);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A multiplexed connection to a DevTools endpoint.
///
/// Cheap to clone; all clones drive the same event loop. The loop stops
/// when [`Connection::close`] is called, when the remote end hangs up,
/// or when the last handle is dropped.
///
/// # Example
///
/// ```no_run
/// use devtools_mux::Connection;
/// use serde_json::json;
///
/// # async fn example() -> devtools_mux::Result<()> {
/// let connection = Connection::connect("ws://127.0.0.1:9222/devtools/browser/abc").await?;
/// let root = connection.root();
///
/// let version = connection.send("Browser.getVersion", json!({}), &root).await?;
/// println!("{version}");
///
/// connection.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    /// Channel into the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Connects to a WebSocket endpoint with default options.
    ///
    /// # Errors
    ///
    /// See [`ConnectionBuilder::connect`].
    pub async fn connect(url: &str) -> Result<Self> {
        ConnectionBuilder::new().connect(url).await
    }

    /// Wraps a transport with default options.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn with_transport<T: Transport>(transport: T) -> Self {
        Self::new(transport, ConnectionOptions::default(), None)
    }

    /// Spawns the event loop over `transport`. Options must be valid.
    pub(crate) fn new<T: Transport>(
        transport: T,
        options: ConnectionOptions,
        lifecycle_hook: Option<LifecycleHook>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(RequestTracker::new(options.max_pending));
        let hub = Arc::new(EventHub::new(options.event_buffer));
        let registry = SessionRegistry::new(Arc::clone(&tracker), Arc::clone(&hub));
        let (state_tx, _) = watch::channel(ConnectionState::Open);

        let shared = Arc::new(Shared {
            tracker,
            hub,
            registry,
            lifecycle_hook: Mutex::new(lifecycle_hook.map(Arc::new)),
            state_tx,
            options,
        });

        let (sink, source) = transport.split();
        tokio::spawn(Self::run_event_loop(
            sink,
            source,
            command_rx,
            Arc::clone(&shared),
        ));

        debug!(options = ?shared.options, "Connection opened");

        Self { command_tx, shared }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Returns the root session.
    #[inline]
    #[must_use]
    pub fn root(&self) -> Session {
        self.shared.registry.root().clone()
    }

    /// Looks up an open child session.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.shared.registry.get(session_id)
    }

    /// Registers a child session by hand.
    ///
    /// Idempotent for an id that is already open.
    ///
    /// # Errors
    ///
    /// Returns the parent's closed error if `parent` is closed.
    pub fn attach_session(
        &self,
        parent: &Session,
        session_id: impl Into<SessionId>,
    ) -> Result<Session> {
        self.shared.registry.create_child(parent, session_id.into())
    }

    /// Closes a child session and its descendants.
    ///
    /// Returns the number of sessions closed.
    pub fn detach_session(&self, session_id: &SessionId) -> usize {
        self.shared.registry.close(session_id)
    }

    /// Installs the hook that reports session attach/detach events.
    pub fn set_lifecycle_hook(&self, hook: LifecycleHook) {
        *self.shared.lifecycle_hook.lock() = Some(Arc::new(hook));
    }

    /// Removes the lifecycle hook.
    pub fn clear_lifecycle_hook(&self) {
        *self.shared.lifecycle_hook.lock() = None;
    }

    /// Returns a typed client bound to `session`.
    #[must_use]
    pub fn client(&self, session: &Session) -> SessionClient {
        SessionClient::new(self.clone(), session.clone())
    }

    /// Returns a typed client bound to the root session.
    #[must_use]
    pub fn root_client(&self) -> SessionClient {
        self.client(&self.root())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends a command on `session` and waits for its response.
    ///
    /// `params` must be a JSON object or `null`. Waits indefinitely unless
    /// a command timeout was configured.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `method` is empty or `params` is not an object
    /// - [`Error::TooManyPending`] if the in-flight limit is reached
    /// - [`Error::Protocol`] if the remote end answered with an error
    /// - [`Error::SessionClosed`] if the session closed first
    /// - [`Error::ConnectionClosed`] if the connection closed first
    /// - [`Error::RequestTimeout`] if a configured timeout expired
    pub async fn send(&self, method: &str, params: Value, session: &Session) -> Result<Value> {
        let (id, completion) = self.dispatch(method, params, session)?;

        match self.shared.options.command_timeout {
            Some(deadline) => self.await_with_deadline(id, completion, deadline).await,
            None => await_completion(completion).await,
        }
    }

    /// Sends a command and waits at most `deadline` for its response.
    ///
    /// On expiry the command is forgotten; a late response is logged and
    /// discarded.
    ///
    /// # Errors
    ///
    /// As [`Connection::send`], plus [`Error::RequestTimeout`].
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        session: &Session,
        deadline: Duration,
    ) -> Result<Value> {
        let (id, completion) = self.dispatch(method, params, session)?;
        self.await_with_deadline(id, completion, deadline).await
    }

    /// Registers and queues a command.
    fn dispatch(
        &self,
        method: &str,
        params: Value,
        session: &Session,
    ) -> Result<(CommandId, Completion)> {
        if method.is_empty() {
            return Err(Error::invalid_argument("method must not be empty"));
        }
        let params = params_object(params)?;
        self.ensure_usable(session)?;

        let (id, completion) = self.shared.tracker.allocate(method, session.id())?;

        // A close may have drained the tracker before the allocation landed.
        // Whoever removes the entry reports the outcome.
        if let Err(e) = self.ensure_usable(session) {
            return match self.shared.tracker.remove(id) {
                Some(_) => Err(e),
                None => Ok((id, completion)),
            };
        }

        let request = Request::new(id, method, params, session.id().cloned());
        let frame = match encode(&request) {
            Ok(frame) => frame,
            Err(e) => {
                self.shared.tracker.remove(id);
                return Err(e);
            }
        };

        if self
            .command_tx
            .send(ConnectionCommand::Write { id, frame })
            .is_err()
        {
            self.shared.tracker.remove(id);
            return Err(Error::ConnectionClosed);
        }

        trace!(id = %id, method, session = ?session.id(), "Command queued");
        Ok((id, completion))
    }

    fn ensure_usable(&self, session: &Session) -> Result<()> {
        if self.state() != ConnectionState::Open {
            return Err(Error::ConnectionClosed);
        }
        if session.is_closed() {
            return Err(session.closed_error());
        }
        Ok(())
    }

    async fn await_with_deadline(
        &self,
        id: CommandId,
        mut completion: Completion,
        deadline: Duration,
    ) -> Result<Value> {
        match timeout(deadline, &mut completion).await {
            Ok(result) => result.unwrap_or(Err(Error::ConnectionClosed)),
            Err(_) => {
                if self.shared.tracker.remove(id).is_some() {
                    debug!(id = %id, "Command timed out");
                    return Err(Error::request_timeout(id, deadline));
                }
                // Completed right at the deadline.
                await_completion(completion).await
            }
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes to events on `session` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the session's closed error if it is already closed.
    pub fn subscribe(&self, session: &Session, filter: impl Into<EventFilter>) -> Result<Subscription> {
        self.shared.hub.subscribe(session, filter)
    }

    /// Subscribes to every event on `session`.
    ///
    /// # Errors
    ///
    /// Returns the session's closed error if it is already closed.
    pub fn events(&self, session: &Session) -> Result<Subscription> {
        self.subscribe(session, EventFilter::Any)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Returns `true` once the close cascade has completed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Waits until the connection is fully closed.
    pub async fn closed(&self) {
        let mut state_rx = self.shared.state_tx.subscribe();
        let _ = state_rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    /// Closes the connection and waits for the close cascade.
    ///
    /// Idempotent. Pending commands fail with
    /// [`Error::ConnectionClosed`]; subscriptions end.
    pub async fn close(&self) {
        if self.shared.begin_close() {
            debug!("Closing connection");
        }
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
        self.closed().await;
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.tracker.pending_count()
    }

    /// Returns the ids of commands awaiting a response, ascending.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<CommandId> {
        self.shared.tracker.pending_ids()
    }

    /// Returns the number of open child sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.shared.registry.session_count()
    }

    /// Returns the number of live subscriptions on `session`.
    #[must_use]
    pub fn subscriber_count(&self, session: &Session) -> usize {
        self.shared.hub.subscriber_count(session)
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    async fn run_event_loop<K, S>(
        mut sink: K,
        mut source: S,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
    ) where
        K: FrameSink,
        S: FrameSource,
    {
        loop {
            tokio::select! {
                // Inbound frames
                frame = source.next_frame() => {
                    match frame {
                        Some(Ok(text)) => shared.handle_incoming_frame(&text),

                        Some(Err(e)) => {
                            error!(error = %e, "Transport error");
                            break;
                        }

                        None => {
                            debug!("Transport closed by remote");
                            break;
                        }
                    }
                }

                // Outbound commands
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Write { id, frame }) => {
                            if let Err(e) = sink.send_frame(frame).await {
                                error!(id = %id, error = %e, "Transport write failed");
                                break;
                            }
                            trace!(id = %id, "Command written");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            if let Err(e) = sink.close().await {
                                debug!(error = %e, "Transport close failed");
                            }
                            break;
                        }

                        None => {
                            debug!("All connection handles dropped");
                            let _ = sink.close().await;
                            break;
                        }
                    }
                }
            }
        }

        shared.finish();

        debug!("Event loop terminated");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn await_completion(completion: Completion) -> Result<Value> {
    completion.await.unwrap_or(Err(Error::ConnectionClosed))
}

/// Truncates `text` on a char boundary for logging.
fn log_preview(text: &str) -> &str {
    if text.len() <= LOG_PREVIEW_BYTES {
        return text;
    }
    let mut end = LOG_PREVIEW_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================================================
// Tests
// ============================================================================
