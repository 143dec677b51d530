//! Per-session event multicast.
//!
//! The hub keeps an index of subscriptions per session and, within a
//! session, by exact method, by domain, and catch-all. Publishing an
//! event touches only the three lists that can match it.
//!
//! Delivery is fire-and-forget: an event published with no matching
//! subscriber is dropped. Each subscriber owns its own queue, so one slow
//! consumer never delays another.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::identifiers::{SessionId, SubscriptionId};
use crate::protocol::Event;
use crate::protocol::event::split_method;
use crate::session::Session;

use super::filter::EventFilter;
use super::subscription::{EventReceiver, Subscription};

// ============================================================================
// EventBuffer
// ============================================================================

/// Per-subscriber queue policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventBuffer {
    /// Queue every event until the subscriber drains it.
    #[default]
    Unbounded,
    /// Queue at most `n` events; newer events are dropped while full.
    Bounded(usize),
}

// ============================================================================
// Types
// ============================================================================

/// Subscriptions are keyed by session; `None` is the root session.
type ScopeKey = Option<SessionId>;

/// Sending half of one subscriber's queue.
enum EventSender {
    Unbounded(mpsc::UnboundedSender<Event>),
    Bounded {
        tx: mpsc::Sender<Event>,
        dropped: Arc<AtomicU64>,
    },
}

/// Outcome of handing an event to one subscriber.
enum Delivery {
    Delivered,
    Dropped,
    Gone,
}

impl EventSender {
    fn deliver(&self, event: Event) -> Delivery {
        match self {
            Self::Unbounded(tx) => match tx.send(event) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Gone,
            },
            Self::Bounded { tx, dropped } => match tx.try_send(event) {
                Ok(()) => Delivery::Delivered,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    Delivery::Dropped
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Gone,
            },
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    sender: EventSender,
}

/// All subscriptions of one session.
#[derive(Default)]
struct ScopeSubscribers {
    by_method: FxHashMap<String, Vec<Subscriber>>,
    by_domain: FxHashMap<String, Vec<Subscriber>>,
    any: Vec<Subscriber>,
}

impl ScopeSubscribers {
    fn list_mut(&mut self, filter: &EventFilter) -> &mut Vec<Subscriber> {
        match filter {
            EventFilter::Method(method) => self.by_method.entry(method.clone()).or_default(),
            EventFilter::Domain(domain) => self.by_domain.entry(domain.clone()).or_default(),
            EventFilter::Any => &mut self.any,
        }
    }

    fn remove(&mut self, filter: &EventFilter, id: SubscriptionId) -> bool {
        let (removed, now_empty) = {
            let list = self.list_mut(filter);
            let before = list.len();
            list.retain(|subscriber| subscriber.id != id);
            (list.len() != before, list.is_empty())
        };

        if now_empty {
            match filter {
                EventFilter::Method(method) => {
                    self.by_method.remove(method);
                }
                EventFilter::Domain(domain) => {
                    self.by_domain.remove(domain);
                }
                EventFilter::Any => {}
            }
        }
        removed
    }

    fn len(&self) -> usize {
        self.by_method.values().map(Vec::len).sum::<usize>()
            + self.by_domain.values().map(Vec::len).sum::<usize>()
            + self.any.len()
    }

    fn is_empty(&self) -> bool {
        self.by_method.is_empty() && self.by_domain.is_empty() && self.any.is_empty()
    }
}

// ============================================================================
// EventHub
// ============================================================================

/// Multicasts decoded events to per-session subscribers.
pub struct EventHub {
    scopes: Mutex<FxHashMap<ScopeKey, ScopeSubscribers>>,
    buffer: EventBuffer,
}

impl EventHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new(buffer: EventBuffer) -> Self {
        Self {
            scopes: Mutex::new(FxHashMap::default()),
            buffer,
        }
    }

    /// Registers a subscription on `session`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SessionClosed`] (or
    /// [`crate::Error::ConnectionClosed`] for the root session) if the
    /// session is already closed.
    pub fn subscribe(
        self: &Arc<Self>,
        session: &Session,
        filter: impl Into<EventFilter>,
    ) -> Result<Subscription> {
        let filter = filter.into();
        let id = SubscriptionId::next();

        let (sender, receiver, dropped) = match self.buffer {
            EventBuffer::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (EventSender::Unbounded(tx), EventReceiver::Unbounded(rx), None)
            }
            EventBuffer::Bounded(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                let dropped = Arc::new(AtomicU64::new(0));
                (
                    EventSender::Bounded {
                        tx,
                        dropped: Arc::clone(&dropped),
                    },
                    EventReceiver::Bounded(rx),
                    Some(dropped),
                )
            }
        };

        {
            let mut scopes = self.scopes.lock();
            // Checked under the hub lock so a concurrent close either sees
            // this subscriber or we see the closed flag.
            if session.is_closed() {
                return Err(session.closed_error());
            }
            scopes
                .entry(session.id().cloned())
                .or_default()
                .list_mut(&filter)
                .push(Subscriber { id, sender });
        }

        debug!(subscription = %id, session = ?session.id(), filter = %filter, "Subscribed");

        Ok(Subscription::new(
            id,
            session.clone(),
            filter,
            receiver,
            dropped,
            Arc::downgrade(self),
        ))
    }

    /// Delivers `event` to every matching subscriber on `session`.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, session: &Session, event: Event) -> usize {
        let key = session.id().cloned();
        let mut scopes = self.scopes.lock();

        let Some(scope) = scopes.get_mut(&key) else {
            trace!(method = %event.method, session = ?key, "No subscribers for event");
            return 0;
        };

        let domain = split_method(&event.method).0;
        let mut delivered = 0;
        let mut gone: Vec<(EventFilter, SubscriptionId)> = Vec::new();

        let lists = [
            (
                scope.by_method.get(event.method.as_str()),
                EventFilter::Method(event.method.clone()),
            ),
            (
                scope.by_domain.get(domain),
                EventFilter::Domain(domain.to_string()),
            ),
            (Some(&scope.any), EventFilter::Any),
        ];

        for (list, filter) in lists {
            let Some(list) = list else { continue };
            for subscriber in list {
                match subscriber.sender.deliver(event.clone()) {
                    Delivery::Delivered => delivered += 1,
                    Delivery::Dropped => warn!(
                        subscription = %subscriber.id,
                        method = %event.method,
                        "Subscriber queue full, dropping event"
                    ),
                    Delivery::Gone => gone.push((filter.clone(), subscriber.id)),
                }
            }
        }

        for (filter, id) in &gone {
            scope.remove(filter, *id);
        }
        if scope.is_empty() {
            scopes.remove(&key);
        }

        trace!(method = %event.method, session = ?key, delivered, "Event published");
        delivered
    }

    /// Removes one subscription.
    ///
    /// Returns `false` if it was already gone.
    pub(crate) fn unsubscribe(
        &self,
        session_id: Option<&SessionId>,
        filter: &EventFilter,
        id: SubscriptionId,
    ) -> bool {
        let key = session_id.cloned();
        let mut scopes = self.scopes.lock();

        let Some(scope) = scopes.get_mut(&key) else {
            return false;
        };
        let removed = scope.remove(filter, id);
        if scope.is_empty() {
            scopes.remove(&key);
        }

        if removed {
            debug!(subscription = %id, session = ?key, "Unsubscribed");
        }
        removed
    }

    /// Ends every subscription on the given sessions.
    ///
    /// Dropping the senders completes each subscriber's sequence once
    /// its queue drains. Returns the number of subscriptions ended.
    pub fn close_scopes(&self, sessions: &FxHashSet<SessionId>) -> usize {
        let removed: Vec<ScopeSubscribers> = {
            let mut scopes = self.scopes.lock();
            sessions
                .iter()
                .filter_map(|id| scopes.remove(&Some(id.clone())))
                .collect()
        };

        let count = removed.iter().map(ScopeSubscribers::len).sum();
        if count > 0 {
            debug!(count, "Ended subscriptions on session close");
        }
        count
    }

    /// Ends every subscription on every session.
    pub fn close_all(&self) -> usize {
        let removed: Vec<ScopeSubscribers> = {
            let mut scopes = self.scopes.lock();
            scopes.drain().map(|(_, scope)| scope).collect()
        };

        let count = removed.iter().map(ScopeSubscribers::len).sum();
        if count > 0 {
            debug!(count, "Ended subscriptions on connection close");
        }
        count
    }

    /// Returns the number of live subscriptions on `session`.
    #[must_use]
    pub fn subscriber_count(&self, session: &Session) -> usize {
        self.scopes
            .lock()
            .get(&session.id().cloned())
            .map_or(0, ScopeSubscribers::len)
    }

    /// Returns the number of live subscriptions across all sessions.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.scopes.lock().values().map(ScopeSubscribers::len).sum()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("buffer", &self.buffer)
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// Weak handle a subscription keeps to its hub.
pub(crate) type HubRef = Weak<EventHub>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Map, json};

    use crate::Error;

    fn event(method: &str, value: i64, session: Option<&str>) -> Event {
        let mut params = Map::new();
        params.insert("v".into(), json!(value));
        Event::new(method, params, session.map(SessionId::new))
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_filters_only() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();

        let mut exact = hub.subscribe(&root, "Foo.baz").expect("subscribe");
        let mut domain = hub.subscribe(&root, "Foo.*").expect("subscribe");
        let mut other = hub.subscribe(&root, "Bar.baz").expect("subscribe");

        assert_eq!(hub.publish(&root, event("Foo.baz", 1, None)), 2);

        assert_eq!(exact.recv().await.expect("event").params["v"], json!(1));
        assert_eq!(domain.recv().await.expect("event").params["v"], json!(1));
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_session_isolation() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let child = Session::child(SessionId::new("S1"), &root);

        let mut on_root = hub.subscribe(&root, "Foo.baz").expect("subscribe");
        let mut on_child = hub.subscribe(&child, "Foo.baz").expect("subscribe");

        hub.publish(&child, event("Foo.baz", 1, Some("S1")));

        assert!(on_root.try_recv().is_none());
        let received = on_child.recv().await.expect("event");
        assert_eq!(received.session_id, Some(SessionId::new("S1")));
    }

    #[tokio::test]
    async fn test_fifo_per_subscriber() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let mut sub = hub.subscribe(&root, "*").expect("subscribe");

        for n in 0..5 {
            hub.publish(&root, event("Foo.tick", n, None));
        }

        for n in 0..5 {
            assert_eq!(sub.recv().await.expect("event").params["v"], json!(n));
        }
    }

    #[tokio::test]
    async fn test_bounded_buffer_drops_newest() {
        let hub = Arc::new(EventHub::new(EventBuffer::Bounded(2)));
        let root = Session::root();
        let mut sub = hub.subscribe(&root, "Foo.tick").expect("subscribe");

        for n in 0..4 {
            hub.publish(&root, event("Foo.tick", n, None));
        }

        assert_eq!(sub.dropped_count(), 2);
        assert_eq!(sub.recv().await.expect("event").params["v"], json!(0));
        assert_eq!(sub.recv().await.expect("event").params["v"], json!(1));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_close_scopes_ends_streams() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let child = Session::child(SessionId::new("S1"), &root);

        let mut on_child = hub.subscribe(&child, "*").expect("subscribe");
        let _on_root = hub.subscribe(&root, "*").expect("subscribe");

        let scope: FxHashSet<SessionId> = [SessionId::new("S1")].into_iter().collect();
        assert_eq!(hub.close_scopes(&scope), 1);

        assert!(on_child.recv().await.is_none());
        assert_eq!(hub.subscriber_count(&root), 1);
    }

    #[test]
    fn test_subscribe_on_closed_session_fails() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let child = Session::child(SessionId::new("S9"), &Session::root());
        child.mark_closed();

        let err = hub.subscribe(&child, "*").unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();

        let sub = hub.subscribe(&root, "Foo.baz").expect("subscribe");
        assert_eq!(hub.subscriber_count(&root), 1);

        drop(sub);
        assert_eq!(hub.subscriber_count(&root), 0);
        assert_eq!(hub.publish(&root, event("Foo.baz", 1, None)), 0);
    }
}
