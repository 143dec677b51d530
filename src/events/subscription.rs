//! Subscription handle.
//!
//! A [`Subscription`] is a lazy, unbounded sequence of [`Event`]s. It
//! implements [`Stream`] and ends (yields `None`) when its session
//! closes. Dropping it or calling [`Subscription::cancel`] stops
//! delivery.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::protocol::Event;
use crate::session::Session;

use super::filter::EventFilter;
use super::hub::HubRef;

// ============================================================================
// EventReceiver
// ============================================================================

/// Receiving half of one subscriber's queue.
pub(crate) enum EventReceiver {
    Unbounded(mpsc::UnboundedReceiver<Event>),
    Bounded(mpsc::Receiver<Event>),
}

impl EventReceiver {
    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        match self {
            Self::Unbounded(rx) => rx.poll_recv(cx),
            Self::Bounded(rx) => rx.poll_recv(cx),
        }
    }

    fn try_recv(&mut self) -> Option<Event> {
        match self {
            Self::Unbounded(rx) => rx.try_recv().ok(),
            Self::Bounded(rx) => rx.try_recv().ok(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Unbounded(rx) => rx.close(),
            Self::Bounded(rx) => rx.close(),
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A standing registration for events on one session.
///
/// # Example
///
/// ```ignore
/// use futures_util::StreamExt;
///
/// let mut added = connection.subscribe(&session, "DOMStorage.domStorageItemAdded")?;
/// while let Some(event) = added.next().await {
///     println!("{} = {:?}", event.method, event.params);
/// }
/// // Sequence ended: the session closed.
/// ```
pub struct Subscription {
    id: SubscriptionId,
    session: Session,
    filter: EventFilter,
    receiver: EventReceiver,
    dropped: Option<Arc<AtomicU64>>,
    hub: HubRef,
    cancelled: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        session: Session,
        filter: EventFilter,
        receiver: EventReceiver,
        dropped: Option<Arc<AtomicU64>>,
        hub: HubRef,
    ) -> Self {
        Self {
            id,
            session,
            filter,
            receiver,
            dropped,
            hub,
            cancelled: false,
        }
    }

    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the session this subscription listens on.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the filter.
    #[inline]
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the session has closed (or the subscription
    /// was cancelled) and the queue is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.next().await
    }

    /// Returns an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv()
    }

    /// Number of events dropped because the queue was full.
    ///
    /// Always zero for unbounded queues.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
            .as_ref()
            .map_or(0, |dropped| dropped.load(Ordering::Relaxed))
    }

    /// Stops future delivery. Idempotent.
    ///
    /// Events already queued can still be drained.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;

        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.session.id(), &self.filter, self.id);
        }
        self.receiver.close();
    }

    /// Maps each event's params into a typed record.
    pub fn typed<T: DeserializeOwned>(self) -> impl Stream<Item = Result<T>> + Send + Unpin {
        self.map(|event| event.params_as::<T>())
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("session", &self.session.id())
            .field("filter", &self.filter)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;
    use serde_json::{Map, json};
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use crate::events::{EventBuffer, EventHub};

    fn tick(n: i64) -> Event {
        let mut params = Map::new();
        params.insert("v".into(), json!(n));
        Event::new("Foo.tick", params, None)
    }

    #[test]
    fn test_recv_is_pending_until_publish() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let mut sub = hub.subscribe(&root, "Foo.tick").expect("subscribe");

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());

        hub.publish(&root, tick(1));
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(tick(1)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let mut sub = hub.subscribe(&root, "Foo.tick").expect("subscribe");

        sub.cancel();
        sub.cancel();

        assert_eq!(hub.subscriber_count(&root), 0);
        assert_eq!(hub.publish(&root, tick(1)), 0);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_typed_stream() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Tick {
            v: i64,
        }

        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let mut ticks = hub.subscribe(&root, "Foo.tick").expect("subscribe").typed::<Tick>();

        hub.publish(&root, tick(7));
        let typed = ticks.next().await.expect("item").expect("typed");
        assert_eq!(typed, Tick { v: 7 });
    }

    #[tokio::test]
    async fn test_subscription_outlives_hub() {
        let hub = Arc::new(EventHub::new(EventBuffer::Unbounded));
        let root = Session::root();
        let mut sub = hub.subscribe(&root, "*").expect("subscribe");

        hub.publish(&root, tick(1));
        drop(hub);

        assert_eq!(sub.recv().await, Some(tick(1)));
        assert_eq!(sub.recv().await, None);
        sub.cancel();
    }
}
