//! The type-keyed publish/subscribe registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;

use edt_core::{ActionFuture, BoxAction, EdtError, Token};

use crate::event::Event;

type Payload = Arc<dyn Any + Send + Sync>;
type Erased = Arc<dyn Fn(Payload, Token) -> ActionFuture<'static> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    id: u64,
    handler: Erased,
}

/// A handle returned by [`Hub::subscribe`], used to remove that
/// subscription later via [`Hub::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(TypeId, u64);

/// A type-keyed, in-process event hub.
///
/// [`Hub::subscribe`] registers a handler for a concrete [`Event`] type;
/// [`Hub::publish`] spawns every subscriber registered for its type
/// concurrently and hands back the [`tokio::task::JoinSet`] driving them,
/// a wait-group a caller can await or simply drop to fire-and-forget. A
/// handler that fails is logged at warn-level and does not stop its
/// siblings, nor does it surface to the publisher — a misbehaving
/// subscriber is never the publisher's problem.
#[derive(Default)]
pub struct Hub {
    subscribers: Mutex<HashMap<TypeId, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl Hub {
    /// A hub with no subscribers.
    #[must_use]
    pub fn new() -> Hub {
        Hub {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `handler` for every future [`Hub::publish`] of `E`.
    pub fn subscribe<E, F, Fut>(&self, handler: F) -> Subscription
    where
        E: Event,
        F: Fn(E, Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EdtError>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let erased: Erased = Arc::new(move |payload, token| {
            let event = payload
                .downcast::<E>()
                .expect("event payload type must match its own TypeId key");
            handler((*event).clone(), token)
                .map(|r| r.map(|()| edt_core::ActionResult::nothing()))
                .boxed()
        });

        self.subscribers
            .lock()
            .expect("hub subscriber map poisoned")
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Entry { id, handler: erased });

        Subscription(TypeId::of::<E>(), id)
    }

    /// Subscribe a plain [`BoxAction`] to `E`, ignoring the event's
    /// payload — for handlers that only care that *something* of this
    /// type happened.
    pub fn subscribe_action<E: Event>(&self, action: BoxAction) -> Subscription {
        self.subscribe::<E, _, _>(move |_event, token| {
            let action = Arc::clone(&action);
            async move { action.run(token).await.map(|_| ()) }
        })
    }

    /// Remove a subscription registered via [`Hub::subscribe`] or
    /// [`Hub::subscribe_action`]. A no-op if it was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let Subscription(type_id, id) = subscription;
        if let Some(entries) = self
            .subscribers
            .lock()
            .expect("hub subscriber map poisoned")
            .get_mut(&type_id)
        {
            entries.retain(|e| e.id != id);
        }
    }

    /// Spawn every current subscriber of `E` concurrently and return the
    /// [`tokio::task::JoinSet`] running them. Subscriber failures are
    /// logged and otherwise ignored — awaiting the returned set never
    /// yields an `Err`.
    pub async fn publish<E: Event>(&self, event: E, token: Token) -> tokio::task::JoinSet<()> {
        let handlers: Vec<Entry> = self
            .subscribers
            .lock()
            .expect("hub subscriber map poisoned")
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();

        let payload: Payload = Arc::new(event);
        let mut set = tokio::task::JoinSet::new();
        for entry in handlers {
            let payload = Arc::clone(&payload);
            let token = token.clone();
            set.spawn(async move {
                if let Err(e) = (entry.handler)(payload, token).await {
                    tracing::warn!(event = E::name(), error = %e, "event subscriber failed");
                }
            });
        }
        set
    }

    /// Attach this hub to `token`'s context chain, so descendants can
    /// recover it with [`Hub::from_context`].
    #[must_use]
    pub fn install(self: &Arc<Hub>, token: &Token) -> Token {
        token.with_value(Arc::clone(self))
    }

    /// Recover a hub previously attached with [`Hub::install`].
    #[must_use]
    pub fn from_context(token: &Token) -> Option<Arc<Hub>> {
        token.get::<Arc<Hub>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct Ping(i32);
    impl Event for Ping {}

    #[tokio::test]
    async fn publish_reaches_every_subscriber_concurrently() {
        let hub = Hub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            hub.subscribe::<Ping, _, _>(move |ping, _token| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push((tag, ping.0));
                    Ok(())
                }
            });
        }

        let mut set = hub.publish(Ping(42), Token::background()).await;
        while set.join_next().await.is_some() {}

        let mut observed = seen.lock().unwrap().clone();
        observed.sort();
        assert_eq!(observed, vec![("a", 42), ("b", 42)]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_dispatches() {
        let hub = Hub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let sub = hub.subscribe::<Ping, _, _>(move |_ping, _token| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let mut first = hub.publish(Ping(1), Token::background()).await;
        while first.join_next().await.is_some() {}
        hub.unsubscribe(sub);
        let mut second = hub.publish(Ping(2), Token::background()).await;
        while second.join_next().await.is_some() {}

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_block_the_next_one() {
        let hub = Hub::new();
        let reached = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&reached);

        hub.subscribe::<Ping, _, _>(|_ping, _token| async move {
            Err(EdtError::HandlerError("boom".into()))
        });
        hub.subscribe::<Ping, _, _>(move |_ping, _token| {
            let flag = Arc::clone(&flag);
            async move {
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let mut set = hub.publish(Ping(0), Token::background()).await;
        while set.join_next().await.is_some() {}
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn install_and_from_context_round_trip_through_a_token() {
        let hub = Arc::new(Hub::new());
        let token = hub.install(&Token::background());
        let recovered = Hub::from_context(&token).expect("hub should be in context");
        assert!(Arc::ptr_eq(&hub, &recovered));
    }
}
