//! Wait for a specific, optionally-filtered event to be published.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use edt_core::{EdtError, Token};

use crate::event::Event;
use crate::hub::Hub;

/// A one-shot wait for the next `E` a [`Hub`] publishes that matches a
/// predicate.
///
/// Registers its own subscription on [`Expectable::wait`] and removes it
/// again before returning, win or lose — it never leaves a dangling
/// subscriber behind.
pub struct Expectable<E: Event> {
    hub: Arc<Hub>,
    predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E: Event> Expectable<E> {
    /// Wait for any `E`, regardless of its payload.
    #[must_use]
    pub fn new(hub: Arc<Hub>) -> Expectable<E> {
        Expectable {
            hub,
            predicate: Arc::new(|_| true),
        }
    }

    /// Only resolve on an `E` for which `predicate` returns `true`.
    #[must_use]
    pub fn matching<F: Fn(&E) -> bool + Send + Sync + 'static>(
        mut self,
        predicate: F,
    ) -> Expectable<E> {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Block until a matching event arrives or `token` cancels.
    pub async fn wait(&self, token: Token) -> Result<E, EdtError> {
        let (tx, rx) = oneshot::channel::<E>();
        let tx = Mutex::new(Some(tx));
        let predicate = Arc::clone(&self.predicate);

        let subscription = self.hub.subscribe::<E, _, _>(move |event, _token| {
            if predicate(&event) {
                if let Some(sender) = tx.lock().expect("expectable sender mutex poisoned").take()
                {
                    let _ = sender.send(event);
                }
            }
            async move { Ok(()) }
        });

        let outcome = tokio::select! {
            () = token.cancelled() => Err(token.error().unwrap_or(EdtError::Cancelled)),
            received = rx => received.map_err(|_| {
                EdtError::LifecycleViolation("hub dropped before a matching event arrived".into())
            }),
        };

        self.hub.unsubscribe(subscription);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Clone)]
    struct Tick(u32);
    impl Event for Tick {}

    #[tokio::test]
    async fn resolves_on_first_matching_event() {
        let hub = Arc::new(Hub::new());
        let expectable = Expectable::<Tick>::new(Arc::clone(&hub)).matching(|t| t.0 >= 3);

        let hub_for_publisher = Arc::clone(&hub);
        tokio::spawn(async move {
            for n in 1..=5 {
                hub_for_publisher.publish(Tick(n), Token::background()).await;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let tick = expectable.wait(Token::background()).await.unwrap();
        assert_eq!(tick.0, 3);
    }

    #[tokio::test]
    async fn cancellation_wins_over_an_event_that_never_comes() {
        let hub = Arc::new(Hub::new());
        let expectable = Expectable::<Tick>::new(hub);

        let token = Token::background();
        let waiter = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            waiter.cancel();
        });

        let err = expectable.wait(token).await.unwrap_err();
        assert!(matches!(err, EdtError::Cancelled));
    }
}
