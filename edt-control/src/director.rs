//! Spawns a fixed action set concurrently and waits for a breaker to trip.

use edt_core::{ActionResult, BoxAction, EdtError, Token};

use crate::breaker::Breaker;

/// Spawns every action concurrently under a shared [`Breaker`]'s context,
/// waits for the breaker to trip, then waits for every action to finish.
///
/// Mirrors a process supervisor: actions run for as long as the process
/// does, and the breaker (typically [`SignalBreaker`](crate::SignalBreaker))
/// is what tells the process it's time to shut down.
pub struct Director {
    actions: Vec<BoxAction>,
    breaker: std::sync::Arc<dyn Breaker>,
}

impl Director {
    /// Drive `actions` under `breaker`.
    #[must_use]
    pub fn new(actions: Vec<BoxAction>, breaker: std::sync::Arc<dyn Breaker>) -> Director {
        Director { actions, breaker }
    }

    /// Spawn every action, wait for the breaker to trip, release it, then
    /// collect every action's outcome.
    ///
    /// # Errors
    ///
    /// Returns [`EdtError::Aggregate`] if one or more actions failed,
    /// collecting every failure rather than stopping at the first.
    pub async fn do_(&self) -> Result<Vec<ActionResult>, EdtError> {
        let context = self.breaker.context();

        let mut set = tokio::task::JoinSet::new();
        for action in &self.actions {
            let action = std::sync::Arc::clone(action);
            let token = context.clone();
            set.spawn(async move { action.run(token).await });
        }

        self.breaker.wait().await;
        self.breaker.release();

        let total = self.actions.len();
        let mut results = Vec::with_capacity(total);
        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined.map_err(|e| EdtError::HandlerError(e.to_string()))? {
                Ok(result) => results.push(result),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(results)
        } else {
            Err(EdtError::aggregate(errors, total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::SignalBreaker;
    use edt_core::action_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn waits_for_every_action_after_the_breaker_trips() {
        let count = Arc::new(AtomicUsize::new(0));
        let breaker = Arc::new(SignalBreaker::new(Token::background()));
        let trigger = Arc::clone(&breaker);

        let actions: Vec<BoxAction> = (0..3)
            .map(|_| {
                let count = Arc::clone(&count);
                action_fn(move |_token| {
                    let count = Arc::clone(&count);
                    async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(ActionResult::nothing())
                    }
                })
            })
            .collect();

        let director = Director::new(actions, breaker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            trigger.trip();
        });

        let results = director.do_().await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn aggregates_failures_from_every_failing_action() {
        let breaker = Arc::new(SignalBreaker::new(Token::background()));
        breaker.trip();

        let actions: Vec<BoxAction> = vec![
            action_fn(|_t| async move { Err(EdtError::HandlerError("a".into())) }),
            action_fn(|_t| async move { Ok(ActionResult::nothing()) }),
            action_fn(|_t| async move { Err(EdtError::HandlerError("b".into())) }),
        ];

        let director = Director::new(actions, breaker);
        let err = director.do_().await.unwrap_err();
        match err {
            EdtError::Aggregate { errors, total } => {
                assert_eq!(total, 3);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected Aggregate, got {other:?}"),
        }
    }
}
