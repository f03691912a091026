//! A named [`Loopable`] with a fluent builder.

use std::time::Duration;

use edt_core::{BoxAction, EdtError, Token};

use crate::loopable::Loopable;

/// A [`Loopable`] plus a name, for logging and diagnostics.
pub struct Actor {
    name: String,
    loopable: Loopable,
}

impl Actor {
    /// This actor's name, as given to [`ActorBuilder::new`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until `token` cancels.
    ///
    /// # Errors
    ///
    /// Returns whatever error an action produces.
    pub async fn run(&self, token: Token) -> Result<(), EdtError> {
        tracing::debug!(actor = %self.name, "starting");
        let result = self.loopable.run(token).await;
        if let Err(e) = &result {
            tracing::debug!(actor = %self.name, error = %e, "stopped");
        }
        result
    }
}

/// Builds an [`Actor`] from a name, an action sequence, and a loop delay.
pub struct ActorBuilder {
    name: String,
    actions: Vec<BoxAction>,
    delay: Duration,
}

impl ActorBuilder {
    /// Start building an actor named `name`, with no actions and no delay.
    #[must_use]
    pub fn new(name: impl Into<String>) -> ActorBuilder {
        ActorBuilder {
            name: name.into(),
            actions: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Append an action to the end of the loop sequence.
    #[must_use]
    pub fn with_action(mut self, action: BoxAction) -> ActorBuilder {
        self.actions.push(action);
        self
    }

    /// Wait `delay` between full passes over the action sequence.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> ActorBuilder {
        self.delay = delay;
        self
    }

    /// Finish building the actor.
    ///
    /// # Errors
    ///
    /// Returns [`EdtError::LifecycleViolation`] if no actions were added.
    pub fn build(self) -> Result<Actor, EdtError> {
        if self.actions.is_empty() {
            return Err(EdtError::LifecycleViolation(
                "an actor needs at least one action".into(),
            ));
        }
        Ok(Actor {
            name: self.name,
            loopable: Loopable::new(self.actions, self.delay),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edt_core::{action_fn, ActionResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn runs_its_actions_each_pass_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let actor = ActorBuilder::new("counter")
            .with_action(action_fn(move |_t| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.fetch_add(1, Ordering::SeqCst);
                    Ok(ActionResult::nothing())
                }
            }))
            .with_delay(Duration::from_millis(1))
            .build()
            .unwrap();

        let token = Token::background();
        let runner = token.clone();
        let handle = tokio::spawn(async move { actor.run(runner).await });
        tokio::time::sleep(Duration::from_millis(15)).await;
        token.cancel();
        handle.await.unwrap().unwrap_err();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn building_without_actions_is_a_lifecycle_violation() {
        let err = ActorBuilder::new("empty").build().unwrap_err();
        assert!(matches!(err, EdtError::LifecycleViolation(_)));
    }

    #[test]
    fn name_is_preserved() {
        let actor = ActorBuilder::new("watchdog")
            .with_action(action_fn(|_t| async move { Ok(ActionResult::nothing()) }))
            .build()
            .unwrap();
        assert_eq!(actor.name(), "watchdog");
    }
}
