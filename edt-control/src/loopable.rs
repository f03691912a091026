//! A fixed action sequence, repeated on a delay until cancelled.

use std::time::Duration;

use edt_core::{BoxAction, EdtError, Token};

/// Runs its actions in order, then waits `delay` before looping back to
/// the first one, forever — the only way a [`Loopable`] stops is its
/// [`Token`] being cancelled, checked both between actions and while
/// waiting out the delay.
pub struct Loopable {
    actions: Vec<BoxAction>,
    delay: Duration,
}

impl Loopable {
    /// Repeat `actions` in order, waiting `delay` between full passes.
    #[must_use]
    pub fn new(actions: Vec<BoxAction>, delay: Duration) -> Loopable {
        Loopable { actions, delay }
    }

    /// Run until `token` cancels.
    ///
    /// # Errors
    ///
    /// Returns whatever error an action produces, without running any
    /// further actions or iterations.
    pub async fn run(&self, token: Token) -> Result<(), EdtError> {
        loop {
            for action in &self.actions {
                if token.is_cancelled() {
                    return Err(token.into_error());
                }
                action.run(token.clone()).await?;
            }

            if token.is_cancelled() {
                return Err(token.into_error());
            }

            tokio::select! {
                () = tokio::time::sleep(self.delay) => {}
                () = token.cancelled() => return Err(token.into_error()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edt_core::{action_fn, ActionResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn runs_actions_in_order_each_pass_until_cancelled() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let a = Arc::clone(&log);
        let b = Arc::clone(&log);
        let actions = vec![
            action_fn(move |_t| {
                let a = Arc::clone(&a);
                async move {
                    a.lock().unwrap().push("a");
                    Ok(ActionResult::nothing())
                }
            }),
            action_fn(move |_t| {
                let b = Arc::clone(&b);
                async move {
                    b.lock().unwrap().push("b");
                    Ok(ActionResult::nothing())
                }
            }),
        ];
        let loopable = Loopable::new(actions, Duration::from_millis(1));
        let token = Token::background();

        let runner = token.clone();
        let handle = tokio::spawn(async move { loopable.run(runner).await });
        tokio::time::sleep(Duration::from_millis(15)).await;
        token.cancel();
        handle.await.unwrap().unwrap_err();

        let seen = log.lock().unwrap().clone();
        assert!(seen.len() >= 4);
        for pair in seen.chunks(2) {
            if pair.len() == 2 {
                assert_eq!(pair, ["a", "b"]);
            }
        }
    }

    #[tokio::test]
    async fn an_action_error_stops_the_loop_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let actions = vec![action_fn(move |_t| {
            let inner = Arc::clone(&inner);
            async move {
                inner.fetch_add(1, Ordering::SeqCst);
                Err(EdtError::HandlerError("boom".into()))
            }
        })];
        let loopable = Loopable::new(actions, Duration::from_secs(60));

        let err = loopable.run(Token::background()).await.unwrap_err();
        assert!(matches!(err, EdtError::HandlerError(_)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn an_already_cancelled_token_stops_before_the_first_action() {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let actions = vec![action_fn(move |_t| {
            let inner = Arc::clone(&inner);
            async move {
                inner.fetch_add(1, Ordering::SeqCst);
                Ok(ActionResult::nothing())
            }
        })];
        let loopable = Loopable::new(actions, Duration::from_secs(60));
        let token = Token::background();
        token.cancel();

        let err = loopable.run(token).await.unwrap_err();
        assert!(matches!(err, EdtError::Cancelled));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
