//! Suspend for a fixed delay, then run an action — cancel-aware throughout.

use std::time::Duration;

use edt_core::{do_nothing, Action, ActionResult, BoxAction, EdtError, Token};

/// Wraps an action so it only starts after `delay` has elapsed, unless the
/// token cancels first.
pub struct Delayable {
    delay: Duration,
    action: BoxAction,
}

impl Delayable {
    /// Build a delayable wrapper around `action`.
    #[must_use]
    pub fn new(delay: Duration, action: BoxAction) -> Delayable {
        Delayable { delay, action }
    }

    /// Wait up to `delay`; if `token` cancels first, return its
    /// cancellation error; otherwise run the wrapped action under `token`.
    pub async fn run(&self, token: Token) -> Result<ActionResult, EdtError> {
        run_after(&token, self.delay, self.action.as_ref()).await
    }
}

/// Wait up to `delay`; if `token` cancels first, return its cancellation
/// error; otherwise run `action` under `token`.
pub async fn run_after(
    token: &Token,
    delay: Duration,
    action: &dyn Action,
) -> Result<ActionResult, EdtError> {
    tokio::select! {
        () = token.cancelled() => Err(token.error().unwrap_or(EdtError::Cancelled)),
        () = tokio::time::sleep(delay) => action.run(token.clone()).await,
    }
}

/// Wait up to `delay` without running anything afterward. Equivalent to
/// `run_after(token, delay, do_nothing)`.
pub async fn wait_for(token: &Token, delay: Duration) -> Result<ActionResult, EdtError> {
    run_after(token, delay, &do_nothing as &dyn Action).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use edt_core::action_fn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn runs_action_after_delay() {
        let d = Delayable::new(Duration::from_millis(5), edt_core::nothing());
        let result = d.run(Token::background()).await.unwrap();
        assert_eq!(result.value_of::<()>().unwrap(), ());
    }

    #[tokio::test]
    async fn cancellation_wins_and_action_never_runs() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);
        let action = action_fn(move |_token| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(ActionResult::nothing())
            }
        });

        let token = Token::background();
        token.cancel();

        let d = Delayable::new(Duration::from_secs(5), action);
        let err = d.run(token).await.unwrap_err();
        assert!(matches!(err, EdtError::Cancelled));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wait_for_resolves_after_delay() {
        let start = tokio::time::Instant::now();
        wait_for(&Token::background(), Duration::from_millis(5))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
