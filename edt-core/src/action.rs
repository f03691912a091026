//! The unit of work every primitive wraps: `(token) -> (value | error)`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::EdtError;
use crate::result::ActionResult;
use crate::token::Token;

/// A pinned, boxed, `Send` future returning an action's outcome.
///
/// Boxing the future is what makes [`Action`] object-safe — the same
/// dyn-erasure shape the toolkit uses for every trait whose methods
/// return `impl Future`.
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<ActionResult, EdtError>> + Send + 'a>>;

/// A cancellable unit of work: given a [`Token`], produce a value or an
/// error.
///
/// Not reusable except via explicit rebuild — invoking the same `Action`
/// twice concurrently is well-defined only if the implementation says so;
/// wrappers like [`Cancellable`](../edt_exec/struct.Cancellable.html) and
/// `Promise` enforce single-use where the design calls for it.
pub trait Action: Send + Sync {
    /// Run this action under `token`.
    fn run<'a>(&'a self, token: Token) -> ActionFuture<'a>;
}

impl<F, Fut> Action for F
where
    F: Fn(Token) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionResult, EdtError>> + Send + 'static,
{
    fn run<'a>(&'a self, token: Token) -> ActionFuture<'a> {
        Box::pin(self(token))
    }
}

/// A reference-counted, type-erased [`Action`] — the handle every
/// primitive in this toolkit actually stores and shares.
pub type BoxAction = Arc<dyn Action>;

/// Wrap a closure (or async fn item) as a [`BoxAction`].
///
/// ```
/// use edt_core::{action_fn, ActionResult};
///
/// let doubled = action_fn(|_token| async move { Ok(ActionResult::new(84_i32)) });
/// ```
pub fn action_fn<F, Fut>(f: F) -> BoxAction
where
    F: Fn(Token) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ActionResult, EdtError>> + Send + 'static,
{
    Arc::new(f)
}

/// An action that always fails with `error`, regardless of its token.
#[must_use]
pub fn from_error(error: EdtError) -> BoxAction
where
{
    struct FromError(std::sync::Mutex<Option<EdtError>>);
    impl Action for FromError {
        fn run<'a>(&'a self, _token: Token) -> ActionFuture<'a> {
            // EdtError isn't Clone (it wraps trait objects); the action is
            // meant to be invoked once, so take the error out of its cell.
            let taken = self.0.lock().expect("from_error mutex poisoned").take();
            Box::pin(async move {
                Err(taken.unwrap_or(EdtError::LifecycleViolation(
                    "from_error action invoked more than once".into(),
                )))
            })
        }
    }
    Arc::new(FromError(std::sync::Mutex::new(Some(error))))
}

/// An action that immediately succeeds with an empty result.
#[must_use]
pub fn nothing() -> BoxAction {
    action_fn(|_token| async move { Ok(ActionResult::nothing()) })
}

/// The action body behind [`nothing`] and `Delayable`'s `wait_for` helper:
/// succeeds immediately without inspecting the token.
pub async fn do_nothing(_token: Token) -> Result<ActionResult, EdtError> {
    Ok(ActionResult::nothing())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn action_fn_runs_closure() {
        let a = action_fn(|_t| async move { Ok(ActionResult::new(7_i32)) });
        let result = a.run(Token::background()).await.unwrap();
        assert_eq!(result.value_of::<i32>().unwrap(), 7);
    }

    #[tokio::test]
    async fn from_error_always_fails() {
        let a = from_error(EdtError::NotFound("x".into()));
        let err = a.run(Token::background()).await.unwrap_err();
        assert!(matches!(err, EdtError::NotFound(_)));
    }

    #[tokio::test]
    async fn nothing_succeeds_with_unit() {
        let a = nothing();
        let result = a.run(Token::background()).await.unwrap();
        assert_eq!(result.value_of::<()>().unwrap(), ());
    }

    #[tokio::test]
    async fn do_nothing_is_a_plain_async_fn() {
        let result = do_nothing(Token::background()).await.unwrap();
        assert_eq!(result.value_of::<()>().unwrap(), ());
    }
}
