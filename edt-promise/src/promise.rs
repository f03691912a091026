//! A then/catch/finally chain built over a root [`Action`](edt_core::Action).

use std::future::Future;
use std::sync::{Arc, Mutex};

use edt_core::{Action, ActionFuture, ActionResult, BoxAction, EdtError, Token};

use crate::all::All;

/// The predecessor step's raw result, stashed on the token's context chain
/// by [`Promise::run`] before invoking the next `.then` action — recovered
/// with [`chained_value_of`]/[`chained_slice_of`] rather than taken as a
/// closure parameter, so a `.then` action has the same `Fn(Token) -> Fut`
/// shape as any other [`Action`].
#[derive(Clone)]
struct Chained(ActionResult);

/// Recover the predecessor step's result as `T`, from inside a `.then`
/// action that's part of a [`Promise`] chain.
///
/// # Errors
///
/// `EdtError::NotFound` if `token` carries no chained value (the action
/// wasn't invoked as part of a promise step); `EdtError::TypeMismatch` if
/// the chained value isn't a `T`.
pub fn chained_value_of<T: Clone + Send + Sync + 'static>(token: &Token) -> Result<T, EdtError> {
    token
        .get::<Chained>()
        .ok_or_else(|| EdtError::NotFound("no chained value on this token".into()))?
        .0
        .value_of::<T>()
}

/// Recover the predecessor step's result as `Vec<T>`, the slice-typed
/// counterpart of [`chained_value_of`] (e.g. the result of a preceding
/// [`Promise::all`] fan-out).
///
/// # Errors
///
/// Same as [`chained_value_of`].
pub fn chained_slice_of<T: Clone + Send + Sync + 'static>(
    token: &Token,
) -> Result<Vec<T>, EdtError> {
    token
        .get::<Chained>()
        .ok_or_else(|| EdtError::NotFound("no chained value on this token".into()))?
        .0
        .slice_of::<T>()
}

type ThenFn = Arc<dyn Fn(Token) -> ActionFuture<'static> + Send + Sync>;
type CatchFn = Arc<dyn Fn(Token, EdtError) -> ActionFuture<'static> + Send + Sync>;
type FinallyFn = Arc<dyn Fn(Token) -> ActionFuture<'static> + Send + Sync>;

enum Step {
    Then(ThenFn),
    Catch(CatchFn),
    Finally(FinallyFn),
}

enum RunState {
    NotStarted,
    Running,
    Done(Result<ActionResult, EdtError>),
}

/// A chain of `.then`/`.catch`/`.finally` steps run in registration order
/// over the outcome of a root action.
///
/// Implemented as an owned `Vec` of steps rather than the back-pointer
/// linked list a reflective runtime would use — the chain is built once,
/// front to back, and run the same way, so there's no need for nodes to
/// reach back toward their predecessor.
///
/// - `.then(f)` runs `f` on success, under a token carrying the
///   predecessor's result (recoverable via [`chained_value_of`]); its
///   outcome replaces the chain's outcome. Skipped entirely on a failure.
/// - `.catch(f)` runs `f` on a failure, letting it recover (return `Ok`)
///   or re-fail with a different error; skipped entirely on a success.
/// - `.finally(f)` always runs and never sees the outcome. If `f` itself
///   fails, that failure replaces whatever the chain had produced so far;
///   otherwise the existing outcome passes through unchanged.
/// - `.all(actions)` fans `actions` out concurrently (see [`PromiseAll`]).
///
/// [`Promise::run`] may be driven exactly once: a second call while the
/// first is still in flight fails with `EdtError::LifecycleViolation`.
/// Once it has completed, further calls are idempotent — they return the
/// same cached outcome without re-running anything.
pub struct Promise {
    root: BoxAction,
    steps: Vec<Step>,
    state: Mutex<RunState>,
}

impl Promise {
    /// Start a chain rooted at `action`.
    #[must_use]
    pub fn new(action: BoxAction) -> Promise {
        Promise {
            root: action,
            steps: Vec::new(),
            state: Mutex::new(RunState::NotStarted),
        }
    }

    /// Run `f` on success, under a token carrying the predecessor's result
    /// (see [`chained_value_of`]); skipped on failure.
    #[must_use]
    pub fn then<F, Fut>(mut self, f: F) -> Promise
    where
        F: Fn(Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionResult, EdtError>> + Send + 'static,
    {
        self.steps.push(Step::Then(Arc::new(move |token| Box::pin(f(token)))));
        self
    }

    /// Run `f` on failure, letting it recover or re-fail; skipped on
    /// success.
    #[must_use]
    pub fn catch<F, Fut>(mut self, f: F) -> Promise
    where
        F: Fn(Token, EdtError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionResult, EdtError>> + Send + 'static,
    {
        self.steps
            .push(Step::Catch(Arc::new(move |token, error| {
                Box::pin(f(token, error))
            })));
        self
    }

    /// Run `f` regardless of outcome; a failure from `f` overrides the
    /// outcome so far.
    #[must_use]
    pub fn finally<F, Fut>(mut self, f: F) -> Promise
    where
        F: Fn(Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionResult, EdtError>> + Send + 'static,
    {
        self.steps.push(Step::Finally(Arc::new(move |token| {
            Box::pin(f(token))
        })));
        self
    }

    /// Fan `actions` out concurrently as the next step. Returns a
    /// [`PromiseAll`] builder — chain one of its `wait*` methods to pick a
    /// join policy and get back a [`Promise`] with the fan-out appended.
    #[must_use]
    pub fn all(self, actions: Vec<BoxAction>) -> PromiseAll {
        PromiseAll {
            parent: self,
            actions,
        }
    }

    /// Run the root action, then every step in registration order.
    ///
    /// # Errors
    ///
    /// `EdtError::LifecycleViolation` if this promise is already running
    /// (called reentrantly or concurrently); otherwise whatever error the
    /// chain itself produced.
    pub async fn run(&self, token: Token) -> Result<ActionResult, EdtError> {
        {
            let mut state = self.state.lock().expect("promise state mutex poisoned");
            match &*state {
                RunState::NotStarted => *state = RunState::Running,
                RunState::Running => {
                    return Err(EdtError::LifecycleViolation(
                        "promise is already running".into(),
                    ));
                }
                RunState::Done(_) => return self.cached_outcome().expect("state is Done"),
            }
        }

        let mut outcome = self.root.run(token.clone()).await;
        for step in &self.steps {
            outcome = match step {
                Step::Then(f) => match outcome {
                    Ok(value) => f(token.with_value(Chained(value))).await,
                    Err(e) => Err(e),
                },
                Step::Catch(f) => match outcome {
                    Err(e) => f(token.clone(), e).await,
                    Ok(value) => Ok(value),
                },
                Step::Finally(f) => match f(token.clone()).await {
                    Err(e) => Err(e),
                    Ok(_) => outcome,
                },
            };
        }

        *self.state.lock().expect("promise state mutex poisoned") = RunState::Done(outcome);
        self.cached_outcome().expect("state was just set to Done")
    }

    /// Clone the cached outcome back out of `RunState::Done`. `ActionResult`
    /// is cheap to clone; `EdtError` isn't, so non-clonable variants are
    /// reconstructed with their message preserved — this lets both `run`
    /// itself and any number of later `run` calls observe the same result.
    fn cached_outcome(&self) -> Option<Result<ActionResult, EdtError>> {
        match &*self.state.lock().expect("promise state mutex poisoned") {
            RunState::Done(Ok(value)) => Some(Ok(value.clone())),
            RunState::Done(Err(err)) => Some(Err(clone_edt_error(err))),
            RunState::NotStarted | RunState::Running => None,
        }
    }
}

fn clone_edt_error(err: &EdtError) -> EdtError {
    match err {
        EdtError::Cancelled => EdtError::Cancelled,
        EdtError::DeadlineExceeded => EdtError::DeadlineExceeded,
        EdtError::NotFound(s) => EdtError::NotFound(s.clone()),
        EdtError::Duplicate(s) => EdtError::Duplicate(s.clone()),
        EdtError::LifecycleViolation(s) => EdtError::LifecycleViolation(s.clone()),
        EdtError::HandlerError(s) => EdtError::HandlerError(s.clone()),
        other => EdtError::HandlerError(other.to_string()),
    }
}

impl Action for Promise {
    fn run<'a>(&'a self, token: Token) -> ActionFuture<'a> {
        Box::pin(Promise::run(self, token))
    }
}

/// An in-progress `.all(...)` fan-out, waiting on a join policy to become
/// a [`Promise`] step. Mirrors the original's `AllPromise`, whose `Wait`/
/// `WaitWithBailoutOnError`/`WaitWithCancellationOnError` each build and
/// return a new chained promise.
pub struct PromiseAll {
    parent: Promise,
    actions: Vec<BoxAction>,
}

impl PromiseAll {
    /// Await every sibling regardless of individual failures, aggregating
    /// every error. See [`All::wait`].
    #[must_use]
    pub fn wait(self) -> Promise {
        self.into_step(|fan_out, token| async move { fan_out.wait(token).await })
    }

    /// Await every sibling, but cancel the rest the moment the first one
    /// fails. See [`All::wait_with_cancel`].
    #[must_use]
    pub fn wait_with_cancel(self) -> Promise {
        self.into_step(|fan_out, token| async move { fan_out.wait_with_cancel(token).await })
    }

    /// Return as soon as the first sibling fails, letting the rest finish
    /// in the background. See [`All::wait_with_bailout`].
    #[must_use]
    pub fn wait_with_bailout(self) -> Promise {
        self.into_step(|fan_out, token| async move { fan_out.wait_with_bailout(token).await })
    }

    fn into_step<F, Fut>(self, strategy: F) -> Promise
    where
        F: Fn(Arc<All>, Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ActionResult>, EdtError>> + Send + 'static,
    {
        let PromiseAll { mut parent, actions } = self;
        let fan_out = Arc::new(All::new(actions));
        let strategy = Arc::new(strategy);
        parent.steps.push(Step::Then(Arc::new(move |token| {
            let fan_out = Arc::clone(&fan_out);
            let strategy = Arc::clone(&strategy);
            Box::pin(async move {
                let results = strategy(fan_out, token).await?;
                Ok(ActionResult::from_results(results))
            })
        })));
        parent
    }
}
