//! An action with a deadline and a full set of lifecycle hooks.

use std::sync::Arc;
use std::time::Duration;

use edt_core::{ActionResult, BoxAction, EdtError, Token};

/// A lifecycle callback fired with no payload.
pub type Hook = Arc<dyn Fn() + Send + Sync>;
/// A lifecycle callback fired with the action's successful result.
pub type ResultHook = Arc<dyn Fn(&ActionResult) + Send + Sync>;
/// A lifecycle callback fired with the action's error.
pub type ErrorHook = Arc<dyn Fn(&EdtError) + Send + Sync>;

/// Runs an [`Action`](edt_core::Action) under a derived deadline, with an
/// optional pre-delay and hooks for every way the run can end.
///
/// Built fluently, then driven with [`Expirable::run`]:
///
/// ```
/// use std::time::Duration;
/// use edt_exec::Expirable;
///
/// let expirable = Expirable::new(Duration::from_secs(1), edt_core::nothing())
///     .on_success(|_| println!("done in time"))
///     .on_expired(|| println!("ran out of time"));
/// ```
pub struct Expirable {
    pre_delay: Option<Duration>,
    timeout: Duration,
    action: BoxAction,
    on_expired: Option<Hook>,
    on_success: Option<ResultHook>,
    on_error: Option<ErrorHook>,
    on_canceled: Option<Hook>,
    on_completed: Option<Hook>,
}

impl Expirable {
    /// Build an `Expirable` that gives `action` up to `timeout` to finish.
    #[must_use]
    pub fn new(timeout: Duration, action: BoxAction) -> Expirable {
        Expirable {
            pre_delay: None,
            timeout,
            action,
            on_expired: None,
            on_success: None,
            on_error: None,
            on_canceled: None,
            on_completed: None,
        }
    }

    /// Wait `delay` before the deadline clock starts. Cancellation during
    /// the pre-delay is reported the same way as cancellation during the
    /// run itself.
    #[must_use]
    pub fn with_pre_delay(mut self, delay: Duration) -> Expirable {
        self.pre_delay = Some(delay);
        self
    }

    /// Called when the deadline elapses before the action finishes.
    #[must_use]
    pub fn on_expired<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Expirable {
        self.on_expired = Some(Arc::new(f));
        self
    }

    /// Called with the action's result when it finishes before the deadline.
    #[must_use]
    pub fn on_success<F: Fn(&ActionResult) + Send + Sync + 'static>(mut self, f: F) -> Expirable {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Called with the action's error when it fails (for a reason other
    /// than cancellation or expiry) before the deadline.
    #[must_use]
    pub fn on_error<F: Fn(&EdtError) + Send + Sync + 'static>(mut self, f: F) -> Expirable {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called when the parent token is explicitly cancelled (as opposed to
    /// the deadline simply elapsing).
    #[must_use]
    pub fn on_canceled<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Expirable {
        self.on_canceled = Some(Arc::new(f));
        self
    }

    /// Called once the run has ended, regardless of outcome. Fires after
    /// every other hook.
    #[must_use]
    pub fn on_completed<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Expirable {
        self.on_completed = Some(Arc::new(f));
        self
    }

    /// Run the wrapped action under `token`, enforcing the deadline and
    /// firing the registered hooks.
    ///
    /// The action is spawned on the runtime rather than awaited inline, so
    /// that a deadline or cancellation winning the race doesn't drop it
    /// mid-flight. The spawned task continues to completion in the
    /// background even after this call has already returned the deadline
    /// or cancellation error — its result is simply discarded once nobody
    /// is listening on the other end of the oneshot channel.
    pub async fn run(&self, token: Token) -> Result<ActionResult, EdtError> {
        if let Some(pre) = self.pre_delay {
            if let Err(e) = crate::delayable::wait_for(&token, pre).await {
                self.fire_outcome_hooks(Err(&e));
                return Err(e);
            }
        }

        let child = token.child_with_deadline(self.timeout);

        let (tx, rx) = tokio::sync::oneshot::channel();
        let action = Arc::clone(&self.action);
        let run_token = child.clone();
        tokio::spawn(async move {
            let outcome = action.run(run_token).await;
            let _ = tx.send(outcome);
        });

        let outcome = tokio::select! {
            () = child.cancelled() => Err(child.error().unwrap_or(EdtError::DeadlineExceeded)),
            received = rx => received.unwrap_or_else(|_| {
                Err(EdtError::LifecycleViolation(
                    "expirable action dropped before completing".into(),
                ))
            }),
        };

        match &outcome {
            Ok(result) => self.fire_outcome_hooks(Ok(result)),
            Err(e) => self.fire_outcome_hooks(Err(e)),
        }
        outcome
    }

    fn fire_outcome_hooks(&self, outcome: Result<&ActionResult, &EdtError>) {
        match outcome {
            Ok(result) => {
                if let Some(hook) = &self.on_success {
                    hook(result);
                }
            }
            Err(EdtError::DeadlineExceeded) => {
                if let Some(hook) = &self.on_expired {
                    hook();
                }
            }
            Err(EdtError::Cancelled) => {
                if let Some(hook) = &self.on_canceled {
                    hook();
                }
            }
            Err(e) => {
                if let Some(hook) = &self.on_error {
                    hook(e);
                }
            }
        }
        if let Some(hook) = &self.on_completed {
            hook();
        }
    }
}
