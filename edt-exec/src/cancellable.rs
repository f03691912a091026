//! A single-shot action paired with its own cancellation handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use edt_core::{ActionResult, BoxAction, EdtError, Token};

/// State shared with the background task spawned by [`Cancellable::do_`],
/// kept behind an `Arc` so it outlives the `select!` that may walk away
/// from it when the token cancels first.
struct Shared {
    completed: Notify,
    completed_flag: AtomicBool,
    result: Mutex<Option<Result<ActionResult, EdtError>>>,
}

/// Wraps an [`Action`](edt_core::Action) with a derived [`Token`] so callers
/// can cancel it independently of whoever ends up invoking
/// [`Cancellable::do_`] — typically an [`Executor`](crate::Executor) worker.
///
/// [`Cancellable::do_`] spawns the action on the runtime and races it
/// against its own token rather than just awaiting it inline: cancelling
/// during `do_` makes `do_` return immediately with the token's error,
/// while the action keeps running in the background until it finishes on
/// its own. [`Cancellable::wait`] is the separate operation for observing
/// that background completion later, from a caller that may have nothing
/// to do with the one that ran `do_`.
///
/// [`Cancellable::cancel`] blocks until [`Cancellable::do_`] has actually
/// begun running, so a cancel issued before the task is picked up is never
/// silently lost: the caller knows the task exists and will observe the
/// cancelled token the moment it starts.
pub struct Cancellable {
    action: BoxAction,
    token: Token,
    started: Notify,
    started_flag: AtomicBool,
    shared: Arc<Shared>,
}

impl Cancellable {
    /// Derive a child of `parent` and pair it with `action`.
    #[must_use]
    pub fn new(parent: &Token, action: BoxAction) -> Cancellable {
        Cancellable {
            action,
            token: parent.child(),
            started: Notify::new(),
            started_flag: AtomicBool::new(false),
            shared: Arc::new(Shared {
                completed: Notify::new(),
                completed_flag: AtomicBool::new(false),
                result: Mutex::new(None),
            }),
        }
    }

    /// Spawn the wrapped action and race it against this instance's token.
    /// Marks the instance as started first, waking anyone blocked in
    /// [`Cancellable::cancel`].
    ///
    /// If the token cancels before the action finishes, this returns the
    /// token's error immediately but the spawned action is left running;
    /// its eventual result is still recorded and can be picked up later
    /// with [`Cancellable::wait`].
    ///
    /// Calling this more than once spawns a fresh run under the same
    /// (possibly already-cancelled) token; most callers invoke it exactly
    /// once.
    pub async fn do_(&self) -> Result<ActionResult, EdtError> {
        self.mark_started();

        let action = Arc::clone(&self.action);
        let token = self.token.clone();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let outcome = action.run(token).await;
            *shared
                .result
                .lock()
                .expect("cancellable result mutex poisoned") = Some(outcome);
            shared.completed_flag.store(true, Ordering::SeqCst);
            shared.completed.notify_waiters();
        });

        tokio::select! {
            joined = handle => {
                joined.map_err(|e| EdtError::Other(Box::new(e)))?;
                self.read_result()
            }
            () = self.token.cancelled() => {
                Err(self.token.error().unwrap_or(EdtError::Cancelled))
            }
        }
    }

    /// Block until the action spawned by [`Cancellable::do_`] completes,
    /// or until `token` cancels first — independently of whether `do_`
    /// itself already returned because its own token was cancelled.
    pub async fn wait(&self, token: Token) -> Result<ActionResult, EdtError> {
        if self.shared.completed_flag.load(Ordering::SeqCst) {
            return self.read_result();
        }
        let notified = self.shared.completed.notified();
        if self.shared.completed_flag.load(Ordering::SeqCst) {
            return self.read_result();
        }

        tokio::select! {
            () = notified => self.read_result(),
            () = token.cancelled() => Err(token.error().unwrap_or(EdtError::Cancelled)),
        }
    }

    /// Cancel this instance's token. Blocks until [`Cancellable::do_`] has
    /// started, so the cancellation is guaranteed to land on a task that
    /// actually runs rather than one that was never picked up.
    pub async fn cancel(&self) {
        self.wait_started().await;
        self.token.cancel();
    }

    /// This instance's token, for callers that want to inspect or
    /// propagate it directly (e.g. nesting another `Cancellable` beneath
    /// it).
    #[must_use]
    pub fn token(&self) -> Token {
        self.token.clone()
    }

    async fn wait_started(&self) {
        let notified = self.started.notified();
        if self.started_flag.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    fn mark_started(&self) {
        self.started_flag.store(true, Ordering::SeqCst);
        self.started.notify_waiters();
    }

    /// Read the background task's recorded outcome without consuming it,
    /// so both `do_` and any number of later `wait` calls can observe the
    /// same result. `ActionResult` is cheap to clone; `EdtError` isn't, so
    /// non-clonable variants are reconstructed with their message
    /// preserved.
    fn read_result(&self) -> Result<ActionResult, EdtError> {
        let guard = self
            .shared
            .result
            .lock()
            .expect("cancellable result mutex poisoned");
        match guard.as_ref() {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(err)) => Err(clone_edt_error(err)),
            None => Err(EdtError::LifecycleViolation(
                "cancellable result missing after completion".into(),
            )),
        }
    }
}

/// `EdtError` isn't `Clone` (it can carry an opaque boxed error), but
/// [`Cancellable`] needs to hand the same completion outcome to `do_` and
/// to every later `wait` caller. Reconstruct the clonable variants
/// exactly; fall back to preserving the message for the rest.
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
