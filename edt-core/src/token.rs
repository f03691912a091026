//! The propagated cancellation/deadline handle every primitive threads through.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::EdtError;

const REASON_NONE: u8 = 0;
const REASON_CANCELLED: u8 = 1;
const REASON_DEADLINE: u8 = 2;

/// Why a [`Token`] is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// An explicit `cancel()` call, by this token or an ancestor.
    Cancelled,
    /// A deadline derived via [`Token::child_with_deadline`] elapsed.
    DeadlineExceeded,
}

impl Reason {
    fn from_code(code: u8) -> Option<Reason> {
        match code {
            REASON_CANCELLED => Some(Reason::Cancelled),
            REASON_DEADLINE => Some(Reason::DeadlineExceeded),
            _ => None,
        }
    }

    /// The [`EdtError`] this reason surfaces as.
    #[must_use]
    pub fn into_error(self) -> EdtError {
        match self {
            Reason::Cancelled => EdtError::Cancelled,
            Reason::DeadlineExceeded => EdtError::DeadlineExceeded,
        }
    }
}

#[derive(Default)]
struct ContextFrame {
    parent: Option<Arc<ContextFrame>>,
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ContextFrame {
    fn get(&self, id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        if let Some(v) = self.entries.get(&id) {
            return Some(Arc::clone(v));
        }
        self.parent.as_ref().and_then(|p| p.get(id))
    }
}

struct Inner {
    cancel: CancellationToken,
    reason: AtomicU8,
    context: Arc<ContextFrame>,
}

/// A propagated cancellation/deadline handle with a chained context bag.
///
/// Cheaply `Clone`-able (an `Arc` underneath, same as the
/// `tokio_util::sync::CancellationToken` it wraps). Derive children with
/// [`Token::child`] or [`Token::child_with_deadline`]; cancelling a parent
/// always cancels every descendant, never the reverse.
#[derive(Clone)]
pub struct Token(Arc<Inner>);

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl Default for Token {
    fn default() -> Self {
        Token::background()
    }
}

impl Token {
    /// A token that never cancels on its own. The default for "no token
    /// was supplied".
    #[must_use]
    pub fn background() -> Token {
        Token(Arc::new(Inner {
            cancel: CancellationToken::new(),
            reason: AtomicU8::new(REASON_NONE),
            context: Arc::new(ContextFrame::default()),
        }))
    }

    /// Derive a child token. The child fires when `self` fires; the
    /// reverse never happens.
    #[must_use]
    pub fn child(&self) -> Token {
        Token(Arc::new(Inner {
            cancel: self.0.cancel.child_token(),
            reason: AtomicU8::new(REASON_NONE),
            context: Arc::clone(&self.0.context),
        }))
    }

    /// Derive a child token that cancels itself (with
    /// [`Reason::DeadlineExceeded`]) after `dur` elapses, unless `self`
    /// (or an ancestor) cancels first.
    ///
    /// Requires a Tokio runtime to be active — the deadline watcher is a
    /// spawned task.
    #[must_use]
    pub fn child_with_deadline(&self, dur: Duration) -> Token {
        let child = self.child();
        let watched = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = watched.0.cancel.cancelled() => {}
                () = tokio::time::sleep(dur) => {
                    watched.latch_reason(REASON_DEADLINE);
                    watched.0.cancel.cancel();
                }
            }
        });
        child
    }

    /// Attach one more typed value to the context chain, returning a new
    /// child token. Lookups on the returned token see `value`; lookups on
    /// `self` do not.
    #[must_use]
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Token {
        let mut entries = HashMap::with_capacity(1);
        entries.insert(TypeId::of::<T>(), Arc::new(value) as Arc<dyn Any + Send + Sync>);
        Token(Arc::new(Inner {
            cancel: self.0.cancel.child_token(),
            reason: AtomicU8::new(REASON_NONE),
            context: Arc::new(ContextFrame {
                parent: Some(Arc::clone(&self.0.context)),
                entries,
            }),
        }))
    }

    /// Walk the context chain for a value of type `T`, nearest first.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        let any = self.0.context.get(TypeId::of::<T>())?;
        any.downcast_ref::<T>().cloned()
    }

    /// Whether this token (or an ancestor) has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.cancel.is_cancelled()
    }

    /// A future that resolves once this token is cancelled.
    pub fn cancelled(&self) -> impl std::future::Future<Output = ()> + '_ {
        self.0.cancel.cancelled()
    }

    /// Cancel this token (and every descendant). Idempotent. The first
    /// call — whether via `cancel()` or a deadline watcher — wins the
    /// [`Reason`] race.
    pub fn cancel(&self) {
        self.latch_reason(REASON_CANCELLED);
        self.0.cancel.cancel();
    }

    /// Why this token is cancelled, if it is.
    #[must_use]
    pub fn reason(&self) -> Option<Reason> {
        if !self.is_cancelled() {
            return None;
        }
        // A token can be cancelled by an ancestor without this token's
        // own `reason` ever being latched; default to `Cancelled` in
        // that case since *some* ancestor explicitly cancelled or the
        // watcher on this exact token raced and lost — either way the
        // work was stopped, not merely timed out locally.
        Reason::from_code(self.0.reason.load(Ordering::Acquire)).or(Some(Reason::Cancelled))
    }

    /// The [`EdtError`] this token's cancellation should surface as, if
    /// it is cancelled.
    #[must_use]
    pub fn error(&self) -> Option<EdtError> {
        self.reason().map(Reason::into_error)
    }

    fn latch_reason(&self, code: u8) {
        let _ = self
            .0
            .reason
            .compare_exchange(REASON_NONE, code, Ordering::AcqRel, Ordering::Acquire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_cancels() {
        let t = Token::background();
        assert!(!t.is_cancelled());
        assert!(t.reason().is_none());
    }

    #[test]
    fn cancelling_parent_cancels_child() {
        let parent = Token::background();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.reason(), Some(Reason::Cancelled));
    }

    #[test]
    fn cancelling_child_does_not_cancel_parent() {
        let parent = Token::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn context_chain_is_visible_to_descendants_only() {
        let root = Token::background();
        let with_ctx = root.with_value(42_i32);
        let grandchild = with_ctx.child();

        assert_eq!(with_ctx.get::<i32>(), Some(42));
        assert_eq!(grandchild.get::<i32>(), Some(42));
        assert_eq!(root.get::<i32>(), None);
    }

    #[test]
    fn nearer_context_entry_shadows_ancestor() {
        let root = Token::background().with_value(1_i32);
        let shadowed = root.with_value(2_i32);
        assert_eq!(shadowed.get::<i32>(), Some(2));
        assert_eq!(root.get::<i32>(), Some(1));
    }

    #[tokio::test]
    async fn deadline_cancels_with_deadline_exceeded() {
        let parent = Token::background();
        let child = parent.child_with_deadline(Duration::from_millis(10));
        child.cancelled().await;
        assert_eq!(child.reason(), Some(Reason::DeadlineExceeded));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn explicit_cancel_wins_race_against_deadline() {
        let parent = Token::background();
        let child = parent.child_with_deadline(Duration::from_secs(5));
        child.cancel();
        assert_eq!(child.reason(), Some(Reason::Cancelled));
    }
}
