//! The error taxonomy shared by every primitive in the toolkit.

use thiserror::Error;

/// Errors surfaced across the Event-Driven Toolkit's primitives.
///
/// Discriminated by variant, not by message text — callers should match
/// on the variant, not parse `to_string()`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EdtError {
    /// The governing token was cancelled by a user or a parent token.
    #[error("cancelled")]
    Cancelled,

    /// A deadline elapsed before the work completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A requested state, event, or injected type was not registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// A registration collided with one already present.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A payload or injected value did not match the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: &'static str,
        /// The type that was actually stored.
        found: &'static str,
    },

    /// An operation was attempted outside the lifecycle state that
    /// permits it (triggering a non-running machine, re-running a
    /// promise, reentrant `trigger_event`, and similar).
    #[error("lifecycle violation: {0}")]
    LifecycleViolation(String),

    /// One or more siblings in a parallel fan-out failed.
    #[error("{} of {} actions failed: {}", .errors.len(), .total, join_messages(.errors))]
    Aggregate {
        /// The errors from the failed siblings, in declaration order.
        errors: Vec<EdtError>,
        /// The total number of siblings that were run.
        total: usize,
    },

    /// A subscriber handler failed. Logged at warn-level by the hub that
    /// caught it; never surfaced to the publisher. Exists as a variant
    /// so the warn-level log line has a typed, `Display`-able source.
    #[error("handler error: {0}")]
    HandlerError(String),

    /// Catch-all for errors originating outside this crate's taxonomy.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

fn join_messages(errors: &[EdtError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl EdtError {
    /// True for [`EdtError::Cancelled`] and [`EdtError::DeadlineExceeded`]
    /// — the two flavors of "the token stopped this".
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EdtError::Cancelled | EdtError::DeadlineExceeded)
    }

    /// Build an [`EdtError::Aggregate`] from the failures in a result set,
    /// dropping the successes. `total` is the full sibling count, which
    /// may be larger than `errors.len()`.
    #[must_use]
    pub fn aggregate(errors: Vec<EdtError>, total: usize) -> EdtError {
        EdtError::Aggregate { errors, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_predicate() {
        assert!(EdtError::Cancelled.is_cancellation());
        assert!(EdtError::DeadlineExceeded.is_cancellation());
        assert!(!EdtError::NotFound("x".into()).is_cancellation());
    }

    #[test]
    fn aggregate_display_lists_each_message() {
        let agg = EdtError::aggregate(
            vec![EdtError::NotFound("a".into()), EdtError::Cancelled],
            3,
        );
        let msg = agg.to_string();
        assert!(msg.contains("2 of 3 actions failed"));
        assert!(msg.contains("not found: a"));
        assert!(msg.contains("cancelled"));
    }

    #[test]
    fn type_mismatch_display() {
        let err = EdtError::TypeMismatch {
            expected: "i32",
            found: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "type mismatch: expected i32, found alloc::string::String"
        );
    }
}
