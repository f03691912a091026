//! The opaque payload [`Action`](crate::action::Action)s resolve to.

use std::any::Any;
use std::sync::Arc;

use crate::error::EdtError;

/// An opaque result payload.
///
/// Holds any `Send + Sync + 'static` value behind a type-erased `Arc`.
/// Recover the concrete type with [`ActionResult::value_of`], or a
/// sequence of them with [`ActionResult::slice_of`] (used by `All`'s
/// result slices).
#[derive(Clone)]
pub struct ActionResult(Arc<dyn Any + Send + Sync>);

impl ActionResult {
    /// Wrap a value as a result payload.
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> ActionResult {
        ActionResult(Arc::new(value))
    }

    /// The result of an action that produces nothing meaningful.
    #[must_use]
    pub fn nothing() -> ActionResult {
        ActionResult::new(())
    }

    /// Wrap an already-built vector of results as a single payload,
    /// recoverable via [`ActionResult::slice_of`].
    #[must_use]
    pub fn from_results(results: Vec<ActionResult>) -> ActionResult {
        ActionResult::new(results)
    }

    /// Recover a typed value. Fails with [`EdtError::TypeMismatch`] if the
    /// stored payload is not exactly `T`.
    pub fn value_of<T: Clone + Send + Sync + 'static>(&self) -> Result<T, EdtError> {
        self.0
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| EdtError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: "<opaque>",
            })
    }

    /// Recover a `Vec<T>` from a payload built by [`ActionResult::from_results`]
    /// whose entries are all typed `T`, or a payload that is itself a
    /// `Vec<T>`.
    pub fn slice_of<T: Clone + Send + Sync + 'static>(&self) -> Result<Vec<T>, EdtError> {
        if let Some(direct) = self.0.downcast_ref::<Vec<T>>() {
            return Ok(direct.clone());
        }
        if let Some(results) = self.0.downcast_ref::<Vec<ActionResult>>() {
            return results.iter().map(ActionResult::value_of::<T>).collect();
        }
        Err(EdtError::TypeMismatch {
            expected: std::any::type_name::<Vec<T>>(),
            found: "<opaque>",
        })
    }
}

impl std::fmt::Debug for ActionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActionResult(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_typed_value() {
        let r = ActionResult::new(42_i32);
        assert_eq!(r.value_of::<i32>().unwrap(), 42);
    }

    #[test]
    fn mismatch_is_type_mismatch_error() {
        let r = ActionResult::new(42_i32);
        let err = r.value_of::<String>().unwrap_err();
        assert!(matches!(err, EdtError::TypeMismatch { .. }));
    }

    #[test]
    fn nothing_round_trips_as_unit() {
        assert_eq!(ActionResult::nothing().value_of::<()>().unwrap(), ());
    }

    #[test]
    fn slice_of_from_action_result_vec() {
        let results = vec![ActionResult::new(1_i32), ActionResult::new(2_i32)];
        let combined = ActionResult::from_results(results);
        assert_eq!(combined.slice_of::<i32>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn slice_of_from_direct_vec() {
        let combined = ActionResult::new(vec![1_i32, 2, 3]);
        assert_eq!(combined.slice_of::<i32>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let r = ActionResult::new("hi".to_string());
        assert_eq!(r.value_of::<String>().unwrap(), "hi");
        assert_eq!(r.value_of::<String>().unwrap(), "hi");
    }
}
