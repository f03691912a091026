//! Fan out a set of actions and join on their results.

use edt_core::{ActionResult, BoxAction, EdtError, Token};
use tokio::task::JoinSet;

/// A fan-out of independent actions, run concurrently and joined back
/// together.
///
/// Three join strategies, in increasing order of impatience:
/// - [`All::wait`] always runs every sibling to completion and aggregates
///   every failure.
/// - [`All::wait_with_cancel`] also runs every sibling to completion, but
///   cancels the shared token the moment the first one fails, so the rest
///   get a chance to stop early on their own.
/// - [`All::wait_with_bailout`] returns as soon as the first failure is
///   observed, without waiting on the rest at all. The stragglers are
///   handed to a detached background task so they still run to
///   completion instead of being silently dropped.
pub struct All {
    actions: Vec<BoxAction>,
}

impl All {
    /// Build a fan-out over `actions`.
    #[must_use]
    pub fn new(actions: Vec<BoxAction>) -> All {
        All { actions }
    }

    /// Run every sibling under its own child of `token`, waiting for all
    /// of them regardless of individual failures.
    ///
    /// # Errors
    ///
    /// `EdtError::Aggregate` if one or more siblings failed.
    pub async fn wait(&self, token: Token) -> Result<Vec<ActionResult>, EdtError> {
        let n = self.actions.len();
        let mut set = self.spawn_all(&token);
        let mut results: Vec<Option<ActionResult>> = (0..n).map(|_| None).collect();
        let mut errors = Vec::new();

        while let Some(joined) = set.join_next().await {
            let (i, outcome) = joined.map_err(|e| EdtError::Other(Box::new(e)))?;
            match outcome {
                Ok(value) => results[i] = Some(value),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(results.into_iter().map(|r| r.expect("every sibling recorded")).collect())
        } else {
            Err(EdtError::aggregate(errors, n))
        }
    }

    /// Like [`All::wait`], but cancels a shared child token the moment the
    /// first sibling fails, so the remaining siblings can notice and stop
    /// early. Still waits for all of them before returning.
    ///
    /// # Errors
    ///
    /// The first sibling's error, if any failed.
    pub async fn wait_with_cancel(&self, token: Token) -> Result<Vec<ActionResult>, EdtError> {
        let n = self.actions.len();
        let shared = token.child();
        let mut set = self.spawn_all(&shared);
        let mut results: Vec<Option<ActionResult>> = (0..n).map(|_| None).collect();
        let mut first_error = None;

        while let Some(joined) = set.join_next().await {
            let (i, outcome) = joined.map_err(|e| EdtError::Other(Box::new(e)))?;
            match outcome {
                Ok(value) => results[i] = Some(value),
                Err(e) => {
                    if first_error.is_none() {
                        shared.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results.into_iter().map(|r| r.expect("every sibling recorded")).collect()),
        }
    }

    /// Return as soon as the first sibling fails, without waiting for the
    /// rest. The remaining siblings are moved into a detached background
    /// task that drains them to completion so their work isn't abandoned
    /// mid-flight — only the caller stops waiting.
    ///
    /// # Errors
    ///
    /// The first sibling's error, if any failed. `Ok` only once every
    /// sibling has succeeded.
    pub async fn wait_with_bailout(&self, token: Token) -> Result<Vec<ActionResult>, EdtError> {
        let n = self.actions.len();
        let mut set = self.spawn_all(&token);
        let mut results: Vec<Option<ActionResult>> = (0..n).map(|_| None).collect();

        while let Some(joined) = set.join_next().await {
            let (i, outcome) = joined.map_err(|e| EdtError::Other(Box::new(e)))?;
            match outcome {
                Ok(value) => results[i] = Some(value),
                Err(e) => {
                    tokio::spawn(async move { while set.join_next().await.is_some() {} });
                    return Err(e);
                }
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every sibling recorded")).collect())
    }

    fn spawn_all(&self, token: &Token) -> JoinSet<(usize, Result<ActionResult, EdtError>)> {
        let mut set = JoinSet::new();
        for (i, action) in self.actions.iter().cloned().enumerate() {
            let token = token.child();
            set.spawn(async move { (i, action.run(token).await) });
        }
        set
    }
}
