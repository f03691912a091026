//! Integration tests covering edt-exec's primitives working together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edt_core::{action_fn, ActionResult, EdtError, Token};
use edt_exec::{Executor, Expirable};

#[tokio::test]
async fn executor_drains_actions_queued_while_busy() {
    let exec = Arc::new(Executor::new());
    let seen = Arc::new(AtomicUsize::new(0));

    for i in 0..5 {
        let seen = Arc::clone(&seen);
        exec.add(action_fn(move |_token| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(i, Ordering::SeqCst);
                Ok(ActionResult::nothing())
            }
        }));
    }

    for _ in 0..5 {
        exec.do_(Token::background()).await.unwrap();
    }

    assert!(exec.is_empty());
    assert_eq!(seen.load(Ordering::SeqCst), 0 + 1 + 2 + 3 + 4);
}

#[tokio::test]
async fn expirable_wrapping_a_cancellable_chain_reports_deadline() {
    let slow = action_fn(|token| async move {
        // Honors cancellation cooperatively rather than blocking forever.
        tokio::select! {
            () = token.cancelled() => Err(token.error().unwrap_or(EdtError::Cancelled)),
            () = tokio::time::sleep(Duration::from_secs(10)) => Ok(ActionResult::nothing()),
        }
    });

    let expirable = Expirable::new(Duration::from_millis(15), slow);
    let err = expirable.run(Token::background()).await.unwrap_err();
    assert!(matches!(err, EdtError::DeadlineExceeded));
}

#[tokio::test]
async fn expirable_propagates_parent_cancellation_through_deadline() {
    let waits = action_fn(|token| async move {
        token.cancelled().await;
        Err(token.error().unwrap_or(EdtError::Cancelled))
    });

    let parent = Token::background();
    let expirable = Expirable::new(Duration::from_secs(10), waits);

    let child = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        child.cancel();
    });

    let err = expirable.run(parent).await.unwrap_err();
    assert!(matches!(err, EdtError::Cancelled));
}
