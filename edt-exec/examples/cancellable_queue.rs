//! Example: a worker that cancels a queued task before it's picked up.
//!
//! Demonstrates that `Cancellable::cancel` blocks until the task has
//! actually started, so a pre-start cancel is never silently dropped.
//!
//! Run with: `cargo run --example cancellable_queue -p edt-exec`

use std::sync::Arc;
use std::time::Duration;

use edt_core::{action_fn, ActionResult, EdtError, Token};
use edt_exec::Cancellable;

#[tokio::main]
async fn main() {
    let action = action_fn(|token| async move {
        println!("[worker] task started, waiting to be cancelled...");
        token.cancelled().await;
        println!("[worker] observed cancellation");
        Err(token.error().unwrap_or(EdtError::Cancelled))
    });

    let cancellable = Arc::new(Cancellable::new(&Token::background(), action));

    let canceller = {
        let cancellable = Arc::clone(&cancellable);
        tokio::spawn(async move {
            println!("[canceller] requesting cancellation before the worker starts...");
            cancellable.cancel().await;
            println!("[canceller] cancellation landed");
        })
    };

    // Give the canceller a head start so it's genuinely waiting on
    // `started` before the worker below ever runs.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result: Result<ActionResult, EdtError> = cancellable.do_().await;
    canceller.await.expect("canceller task panicked");

    match result {
        Err(EdtError::Cancelled) => println!("[main] task was cancelled as expected"),
        other => println!("[main] unexpected outcome: {other:?}"),
    }
}
