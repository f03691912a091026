//! A FIFO queue of actions, drained one at a time.

use std::collections::VecDeque;
use std::sync::Mutex;

use edt_core::{do_nothing, ActionResult, BoxAction, EdtError, Token};

/// A first-in-first-out queue of [`Action`](edt_core::Action)s.
///
/// [`Executor::add`] appends; [`Executor::do_`] pops the head and runs it
/// under the given token. An empty queue behaves like
/// [`do_nothing`](edt_core::do_nothing).
#[derive(Default)]
pub struct Executor {
    queue: Mutex<VecDeque<BoxAction>>,
}

impl Executor {
    /// An empty executor.
    #[must_use]
    pub fn new() -> Executor {
        Executor {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an action to the back of the queue.
    pub fn add(&self, action: BoxAction) {
        self.queue
            .lock()
            .expect("executor queue mutex poisoned")
            .push_back(action);
    }

    /// Pop the head of the queue and run it under `token`. With nothing
    /// queued, succeeds immediately without inspecting `token`.
    pub async fn do_(&self, token: Token) -> Result<ActionResult, EdtError> {
        let next = self
            .queue
            .lock()
            .expect("executor queue mutex poisoned")
            .pop_front();
        match next {
            Some(action) => action.run(token).await,
            None => do_nothing(token).await,
        }
    }

    /// Number of actions currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().expect("executor queue mutex poisoned").len()
    }

    /// Whether the queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
