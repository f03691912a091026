//! # edt-exec — delay, deadline, and queueing on top of [`edt_core`]
//!
//! | Type | What it adds over a bare [`Action`](edt_core::Action) |
//! |------|--------------------------------------------------------|
//! | [`Delayable`] | start only after a fixed delay |
//! | [`Expirable`] | a deadline plus lifecycle hooks |
//! | [`Cancellable`] | a token callers can cancel independently of whoever runs it |
//! | [`Executor`] | a FIFO queue of actions drained one at a time |

#![deny(missing_docs)]

mod cancellable;
mod delayable;
mod executor;
mod expirable;

pub use cancellable::Cancellable;
pub use delayable::{run_after, wait_for, Delayable};
pub use executor::Executor;
pub use expirable::{Expirable, ErrorHook, Hook, ResultHook};
