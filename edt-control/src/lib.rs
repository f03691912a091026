//! # edt-control — run-loops, actors, and breaker-governed directors
//!
//! | Type | Role |
//! |------|------|
//! | [`Loopable`] | a fixed action sequence, repeated on a delay until cancelled |
//! | [`Actor`] | a named [`Loopable`] with a fluent [`ActorBuilder`] |
//! | [`Breaker`] | an async-waitable termination source a [`Director`] waits on |
//! | [`Director`] | spawns a fixed action set concurrently and waits for a breaker |

#![deny(missing_docs)]

mod actor;
mod breaker;
mod director;
mod loopable;

pub use actor::{Actor, ActorBuilder};
pub use breaker::{any, Breaker, ContextBreaker, SignalBreaker, WaitFuture};
pub use director::Director;
pub use loopable::Loopable;
