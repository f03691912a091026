//! # edt-core — the base layer of the Event-Driven Toolkit
//!
//! Three pieces every other `edt-*` crate builds on:
//!
//! | Piece | Type | What it does |
//! |-------|------|--------------|
//! | Unit of work | [`Action`] | `(token) -> (value\|error)`, object-safe |
//! | Opaque payload | [`ActionResult`] | type-erased result with typed extraction |
//! | Cancellation | [`Token`] | derived cancellation + chained context |
//!
//! Every higher layer (`edt-exec`, `edt-control`, `edt-promise`, `edt-hub`,
//! `edt-fsm`, `edt-injector`) composes these three without introducing a
//! competing notion of "unit of work" or "cancel signal".

#![deny(missing_docs)]

mod action;
mod error;
mod result;
mod token;

pub use action::{action_fn, do_nothing, from_error, nothing, Action, ActionFuture, BoxAction};
pub use error::EdtError;
pub use result::ActionResult;
pub use token::{Reason, Token};
