//! # edt-promise — chained and fanned-out composition of [`edt_core::Action`]s
//!
//! | Type | Shape |
//! |------|-------|
//! | [`Promise`] | a linear `.then`/`.catch`/`.finally` chain |
//! | [`All`] | a concurrent fan-out joined back with one of three strategies |

#![deny(missing_docs)]

mod all;
mod promise;

pub use all::All;
pub use promise::{chained_slice_of, chained_value_of, Promise, PromiseAll};
