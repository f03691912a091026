//! # edt-hub — typed publish/subscribe and one-shot expectations
//!
//! | Type | Role |
//! |------|------|
//! | [`Event`] | marker trait for payloads a [`Hub`] can carry |
//! | [`Hub`] | type-keyed pub/sub registry |
//! | [`Expectable`] | a one-shot wait for the next matching event |

#![deny(missing_docs)]

mod event;
mod expectable;
mod hub;

pub use event::Event;
pub use expectable::Expectable;
pub use hub::{Hub, Subscription};
