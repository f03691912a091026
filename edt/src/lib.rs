#![deny(missing_docs)]
//! # edt — umbrella crate
//!
//! A single import surface for the Event-Driven Toolkit. Re-exports each
//! primitive crate behind a feature flag, plus a `prelude` for the happy
//! path.

#[cfg(feature = "core")]
pub use edt_core;
#[cfg(feature = "control")]
pub use edt_control;
#[cfg(feature = "exec")]
pub use edt_exec;
#[cfg(feature = "fsm")]
pub use edt_fsm;
#[cfg(feature = "hub")]
pub use edt_hub;
#[cfg(feature = "injector")]
pub use edt_injector;
#[cfg(feature = "promise")]
pub use edt_promise;

/// Happy-path imports for composing event-driven systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use edt_core::{Action, ActionResult, BoxAction, EdtError, Reason, Token};

    #[cfg(feature = "exec")]
    pub use edt_exec::{Cancellable, Executor, Expirable};

    #[cfg(feature = "control")]
    pub use edt_control::{Actor, ActorBuilder, Breaker, Director, Loopable};

    #[cfg(feature = "promise")]
    pub use edt_promise::{All, Promise};

    #[cfg(feature = "hub")]
    pub use edt_hub::{Event, Expectable, Hub};

    #[cfg(feature = "fsm")]
    pub use edt_fsm::{Fire, StateMachine, StateMachineBuilder, Trigger};

    #[cfg(feature = "injector")]
    pub use edt_injector::Injector;
}
