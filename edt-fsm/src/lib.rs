//! # edt-fsm — a state machine defined by a small diagram DSL
//!
//! | Type | Role |
//! |------|------|
//! | [`diagram::parse`] | reads a mermaid-subset `stateDiagram-v2` string into edges |
//! | [`StateMachineBuilder`] | assembles edges plus enter/exit hooks |
//! | [`StateMachine`] | triggers named events, rejecting reentrant transitions |
//! | [`Fire`] | the [`edt_hub::Event`] that [`StateMachine::bind_hub`] listens for |
//! | [`Trigger`] | the `from`/`to`/`event` snapshot handed to hooks |

#![deny(missing_docs)]

pub mod diagram;
mod machine;

pub use machine::{Fire, StateMachine, StateMachineBuilder, Trigger};
