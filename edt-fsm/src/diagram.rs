//! A parser for the small subset of mermaid `stateDiagram-v2` syntax this
//! crate accepts as a state machine definition.
//!
//! Supported, one per line:
//!
//! ```text
//! [*] --> Idle
//! Idle --> Running
//! Running --> Paused
//! Paused --> Running
//! Running --> [*]
//! ```
//!
//! Every line is a bare edge `<from> --> <to>`; there is no label syntax
//! at all. `[*]` on the left marks `to` as the initial state; `[*]` on
//! the right marks `from` as terminal. Blank lines and lines starting
//! with `stateDiagram` are ignored. The event that fires each edge is
//! resolved separately, by [`crate::machine::StateMachineBuilder::from_diagram`]'s
//! `GoToX` naming convention — this parser knows nothing about events.

use edt_core::EdtError;

/// One parsed edge: a state transition, or a declaration that `to` (or
/// `from`) is a lifecycle marker rather than an ordinary state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The state this edge starts from. `"[*]"` if this edge declares
    /// `to` the initial state.
    pub from: String,
    /// The state this edge leads to. `"[*]"` if this edge declares
    /// `from` terminal.
    pub to: String,
    /// Whether `from == "[*]"`, i.e. this edge declares `to` initial.
    pub source_is_initial: bool,
    /// Whether `to == "[*]"`, i.e. this edge declares `from` terminal.
    pub target_is_terminal: bool,
}

/// The result of parsing a diagram: every edge, in source order.
#[derive(Debug, Clone, Default)]
pub struct Diagram {
    /// Every edge, in the order they appeared. Initial/terminal markers
    /// are included as edges whose `from`/`to` is the literal `"[*]"`.
    pub edges: Vec<Edge>,
}

/// Parse `source` into a [`Diagram`].
///
/// # Errors
///
/// `EdtError::LifecycleViolation` naming the offending line, for any line
/// that isn't blank, a `stateDiagram` header, or a bare `<from> --> <to>`
/// edge.
pub fn parse(source: &str) -> Result<Diagram, EdtError> {
    let mut diagram = Diagram::default();

    for raw in source.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("stateDiagram") {
            continue;
        }

        let parts: Vec<&str> = line.split("-->").collect();
        if parts.len() != 2 {
            return Err(EdtError::LifecycleViolation(format!(
                "invalid transition: {line}"
            )));
        }

        let from = parts[0].trim();
        let to = parts[1].trim();
        if from.is_empty() || to.is_empty() {
            return Err(EdtError::LifecycleViolation(format!(
                "invalid transition: {line}"
            )));
        }

        diagram.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            source_is_initial: from == "[*]",
            target_is_terminal: to == "[*]",
        });
    }

    Ok(diagram)
}
