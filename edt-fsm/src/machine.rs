//! The state machine itself, and the builder that assembles one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use edt_core::{BoxAction, EdtError, Token};
use edt_hub::{Event, Hub, Subscription};

use crate::diagram::{self, Edge};

/// Published to a bound [`Hub`] to request a transition by event name.
/// See [`StateMachine::bind_hub`].
#[derive(Debug, Clone)]
pub struct Fire(pub String);

impl Event for Fire {}

/// A snapshot of one transition, handed to `on_before`/`on_enter`/
/// `on_after` hooks via the token they're run with
/// (`token.get::<Trigger>()`).
///
/// `from` is `None` for the synthetic trigger [`StateMachine::start`]
/// fires on the initial state, whose `event` is the sentinel
/// `"__start__"`.
#[derive(Debug, Clone)]
pub struct Trigger {
    /// The state being left, or `None` when entering the initial state.
    pub from: Option<String>,
    /// The state being entered.
    pub to: String,
    /// The event name that caused this transition (`"__start__"` for the
    /// synthetic initial one).
    pub event: String,
}

const START_EVENT: &str = "__start__";

#[derive(Clone, Copy)]
enum HookKind {
    Before,
    Enter,
    After,
}

#[derive(Default)]
struct Node {
    on_before: Option<BoxAction>,
    on_enter: Option<BoxAction>,
    on_after: Option<BoxAction>,
    transitions: HashMap<String, String>,
}

/// Explicit `(from, event, to)` edges added directly, bypassing diagram
/// parsing and the `GoToX` naming convention.
struct Transition {
    from: String,
    event: String,
    to: String,
}

/// Builds a [`StateMachine`] from parsed diagram edges, explicit
/// transitions, and per-state hooks.
pub struct StateMachineBuilder {
    initial: Option<String>,
    extra_states: Vec<String>,
    terminal_states: Vec<String>,
    diagram_edges: Vec<Edge>,
    event_table: Vec<(Option<String>, String)>,
    transitions: Vec<Transition>,
    on_before: HashMap<String, BoxAction>,
    on_enter: HashMap<String, BoxAction>,
    on_after: HashMap<String, BoxAction>,
    token: Option<Token>,
}

impl StateMachineBuilder {
    /// Parse `source` as a diagram (see [`crate::diagram::parse`]),
    /// recording its initial marker, terminal markers, and ordinary
    /// edges. Ordinary edges are resolved to events at
    /// [`StateMachineBuilder::build`] time, via the `GoToX` naming
    /// convention or [`StateMachineBuilder::with_event_for_entering`].
    ///
    /// # Errors
    ///
    /// Whatever [`crate::diagram::parse`] returns for malformed input.
    pub fn from_diagram(source: &str) -> Result<StateMachineBuilder, EdtError> {
        let diagram = diagram::parse(source)?;
        let mut builder = StateMachineBuilder::new();

        for edge in diagram.edges {
            if edge.source_is_initial {
                builder.initial = Some(edge.to.clone());
                builder.extra_states.push(edge.to);
                continue;
            }
            if edge.target_is_terminal {
                builder.terminal_states.push(edge.from.clone());
                continue;
            }
            builder.diagram_edges.push(edge);
        }

        Ok(builder)
    }

    /// An empty builder with no transitions, for assembling one by hand.
    #[must_use]
    pub fn new() -> StateMachineBuilder {
        StateMachineBuilder {
            initial: None,
            extra_states: Vec::new(),
            terminal_states: Vec::new(),
            diagram_edges: Vec::new(),
            event_table: Vec::new(),
            transitions: Vec::new(),
            on_before: HashMap::new(),
            on_enter: HashMap::new(),
            on_after: HashMap::new(),
            token: None,
        }
    }

    /// Add a single `(from, event, to)` transition directly.
    #[must_use]
    pub fn transition(
        mut self,
        from: impl Into<String>,
        event: impl Into<String>,
        to: impl Into<String>,
    ) -> StateMachineBuilder {
        self.transitions.push(Transition {
            from: from.into(),
            event: event.into(),
            to: to.into(),
        });
        self
    }

    /// Override or set the initial state.
    #[must_use]
    pub fn initial_state(mut self, state: impl Into<String>) -> StateMachineBuilder {
        self.initial = Some(state.into());
        self
    }

    /// The token passed to hook invocations. Defaults to
    /// [`Token::background`].
    #[must_use]
    pub fn with_token(mut self, token: Token) -> StateMachineBuilder {
        self.token = Some(token);
        self
    }

    /// Register candidate event names for diagram-derived transitions,
    /// each resolved to a target state by the `GoToX` convention: an
    /// event named `GoToRunning` resolves to the state `Running`.
    #[must_use]
    pub fn with_events<I, S>(mut self, events: I) -> StateMachineBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_table
            .extend(events.into_iter().map(|e| (None, e.into())));
        self
    }

    /// Register an explicit `(state, event)` pair for diagram-derived
    /// transitions, bypassing the `GoToX` naming convention for that
    /// one state.
    #[must_use]
    pub fn with_event_for_entering(
        mut self,
        state: impl Into<String>,
        event: impl Into<String>,
    ) -> StateMachineBuilder {
        self.event_table.push((Some(state.into()), event.into()));
        self
    }

    /// Run `action` when entering `state`, before
    /// [`StateMachineBuilder::on_enter`], with a [`Trigger`] attached to
    /// the hook's token.
    #[must_use]
    pub fn on_before(mut self, state: impl Into<String>, action: BoxAction) -> StateMachineBuilder {
        self.on_before.insert(state.into(), action);
        self
    }

    /// Run `action` when entering `state`, after
    /// [`StateMachineBuilder::on_before`].
    #[must_use]
    pub fn on_enter(mut self, state: impl Into<String>, action: BoxAction) -> StateMachineBuilder {
        self.on_enter.insert(state.into(), action);
        self
    }

    /// Run `action` when leaving `state`, before the incoming state's
    /// hooks.
    #[must_use]
    pub fn on_after(mut self, state: impl Into<String>, action: BoxAction) -> StateMachineBuilder {
        self.on_after.insert(state.into(), action);
        self
    }

    /// Build the machine. The returned machine has not been started —
    /// see [`StateMachine::start`].
    ///
    /// # Errors
    ///
    /// - `EdtError::LifecycleViolation` if no initial state was ever set.
    /// - `EdtError::NotFound` if a diagram edge's target has no
    ///   registered transition event, or a transition names an unknown
    ///   state.
    /// - `EdtError::Duplicate` if two registered events resolve to the
    ///   same target state, or two transitions share a `(from, event)`
    ///   pair.
    pub fn build(self) -> Result<StateMachine, EdtError> {
        let initial = self.initial.ok_or_else(|| {
            EdtError::LifecycleViolation("state machine has no initial state".into())
        })?;

        let sm = StateMachine {
            nodes: Mutex::new(HashMap::new()),
            token: self.token.unwrap_or_else(Token::background),
            initial: initial.clone(),
            current: Mutex::new(None),
            running: AtomicBool::new(false),
            transitioning: AtomicBool::new(false),
        };

        sm.ensure_state(&initial);
        for state in &self.extra_states {
            sm.ensure_state(state);
        }
        for state in &self.terminal_states {
            sm.ensure_state(state);
        }

        if !self.diagram_edges.is_empty() {
            let table = event_reference_table(&self.event_table)?;
            for edge in &self.diagram_edges {
                let event = table.get(&edge.to).ok_or_else(|| {
                    EdtError::NotFound(format!(
                        "no transition event defined for {} --> {}",
                        edge.from, edge.to
                    ))
                })?;
                sm.ensure_state(&edge.from);
                sm.ensure_state(&edge.to);
                sm.add_transition(&edge.from, event, &edge.to)?;
            }
        }

        for t in self.transitions {
            sm.ensure_state(&t.from);
            sm.ensure_state(&t.to);
            sm.add_transition(&t.from, &t.event, &t.to)?;
        }

        {
            let mut nodes = sm.nodes.lock().expect("state machine mutex poisoned");
            for (state, action) in self.on_before {
                let node = nodes
                    .get_mut(&state)
                    .ok_or_else(|| EdtError::NotFound(format!("unknown state: {state}")))?;
                node.on_before = Some(action);
            }
            for (state, action) in self.on_enter {
                let node = nodes
                    .get_mut(&state)
                    .ok_or_else(|| EdtError::NotFound(format!("unknown state: {state}")))?;
                node.on_enter = Some(action);
            }
            for (state, action) in self.on_after {
                let node = nodes
                    .get_mut(&state)
                    .ok_or_else(|| EdtError::NotFound(format!("unknown state: {state}")))?;
                node.on_after = Some(action);
            }
        }

        Ok(sm)
    }
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        StateMachineBuilder::new()
    }
}

/// Resolve registered `(state override, event)` pairs to a `state ->
/// event` table, applying the `GoToX` naming convention wherever no
/// explicit state was given.
fn event_reference_table(
    entries: &[(Option<String>, String)],
) -> Result<HashMap<String, String>, EdtError> {
    let mut table = HashMap::new();
    for (state, event) in entries {
        let state = match state {
            Some(s) => s.clone(),
            None => event.strip_prefix("GoTo").map(str::to_string).ok_or_else(|| {
                EdtError::LifecycleViolation(format!(
                    "a conventional event must have a name starting with GoTo, got: {event}"
                ))
            })?,
        };
        if table.contains_key(&state) {
            return Err(EdtError::Duplicate(format!(
                "state {state} already has a transition event"
            )));
        }
        table.insert(state, event.clone());
    }
    Ok(table)
}

/// A state machine driven by named events.
///
/// The machine exists in a not-yet-started state until [`StateMachine::start`]
/// is called — `current()` returns `None` until then. [`StateMachine::trigger_event`]
/// rejects reentrant calls — a transition's own hooks cannot themselves
/// trigger an event on the same machine — with `EdtError::LifecycleViolation`,
/// rather than deadlocking or corrupting `current`.
pub struct StateMachine {
    nodes: Mutex<HashMap<String, Node>>,
    token: Token,
    initial: String,
    current: Mutex<Option<String>>,
    running: AtomicBool,
    transitioning: AtomicBool,
}

impl StateMachine {
    /// Start building a machine from a diagram string.
    pub fn from_diagram(source: &str) -> Result<StateMachineBuilder, EdtError> {
        StateMachineBuilder::from_diagram(source)
    }

    /// The current state's name, or `None` if [`StateMachine::start`]
    /// hasn't been called yet.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.current.lock().expect("state machine mutex poisoned").clone()
    }

    /// Add a state with no transitions yet.
    ///
    /// # Errors
    ///
    /// `EdtError::LifecycleViolation` for an empty name;
    /// `EdtError::Duplicate` if `name` was already added.
    pub fn add_state(&self, name: impl Into<String>) -> Result<(), EdtError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EdtError::LifecycleViolation(
                "state name must not be empty".into(),
            ));
        }
        let mut nodes = self.nodes.lock().expect("state machine mutex poisoned");
        if nodes.contains_key(&name) {
            return Err(EdtError::Duplicate(format!("state already added: {name}")));
        }
        nodes.insert(name, Node::default());
        Ok(())
    }

    fn ensure_state(&self, name: &str) {
        self.nodes
            .lock()
            .expect("state machine mutex poisoned")
            .entry(name.to_string())
            .or_default();
    }

    /// Add a `(from, event, to)` transition between two already-added
    /// states.
    ///
    /// # Errors
    ///
    /// `EdtError::NotFound` if `from` or `to` isn't a known state;
    /// `EdtError::Duplicate` if `from` already has a transition named
    /// `event`.
    pub fn add_transition(
        &self,
        from: impl Into<String>,
        event: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<(), EdtError> {
        let (from, event, to) = (from.into(), event.into(), to.into());
        let mut nodes = self.nodes.lock().expect("state machine mutex poisoned");
        if !nodes.contains_key(&to) {
            return Err(EdtError::NotFound(format!("unknown state: {to}")));
        }
        let node = nodes
            .get_mut(&from)
            .ok_or_else(|| EdtError::NotFound(format!("unknown state: {from}")))?;
        if node.transitions.contains_key(&event) {
            return Err(EdtError::Duplicate(format!(
                "state {from} already has a transition named {event}"
            )));
        }
        node.transitions.insert(event, to);
        Ok(())
    }

    /// Enter the initial state, firing its `on_before` and `on_enter`
    /// hooks with a synthetic `Trigger{from: None, event: "__start__"}`.
    ///
    /// # Errors
    ///
    /// `EdtError::LifecycleViolation` if the machine was already started.
    pub async fn start(&self) -> Result<(), EdtError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EdtError::LifecycleViolation(
                "state machine already started".into(),
            ));
        }

        *self.current.lock().expect("state machine mutex poisoned") =
            Some(self.initial.clone());

        let trigger = Trigger {
            from: None,
            to: self.initial.clone(),
            event: START_EVENT.to_string(),
        };
        self.run_hook(&self.initial, HookKind::Before, &trigger).await?;
        self.run_hook(&self.initial, HookKind::Enter, &trigger).await?;
        Ok(())
    }

    /// Trigger `event` from the current state. Runs the outgoing state's
    /// `on_after` hook, commits the new current state, then runs the
    /// incoming state's `on_before` and `on_enter` hooks.
    ///
    /// # Errors
    ///
    /// - `EdtError::LifecycleViolation` if the machine hasn't been
    ///   started, or this is a reentrant call from within a hook.
    /// - `EdtError::NotFound` if the current state has no transition
    ///   named `event`.
    pub async fn trigger_event(&self, event: &str) -> Result<String, EdtError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(EdtError::LifecycleViolation(
                "state machine has not been started".into(),
            ));
        }
        if self.transitioning.swap(true, Ordering::SeqCst) {
            return Err(EdtError::LifecycleViolation(format!(
                "reentrant trigger_event({event:?}) while a transition is already in progress"
            )));
        }
        let outcome = self.trigger_event_locked(event).await;
        self.transitioning.store(false, Ordering::SeqCst);
        outcome
    }

    async fn trigger_event_locked(&self, event: &str) -> Result<String, EdtError> {
        let current = self
            .current()
            .expect("running is only set once current is set");

        let to = {
            let nodes = self.nodes.lock().expect("state machine mutex poisoned");
            nodes
                .get(&current)
                .and_then(|node| node.transitions.get(event).cloned())
        }
        .ok_or_else(|| {
            EdtError::NotFound(format!(
                "current state {current:?} has no transition named: {event:?}"
            ))
        })?;

        let trigger = Trigger {
            from: Some(current.clone()),
            to: to.clone(),
            event: event.to_string(),
        };

        self.run_hook(&current, HookKind::After, &trigger).await?;
        *self.current.lock().expect("state machine mutex poisoned") = Some(to.clone());
        self.run_hook(&to, HookKind::Before, &trigger).await?;
        self.run_hook(&to, HookKind::Enter, &trigger).await?;

        Ok(to)
    }

    async fn run_hook(&self, state: &str, kind: HookKind, trigger: &Trigger) -> Result<(), EdtError> {
        let action = {
            let nodes = self.nodes.lock().expect("state machine mutex poisoned");
            nodes.get(state).and_then(|node| match kind {
                HookKind::Before => node.on_before.clone(),
                HookKind::Enter => node.on_enter.clone(),
                HookKind::After => node.on_after.clone(),
            })
        };
        if let Some(action) = action {
            let token = self.token.with_value(trigger.clone());
            action.run(token).await?;
        }
        Ok(())
    }

    /// Subscribe this machine to `hub`, so publishing a [`Fire`] with a
    /// given event name triggers it. Transition errors are logged by the
    /// hub (see [`Hub::publish`]) rather than surfaced to the publisher.
    pub fn bind_hub(self: &Arc<StateMachine>, hub: &Hub) -> Subscription {
        let machine = Arc::clone(self);
        hub.subscribe::<Fire, _, _>(move |fire, _token| {
            let machine = Arc::clone(&machine);
            async move { machine.trigger_event(&fire.0).await.map(|_| ()) }
        })
    }
}
