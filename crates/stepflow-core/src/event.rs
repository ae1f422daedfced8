//! Lifecycle events and the channels they are dispatched on.

use crate::context::Context;
use crate::definition::Definition;
use crate::step::StepNumber;
use std::fmt;

/// Lifecycle moments the transitioner announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreForwards,
    PostForwards,
    PreBackwards,
    PostBackwards,
    PreComplete,
    Completed,
    Skip,
    Reset,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PreForwards => "flow.pre_forwards",
            EventKind::PostForwards => "flow.post_forwards",
            EventKind::PreBackwards => "flow.pre_backwards",
            EventKind::PostBackwards => "flow.post_backwards",
            EventKind::PreComplete => "flow.pre_complete",
            EventKind::Completed => "flow.completed",
            EventKind::Skip => "flow.skip",
            EventKind::Reset => "flow.reset",
        }
    }

    /// Whether listeners may block the transition this event precedes.
    pub fn is_blockable(&self) -> bool {
        matches!(
            self,
            EventKind::PreForwards | EventKind::PreBackwards | EventKind::PreComplete
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audience of a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every flow.
    Global,
    /// Every flow in a routing group.
    Group(String),
    /// One flow, by name.
    Flow(String),
    /// One step of one flow.
    Step { flow: String, number: StepNumber },
}

/// Structured channel identifier: an event kind and a scope.
///
/// Renders as `<event>`, `<event>.<group>`, `<event>.<flow>` or
/// `<event>.<flow>.step_<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    pub kind: EventKind,
    pub scope: Scope,
}

impl Channel {
    pub fn global(kind: EventKind) -> Self {
        Self {
            kind,
            scope: Scope::Global,
        }
    }

    pub fn group(kind: EventKind, group: impl Into<String>) -> Self {
        Self {
            kind,
            scope: Scope::Group(group.into()),
        }
    }

    pub fn flow(kind: EventKind, flow: impl Into<String>) -> Self {
        Self {
            kind,
            scope: Scope::Flow(flow.into()),
        }
    }

    pub fn step(kind: EventKind, flow: impl Into<String>, number: StepNumber) -> Self {
        Self {
            kind,
            scope: Scope::Step {
                flow: flow.into(),
                number,
            },
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Global => write!(f, "{}", self.kind),
            Scope::Group(group) => write!(f, "{}.{}", self.kind, group),
            Scope::Flow(flow) => write!(f, "{}.{}", self.kind, flow),
            Scope::Step { flow, number } => write!(f, "{}.{}.step_{}", self.kind, flow, number),
        }
    }
}

/// Event handed to listeners.
///
/// It exposes the flow it concerns read-only, and carries the bits
/// listeners may flip: the blocked flag for `Pre*` events and the skip
/// flags for [`EventKind::Skip`]. Flags can only be raised, never cleared.
pub struct Event<'a, T> {
    kind: EventKind,
    definition: &'a Definition,
    context: &'a Context<T>,
    blocked: bool,
    soft_skipped: bool,
    hard_skipped: bool,
}

impl<'a, T> Event<'a, T> {
    pub fn new(kind: EventKind, definition: &'a Definition, context: &'a Context<T>) -> Self {
        Self {
            kind,
            definition,
            context,
            blocked: false,
            soft_skipped: false,
            hard_skipped: false,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn flow_name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &'a Definition {
        self.definition
    }

    pub fn context(&self) -> &'a Context<T> {
        self.context
    }

    pub fn data(&self) -> &'a T {
        self.context.data()
    }

    /// Blocks the pending transition. Has no effect on events that do
    /// not precede a transition.
    pub fn block_transition(&mut self) {
        if self.kind.is_blockable() {
            self.blocked = true;
        }
    }

    pub fn is_transition_blocked(&self) -> bool {
        self.blocked
    }

    /// Soft skips the step following the one this skip event fired for.
    pub fn soft_skip(&mut self) {
        if self.kind == EventKind::Skip {
            self.soft_skipped = true;
        }
    }

    pub fn is_soft_skipped(&self) -> bool {
        self.soft_skipped
    }

    /// Hard skips the step following the one this skip event fired for.
    pub fn hard_skip(&mut self) {
        if self.kind == EventKind::Skip {
            self.hard_skipped = true;
        }
    }

    pub fn is_hard_skipped(&self) -> bool {
        self.hard_skipped
    }
}

impl<T> fmt::Debug for Event<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("flow", &self.definition.name())
            .field("current_step", &self.context.current_step_number())
            .field("blocked", &self.blocked)
            .field("soft_skipped", &self.soft_skipped)
            .field("hard_skipped", &self.hard_skipped)
            .finish()
    }
}
