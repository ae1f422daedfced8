//! Transport requests and the transition directive they carry.

use crate::error::FlowError;
use crate::step::StepNumber;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Key/value view of an incoming request.
///
/// Values are looked up in the body first and the query second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportRequest {
    body: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl TransportRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body field.
    pub fn with_body(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Returns the value for `key`, preferring the body over the query.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .or_else(|| self.query.get(key))
            .map(String::as_str)
    }

    /// Returns `true` if the body carries `key`.
    pub fn has_body(&self, key: &str) -> bool {
        self.body.contains_key(key)
    }

    pub fn body(&self) -> &HashMap<String, String> {
        &self.body
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }
}

/// Transition a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forwards,
    Backwards,
    Complete,
    Reset,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Forwards => "forwards",
            Action::Backwards => "backwards",
            Action::Complete => "complete",
            Action::Reset => "reset",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forwards" => Ok(Action::Forwards),
            "backwards" => Ok(Action::Backwards),
            "complete" => Ok(Action::Complete),
            "reset" => Ok(Action::Reset),
            other => Err(FlowError::InvalidArgument(format!(
                "\"{}\" is not a transition action.",
                other
            ))),
        }
    }
}

/// Parsed transition directive: an action and the step it targets.
///
/// The token grammar is `forwards`, `backwards`, `complete`, `reset` or
/// `<action>_<N>`. Bare `forwards` targets the step after the current one,
/// bare `backwards` the step before it, the other bare actions target 0.
///
/// # Examples
///
/// ```
/// use stepflow_core::{Action, TransitionRequest};
///
/// let request = TransitionRequest::parse("backwards_1", 3, 4)?;
/// assert_eq!(request.action(), Action::Backwards);
/// assert_eq!(request.requested_step_number(), 1);
///
/// let request = TransitionRequest::parse("forwards", 1, 4)?;
/// assert_eq!(request.requested_step_number(), 2);
/// # Ok::<(), stepflow_core::FlowError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    action: Action,
    requested_step_number: StepNumber,
}

impl TransitionRequest {
    /// Creates a request, enforcing the per-action target bounds.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] if `forwards` targets a step
    /// below 2 or `backwards` targets step 0.
    pub fn new(action: Action, requested_step_number: StepNumber) -> Result<Self, FlowError> {
        if action == Action::Forwards && requested_step_number < 2 {
            return Err(FlowError::InvalidArgument(format!(
                "A requested step number must be above 1 when going forwards. \"{}\" given.",
                requested_step_number
            )));
        }

        if action == Action::Backwards && requested_step_number < 1 {
            return Err(FlowError::InvalidArgument(format!(
                "A requested step number must be above 0 when going backwards. \"{}\" given.",
                requested_step_number
            )));
        }

        Ok(Self {
            action,
            requested_step_number,
        })
    }

    /// Parses a raw token against the flow's current position and size.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] for anything outside the
    /// grammar, numeric targets outside `1..=step_count`, or targets that
    /// [`TransitionRequest::new`] rejects.
    pub fn parse(
        token: &str,
        current_step_number: StepNumber,
        step_count: usize,
    ) -> Result<Self, FlowError> {
        if let Ok(action) = token.parse::<Action>() {
            let target = match action {
                Action::Forwards => current_step_number.saturating_add(1),
                Action::Backwards => current_step_number.saturating_sub(1),
                Action::Complete | Action::Reset => 0,
            };
            return Self::new(action, target);
        }

        let invalid = || {
            FlowError::InvalidArgument(format!("\"{}\" is not a valid transition request.", token))
        };

        let (action, number) = token.split_once('_').ok_or_else(invalid)?;
        let action = action.parse::<Action>().map_err(|_| invalid())?;
        let number = number.parse::<StepNumber>().map_err(|_| invalid())?;
        if number < 1 || number as usize > step_count {
            return Err(invalid());
        }

        Self::new(action, number)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn requested_step_number(&self) -> StepNumber {
        self.requested_step_number
    }
}
