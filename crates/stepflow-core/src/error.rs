//! Flow error types.

use crate::step::StepNumber;
use thiserror::Error;

/// The broad category of a [`FlowError`].
///
/// Callers that only care about who is at fault can branch on this instead
/// of on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input given to a constructor or parser.
    InvalidArgument,
    /// An operation was invoked in a state that forbids it.
    Logic,
    /// A transition precondition did not hold.
    Transition,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid_argument"),
            ErrorKind::Logic => write!(f, "logic"),
            ErrorKind::Transition => write!(f, "transition"),
        }
    }
}

/// Errors raised by the flow engine.
///
/// Expected outcomes such as an invalid form, a blocked transition or an
/// incomplete flow are reported through [`Status`](crate::Status) instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FlowError {
    /// Malformed construction or parse input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was invoked in a state that forbids it.
    #[error("Logic error: {0}")]
    Logic(String),

    /// A transition precondition failed.
    #[error("Transition of flow '{flow}' failed: {message}")]
    Transition {
        /// The name of the flow being transitioned.
        flow: String,
        /// Details about the failure.
        message: String,
    },

    /// No step with the given number exists.
    #[error("Step not found: {0}")]
    StepNotFound(StepNumber),

    /// The flow payload does not have the type the definition expects.
    #[error("Expected flow data of type '{expected}', got '{actual}'")]
    DataTypeMismatch {
        /// The type name recorded in the definition.
        expected: &'static str,
        /// The type name the flow was started with.
        actual: &'static str,
    },

    /// A stored value could not be turned back into a valid context.
    #[error("Stored context under '{key}' is corrupted: {details}")]
    CorruptedContext {
        /// The storage key that was read.
        key: String,
        /// What was wrong with the value.
        details: String,
    },

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl FlowError {
    /// Creates a [`FlowError::Transition`] for the named flow.
    pub fn transition(flow: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Transition {
            flow: flow.into(),
            message: message.into(),
        }
    }

    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::InvalidArgument(_) | FlowError::DataTypeMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            FlowError::Transition { .. } => ErrorKind::Transition,
            FlowError::Logic(_)
            | FlowError::StepNotFound(_)
            | FlowError::CorruptedContext { .. }
            | FlowError::Storage(_) => ErrorKind::Logic,
        }
    }
}
