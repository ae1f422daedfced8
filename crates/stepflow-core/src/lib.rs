//! Core types and traits for the stepflow multi-step flow engine.
//!
//! This crate holds the data model and the collaborator contracts, without
//! the transition logic. Hosts that only implement forms, storage or event
//! listeners can depend on it alone.
//!
//! # Core Types
//!
//! - [`Step`] / [`StepCollection`] - Immutable, number-ordered flow positions
//! - [`Definition`] - Blueprint shared by every flow started from it
//! - [`Context`] - Mutable, serializable progress of one flow
//! - [`Status`] - Outcome of a transition
//! - [`FlowError`] - Error types for flow operations
//!
//! # Collaborators
//!
//! - [`Form`] / [`FormFactory`] - Per-step payload submission and validation
//! - [`EventBus`] - Lifecycle event delivery
//! - [`Storage`] - Context persistence between requests

mod context;
mod definition;
mod error;
mod event;
mod request;
mod status;
mod step;
mod traits;

pub use context::{Checkpoint, Context};
pub use definition::{DataType, Definition, DefinitionBuilder};
pub use error::{ErrorKind, FlowError};
pub use event::{Channel, Event, EventKind, Scope};
pub use request::{Action, TransitionRequest, TransportRequest};
pub use status::{Status, StatusFlags};
pub use step::{Step, StepCollection, StepNumber};
pub use traits::{EventBus, Form, FormFactory, Storage};
