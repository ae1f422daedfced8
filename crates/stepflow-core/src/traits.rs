//! Collaborator traits the engine calls into.

use crate::error::FlowError;
use crate::event::{Channel, Event};
use crate::request::TransportRequest;
use crate::step::Step;
use serde_json::Value;

/// Per-step payload handle.
///
/// The engine submits a form at most once per transition attempt and only
/// looks at whether it was submitted and whether it is valid.
pub trait Form: Send + Sync {
    /// Name of the body field the form is submitted under.
    fn name(&self) -> &str;

    fn is_submitted(&self) -> bool;

    fn is_valid(&self) -> bool;

    /// Binds the request to the form, marking it submitted.
    fn handle_request(&mut self, request: &TransportRequest);
}

/// Creates the form for a step of a running flow.
pub trait FormFactory<T>: Send + Sync {
    fn create(&self, step: &Step, data: &T) -> Box<dyn Form>;
}

impl<T, F> FormFactory<T> for F
where
    F: Fn(&Step, &T) -> Box<dyn Form> + Send + Sync,
{
    fn create(&self, step: &Step, data: &T) -> Box<dyn Form> {
        self(step, data)
    }
}

/// Delivers lifecycle events to listeners.
///
/// # Examples
///
/// ```
/// use stepflow_core::{Channel, Event, EventBus};
///
/// /// Blocks every transition of every flow.
/// struct Freeze;
///
/// impl<T> EventBus<T> for Freeze {
///     fn dispatch(&self, event: &mut Event<'_, T>, _channel: &Channel) {
///         event.block_transition();
///     }
/// }
/// ```
pub trait EventBus<T>: Send + Sync {
    /// Runs every listener registered for `channel`, in registration order.
    fn dispatch(&self, event: &mut Event<'_, T>, channel: &Channel);
}

/// Persistence for serialized contexts, keyed by flow storage key.
///
/// Implementations must not let two transitions of the same flow run
/// against the same key at once.
pub trait Storage: Send + Sync {
    fn has(&self, key: &str) -> Result<bool, FlowError>;

    fn load(&self, key: &str) -> Result<Option<Value>, FlowError>;

    fn save(&self, key: &str, value: Value) -> Result<(), FlowError>;

    fn remove(&self, key: &str) -> Result<(), FlowError>;
}
