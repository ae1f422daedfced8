//! A multi-step flow engine for Rust.
//!
//! A flow walks its payload through numbered steps. Each request may move it
//! forwards, backwards, complete it on the last step or reset it. Listeners
//! on the event bus can block transitions and skip upcoming steps, and the
//! flow's progress is persisted between requests through a [`Storage`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use stepflow::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Order {
//!     express: bool,
//! }
//!
//! struct Accept(String);
//!
//! impl Form for Accept {
//!     fn name(&self) -> &str {
//!         &self.0
//!     }
//!     fn is_submitted(&self) -> bool {
//!         true
//!     }
//!     fn is_valid(&self) -> bool {
//!         true
//!     }
//!     fn handle_request(&mut self, _request: &TransportRequest) {}
//! }
//!
//! let definition = Definition::builder()
//!     .name("checkout")
//!     .data_type::<Order>()
//!     .add_step("address")
//!     .add_step("shipping")
//!     .add_step("payment")
//!     .build()?;
//!
//! // Express orders do not pick a shipping method.
//! let mut dispatcher = EventDispatcher::<Order>::new();
//! dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| {
//!     if event.data().express {
//!         event.hard_skip();
//!     }
//! });
//!
//! let mut flow = Flow::new(
//!     Arc::new(definition),
//!     |step: &Step, _: &Order| -> Box<dyn Form> { Box::new(Accept(step.form_tag().to_string())) },
//!     Arc::new(dispatcher),
//!     Arc::new(MemoryStorage::new()),
//! );
//! flow.start(Order { express: true })?;
//!
//! let status = Transitioner.forwards(&mut flow, &TransportRequest::new())?;
//! assert!(status.is_successful());
//! assert_eq!(flow.current_step_number()?, 3);
//! # Ok::<(), stepflow::FlowError>(())
//! ```

mod config;
mod dispatcher;
mod flow;
mod storage;
mod transitioner;

// Re-export core types
pub use stepflow_core::*;

pub use config::FlowConfig;
pub use dispatcher::EventDispatcher;
pub use flow::{Flow, FlowData};
pub use storage::MemoryStorage;
pub use transitioner::Transitioner;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Action, Channel, Context, Definition, ErrorKind, Event, EventBus, EventDispatcher,
        EventKind, Flow, FlowConfig, FlowError, Form, FormFactory, MemoryStorage, Scope, Status,
        StatusFlags, Step, StepCollection, StepNumber, Storage, Transitioner, TransportRequest,
    };
}
