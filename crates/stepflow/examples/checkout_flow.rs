//! Checkout flow driven by a sequence of simulated requests.
//!
//! Demonstrates:
//! - Rebuilding the flow for every request and resuming it from storage
//! - Skipping a step from a listener based on the flow data
//! - Blocking completion until a condition holds
//! - Numbered backwards requests

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stepflow::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    customer: String,
    digital_only: bool,
    accepted_terms: bool,
}

/// Form that accepts any submission carrying a non-empty value.
struct FieldForm {
    name: String,
    submitted: bool,
    valid: bool,
}

impl FieldForm {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            submitted: false,
            valid: false,
        }
    }
}

impl Form for FieldForm {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_submitted(&self) -> bool {
        self.submitted
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn handle_request(&mut self, request: &TransportRequest) {
        self.submitted = true;
        self.valid = request.get(&self.name).is_some_and(|value| !value.is_empty());
    }
}

fn build_flow(
    definition: &Arc<Definition>,
    events: &Arc<EventDispatcher<Order>>,
    storage: &Arc<MemoryStorage>,
) -> Flow<Order> {
    Flow::new(
        Arc::clone(definition),
        |step: &Step, _: &Order| -> Box<dyn Form> { Box::new(FieldForm::new(step.form_tag())) },
        events.clone(),
        storage.clone(),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let definition = Arc::new(
        Definition::builder()
            .name("checkout")
            .data_type::<Order>()
            .add_labeled_step("address", "Address", "Continue", "Back")
            .add_labeled_step("shipping", "Shipping", "Continue", "Back")
            .add_labeled_step("payment", "Payment", "Continue", "Back")
            .add_labeled_step("review", "Review", "Place order", "Back")
            .group("shop")
            .build()?,
    );

    let mut events = EventDispatcher::<Order>::new();
    events
        .on_step(EventKind::Skip, "checkout", 1, |event| {
            if event.data().digital_only {
                event.hard_skip();
            }
        })
        .on_flow(EventKind::PreComplete, "checkout", |event| {
            if !event.data().accepted_terms {
                event.block_transition();
            }
        })
        .on_global(EventKind::Completed, |event| {
            println!("Order for {} placed", event.data().customer);
        });
    let events = Arc::new(events);
    let storage = Arc::new(MemoryStorage::new());

    let mut flow = build_flow(&definition, &events, &storage);
    flow.start(Order {
        customer: "Ada".to_string(),
        digital_only: true,
        accepted_terms: false,
    })?;

    let key = flow.transition_key();
    let requests = [
        TransportRequest::new()
            .with_body(key.as_str(), "forwards")
            .with_body("address", "1 Analytical Way"),
        TransportRequest::new()
            .with_body(key.as_str(), "forwards")
            .with_body("payment", "card"),
        TransportRequest::new()
            .with_body(key.as_str(), "complete")
            .with_body("review", "ok"),
        TransportRequest::new().with_query(key.as_str(), "backwards_1"),
    ];

    let transitioner = Transitioner::new();
    for request in &requests {
        let mut flow = build_flow(&definition, &events, &storage);
        if !flow.resume()? || !transitioner.has_transition_request(&flow, request) {
            continue;
        }

        let status = transitioner.transition(&mut flow, request)?;
        let token = request.get(&key).unwrap_or_default();
        match flow.current_step() {
            Ok(step) => println!(
                "{:<12} -> {} on step {} ({})",
                token,
                status,
                step.number(),
                step.label()
            ),
            Err(_) => println!("{:<12} -> {}", token, status),
        }
    }

    let mut flow = build_flow(&definition, &events, &storage);
    if flow.resume()? {
        flow.context_mut()?.data_mut().accepted_terms = true;
        flow.save()?;
        println!("Steps still ahead: {}", flow.steps_remaining()?.len());
    }

    Ok(())
}
