use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stepflow::prelude::*;

const TRANSITION_KEY: &str = "flow_checkout_transition";
const STORAGE_KEY: &str = "flow_checkout_storage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    express: bool,
}

/// Form that becomes valid when the request body carries `"valid"` under
/// its name.
struct StubForm {
    name: String,
    submitted: bool,
    valid: bool,
}

impl Form for StubForm {
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
        self.valid = request.get(&self.name) == Some("valid");
    }
}

fn definition(steps: u32) -> Arc<Definition> {
    let mut builder = Definition::builder()
        .name("checkout")
        .data_type::<Order>()
        .group("shop");
    for number in 1..=steps {
        builder = builder.add_step(format!("step{}", number));
    }
    Arc::new(builder.build().expect("valid definition"))
}

fn flow(
    steps: u32,
    dispatcher: EventDispatcher<Order>,
    storage: Arc<MemoryStorage>,
) -> Flow<Order> {
    Flow::new(
        definition(steps),
        |step: &Step, _: &Order| -> Box<dyn Form> {
            Box::new(StubForm {
                name: step.form_tag().to_string(),
                submitted: false,
                valid: false,
            })
        },
        Arc::new(dispatcher),
        storage,
    )
}

fn started(steps: u32, dispatcher: EventDispatcher<Order>) -> (Flow<Order>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let mut flow = flow(steps, dispatcher, Arc::clone(&storage));
    flow.start(Order { express: false }).expect("flow starts");
    (flow, storage)
}

/// Request carrying a transition token and a valid submission for the
/// form of `step`.
fn submit(token: &str, step: u32) -> TransportRequest {
    TransportRequest::new()
        .with_body(TRANSITION_KEY, token)
        .with_body(format!("step{}", step), "valid")
}

fn step(flow: &Flow<Order>, number: u32) -> Step {
    flow.steps()
        .get_by_number(number)
        .expect("step exists")
        .clone()
}

#[test]
fn test_two_step_forwards() {
    let (mut flow, _) = started(2, EventDispatcher::new());

    let status = Transitioner
        .transition(&mut flow, &submit("forwards", 1))
        .expect("transition succeeds");

    assert_eq!(
        status.flags(),
        StatusFlags::SUCCESS | StatusFlags::VALID_FORM
    );
    assert_eq!(flow.current_step_number().unwrap(), 2);
    let first = step(&flow, 1);
    assert!(flow.context().unwrap().is_completed(&first));
}

#[test]
fn test_invalid_form_keeps_position() {
    let (mut flow, _) = started(3, EventDispatcher::new());
    let request = TransportRequest::new()
        .with_body(TRANSITION_KEY, "forwards")
        .with_body("step1", "invalid");

    let status = Transitioner.transition(&mut flow, &request).unwrap();

    assert_eq!(
        status.flags(),
        StatusFlags::FAILURE | StatusFlags::INVALID_FORM
    );
    assert_eq!(flow.current_step_number().unwrap(), 1);
    assert!(flow.context().unwrap().completed_steps().is_empty());
}

#[test]
fn test_resubmission_after_invalid_form() {
    let (mut flow, _) = started(3, EventDispatcher::new());
    let invalid = TransportRequest::new()
        .with_body(TRANSITION_KEY, "forwards")
        .with_body("step1", "invalid");

    let status = Transitioner.transition(&mut flow, &invalid).unwrap();
    assert!(status.is_form_invalid());

    let status = Transitioner
        .transition(&mut flow, &submit("forwards", 1))
        .unwrap();
    assert_eq!(
        status.flags(),
        StatusFlags::SUCCESS | StatusFlags::VALID_FORM
    );
    assert_eq!(flow.current_step_number().unwrap(), 2);
}

#[test]
fn test_revisited_step_reads_new_submission() {
    let (mut flow, _) = started(3, EventDispatcher::new());
    Transitioner
        .transition(&mut flow, &submit("forwards", 1))
        .unwrap();
    Transitioner
        .transition(&mut flow, &submit("backwards", 2))
        .unwrap();
    assert_eq!(flow.current_step_number().unwrap(), 1);

    let invalid = TransportRequest::new()
        .with_body(TRANSITION_KEY, "forwards")
        .with_body("step1", "invalid");
    let status = Transitioner.transition(&mut flow, &invalid).unwrap();

    assert_eq!(
        status.flags(),
        StatusFlags::FAILURE | StatusFlags::INVALID_FORM
    );
    assert_eq!(flow.current_step_number().unwrap(), 1);
}

#[test]
fn test_unsubmitted_form_is_invalid() {
    let (mut flow, _) = started(3, EventDispatcher::new());
    let request = TransportRequest::new().with_body(TRANSITION_KEY, "forwards");

    let status = Transitioner.transition(&mut flow, &request).unwrap();
    assert!(status.is_failed());
    assert!(status.is_form_invalid());
    assert!(!flow.current_step_form().unwrap().is_submitted());
}

#[test]
fn test_hard_skip_then_backwards() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| event.hard_skip());
    let (mut flow, _) = started(3, dispatcher);

    let status = Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();
    assert!(status.is_successful());
    assert_eq!(flow.current_step_number().unwrap(), 3);
    let second = step(&flow, 2);
    assert!(flow.context().unwrap().is_hard_skipped(&second));

    let status = Transitioner
        .backwards(&mut flow, &TransportRequest::new())
        .unwrap();
    assert_eq!(
        status.flags(),
        StatusFlags::SUCCESS | StatusFlags::VALID_FORM
    );
    assert_eq!(flow.current_step_number().unwrap(), 1);
}

#[test]
fn test_soft_skip_is_reachable_backwards() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| event.soft_skip());
    let (mut flow, _) = started(3, dispatcher);

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();
    assert_eq!(flow.current_step_number().unwrap(), 3);
    let second = step(&flow, 2);
    assert!(flow.context().unwrap().is_soft_skipped(&second));
    assert!(flow.context().unwrap().is_skipped(&second));

    Transitioner
        .backwards(&mut flow, &TransportRequest::new())
        .unwrap();
    assert_eq!(flow.current_step_number().unwrap(), 2);
}

#[test]
fn test_skip_cascade_chains() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher
        .on_step(EventKind::Skip, "checkout", 1, |event| event.hard_skip())
        .on_step(EventKind::Skip, "checkout", 2, |event| event.soft_skip());
    let (mut flow, _) = started(4, dispatcher);

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();

    assert_eq!(flow.current_step_number().unwrap(), 4);
    let context = flow.context().unwrap();
    assert!(context.is_hard_skipped(&step(&flow, 2)));
    assert!(context.is_soft_skipped(&step(&flow, 3)));
}

#[test]
fn test_skip_listeners_see_cascade_progress() {
    type Seen = (u32, BTreeSet<u32>, BTreeSet<u32>);
    let seen: Arc<Mutex<Vec<Seen>>> = Arc::new(Mutex::new(Vec::new()));
    let mut dispatcher = EventDispatcher::<Order>::new();
    for (number, skip) in [(1, true), (2, false)] {
        let seen = Arc::clone(&seen);
        dispatcher.on_step(EventKind::Skip, "checkout", number, move |event| {
            let context = event.context();
            seen.lock().unwrap().push((
                number,
                context.completed_steps().clone(),
                context.hard_skipped_steps().clone(),
            ));
            if skip {
                event.hard_skip();
            }
        });
    }
    let (mut flow, _) = started(4, dispatcher);

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();

    assert_eq!(flow.current_step_number().unwrap(), 3);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (1, BTreeSet::from([1]), BTreeSet::new()),
            (2, BTreeSet::from([1]), BTreeSet::from([2])),
        ]
    );
}

#[test]
fn test_skip_flags_are_cleared_when_not_raised() {
    let skip = Arc::new(AtomicBool::new(true));
    let mut dispatcher = EventDispatcher::<Order>::new();
    {
        let skip = Arc::clone(&skip);
        dispatcher.on_step(EventKind::Skip, "checkout", 1, move |event| {
            if skip.load(Ordering::SeqCst) {
                event.hard_skip();
            }
        });
    }
    let (mut flow, _) = started(3, dispatcher);

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();
    Transitioner
        .backwards(&mut flow, &TransportRequest::new())
        .unwrap();
    assert_eq!(flow.current_step_number().unwrap(), 1);

    skip.store(false, Ordering::SeqCst);
    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();

    assert_eq!(flow.current_step_number().unwrap(), 2);
    let second = step(&flow, 2);
    assert!(!flow.context().unwrap().is_skipped(&second));
}

#[test]
fn test_both_skip_kinds_is_a_logic_error() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| {
        event.soft_skip();
        event.hard_skip();
    });
    let (mut flow, storage) = started(3, dispatcher);
    let before = flow.context().unwrap().clone();

    let err = Transitioner
        .forwards(&mut flow, &submit("forwards", 1))
        .unwrap_err();

    assert!(matches!(err, FlowError::Logic(_)));
    assert_eq!(err.kind(), ErrorKind::Logic);
    assert_eq!(
        err.to_string(),
        "Logic error: A step can not be both hard and soft skipped."
    );
    assert_eq!(flow.context().unwrap(), &before);

    let mut reloaded = flow_from(storage);
    reloaded.resume().unwrap();
    assert_eq!(reloaded.context().unwrap(), &before);
}

#[test]
fn test_skipping_last_step_is_a_logic_error() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 2, |event| event.hard_skip());
    let (mut flow, _) = started(3, dispatcher);
    flow.context_mut().unwrap().set_current_step_number(2).unwrap();

    let err = Transitioner
        .forwards(&mut flow, &submit("forwards", 2))
        .unwrap_err();

    assert!(matches!(err, FlowError::Logic(_)));
    assert_eq!(flow.current_step_number().unwrap(), 2);
    let context = flow.context().unwrap();
    assert!(context.completed_steps().is_empty());
    assert!(context.hard_skipped_steps().is_empty());
}

#[test]
fn test_blocked_transitions_keep_position() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher
        .on_flow(EventKind::PreForwards, "checkout", |event| {
            event.block_transition()
        })
        .on_group(EventKind::PreBackwards, "shop", |event| {
            event.block_transition()
        })
        .on_global(EventKind::PreComplete, |event| event.block_transition());
    let (mut flow, _) = started(3, dispatcher);

    let status = Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();
    assert_eq!(
        status.flags(),
        StatusFlags::FAILURE | StatusFlags::VALID_FORM | StatusFlags::BLOCKED
    );
    assert_eq!(flow.current_step_number().unwrap(), 1);

    flow.context_mut().unwrap().set_current_step_number(2).unwrap();
    let status = Transitioner
        .backwards(&mut flow, &TransportRequest::new())
        .unwrap();
    assert_eq!(
        status.flags(),
        StatusFlags::FAILURE | StatusFlags::BLOCKED | StatusFlags::INVALID_FORM
    );
    assert_eq!(flow.current_step_number().unwrap(), 2);

    {
        let context = flow.context_mut().unwrap();
        context.set_current_step_number(3).unwrap();
    }
    let (first, second) = (step(&flow, 1), step(&flow, 2));
    flow.context_mut().unwrap().set_completed(&first).unwrap();
    flow.context_mut().unwrap().set_completed(&second).unwrap();

    let status = Transitioner.complete(&mut flow, &submit("complete", 3)).unwrap();
    assert!(status.is_blocked());
    assert!(!status.is_completed());
    assert_eq!(flow.current_step_number().unwrap(), 3);
}

#[test]
fn test_complete_requires_every_earlier_step() {
    let (mut flow, storage) = started(3, EventDispatcher::new());
    let first = step(&flow, 1);
    {
        let context = flow.context_mut().unwrap();
        context.set_completed(&first).unwrap();
        context.set_current_step_number(3).unwrap();
    }

    let status = Transitioner.complete(&mut flow, &submit("complete", 3)).unwrap();

    assert_eq!(status.flags(), StatusFlags::FAILURE);
    assert!(flow.is_started());
    assert!(storage.has(STORAGE_KEY).unwrap());
}

#[test]
fn test_complete_resets_flow() {
    let completed = Arc::new(Mutex::new(None));
    let mut dispatcher = EventDispatcher::<Order>::new();
    {
        let completed = Arc::clone(&completed);
        dispatcher.on_flow(EventKind::Completed, "checkout", move |event| {
            *completed.lock().unwrap() = Some(event.context().completed_steps().clone());
        });
    }
    let (mut flow, storage) = started(3, dispatcher);

    Transitioner
        .transition(&mut flow, &submit("forwards", 1))
        .unwrap();
    Transitioner
        .transition(&mut flow, &submit("forwards", 2))
        .unwrap();
    let status = Transitioner
        .transition(&mut flow, &submit("complete", 3))
        .unwrap();

    assert_eq!(
        status.flags(),
        StatusFlags::SUCCESS | StatusFlags::VALID_FORM | StatusFlags::COMPLETED
    );
    assert!(!flow.is_started());
    assert!(!storage.has(STORAGE_KEY).unwrap());
    assert_eq!(
        completed
            .lock()
            .unwrap()
            .as_ref()
            .map(|steps| steps.iter().copied().collect::<Vec<_>>()),
        Some(vec![1, 2])
    );
}

#[test]
fn test_complete_accepts_skipped_steps() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| event.soft_skip());
    let (mut flow, _) = started(3, dispatcher);

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();
    let status = Transitioner.complete(&mut flow, &submit("complete", 3)).unwrap();
    assert!(status.is_completed());
}

#[test]
fn test_transition_errors_at_boundaries() {
    let (mut flow, _) = started(2, EventDispatcher::new());
    let request = TransportRequest::new();

    let err = Transitioner.backwards(&mut flow, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transition);
    let err = Transitioner.complete(&mut flow, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transition);

    flow.context_mut().unwrap().set_current_step_number(2).unwrap();
    let err = Transitioner.forwards(&mut flow, &request).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Transition of flow 'checkout' failed: The flow is on the last step and can not transition forwards."
    );
}

#[test]
fn test_numbered_backwards_request() {
    let (mut flow, _) = started(4, EventDispatcher::new());
    for number in 1..=3 {
        Transitioner
            .transition(&mut flow, &submit("forwards", number))
            .unwrap();
    }
    assert_eq!(flow.current_step_number().unwrap(), 4);

    let request = TransportRequest::new().with_body(TRANSITION_KEY, "backwards_2");
    let status = Transitioner.transition(&mut flow, &request).unwrap();
    assert!(status.is_successful());
    assert_eq!(flow.current_step_number().unwrap(), 2);

    let request = TransportRequest::new().with_body(TRANSITION_KEY, "backwards_3");
    let err = Transitioner.transition(&mut flow, &request).unwrap_err();
    assert!(matches!(err, FlowError::Transition { .. }));

    let request = TransportRequest::new().with_query(TRANSITION_KEY, "sideways");
    let err = Transitioner.transition(&mut flow, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_numbered_backwards_stops_when_blocked() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::PreBackwards, "checkout", 2, |event| {
        event.block_transition()
    });
    let (mut flow, _) = started(3, dispatcher);
    flow.context_mut().unwrap().set_current_step_number(3).unwrap();

    let request = TransportRequest::new().with_body(TRANSITION_KEY, "backwards_1");
    let status = Transitioner.transition(&mut flow, &request).unwrap();

    assert!(status.is_blocked());
    assert_eq!(flow.current_step_number().unwrap(), 2);
}

#[test]
fn test_reset_request() {
    let resets = Arc::new(Mutex::new(0));
    let mut dispatcher = EventDispatcher::<Order>::new();
    {
        let resets = Arc::clone(&resets);
        dispatcher.on_global(EventKind::Reset, move |_| {
            *resets.lock().unwrap() += 1;
        });
    }
    let (mut flow, storage) = started(3, dispatcher);
    Transitioner
        .transition(&mut flow, &submit("forwards", 1))
        .unwrap();

    let request = TransportRequest::new().with_body(TRANSITION_KEY, "reset");
    let status = Transitioner.transition(&mut flow, &request).unwrap();

    assert_eq!(status.flags(), StatusFlags::SUCCESS | StatusFlags::RESET);
    assert_eq!(*resets.lock().unwrap(), 1);
    assert!(!flow.is_started());
    assert!(storage.is_empty().unwrap());
}

fn flow_from(storage: Arc<MemoryStorage>) -> Flow<Order> {
    flow(3, EventDispatcher::new(), storage)
}

#[test]
fn test_context_survives_storage_round_trip() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| event.hard_skip());
    let (mut flow, storage) = started(3, dispatcher);
    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();

    let mut next_request = flow_from(storage);
    assert!(next_request.resume().unwrap());

    let restored = next_request.context().unwrap();
    let saved = flow.context().unwrap();
    assert_eq!(restored, saved);
    assert_eq!(restored.current_step_number(), 3);
    assert_eq!(restored.completed_steps(), saved.completed_steps());
    assert_eq!(restored.soft_skipped_steps(), saved.soft_skipped_steps());
    assert_eq!(restored.hard_skipped_steps(), saved.hard_skipped_steps());
}

#[test]
fn test_storage_suffix_separates_instances() {
    let storage = Arc::new(MemoryStorage::new());
    let mut first = flow(2, EventDispatcher::new(), Arc::clone(&storage))
        .with_config(FlowConfig::default().with_storage_suffix("a"));
    let mut second = flow(2, EventDispatcher::new(), Arc::clone(&storage))
        .with_config(FlowConfig::default().with_storage_suffix("b"));

    first.start(Order { express: true }).unwrap();
    second.start(Order { express: false }).unwrap();
    assert_eq!(storage.len().unwrap(), 2);

    first.reset().unwrap();
    assert!(storage.has("flow_checkout_storage.b").unwrap());
    assert!(!storage.has("flow_checkout_storage.a").unwrap());
}

#[test]
fn test_dispatch_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut dispatcher = EventDispatcher::<Order>::new();
    let channels = [
        Channel::step(EventKind::PreForwards, "checkout", 1),
        Channel::group(EventKind::PreForwards, "shop"),
        Channel::flow(EventKind::PreForwards, "checkout"),
        Channel::global(EventKind::PreForwards),
        Channel::step(EventKind::Skip, "checkout", 1),
        Channel::step(EventKind::PostForwards, "checkout", 1),
        Channel::global(EventKind::PostForwards),
    ];
    // Registered in reverse to show order comes from the fan-out.
    for channel in channels.iter().rev() {
        let seen = Arc::clone(&seen);
        let label = channel.to_string();
        dispatcher.listen(channel.clone(), move |_| {
            seen.lock().unwrap().push(label.clone());
        });
    }
    let (mut flow, _) = started(3, dispatcher);

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();

    let expected: Vec<String> = channels.iter().map(ToString::to_string).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

#[test]
fn test_listeners_see_flow_state() {
    let mut dispatcher = EventDispatcher::<Order>::new();
    dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| {
        if event.data().express {
            event.hard_skip();
        }
    });
    dispatcher.on_flow(EventKind::PostForwards, "checkout", |event| {
        assert_eq!(event.flow_name(), "checkout");
        assert!(event.context().current_step_number() > 1);
    });

    let storage = Arc::new(MemoryStorage::new());
    let mut flow = flow(3, dispatcher, storage);
    flow.start(Order { express: true }).unwrap();

    Transitioner.forwards(&mut flow, &submit("forwards", 1)).unwrap();
    assert_eq!(flow.current_step_number().unwrap(), 3);
}

#[test]
fn test_corrupted_storage() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .save(STORAGE_KEY, serde_json::json!("not a context"))
        .unwrap();

    let mut flow = flow_from(Arc::clone(&storage));
    let err = flow.resume().unwrap_err();
    assert!(matches!(err, FlowError::CorruptedContext { .. }));
    assert_eq!(err.kind(), ErrorKind::Logic);
    assert!(!flow.is_started());
}

#[test]
fn test_data_type_mismatch() {
    let storage = Arc::new(MemoryStorage::new());
    let mut flow: Flow<String> = Flow::new(
        definition(2),
        |step: &Step, _: &String| -> Box<dyn Form> {
            Box::new(StubForm {
                name: step.form_tag().to_string(),
                submitted: false,
                valid: false,
            })
        },
        Arc::new(EventDispatcher::<String>::new()),
        storage,
    );

    let err = flow.start("order".to_string()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    match err {
        FlowError::DataTypeMismatch { expected, actual } => {
            assert!(expected.ends_with("Order"));
            assert_eq!(actual, std::any::type_name::<String>());
        }
        other => panic!("Unexpected error type: {:?}", other),
    }
}

#[test]
fn test_transitions_require_started_flow() {
    let storage = Arc::new(MemoryStorage::new());
    let mut flow = flow_from(storage);

    for token in ["forwards", "backwards", "backwards_1", "complete"] {
        let err = Transitioner
            .transition(&mut flow, &submit(token, 1))
            .unwrap_err();
        assert!(matches!(err, FlowError::Logic(_)), "{}: {:?}", token, err);
    }

    let status = Transitioner
        .transition(&mut flow, &submit("reset", 1))
        .unwrap();
    assert!(status.is_reset());

    let status = Transitioner
        .reset(&mut flow, &TransportRequest::new())
        .unwrap();
    assert!(status.is_reset());
}

#[test]
fn test_flows_need_two_steps() {
    for total in [0, 1] {
        let err = Context::new(Order { express: false }, total).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let err = Definition::builder()
        .name("checkout")
        .data_type::<Order>()
        .add_step("only")
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
