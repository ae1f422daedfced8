//! Transition logic.
//!
//! The [`Transitioner`] moves a [`Flow`] between steps in response to a
//! [`TransportRequest`]. Expected outcomes (an invalid form, a blocking
//! listener, missing steps on completion) come back as a [`Status`]; only
//! misuse and broken invariants are errors.

use crate::flow::{Flow, FlowData};
use stepflow_core::{
    Action, Channel, Event, EventBus, EventKind, FlowError, Status, StatusFlags, Step, StepNumber,
    TransitionRequest, TransportRequest,
};
use tracing::{debug, info, warn};

/// Stateless driver of the forwards, backwards, complete and reset
/// transitions.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stepflow::prelude::*;
///
/// struct Accept;
///
/// impl Form for Accept {
///     fn name(&self) -> &str { "accept" }
///     fn is_submitted(&self) -> bool { true }
///     fn is_valid(&self) -> bool { true }
///     fn handle_request(&mut self, _request: &TransportRequest) {}
/// }
///
/// let definition = Definition::builder()
///     .name("survey")
///     .data_type::<String>()
///     .add_step("intro")
///     .add_step("questions")
///     .build()?;
///
/// let mut flow = Flow::new(
///     Arc::new(definition),
///     |_: &Step, _: &String| -> Box<dyn Form> { Box::new(Accept) },
///     Arc::new(EventDispatcher::<String>::new()),
///     Arc::new(MemoryStorage::new()),
/// );
/// flow.start("anonymous".to_string())?;
///
/// let request = TransportRequest::new().with_body("flow_survey_transition", "forwards");
/// let status = Transitioner.transition(&mut flow, &request)?;
/// assert!(status.is_successful());
/// assert_eq!(flow.current_step_number()?, 2);
/// # Ok::<(), stepflow::FlowError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Transitioner;

impl Transitioner {
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if the request carries a non-empty transition token
    /// for the flow.
    pub fn has_transition_request<T: FlowData>(
        &self,
        flow: &Flow<T>,
        request: &TransportRequest,
    ) -> bool {
        request
            .get(&flow.transition_key())
            .is_some_and(|token| !token.is_empty())
    }

    /// Performs the transition the request asks for.
    ///
    /// A numbered backwards request walks back one step at a time until the
    /// target is reached or a step fails.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Transition`] if the request carries no token or
    /// targets an unreachable step, [`FlowError::Logic`] for anything but a
    /// reset on a flow that is not started, [`FlowError::InvalidArgument`]
    /// if the token does not parse, and whatever the dispatched transition
    /// returns.
    pub fn transition<T: FlowData>(
        &self,
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        let token = match request.get(&flow.transition_key()) {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(FlowError::transition(
                    flow.name(),
                    format!(
                        "Unable to transition flow '{}'. Check has_transition_request before attempting to transition.",
                        flow.name()
                    ),
                ))
            }
        };

        let current = match flow.current_step_number() {
            Ok(number) => number,
            Err(_) if token.split('_').next() == Some(Action::Reset.as_str()) => 1,
            Err(err) => return Err(err),
        };
        let parsed = TransitionRequest::parse(token, current, flow.steps().len())?;
        debug!("Flow '{}' received '{}' request", flow.name(), token);

        match parsed.action() {
            Action::Forwards => self.forwards(flow, request),
            Action::Backwards => {
                let current = flow.current_step_number()?;
                let target = parsed.requested_step_number();
                if current <= target || target as usize > flow.steps().len() {
                    return Err(FlowError::transition(
                        flow.name(),
                        format!(
                            "\"{}\" is an invalid requested step number in the current context.",
                            target
                        ),
                    ));
                }

                let mut status = Status::new(StatusFlags::FAILURE)?;
                while flow.current_step_number()? > target {
                    status = self.backwards(flow, request)?;
                    if !status.is_successful() {
                        break;
                    }
                }
                Ok(status)
            }
            Action::Complete => self.complete(flow, request),
            Action::Reset => self.reset(flow, request),
        }
    }

    /// Moves the flow past the current step, and past every step the skip
    /// listeners flag along the way.
    ///
    /// The current step is marked completed before the first skip event and
    /// each flag is written as soon as its listeners return, so later skip
    /// listeners see the earlier outcome. An error rolls the context back.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Transition`] on the last step and
    /// [`FlowError::Logic`] if the flow is not started or a listener flags
    /// a step both soft and hard skipped, or flags the last step.
    pub fn forwards<T: FlowData>(
        &self,
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        Self::attempt(flow, |flow| Self::move_forwards(flow, request))
    }

    fn move_forwards<T: FlowData>(
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        let current_step = flow.current_step()?.clone();
        let current = current_step.number();
        if flow.is_last_step()? {
            return Err(FlowError::transition(
                flow.name(),
                "The flow is on the last step and can not transition forwards.",
            ));
        }

        if !Self::submit_form(flow, request)? {
            debug!("Flow '{}' step {} form is not valid", flow.name(), current);
            return Status::new(StatusFlags::FAILURE | StatusFlags::INVALID_FORM);
        }

        let bus = flow.event_bus();
        let blocked = {
            let mut event = Event::new(EventKind::PreForwards, flow.definition(), flow.context()?);
            dispatch(bus.as_ref(), &mut event, Some(current));
            event.is_transition_blocked()
        };
        if blocked {
            warn!("Flow '{}' forwards from step {} was blocked", flow.name(), current);
            return Status::new(
                StatusFlags::FAILURE | StatusFlags::VALID_FORM | StatusFlags::BLOCKED,
            );
        }

        let checkpoint = flow.context()?.checkpoint();
        let target = match Self::skip_cascade(flow, bus.as_ref(), &current_step) {
            Ok(target) => target,
            Err(err) => {
                flow.context_mut()?.rollback(checkpoint);
                return Err(err);
            }
        };

        {
            let mut event = Event::new(EventKind::PostForwards, flow.definition(), flow.context()?);
            dispatch(bus.as_ref(), &mut event, Some(current));
        }
        flow.save()?;

        info!(
            "Flow '{}' moved forwards from step {} to step {}",
            flow.name(),
            current,
            target
        );
        Status::new(StatusFlags::SUCCESS | StatusFlags::VALID_FORM)
    }

    /// Moves the flow to the previous step that is not hard skipped.
    ///
    /// The form is still submitted, but its validity only shows up in the
    /// status of a blocked transition.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Transition`] on the first step and
    /// [`FlowError::Logic`] if the flow is not started.
    pub fn backwards<T: FlowData>(
        &self,
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        Self::attempt(flow, |flow| Self::move_backwards(flow, request))
    }

    fn move_backwards<T: FlowData>(
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        let current_step = flow.current_step()?.clone();
        let current = current_step.number();
        if flow.is_first_step()? {
            return Err(FlowError::transition(
                flow.name(),
                "The flow is on the first step and can not transition backwards.",
            ));
        }

        let form_flag = if Self::submit_form(flow, request)? {
            StatusFlags::VALID_FORM
        } else {
            StatusFlags::INVALID_FORM
        };

        let bus = flow.event_bus();
        let blocked = {
            let mut event = Event::new(EventKind::PreBackwards, flow.definition(), flow.context()?);
            dispatch(bus.as_ref(), &mut event, Some(current));
            event.is_transition_blocked()
        };
        if blocked {
            warn!("Flow '{}' backwards from step {} was blocked", flow.name(), current);
            return Status::new(StatusFlags::FAILURE | StatusFlags::BLOCKED | form_flag);
        }

        let mut target = current - 1;
        {
            let context = flow.context()?;
            while target > 1 && context.is_hard_skipped(flow.steps().get_by_number(target)?) {
                target -= 1;
            }
        }

        let context = flow.context_mut()?;
        context.unset_completed(&current_step);
        context.set_current_step_number(target)?;

        {
            let mut event =
                Event::new(EventKind::PostBackwards, flow.definition(), flow.context()?);
            dispatch(bus.as_ref(), &mut event, Some(current));
        }
        flow.save()?;

        info!(
            "Flow '{}' moved backwards from step {} to step {}",
            flow.name(),
            current,
            target
        );
        Status::new(StatusFlags::SUCCESS | StatusFlags::VALID_FORM)
    }

    /// Completes the flow from its last step and resets it.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Transition`] unless the flow is on its last
    /// step, [`FlowError::Logic`] if it is not started, and storage errors
    /// from the reset.
    pub fn complete<T: FlowData>(
        &self,
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        Self::attempt(flow, |flow| Self::finish(flow, request))
    }

    fn finish<T: FlowData>(
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        if !flow.is_last_step()? {
            return Err(FlowError::transition(
                flow.name(),
                "The flow must be on the last step in order to be completed.",
            ));
        }

        if !Self::submit_form(flow, request)? {
            return Status::new(StatusFlags::FAILURE | StatusFlags::INVALID_FORM);
        }

        let context = flow.context()?;
        let earlier = flow.steps().filter_smaller_than(context.current_step_number());
        if let Some(step) = earlier
            .iter()
            .find(|step| !context.is_completed(step) && !context.is_skipped(step))
        {
            warn!(
                "Flow '{}' can not be completed, step {} is neither completed nor skipped",
                flow.name(),
                step.number()
            );
            return Status::new(StatusFlags::FAILURE);
        }

        let bus = flow.event_bus();
        let blocked = {
            let mut event = Event::new(EventKind::PreComplete, flow.definition(), context);
            dispatch(bus.as_ref(), &mut event, None);
            event.is_transition_blocked()
        };
        if blocked {
            warn!("Flow '{}' completion was blocked", flow.name());
            return Status::new(
                StatusFlags::FAILURE | StatusFlags::VALID_FORM | StatusFlags::BLOCKED,
            );
        }

        {
            let mut event = Event::new(EventKind::Completed, flow.definition(), flow.context()?);
            dispatch(bus.as_ref(), &mut event, None);
        }
        flow.reset()?;

        info!("Flow '{}' completed", flow.name());
        Status::new(StatusFlags::SUCCESS | StatusFlags::VALID_FORM | StatusFlags::COMPLETED)
    }

    /// Discards the flow's progress.
    ///
    /// The reset event goes out on the global channel only, and only if the
    /// flow was started.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the stored context can not be removed.
    pub fn reset<T: FlowData>(
        &self,
        flow: &mut Flow<T>,
        _request: &TransportRequest,
    ) -> Result<Status, FlowError> {
        match flow.context() {
            Ok(context) => {
                let mut event = Event::new(EventKind::Reset, flow.definition(), context);
                flow.event_bus()
                    .dispatch(&mut event, &Channel::global(EventKind::Reset));
            }
            Err(_) => debug!("Flow '{}' was not started, no reset event", flow.name()),
        }
        flow.reset()?;

        info!("Flow '{}' was reset", flow.name());
        Status::new(StatusFlags::SUCCESS | StatusFlags::RESET)
    }

    /// Runs one transition attempt and drops the form of the step it
    /// started on, whatever the outcome.
    fn attempt<T, F>(flow: &mut Flow<T>, run: F) -> Result<Status, FlowError>
    where
        T: FlowData,
        F: FnOnce(&mut Flow<T>) -> Result<Status, FlowError>,
    {
        let number = flow.current_step_number().ok();
        let result = run(flow);
        if let Some(number) = number {
            flow.discard_form(number);
        }
        result
    }

    /// Submits the current form if the request carries it and returns
    /// whether it is submitted and valid.
    fn submit_form<T: FlowData>(
        flow: &mut Flow<T>,
        request: &TransportRequest,
    ) -> Result<bool, FlowError> {
        let form = flow.current_step_form()?;
        if request.has_body(form.name()) && !form.is_submitted() {
            form.handle_request(request);
        }
        Ok(form.is_submitted() && form.is_valid())
    }

    /// Completes the current step, then runs the skip cascade writing each
    /// flag as it is raised, and moves to the returned step number. The
    /// caller rolls back on error.
    fn skip_cascade<T: FlowData>(
        flow: &mut Flow<T>,
        bus: &dyn EventBus<T>,
        current_step: &Step,
    ) -> Result<StepNumber, FlowError> {
        let current = current_step.number();
        flow.context_mut()?.set_completed(current_step)?;

        let total = flow.context()?.total_number_of_steps();
        let mut increment: StepNumber = 1;
        let mut offset: StepNumber = 0;

        while offset < increment {
            let skipping = current + offset;
            offset += 1;
            if skipping >= total {
                continue;
            }

            let (soft, hard) = {
                let mut event = Event::new(EventKind::Skip, flow.definition(), flow.context()?);
                bus.dispatch(
                    &mut event,
                    &Channel::step(EventKind::Skip, flow.name(), skipping),
                );
                (event.is_soft_skipped(), event.is_hard_skipped())
            };
            if soft && hard {
                return Err(FlowError::Logic(
                    "A step can not be both hard and soft skipped.".to_string(),
                ));
            }

            let next = flow.steps().get_by_number(skipping + 1)?.clone();
            let context = flow.context_mut()?;
            if hard {
                context.set_hard_skipped(&next)?;
            } else {
                context.unset_hard_skipped(&next);
            }
            if soft {
                context.set_soft_skipped(&next)?;
            } else {
                context.unset_soft_skipped(&next);
            }

            if soft || hard {
                increment += 1;
                debug!(
                    "Flow '{}' step {} {} skipped",
                    flow.name(),
                    next.number(),
                    if hard { "hard" } else { "soft" }
                );
            }
        }

        let target = current + increment;
        flow.context_mut()?.set_current_step_number(target)?;
        Ok(target)
    }
}

/// Delivers an event on the step channel (when given), every group
/// channel, the flow channel and the global channel, in that order.
fn dispatch<T>(bus: &dyn EventBus<T>, event: &mut Event<'_, T>, step: Option<StepNumber>) {
    let kind = event.kind();
    let definition = event.definition();

    if let Some(number) = step {
        bus.dispatch(event, &Channel::step(kind, definition.name(), number));
    }
    for group in definition.groups() {
        bus.dispatch(event, &Channel::group(kind, group.as_str()));
    }
    bus.dispatch(event, &Channel::flow(kind, definition.name()));
    bus.dispatch(event, &Channel::global(kind));
}
