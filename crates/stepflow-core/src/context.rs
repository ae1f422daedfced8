//! Mutable per-flow state.

use crate::error::FlowError;
use crate::step::{Step, StepNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Position and progress of one running flow.
///
/// The context owns the flow payload and records which steps were
/// completed, soft skipped or hard skipped. It is serializable so a
/// [`Storage`](crate::Storage) can carry it between requests.
///
/// # Examples
///
/// ```
/// use stepflow_core::{Context, Step};
///
/// let mut ctx = Context::new("payload".to_string(), 3)?;
/// let second = Step::new(2, "form", "Step", "Next", "Previous")?;
///
/// ctx.set_soft_skipped(&second)?;
/// assert!(ctx.is_skipped(&second));
/// assert!(!ctx.is_hard_skipped(&second));
/// # Ok::<(), stepflow_core::FlowError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context<T> {
    data: T,
    current_step_number: StepNumber,
    total_number_of_steps: StepNumber,
    completed_steps: BTreeSet<StepNumber>,
    soft_skipped_steps: BTreeSet<StepNumber>,
    hard_skipped_steps: BTreeSet<StepNumber>,
}

impl<T> Context<T> {
    /// Creates a context positioned on the first step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] if `total_number_of_steps` is
    /// below 2.
    pub fn new(data: T, total_number_of_steps: StepNumber) -> Result<Self, FlowError> {
        if total_number_of_steps < 2 {
            return Err(FlowError::InvalidArgument(format!(
                "The total number of steps must be 2 or more. \"{}\" given.",
                total_number_of_steps
            )));
        }

        Ok(Self {
            data,
            current_step_number: 1,
            total_number_of_steps,
            completed_steps: BTreeSet::new(),
            soft_skipped_steps: BTreeSet::new(),
            hard_skipped_steps: BTreeSet::new(),
        })
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn current_step_number(&self) -> StepNumber {
        self.current_step_number
    }

    pub fn total_number_of_steps(&self) -> StepNumber {
        self.total_number_of_steps
    }

    /// Moves the context to another step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] if the number is outside
    /// `1..=total_number_of_steps`.
    pub fn set_current_step_number(&mut self, number: StepNumber) -> Result<(), FlowError> {
        if !self.is_in_range(number) {
            return Err(FlowError::InvalidArgument(format!(
                "Step number \"{}\" is invalid for this context.",
                number
            )));
        }

        self.current_step_number = number;
        Ok(())
    }

    /// Marks a step as completed.
    ///
    /// The current step and every step before it can be completed.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] if the step does not belong to this
    /// context or lies beyond the current step.
    pub fn set_completed(&mut self, step: &Step) -> Result<(), FlowError> {
        let number = self.validate_number(step)?;
        if number > self.current_step_number {
            return Err(FlowError::Logic(format!(
                "Can not complete step \"{}\", it is beyond the current step \"{}\".",
                number, self.current_step_number
            )));
        }

        self.completed_steps.insert(number);
        Ok(())
    }

    pub fn unset_completed(&mut self, step: &Step) {
        self.completed_steps.remove(&step.number());
    }

    pub fn is_completed(&self, step: &Step) -> bool {
        self.completed_steps.contains(&step.number())
    }

    /// Marks a step as soft skipped: bypassed going forwards, still
    /// reachable going backwards.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] for the first or last step, or a step
    /// outside this context.
    pub fn set_soft_skipped(&mut self, step: &Step) -> Result<(), FlowError> {
        let number = self.check_skippable(step)?;
        self.soft_skipped_steps.insert(number);
        Ok(())
    }

    pub fn unset_soft_skipped(&mut self, step: &Step) {
        self.soft_skipped_steps.remove(&step.number());
    }

    pub fn is_soft_skipped(&self, step: &Step) -> bool {
        self.soft_skipped_steps.contains(&step.number())
    }

    /// Marks a step as hard skipped: bypassed in both directions.
    ///
    /// # Errors
    ///
    /// Same as [`Context::set_soft_skipped`].
    pub fn set_hard_skipped(&mut self, step: &Step) -> Result<(), FlowError> {
        let number = self.check_skippable(step)?;
        self.hard_skipped_steps.insert(number);
        Ok(())
    }

    pub fn unset_hard_skipped(&mut self, step: &Step) {
        self.hard_skipped_steps.remove(&step.number());
    }

    pub fn is_hard_skipped(&self, step: &Step) -> bool {
        self.hard_skipped_steps.contains(&step.number())
    }

    pub fn is_skipped(&self, step: &Step) -> bool {
        self.is_soft_skipped(step) || self.is_hard_skipped(step)
    }

    pub fn completed_steps(&self) -> &BTreeSet<StepNumber> {
        &self.completed_steps
    }

    pub fn soft_skipped_steps(&self) -> &BTreeSet<StepNumber> {
        &self.soft_skipped_steps
    }

    pub fn hard_skipped_steps(&self) -> &BTreeSet<StepNumber> {
        &self.hard_skipped_steps
    }

    /// Captures the position and step flags, without the payload.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            current_step_number: self.current_step_number,
            completed_steps: self.completed_steps.clone(),
            soft_skipped_steps: self.soft_skipped_steps.clone(),
            hard_skipped_steps: self.hard_skipped_steps.clone(),
        }
    }

    /// Puts position and step flags back to a captured state.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.current_step_number = checkpoint.current_step_number;
        self.completed_steps = checkpoint.completed_steps;
        self.soft_skipped_steps = checkpoint.soft_skipped_steps;
        self.hard_skipped_steps = checkpoint.hard_skipped_steps;
    }

    /// Re-checks the invariants of a context that did not come from
    /// [`Context::new`], e.g. one read back from storage.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] describing the first broken invariant.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.total_number_of_steps < 2 {
            return Err(FlowError::Logic(format!(
                "The total number of steps must be 2 or more. \"{}\" found.",
                self.total_number_of_steps
            )));
        }

        if !self.is_in_range(self.current_step_number) {
            return Err(FlowError::Logic(format!(
                "Current step number \"{}\" is out of range.",
                self.current_step_number
            )));
        }

        if let Some(number) = self
            .completed_steps
            .iter()
            .find(|n| !self.is_in_range(**n) || **n > self.current_step_number)
        {
            return Err(FlowError::Logic(format!(
                "Step \"{}\" can not be marked completed.",
                number
            )));
        }

        if let Some(number) = self
            .soft_skipped_steps
            .iter()
            .chain(&self.hard_skipped_steps)
            .find(|n| !self.is_skippable(**n))
        {
            return Err(FlowError::Logic(format!(
                "Step \"{}\" can not be marked skipped.",
                number
            )));
        }

        if let Some(number) = self
            .soft_skipped_steps
            .intersection(&self.hard_skipped_steps)
            .next()
        {
            return Err(FlowError::Logic(format!(
                "Step \"{}\" is both hard and soft skipped.",
                number
            )));
        }

        Ok(())
    }

    fn is_in_range(&self, number: StepNumber) -> bool {
        (1..=self.total_number_of_steps).contains(&number)
    }

    fn is_skippable(&self, number: StepNumber) -> bool {
        number > 1 && number < self.total_number_of_steps
    }

    fn validate_number(&self, step: &Step) -> Result<StepNumber, FlowError> {
        let number = step.number();
        if !self.is_in_range(number) {
            return Err(FlowError::Logic(format!(
                "Step number \"{}\" is invalid for this context.",
                number
            )));
        }
        Ok(number)
    }

    /// Checks that a step may carry a skip flag without setting one.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] for the first or last step, or a step
    /// outside this context.
    pub fn check_skippable(&self, step: &Step) -> Result<StepNumber, FlowError> {
        let number = self.validate_number(step)?;
        if number < 2 {
            return Err(FlowError::Logic(format!(
                "Step \"{}\" is the first step and can not be skipped.",
                number
            )));
        }

        if number == self.total_number_of_steps {
            return Err(FlowError::Logic(format!(
                "Step \"{}\" is the last step and can not be skipped.",
                number
            )));
        }

        Ok(number)
    }
}

/// Position and step flags of a [`Context`] at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    current_step_number: StepNumber,
    completed_steps: BTreeSet<StepNumber>,
    soft_skipped_steps: BTreeSet<StepNumber>,
    hard_skipped_steps: BTreeSet<StepNumber>,
}
