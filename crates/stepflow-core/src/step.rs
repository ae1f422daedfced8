//! Steps and the ordered collection a definition is built from.

use crate::error::FlowError;
use std::collections::BTreeSet;
use std::fmt;

/// One-based position of a step within a flow.
pub type StepNumber = u32;

/// Immutable description of one position in a flow.
///
/// # Examples
///
/// ```
/// use stepflow_core::Step;
///
/// let step = Step::new(1, "address_form", "Address", "Continue", "Back")?;
/// assert_eq!(step.number(), 1);
/// assert_eq!(step.form_tag(), "address_form");
/// # Ok::<(), stepflow_core::FlowError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    number: StepNumber,
    form_tag: String,
    label: String,
    next_label: String,
    previous_label: String,
}

impl Step {
    /// Creates a new step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] if `number` is 0 or any of the
    /// strings is empty.
    pub fn new(
        number: StepNumber,
        form_tag: impl Into<String>,
        label: impl Into<String>,
        next_label: impl Into<String>,
        previous_label: impl Into<String>,
    ) -> Result<Self, FlowError> {
        if number < 1 {
            return Err(FlowError::InvalidArgument(format!(
                "The number must be above 0. \"{}\" given.",
                number
            )));
        }

        let step = Self {
            number,
            form_tag: form_tag.into(),
            label: label.into(),
            next_label: next_label.into(),
            previous_label: previous_label.into(),
        };

        for (field, value) in [
            ("form tag", &step.form_tag),
            ("label", &step.label),
            ("next label", &step.next_label),
            ("previous label", &step.previous_label),
        ] {
            if value.is_empty() {
                return Err(FlowError::InvalidArgument(format!(
                    "The {} cannot be empty.",
                    field
                )));
            }
        }

        Ok(step)
    }

    pub fn number(&self) -> StepNumber {
        self.number
    }

    /// Tag the form factory uses to pick the form for this step.
    pub fn form_tag(&self) -> &str {
        &self.form_tag
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn next_label(&self) -> &str {
        &self.next_label
    }

    pub fn previous_label(&self) -> &str {
        &self.previous_label
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step_{} ({})", self.number, self.label)
    }
}

/// Immutable, number-ordered set of steps.
///
/// A collection built with [`StepCollection::new`] holds at least two steps
/// with unique numbers. The filter methods return sub-collections that may be
/// smaller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCollection {
    steps: Vec<Step>,
}

impl StepCollection {
    /// Minimum number of steps a flow consists of.
    pub const MIN_STEPS: usize = 2;

    /// Creates a collection, ordering the steps by number.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] if two steps share a number or
    /// fewer than [`Self::MIN_STEPS`] steps are given.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Result<Self, FlowError> {
        let mut steps: Vec<Step> = steps.into_iter().collect();
        if steps.len() < Self::MIN_STEPS {
            return Err(FlowError::InvalidArgument(format!(
                "A flow must consist of at least {} steps. \"{}\" given.",
                Self::MIN_STEPS,
                steps.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for step in &steps {
            if !seen.insert(step.number()) {
                return Err(FlowError::InvalidArgument(format!(
                    "Step number \"{}\" is used more than once.",
                    step.number()
                )));
            }
        }

        steps.sort_by_key(Step::number);
        Ok(Self { steps })
    }

    /// Returns the step with the given number.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StepNotFound`] if no such step exists.
    pub fn get_by_number(&self, number: StepNumber) -> Result<&Step, FlowError> {
        self.steps
            .binary_search_by_key(&number, Step::number)
            .map(|index| &self.steps[index])
            .map_err(|_| FlowError::StepNotFound(number))
    }

    pub fn has_number(&self, number: StepNumber) -> bool {
        self.get_by_number(number).is_ok()
    }

    /// Steps numbered strictly below `number`.
    pub fn filter_smaller_than(&self, number: StepNumber) -> StepCollection {
        self.filter(|step| step.number() < number)
    }

    /// Steps numbered strictly above `number`.
    pub fn filter_greater_than(&self, number: StepNumber) -> StepCollection {
        self.filter(|step| step.number() > number)
    }

    /// Steps numbered `number` or above.
    pub fn filter_greater_than_or_equal_to(&self, number: StepNumber) -> StepCollection {
        match number.checked_sub(1) {
            Some(below) => self.filter_greater_than(below),
            None => self.clone(),
        }
    }

    pub fn first(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// Numbers of the steps in this collection, ascending.
    pub fn numbers(&self) -> impl Iterator<Item = StepNumber> + '_ {
        self.steps.iter().map(Step::number)
    }

    fn filter(&self, predicate: impl Fn(&Step) -> bool) -> StepCollection {
        StepCollection {
            steps: self.steps.iter().filter(|s| predicate(s)).cloned().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a StepCollection {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(number: StepNumber) -> Step {
        Step::new(number, "form", "Step", "Next", "Previous").unwrap()
    }

    fn collection(numbers: &[StepNumber]) -> StepCollection {
        StepCollection::new(numbers.iter().map(|n| step(*n))).unwrap()
    }

    #[test]
    fn test_step_validation() {
        assert!(Step::new(0, "form", "Step", "Next", "Previous").is_err());
        assert!(Step::new(1, "", "Step", "Next", "Previous").is_err());
        assert!(Step::new(1, "form", "", "Next", "Previous").is_err());

        let err = Step::new(1, "form", "Step", "", "Previous").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument: The next label cannot be empty."
        );
        assert!(Step::new(1, "form", "Step", "Next", "").is_err());
    }

    #[test]
    fn test_step_equality() {
        assert_eq!(step(1), step(1));
        assert_ne!(step(1), step(2));
        assert_ne!(
            step(1),
            Step::new(1, "form", "Other", "Next", "Previous").unwrap()
        );
    }

    #[test]
    fn test_collection_is_ordered() {
        let steps = collection(&[3, 1, 2]);
        assert_eq!(steps.numbers().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(steps.first().map(Step::number), Some(1));
        assert_eq!(steps.last().map(Step::number), Some(3));
    }

    #[test]
    fn test_collection_validation() {
        let result = StepCollection::new(vec![step(1)]);
        assert!(result.is_err());

        let result = StepCollection::new(vec![step(1), step(2), step(2)]);
        match result {
            Err(FlowError::InvalidArgument(msg)) => {
                assert_eq!(msg, "Step number \"2\" is used more than once.");
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_get_by_number() {
        let steps = collection(&[1, 2, 3]);
        assert_eq!(steps.get_by_number(2).unwrap(), &step(2));
        assert!(steps.has_number(3));
        assert!(!steps.has_number(4));
        assert!(matches!(
            steps.get_by_number(4),
            Err(FlowError::StepNotFound(4))
        ));
    }

    #[test]
    fn test_filters() {
        let steps = collection(&[1, 2, 3, 4]);

        let smaller = steps.filter_smaller_than(3);
        assert_eq!(smaller.numbers().collect::<Vec<_>>(), vec![1, 2]);

        let greater = steps.filter_greater_than(2);
        assert_eq!(greater.numbers().collect::<Vec<_>>(), vec![3, 4]);

        let greater_or_equal = steps.filter_greater_than_or_equal_to(2);
        assert_eq!(greater_or_equal.numbers().collect::<Vec<_>>(), vec![2, 3, 4]);

        assert!(steps.filter_smaller_than(1).is_empty());
        assert_eq!(steps.filter_greater_than_or_equal_to(0).len(), 4);

        // Receiver is untouched.
        assert_eq!(steps.len(), 4);
    }
}
