//! Flow blueprints.

use crate::error::FlowError;
use crate::step::{Step, StepCollection};
use std::any::{type_name, TypeId};
use std::fmt;

/// Rust type a flow's payload must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    id: TypeId,
    name: &'static str,
}

impl DataType {
    /// Captures the type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns `true` if `T` is the captured type.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Immutable blueprint shared by every flow started from it.
///
/// # Examples
///
/// ```
/// use stepflow_core::Definition;
///
/// struct Order;
///
/// let definition = Definition::builder()
///     .name("checkout")
///     .data_type::<Order>()
///     .add_step("address")
///     .add_step("payment")
///     .build()?;
///
/// assert_eq!(definition.to_string(), "checkout");
/// assert_eq!(definition.steps().len(), 2);
/// assert_eq!(definition.groups(), [Definition::DEFAULT_GROUP]);
/// # Ok::<(), stepflow_core::FlowError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Definition {
    name: String,
    expected_data: DataType,
    steps: StepCollection,
    groups: Vec<String>,
}

impl Definition {
    /// Group every definition routes events to unless told otherwise.
    pub const DEFAULT_GROUP: &'static str = "Default";

    /// Creates a definition.
    ///
    /// Duplicate groups are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] if the name or a group is empty,
    /// if there are fewer than two steps, or if the step numbers do not run
    /// from 1 without gaps.
    pub fn new(
        name: impl Into<String>,
        expected_data: DataType,
        steps: StepCollection,
        groups: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, FlowError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FlowError::InvalidArgument(
                "The definition name cannot be empty.".to_string(),
            ));
        }

        if steps.len() < StepCollection::MIN_STEPS {
            return Err(FlowError::InvalidArgument(
                "A flow must consist of at least 2 steps.".to_string(),
            ));
        }

        if let Some((expected, step)) = (1..)
            .zip(steps.iter())
            .find(|(expected, step)| step.number() != *expected)
        {
            return Err(FlowError::InvalidArgument(format!(
                "Step numbers must run from 1 without gaps. Expected \"{}\", found \"{}\".",
                expected,
                step.number()
            )));
        }

        let mut unique: Vec<String> = Vec::new();
        for group in groups.into_iter().map(Into::into) {
            if group.is_empty() {
                return Err(FlowError::InvalidArgument(
                    "A group name cannot be empty.".to_string(),
                ));
            }
            if !unique.contains(&group) {
                unique.push(group);
            }
        }

        Ok(Self {
            name,
            expected_data,
            steps,
            groups: unique,
        })
    }

    /// Creates a new definition builder.
    pub fn builder() -> DefinitionBuilder {
        DefinitionBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected_data(&self) -> DataType {
        self.expected_data
    }

    pub fn steps(&self) -> &StepCollection {
        &self.steps
    }

    /// Event routing groups, in declaration order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Builder for [`Definition`] that numbers steps in insertion order.
#[derive(Debug, Default)]
pub struct DefinitionBuilder {
    name: Option<String>,
    expected_data: Option<DataType>,
    steps: Vec<(String, String, String, String)>,
    groups: Vec<String>,
}

impl DefinitionBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flow name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the payload type flows must be started with.
    pub fn data_type<T: 'static>(mut self) -> Self {
        self.expected_data = Some(DataType::of::<T>());
        self
    }

    /// Appends a step with the default labels.
    pub fn add_step(self, form_tag: impl Into<String>) -> Self {
        self.add_labeled_step(form_tag, "Step", "Next", "Previous")
    }

    /// Appends a step with custom labels.
    pub fn add_labeled_step(
        mut self,
        form_tag: impl Into<String>,
        label: impl Into<String>,
        next_label: impl Into<String>,
        previous_label: impl Into<String>,
    ) -> Self {
        self.steps.push((
            form_tag.into(),
            label.into(),
            next_label.into(),
            previous_label.into(),
        ));
        self
    }

    /// Adds an event routing group. Without any, the default group is used.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Adds several event routing groups.
    pub fn groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Builds the definition.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] when steps, data type or name are
    /// missing, and whatever [`Step::new`] or [`Definition::new`] reject.
    pub fn build(self) -> Result<Definition, FlowError> {
        if self.steps.is_empty() {
            return Err(FlowError::Logic(
                "Unable to build a definition without steps.".to_string(),
            ));
        }

        let expected_data = self.expected_data.ok_or_else(|| {
            FlowError::Logic(
                "Unable to build a definition without an expected data type.".to_string(),
            )
        })?;

        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(FlowError::Logic(
                    "Unable to build a definition without a valid name.".to_string(),
                ))
            }
        };

        let steps = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, (form_tag, label, next, previous))| {
                Step::new(index as u32 + 1, form_tag, label, next, previous)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let groups = if self.groups.is_empty() {
            vec![Definition::DEFAULT_GROUP.to_string()]
        } else {
            self.groups
        };

        Definition::new(name, expected_data, StepCollection::new(steps)?, groups)
    }
}
