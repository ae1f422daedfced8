//! A running instance of a definition.

use crate::config::FlowConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stepflow_core::{
    Context, Definition, EventBus, FlowError, Form, FormFactory, Step, StepCollection, StepNumber,
    Storage,
};
use tracing::{debug, info};

/// Payload types a flow can carry.
pub trait FlowData: Serialize + DeserializeOwned + 'static {}

impl<T: Serialize + DeserializeOwned + 'static> FlowData for T {}

/// One running instance of a [`Definition`].
///
/// A flow pairs the shared definition with its own [`Context`] and the
/// collaborators the transitioner needs: a form factory, an event bus and a
/// storage backend. The context is absent until [`Flow::start`] or
/// [`Flow::resume`] succeeds, and again after [`Flow::reset`].
pub struct Flow<T> {
    definition: Arc<Definition>,
    context: Option<Context<T>>,
    forms: Box<dyn FormFactory<T>>,
    form_cache: HashMap<StepNumber, Box<dyn Form>>,
    event_bus: Arc<dyn EventBus<T>>,
    storage: Arc<dyn Storage>,
    config: FlowConfig,
}

impl<T> fmt::Debug for Flow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.definition.name())
            .field(
                "current_step",
                &self.context.as_ref().map(Context::current_step_number),
            )
            .field("cached_forms", &self.form_cache.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: FlowData> Flow<T> {
    /// Creates a flow that has not been started yet.
    pub fn new(
        definition: Arc<Definition>,
        forms: impl FormFactory<T> + 'static,
        event_bus: Arc<dyn EventBus<T>>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            definition,
            context: None,
            forms: Box::new(forms),
            form_cache: HashMap::new(),
            event_bus,
            storage,
            config: FlowConfig::default(),
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn steps(&self) -> &StepCollection {
        self.definition.steps()
    }

    pub fn groups(&self) -> &[String] {
        self.definition.groups()
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Request field the transition token is read from.
    pub fn transition_key(&self) -> String {
        self.config.transition_key(self.name())
    }

    /// Key the context is stored under.
    pub fn storage_key(&self) -> String {
        self.config.storage_key(self.name())
    }

    /// Handle to the event bus, detached from the flow's borrow.
    pub fn event_bus(&self) -> Arc<dyn EventBus<T>> {
        Arc::clone(&self.event_bus)
    }

    pub fn is_started(&self) -> bool {
        self.context.is_some()
    }

    /// Starts the flow on its first step with the given payload and
    /// persists the fresh context.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DataTypeMismatch`] if `T` is not the type the
    /// definition expects, or a storage error.
    pub fn start(&mut self, data: T) -> Result<(), FlowError> {
        self.ensure_data_type()?;
        let total = self.step_count()?;
        self.context = Some(Context::new(data, total)?);
        self.form_cache.clear();
        self.save()?;
        info!("Flow '{}' started", self.name());
        Ok(())
    }

    /// Restores the context persisted for this flow.
    ///
    /// Returns `Ok(false)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DataTypeMismatch`] as [`Flow::start`] does, and
    /// [`FlowError::CorruptedContext`] if the stored value is not a valid
    /// context for this definition.
    pub fn resume(&mut self) -> Result<bool, FlowError> {
        self.ensure_data_type()?;
        let key = self.storage_key();
        let value = match self.storage.load(&key)? {
            Some(value) => value,
            None => return Ok(false),
        };

        let corrupted = |details: String| FlowError::CorruptedContext {
            key: key.clone(),
            details,
        };

        let context: Context<T> =
            serde_json::from_value(value).map_err(|e| corrupted(e.to_string()))?;
        context.validate().map_err(|e| corrupted(e.to_string()))?;
        if context.total_number_of_steps() != self.step_count()? {
            return Err(corrupted(format!(
                "context has {} steps, definition has {}",
                context.total_number_of_steps(),
                self.steps().len()
            )));
        }

        debug!(
            "Flow '{}' resumed on step {}",
            self.name(),
            context.current_step_number()
        );
        self.context = Some(context);
        self.form_cache.clear();
        Ok(true)
    }

    /// Returns the context.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] if the flow has not been started.
    pub fn context(&self) -> Result<&Context<T>, FlowError> {
        self.context.as_ref().ok_or_else(|| self.not_started())
    }

    /// Returns the context mutably.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] if the flow has not been started.
    pub fn context_mut(&mut self) -> Result<&mut Context<T>, FlowError> {
        match self.context.as_mut() {
            Some(context) => Ok(context),
            None => Err(FlowError::Logic(format!(
                "Flow '{}' has not been started.",
                self.definition.name()
            ))),
        }
    }

    pub fn data(&self) -> Result<&T, FlowError> {
        self.context().map(Context::data)
    }

    pub fn current_step_number(&self) -> Result<StepNumber, FlowError> {
        self.context().map(Context::current_step_number)
    }

    pub fn current_step(&self) -> Result<&Step, FlowError> {
        self.steps().get_by_number(self.current_step_number()?)
    }

    pub fn first_step(&self) -> Result<&Step, FlowError> {
        self.steps()
            .first()
            .ok_or_else(|| FlowError::Logic(format!("Flow '{}' has no steps.", self.name())))
    }

    pub fn last_step(&self) -> Result<&Step, FlowError> {
        self.steps()
            .last()
            .ok_or_else(|| FlowError::Logic(format!("Flow '{}' has no steps.", self.name())))
    }

    pub fn is_first_step(&self) -> Result<bool, FlowError> {
        Ok(self.current_step()? == self.first_step()?)
    }

    pub fn is_last_step(&self) -> Result<bool, FlowError> {
        Ok(self.current_step()? == self.last_step()?)
    }

    pub fn next_step(&self) -> Result<&Step, FlowError> {
        self.steps().get_by_number(self.current_step_number()? + 1)
    }

    pub fn has_next_step(&self) -> Result<bool, FlowError> {
        Ok(self.steps().has_number(self.current_step_number()? + 1))
    }

    pub fn previous_step(&self) -> Result<&Step, FlowError> {
        self.steps()
            .get_by_number(self.current_step_number()?.saturating_sub(1))
    }

    pub fn has_previous_step(&self) -> Result<bool, FlowError> {
        Ok(self.current_step_number()? > 1)
    }

    /// Steps after the current one.
    pub fn steps_remaining(&self) -> Result<StepCollection, FlowError> {
        Ok(self.steps().filter_greater_than(self.current_step_number()?))
    }

    /// Steps before the current one.
    pub fn steps_done(&self) -> Result<StepCollection, FlowError> {
        Ok(self.steps().filter_smaller_than(self.current_step_number()?))
    }

    /// Form of the current step, created on first use. The transitioner
    /// drops it once a transition attempt from that step ends, so every
    /// attempt reads a fresh submission.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] if the flow has not been started.
    pub fn current_step_form(&mut self) -> Result<&mut (dyn Form + 'static), FlowError> {
        let context = match self.context.as_ref() {
            Some(context) => context,
            None => return Err(self.not_started()),
        };
        let number = context.current_step_number();
        let step = self.definition.steps().get_by_number(number)?;

        let forms = &self.forms;
        let form = self
            .form_cache
            .entry(number)
            .or_insert_with(|| forms.create(step, context.data()));
        Ok(form.as_mut())
    }

    /// Drops the cached form of a step, if any.
    pub(crate) fn discard_form(&mut self, number: StepNumber) {
        self.form_cache.remove(&number);
    }

    /// Persists the context.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Logic`] if the flow has not been started, or a
    /// storage error.
    pub fn save(&self) -> Result<(), FlowError> {
        let context = self.context()?;
        let value = serde_json::to_value(context)
            .map_err(|e| FlowError::Storage(format!("unable to serialize context: {}", e)))?;
        self.storage.save(&self.storage_key(), value)
    }

    /// Drops the context and its stored copy. The flow must be started
    /// again before it can transition.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the stored copy can not be removed.
    pub fn reset(&mut self) -> Result<(), FlowError> {
        self.storage.remove(&self.storage_key())?;
        self.context = None;
        self.form_cache.clear();
        debug!("Flow '{}' reset", self.name());
        Ok(())
    }

    fn ensure_data_type(&self) -> Result<(), FlowError> {
        let expected = self.definition.expected_data();
        if !expected.is::<T>() {
            return Err(FlowError::DataTypeMismatch {
                expected: expected.name(),
                actual: std::any::type_name::<T>(),
            });
        }
        Ok(())
    }

    fn step_count(&self) -> Result<StepNumber, FlowError> {
        StepNumber::try_from(self.steps().len())
            .map_err(|_| FlowError::Logic(format!("Flow '{}' has too many steps.", self.name())))
    }

    fn not_started(&self) -> FlowError {
        FlowError::Logic(format!("Flow '{}' has not been started.", self.name()))
    }
}
