//! In-process event bus.

use std::collections::HashMap;
use std::fmt;
use stepflow_core::{Channel, Event, EventBus, EventKind, StepNumber};
use tracing::debug;

type Listener<T> = Box<dyn Fn(&mut Event<'_, T>) + Send + Sync>;

/// [`EventBus`] backed by a listener registry keyed by [`Channel`].
///
/// Listeners of a channel run in registration order. Register them before
/// sharing the dispatcher with flows.
///
/// # Examples
///
/// ```
/// use stepflow::{EventDispatcher, EventKind};
///
/// let mut dispatcher = EventDispatcher::<String>::new();
/// dispatcher.on_step(EventKind::Skip, "checkout", 1, |event| {
///     if event.data().is_empty() {
///         event.hard_skip();
///     }
/// });
/// dispatcher.on_global(EventKind::PreComplete, |event| event.block_transition());
///
/// assert_eq!(dispatcher.listener_count(), 2);
/// ```
pub struct EventDispatcher<T> {
    listeners: HashMap<Channel, Vec<Listener<T>>>,
}

impl<T> EventDispatcher<T> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    /// Registers a listener on an arbitrary channel.
    pub fn listen<F>(&mut self, channel: Channel, listener: F) -> &mut Self
    where
        F: Fn(&mut Event<'_, T>) + Send + Sync + 'static,
    {
        self.listeners
            .entry(channel)
            .or_default()
            .push(Box::new(listener));
        self
    }

    pub fn on_global<F>(&mut self, kind: EventKind, listener: F) -> &mut Self
    where
        F: Fn(&mut Event<'_, T>) + Send + Sync + 'static,
    {
        self.listen(Channel::global(kind), listener)
    }

    pub fn on_group<F>(&mut self, kind: EventKind, group: &str, listener: F) -> &mut Self
    where
        F: Fn(&mut Event<'_, T>) + Send + Sync + 'static,
    {
        self.listen(Channel::group(kind, group), listener)
    }

    pub fn on_flow<F>(&mut self, kind: EventKind, flow: &str, listener: F) -> &mut Self
    where
        F: Fn(&mut Event<'_, T>) + Send + Sync + 'static,
    {
        self.listen(Channel::flow(kind, flow), listener)
    }

    pub fn on_step<F>(
        &mut self,
        kind: EventKind,
        flow: &str,
        number: StepNumber,
        listener: F,
    ) -> &mut Self
    where
        F: Fn(&mut Event<'_, T>) + Send + Sync + 'static,
    {
        self.listen(Channel::step(kind, flow, number), listener)
    }

    /// Total number of registered listeners across all channels.
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}

impl<T> Default for EventDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("channels", &self.listeners.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T> EventBus<T> for EventDispatcher<T> {
    fn dispatch(&self, event: &mut Event<'_, T>, channel: &Channel) {
        let Some(listeners) = self.listeners.get(channel) else {
            return;
        };

        debug!("Dispatching {} to {} listener(s)", channel, listeners.len());
        for listener in listeners {
            listener(&mut *event);
        }
    }
}
