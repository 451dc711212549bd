use std::sync::{Arc, Mutex};

use derive_where::derive_where;

use crate::event::EventHandler;

/// A buffer of events that tests can register with a `Client` and query afterwards.
#[derive_where(Clone)]
pub(crate) struct EventBuffer<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T> EventBuffer<T> {
    pub(crate) fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn filter_map<R>(&self, f: impl Fn(&T) -> Option<R>) -> Vec<R> {
        self.events.lock().unwrap().iter().filter_map(f).collect()
    }

    pub(crate) fn push_event(&self, event: T) {
        self.events.lock().unwrap().push(event);
    }

    /// Clear all cached events.
    pub(crate) fn clear_cached_events(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl<T: Clone> EventBuffer<T> {
    pub(crate) fn all(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }
}

impl<T: Send + Sync + 'static> EventBuffer<T> {
    /// An event handler that appends to this buffer as soon as an event is emitted.
    pub(crate) fn handler(&self) -> EventHandler<T> {
        let buffer = self.clone();
        EventHandler::callback(move |event| buffer.push_event(event))
    }
}
