use crate::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<T> {
    id: ListenerId,
    once: bool,
    listener: Listener<T>,
}

struct EmitterInner<T> {
    listeners: Mutex<HashMap<String, Vec<Registration<T>>>>,
    next_id: AtomicU64,
}

/// Publish/subscribe registry keyed by event name.
///
/// Cloning an emitter yields another handle to the same registry. Listeners
/// run on the emitting thread, after the registry lock has been released, so
/// a listener may subscribe, unsubscribe or emit again.
pub struct EventEmitter<T> {
    inner: Arc<EmitterInner<T>>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(event.into(), false, Arc::new(listener))
    }

    /// Subscribes for the next emission only.
    pub fn once<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(event.into(), true, Arc::new(listener))
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let Some(registrations) = listeners.get_mut(event) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    pub fn clear(&self, event: &str) {
        lock(&self.inner.listeners).remove(event);
    }

    pub fn clear_all(&self) {
        lock(&self.inner.listeners).clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        lock(&self.inner.listeners)
            .get(event)
            .map_or(0, |registrations| registrations.len())
    }

    /// Delivers `payload` to every listener of `event` and returns how many
    /// listeners ran.
    pub fn emit(&self, event: &str, payload: &T) -> usize {
        let fired: Vec<Listener<T>> = {
            let mut listeners = lock(&self.inner.listeners);
            let Some(registrations) = listeners.get_mut(event) else {
                return 0;
            };
            let fired = registrations.iter().map(|r| r.listener.clone()).collect();
            registrations.retain(|r| !r.once);
            if registrations.is_empty() {
                listeners.remove(event);
            }
            fired
        };
        for listener in &fired {
            listener(payload);
        }
        fired.len()
    }

    fn register(&self, event: String, once: bool, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners)
            .entry(event)
            .or_default()
            .push(Registration { id, once, listener });
        id
    }
}
