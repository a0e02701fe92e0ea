use crate::{lock, Internal, LifecycleEvent, StoreError, TransitionPath};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::pin::pin;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub type DoneCallback = Box<dyn FnOnce() + Send>;
pub type ErrorCallback = Box<dyn FnOnce(StoreError) + Send>;
pub(crate) type DrainHook = Box<dyn Fn(&[String], CleanupPolicy) + Send + Sync>;

/// What `done_key` does with the callbacks of a counter that reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Fire the done callback.
    #[default]
    RunEffects,
    /// Drop the callbacks without firing them.
    SkipEffects,
}

/// Free-form bag attached to a transition path.
///
/// Bags outlive the transition's counter so policies such as throttling can
/// remember state between generations.
#[derive(Debug, Clone, Default)]
pub struct Meta(Arc<Mutex<Map<String, Value>>>);

impl Meta {
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.0).get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        lock(&self.0).insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        lock(&self.0).remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.0).contains_key(key)
    }

    /// Replaces the value under `key` with `f(current)` and returns it.
    pub fn update<F>(&self, key: &str, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut map = lock(&self.0);
        let next = f(map.get(key));
        map.insert(key.to_string(), next.clone());
        next
    }

    pub fn to_map(&self) -> Map<String, Value> {
        lock(&self.0).clone()
    }
}

#[derive(Default)]
struct Callbacks {
    done: Option<DoneCallback>,
    error: Option<ErrorCallback>,
}

#[derive(Default)]
struct Registry {
    counters: HashMap<String, usize>,
    controllers: HashMap<String, CancellationToken>,
    callbacks: HashMap<String, Callbacks>,
    meta: HashMap<String, Meta>,
}

struct TransitionsInner {
    registry: Mutex<Registry>,
    idle: Notify,
    internal: Internal,
    drain_hook: OnceLock<DrainHook>,
}

/// Reference counts, controllers, callbacks and metadata per transition.
///
/// Every prefix of a path carries its own counter: adding `["todo", "7"]`
/// increments both `todo` and `todo:7`. Controllers, callbacks and metadata
/// are bound to the joined key of the full path.
#[derive(Clone)]
pub struct Transitions {
    inner: Arc<TransitionsInner>,
}

impl Default for Transitions {
    fn default() -> Self {
        Self::new(Internal::new())
    }
}

impl Transitions {
    pub fn new(internal: Internal) -> Self {
        Self {
            inner: Arc::new(TransitionsInner {
                registry: Mutex::new(Registry::default()),
                idle: Notify::new(),
                internal,
                drain_hook: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn set_drain_hook(&self, hook: DrainHook) {
        let _ = self.inner.drain_hook.set(hook);
    }

    pub fn add_key(&self, path: &TransitionPath) {
        let keys = path.prefix_keys();
        let Some(full) = keys.last().cloned() else {
            return;
        };
        let fresh = {
            let mut registry = lock(&self.inner.registry);
            for key in &keys {
                *registry.counters.entry(key.clone()).or_insert(0) += 1;
            }
            if registry
                .controllers
                .get(&full)
                .is_some_and(|controller| controller.is_cancelled())
            {
                registry
                    .controllers
                    .insert(full.clone(), CancellationToken::new());
            }
            registry.counters.get(&full) == Some(&1)
        };
        trace!(transition = %full, "add key");
        if fresh {
            debug!(transition = %full, "new transition");
            self.inner
                .internal
                .announce(LifecycleEvent::NewTransition { key: full });
        }
    }

    /// Decrements every prefix counter of `path`, returning the keys that
    /// reached zero. Absent counters are left alone.
    pub fn done_key(&self, path: &TransitionPath, policy: CleanupPolicy) -> Vec<String> {
        let keys = path.prefix_keys();
        let mut drained = Vec::new();
        let mut fire = Vec::new();
        {
            let mut registry = lock(&self.inner.registry);
            for key in keys.iter().rev() {
                let Some(count) = registry.counters.get_mut(key) else {
                    continue;
                };
                *count -= 1;
                if *count > 0 {
                    continue;
                }
                registry.counters.remove(key);
                registry.controllers.remove(key);
                if let Some(callbacks) = registry.callbacks.remove(key) {
                    if policy == CleanupPolicy::RunEffects {
                        fire.extend(callbacks.done);
                    }
                }
                drained.push(key.clone());
            }
        }
        for done in fire {
            done();
        }
        if drained.is_empty() {
            return drained;
        }
        if let Some(full) = keys.last().filter(|full| drained.contains(full)) {
            debug!(transition = %full, ?policy, "transition drained");
            self.inner
                .internal
                .announce(LifecycleEvent::TransitionCompleted { key: full.clone() });
        }
        if let Some(hook) = self.inner.drain_hook.get() {
            hook(&drained, policy);
        }
        self.inner.idle.notify_waiters();
        drained
    }

    /// Drains the exact counter of `path` to zero, abandoning the transition.
    pub fn erase_key(&self, path: &TransitionPath, policy: CleanupPolicy) -> Vec<String> {
        let mut drained = Vec::new();
        for _ in 0..self.get(path) {
            drained.extend(self.done_key(path, policy));
        }
        drained
    }

    pub fn get(&self, path: &TransitionPath) -> usize {
        lock(&self.inner.registry)
            .counters
            .get(&path.key())
            .copied()
            .unwrap_or(0)
    }

    /// True while the exact key of `path` (or anything below it) is active.
    pub fn is_happening_unique(&self, path: &TransitionPath) -> bool {
        self.get(path) > 0
    }

    /// True while any prefix of `path` is active.
    pub fn is_happening(&self, path: &TransitionPath) -> bool {
        let registry = lock(&self.inner.registry);
        path.prefix_keys()
            .iter()
            .any(|key| registry.counters.get(key).is_some_and(|count| *count > 0))
    }

    /// Returns the controller of `path`, creating it on first use.
    pub fn controller(&self, path: &TransitionPath) -> CancellationToken {
        lock(&self.inner.registry)
            .controllers
            .entry(path.key())
            .or_default()
            .clone()
    }

    pub fn set_controller(&self, path: &TransitionPath, controller: CancellationToken) {
        lock(&self.inner.registry)
            .controllers
            .insert(path.key(), controller);
    }

    /// True when `path` has a controller that has not been cancelled.
    pub fn has_live_controller(&self, path: &TransitionPath) -> bool {
        lock(&self.inner.registry)
            .controllers
            .get(&path.key())
            .is_some_and(|controller| !controller.is_cancelled())
    }

    /// Cancels the current controller of `path`. Returns false when there was
    /// nothing left to cancel.
    pub fn abort(&self, path: &TransitionPath) -> bool {
        let controller = lock(&self.inner.registry)
            .controllers
            .get(&path.key())
            .cloned();
        match controller {
            Some(controller) if !controller.is_cancelled() => {
                debug!(transition = %path, "abort transition");
                controller.cancel();
                true
            }
            _ => false,
        }
    }

    /// Installs the lifecycle callbacks of the current generation. Returns
    /// false, dropping both callbacks, if a generation already has them.
    pub fn on_settled(
        &self,
        path: &TransitionPath,
        done: DoneCallback,
        error: ErrorCallback,
    ) -> bool {
        let mut registry = lock(&self.inner.registry);
        let callbacks = registry.callbacks.entry(path.key()).or_default();
        if callbacks.done.is_some() || callbacks.error.is_some() {
            return false;
        }
        callbacks.done = Some(done);
        callbacks.error = Some(error);
        true
    }

    pub fn has_callbacks(&self, path: &TransitionPath) -> bool {
        lock(&self.inner.registry)
            .callbacks
            .get(&path.key())
            .is_some_and(|callbacks| callbacks.done.is_some() || callbacks.error.is_some())
    }

    /// Fires the error callback of `path` and clears both callbacks, whatever
    /// the counter says. Returns whether a callback ran.
    pub fn emit_error(&self, path: &TransitionPath, error: StoreError) -> bool {
        let callbacks = lock(&self.inner.registry).callbacks.remove(&path.key());
        match callbacks.and_then(|callbacks| callbacks.error) {
            Some(on_error) => {
                on_error(error);
                true
            }
            None => false,
        }
    }

    pub fn meta(&self, path: &TransitionPath) -> Meta {
        lock(&self.inner.registry)
            .meta
            .entry(path.key())
            .or_default()
            .clone()
    }

    /// Active counters by key.
    pub fn snapshot(&self) -> BTreeMap<String, usize> {
        lock(&self.inner.registry)
            .counters
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect()
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.inner.registry).counters.is_empty()
    }

    /// Resolves once `path` is no longer happening.
    pub async fn settled(&self, path: &TransitionPath) {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if !self.is_happening(path) {
                return;
            }
            notified.await;
        }
    }
}
