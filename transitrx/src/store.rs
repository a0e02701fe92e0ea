use crate::effect::launch;
use crate::setter::fold;
use crate::{
    has_changed, lock, Action, BeforeDispatch, CleanupPolicy, Deps, ErrorHandlers, ErrorsStore,
    EventEmitter, HandlerId, History, HistoryPolicy, Internal, LifecycleEvent, OnTransitionEnd,
    Payload, PushContext, ReduceContext, Reducer, Redispatch, Selector, Setter, Settled, State,
    StoreError, Subject, Subscription, TransitionPath, Transitions, BOOTSTRAP,
};
use chrono::Utc;
use futures::future::BoxFuture;
use futures_signals::signal::{Mutable, MutableSignalCloned, SignalExt, SignalStream};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::mem;
use std::sync::{Arc, Mutex, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub type Deriver<S> = Arc<dyn Fn(&mut S) + Send + Sync>;
pub type HistoryHook<S> = Arc<dyn Fn(&PushContext<'_, S>) -> HistoryPolicy + Send + Sync>;

/// Builds the state the store starts from.
pub enum Initializer<S, D> {
    Sync(Arc<dyn Fn(&D) -> Result<S, StoreError> + Send + Sync>),
    Async(Arc<dyn Fn(Arc<D>) -> BoxFuture<'static, Result<S, StoreError>> + Send + Sync>),
}

impl<S, D> Clone for Initializer<S, D> {
    fn clone(&self) -> Self {
        match self {
            Initializer::Sync(f) => Initializer::Sync(f.clone()),
            Initializer::Async(f) => Initializer::Async(f.clone()),
        }
    }
}

/// A committed change as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<S> {
    pub previous: S,
    pub current: S,
}

/// Point-in-time summary of a store, for debugging tools.
#[derive(Debug, Clone)]
pub struct Inspection<S> {
    pub name: String,
    pub state: S,
    pub view: S,
    pub history_len: usize,
    pub redo_len: usize,
    pub transitions: BTreeMap<String, usize>,
    pub queued: BTreeMap<String, usize>,
    pub optimistic: usize,
}

/// Read-only handle given to debug registration hooks.
pub struct Inspector<S>(Arc<dyn Fn() -> Option<Inspection<S>> + Send + Sync>);

impl<S> Clone for Inspector<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> Inspector<S> {
    /// Returns `None` once the store is gone.
    pub fn inspect(&self) -> Option<Inspection<S>> {
        (self.0)()
    }
}

/// Identifies who a queued write belongs to: the generation of its
/// transition and the controller it was dispatched under.
#[derive(Debug, Clone)]
pub(crate) struct Stamp {
    pub generation: u64,
    pub controller: CancellationToken,
}

impl Stamp {
    fn detached(controller: CancellationToken) -> Self {
        Self {
            generation: 0,
            controller,
        }
    }
}

enum Resolution {
    Commit,
    Fail(StoreError),
    Cancel,
}

struct Core<S> {
    committed: S,
    visible: S,
    history: History<S>,
    queues: HashMap<String, Vec<(CancellationToken, Setter<S>)>>,
    optimistic: Vec<(String, Setter<S>)>,
    endings: HashMap<String, Vec<(CancellationToken, OnTransitionEnd)>>,
    generations: HashMap<String, u64>,
    /// Keys whose current generation was rolled back.
    failed: HashSet<String>,
}

impl<S: State> Core<S> {
    fn accepts(&self, key: &str, stamp: &Stamp) -> bool {
        !self.failed.contains(key)
            && self.generations.get(key).copied().unwrap_or(0) == stamp.generation
    }

    fn drop_layers(&mut self, key: &str) -> bool {
        let before = self.optimistic.len();
        self.optimistic.retain(|(owner, _)| owner != key);
        self.optimistic.len() != before
    }
}

pub(crate) struct StoreParts<S, P, D> {
    pub name: String,
    pub initial: S,
    pub reducer: Arc<dyn Reducer<S, P, D>>,
    pub deriver: Option<Deriver<S>>,
    pub deps: D,
    pub initializer: Option<Initializer<S, D>>,
    pub history_hook: Option<HistoryHook<S>>,
    pub history_limit: Option<usize>,
    pub handlers: ErrorHandlers,
}

struct Inner<S, P, D> {
    name: String,
    core: Mutex<Core<S>>,
    /// Serializes writes to committed state. Held while derive and history
    /// hooks run, `core` is not.
    writer: Mutex<()>,
    view: Mutable<S>,
    subject: Subject<StateChange<S>>,
    transitions: Transitions,
    reducer: Arc<dyn Reducer<S, P, D>>,
    deriver: Option<Deriver<S>>,
    deps: Arc<D>,
    events: EventEmitter<Value>,
    internal: Internal,
    errors: ErrorsStore,
    handlers: ErrorHandlers,
    history_hook: Option<HistoryHook<S>>,
    initializer: Option<Initializer<S, D>>,
}

/// The transition-tracked state container.
///
/// Cloning a store yields another handle to the same state.
pub struct Store<S, P, D = ()> {
    inner: Arc<Inner<S, P, D>>,
}

impl<S, P, D> Clone for Store<S, P, D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: State, P: Payload, D: Deps> Store<S, P, D> {
    pub(crate) fn from_parts(parts: StoreParts<S, P, D>) -> Self {
        let StoreParts {
            name,
            mut initial,
            reducer,
            deriver,
            deps,
            initializer,
            history_hook,
            history_limit,
            handlers,
        } = parts;
        reducer.derive(&mut initial);
        if let Some(deriver) = &deriver {
            deriver(&mut initial);
        }
        let mut history = History::new(history_limit);
        if initializer.is_none() {
            history.push(initial.clone());
        }
        let internal = Internal::new();
        let transitions = Transitions::new(internal.clone());
        let inner = Arc::new(Inner {
            name,
            core: Mutex::new(Core {
                committed: initial.clone(),
                visible: initial.clone(),
                history,
                queues: HashMap::new(),
                optimistic: Vec::new(),
                endings: HashMap::new(),
                generations: HashMap::new(),
                failed: HashSet::new(),
            }),
            writer: Mutex::new(()),
            view: Mutable::new(initial),
            subject: Subject::new(),
            transitions,
            reducer,
            deriver,
            deps: Arc::new(deps),
            events: EventEmitter::new(),
            internal,
            errors: ErrorsStore::new(),
            handlers,
            history_hook,
            initializer,
        });
        let weak = Arc::downgrade(&inner);
        inner
            .transitions
            .set_drain_hook(Box::new(move |drained: &[String], policy: CleanupPolicy| {
                if let Some(store) = Self::upgrade(&weak) {
                    store.sweep(drained, policy);
                }
            }));
        Store { inner }
    }

    fn upgrade(weak: &Weak<Inner<S, P, D>>) -> Option<Self> {
        weak.upgrade().map(|inner| Store { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Committed state.
    pub fn get_state(&self) -> S {
        lock(&self.inner.core).committed.clone()
    }

    /// Committed state with the optimistic writes of pending transitions
    /// layered on top. This is what subscribers see.
    pub fn view(&self) -> S {
        lock(&self.inner.core).visible.clone()
    }

    pub fn deps(&self) -> &D {
        &self.inner.deps
    }

    pub fn transitions(&self) -> &Transitions {
        &self.inner.transitions
    }

    pub fn errors(&self) -> &ErrorsStore {
        &self.inner.errors
    }

    /// Domain events emitted by reducers and effects.
    pub fn events(&self) -> &EventEmitter<Value> {
        &self.inner.events
    }

    pub fn internal(&self) -> &Internal {
        &self.inner.internal
    }

    pub fn to_signal(&self) -> MutableSignalCloned<S> {
        self.inner.view.signal_cloned()
    }

    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<S>> {
        self.inner.view.signal_cloned().to_stream()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.inner
            .subject
            .subscribe(move |change: &StateChange<S>| listener(&change.current))
    }

    pub fn subscribe_changes<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange<S>) + Send + Sync + 'static,
    {
        self.inner.subject.subscribe(listener)
    }

    /// Calls `listener` only when one of `selectors` reports a change.
    pub fn subscribe_selected<F>(&self, selectors: Vec<Selector<S>>, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.inner.subject.subscribe(move |change: &StateChange<S>| {
            if has_changed(&change.previous, &change.current, &selectors) {
                listener(&change.current);
            }
        })
    }

    pub fn add_error_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.inner.handlers.add(handler)
    }

    pub fn remove_error_handler(&self, id: HandlerId) -> bool {
        self.inner.handlers.remove(id)
    }

    pub fn dispatch(&self, action: impl Into<Action<P>>) {
        self.dispatch_within(action.into(), None);
    }

    /// Commits `f` right away.
    pub fn set_state<F>(&self, f: F)
    where
        F: Fn(&mut S) + Send + Sync + 'static,
    {
        self.commit(vec![Setter::new(f)], None);
    }

    /// Queues `setter` behind `transition` while it is happening, commits it
    /// right away otherwise.
    pub fn set_state_in(&self, setter: Setter<S>, transition: Option<&TransitionPath>) {
        match transition {
            Some(path) if self.inner.transitions.is_happening_unique(path) => {
                let stamp = self.current_stamp(path);
                self.enqueue(path, &stamp, vec![setter], Vec::new());
            }
            _ => self.commit(vec![setter], None),
        }
    }

    /// Steps back one history entry. Returns false at the boundary.
    pub fn undo(&self) -> bool {
        let change = {
            let _writer = lock(&self.inner.writer);
            let mut core = lock(&self.inner.core);
            let current = core.committed.clone();
            match core.history.undo(current) {
                Some(previous) => {
                    core.committed = previous;
                    Some(self.refresh(&mut core))
                }
                None => None,
            }
        };
        self.publish(change)
    }

    /// Re-applies the last undone entry. Returns false when there is none.
    pub fn redo(&self) -> bool {
        let change = {
            let _writer = lock(&self.inner.writer);
            let mut core = lock(&self.inner.core);
            match core.history.redo() {
                Some(next) => {
                    core.committed = next;
                    Some(self.refresh(&mut core))
                }
                None => None,
            }
        };
        self.publish(change)
    }

    pub fn history(&self) -> Vec<S> {
        lock(&self.inner.core).history.entries().to_vec()
    }

    pub fn redo_stack(&self) -> Vec<S> {
        lock(&self.inner.core).history.redo_entries().to_vec()
    }

    pub fn can_undo(&self) -> bool {
        lock(&self.inner.core).history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        lock(&self.inner.core).history.can_redo()
    }

    pub fn inspect(&self) -> Inspection<S> {
        let core = lock(&self.inner.core);
        Inspection {
            name: self.inner.name.clone(),
            state: core.committed.clone(),
            view: core.visible.clone(),
            history_len: core.history.len(),
            redo_len: core.history.redo_entries().len(),
            transitions: self.inner.transitions.snapshot(),
            queued: core
                .queues
                .iter()
                .map(|(key, queue)| (key.clone(), queue.len()))
                .collect(),
            optimistic: core.optimistic.len(),
        }
    }

    pub fn inspector(&self) -> Inspector<S> {
        let weak = Arc::downgrade(&self.inner);
        Inspector(Arc::new(move || {
            Self::upgrade(&weak).map(|store| store.inspect())
        }))
    }

    /// Resolves once the initializer has settled.
    pub async fn ready(&self) {
        self.settled(&TransitionPath::bootstrap()).await
    }

    pub async fn settled(&self, path: &TransitionPath) {
        self.inner.transitions.settled(path).await
    }

    /// Clears the recorded bootstrap failure and runs the initializer again.
    pub fn rebootstrap(&self) -> Result<(), StoreError> {
        self.inner.errors.clear_bootstrap();
        self.bootstrap()
    }

    pub(crate) fn bootstrap(&self) -> Result<(), StoreError> {
        let Some(initializer) = self.inner.initializer.clone() else {
            return Ok(());
        };
        let path = TransitionPath::bootstrap();
        let stamp = self.register(&path, None);
        debug!(store = %self.inner.name, "bootstrap");
        match initializer {
            Initializer::Sync(init) => {
                let result = init(&self.inner.deps);
                self.finish_bootstrap(&path, &stamp, Settled::from(result))
            }
            Initializer::Async(init) => {
                let computation = init(self.inner.deps.clone());
                let store = self.clone();
                tokio::spawn(async move {
                    let outcome = tokio::select! {
                        biased;
                        _ = stamp.controller.cancelled() => Settled::Cancelled,
                        result = computation => Settled::from(result),
                    };
                    let _ = store.finish_bootstrap(&path, &stamp, outcome);
                });
                Ok(())
            }
        }
    }

    fn finish_bootstrap(
        &self,
        path: &TransitionPath,
        stamp: &Stamp,
        outcome: Settled<S>,
    ) -> Result<(), StoreError> {
        match outcome {
            Settled::Completed(state) => {
                self.enqueue(path, stamp, vec![Setter::replace(state)], Vec::new());
                self.inner.transitions.done_key(path, CleanupPolicy::RunEffects);
                Ok(())
            }
            Settled::Failed(error) => {
                if !self.inner.transitions.emit_error(path, error.clone()) {
                    self.inner.errors.set_bootstrap(error.clone());
                    self.handle_error(&error);
                }
                self.inner.transitions.done_key(path, CleanupPolicy::SkipEffects);
                Err(error)
            }
            Settled::Cancelled => {
                self.inner.transitions.done_key(path, CleanupPolicy::SkipEffects);
                Ok(())
            }
        }
    }

    /// Runs `action`. `active` is the transition and stamp of the effect
    /// dispatching it, if any; an action on that same path joins it.
    pub(crate) fn dispatch_within(
        &self,
        mut action: Action<P>,
        active: Option<(&TransitionPath, &Stamp)>,
    ) {
        let started_at = Utc::now();
        if let Some(filter) = action.take_before_dispatch() {
            let path = action.transition.clone();
            let cx = BeforeDispatch {
                path: path.as_ref(),
                transitions: &self.inner.transitions,
                events: &self.inner.events,
                meta: path.as_ref().map(|path| self.inner.transitions.meta(path)),
                redispatch: self.redispatcher(),
                started_at,
            };
            match filter(&cx, action) {
                Some(mut next) => {
                    next.take_before_dispatch();
                    action = next;
                }
                None => {
                    debug!(
                        store = %self.inner.name,
                        transition = ?path.as_ref().map(TransitionPath::key),
                        "action swallowed"
                    );
                    return;
                }
            }
        }

        let parts = action.into_parts();
        let transition = parts.transition;
        debug!(
            store = %self.inner.name,
            action = ?parts.payload,
            transition = ?transition.as_ref().map(|p| p.key()),
            "dispatch"
        );
        let joined = match (&transition, active) {
            (Some(path), Some((active, stamp))) if path == active => Some(stamp.clone()),
            _ => None,
        };
        let registered = transition.is_some() && joined.is_none();
        let stamp = match (&transition, joined) {
            (_, Some(stamp)) => stamp,
            (Some(path), None) => self.register(path, parts.controller),
            (None, None) => Stamp::detached(parts.controller.unwrap_or_default()),
        };
        let mut ending = parts.on_transition_end;
        if let Some(path) = &transition {
            if let Some(end) = ending.take() {
                self.push_ending(path, &stamp, end);
            }
        }

        let mut cx = ReduceContext::new(
            self,
            self.get_state(),
            transition.clone(),
            stamp.controller.clone(),
            started_at,
        );
        let mut worklist = VecDeque::from([parts.payload]);
        let mut result = Ok(());
        while let Some(payload) = worklist.pop_front() {
            if let Err(error) = self.inner.reducer.reduce(&mut cx, payload) {
                result = Err(error);
                break;
            }
            worklist.extend(cx.take_dispatched());
        }
        let output = cx.into_output();

        match (result, transition) {
            (Err(error), Some(path)) => {
                warn!(store = %self.inner.name, transition = %path, error = %error, "reducer failed");
                if !self.inner.transitions.emit_error(&path, error.clone()) {
                    self.handle_error(&error);
                }
                if registered {
                    self.inner.transitions.done_key(&path, CleanupPolicy::SkipEffects);
                }
            }
            (Err(error), None) => {
                warn!(store = %self.inner.name, error = %error, "reducer failed");
                self.handle_error(&error);
                if let Some(end) = ending {
                    end(&Settled::Failed(error));
                }
            }
            (Ok(()), Some(path)) => {
                self.enqueue(&path, &stamp, output.setters, output.optimistic);
                for operation in output.operations {
                    launch(self, operation, Some(path.clone()), stamp.clone());
                }
                if registered {
                    self.inner.transitions.done_key(&path, CleanupPolicy::RunEffects);
                }
            }
            (Ok(()), None) => {
                if !output.optimistic.is_empty() {
                    debug!(store = %self.inner.name, "optimistic writes without a transition ignored");
                }
                self.commit(output.setters, None);
                for operation in output.operations {
                    launch(self, operation, None, stamp.clone());
                }
                if let Some(end) = ending {
                    end(&Settled::Completed(()));
                }
            }
        }
    }

    /// Opens (or joins) the transition at `path`. Installing fresh callbacks
    /// starts a new generation.
    fn register(&self, path: &TransitionPath, controller: Option<CancellationToken>) -> Stamp {
        let transitions = &self.inner.transitions;
        transitions.add_key(path);
        let controller = match controller {
            Some(controller) => {
                transitions.set_controller(path, controller.clone());
                controller
            }
            None => transitions.controller(path),
        };
        let key = path.key();
        let done_store = Arc::downgrade(&self.inner);
        let done_key = key.clone();
        let error_store = Arc::downgrade(&self.inner);
        let fresh = transitions.on_settled(
            path,
            Box::new(move || {
                if let Some(store) = Self::upgrade(&done_store) {
                    store.resolve(&done_key, Resolution::Commit);
                }
            }),
            Box::new(move |error: StoreError| {
                if let Some(store) = Self::upgrade(&error_store) {
                    store.resolve(&key, Resolution::Fail(error));
                }
            }),
        );
        let key = path.key();
        let mut core = lock(&self.inner.core);
        let generation = if fresh {
            core.failed.remove(&key);
            let generation = core.generations.entry(key).or_insert(0);
            *generation += 1;
            *generation
        } else {
            core.generations.get(&key).copied().unwrap_or(0)
        };
        Stamp {
            generation,
            controller,
        }
    }

    fn current_stamp(&self, path: &TransitionPath) -> Stamp {
        let generation = lock(&self.inner.core)
            .generations
            .get(&path.key())
            .copied()
            .unwrap_or(0);
        Stamp {
            generation,
            controller: self.inner.transitions.controller(path),
        }
    }

    /// Queues `end` for when its generation settles. An action that joined a
    /// generation already rolled back hears `Cancelled` right away.
    fn push_ending(&self, path: &TransitionPath, stamp: &Stamp, end: OnTransitionEnd) {
        let key = path.key();
        let stale = {
            let mut core = lock(&self.inner.core);
            if core.accepts(&key, stamp) {
                core.endings
                    .entry(key)
                    .or_default()
                    .push((stamp.controller.clone(), end));
                None
            } else {
                Some(end)
            }
        };
        if let Some(end) = stale {
            end(&Settled::Cancelled);
        }
    }

    fn redispatcher(&self) -> Redispatch<P> {
        let weak = Arc::downgrade(&self.inner);
        Redispatch::new(move |action| {
            if let Some(store) = Self::upgrade(&weak) {
                store.dispatch(action);
            }
        })
    }

    /// Appends writes to the queue of `path`. Writes from a generation that
    /// failed or has been replaced are dropped.
    pub(crate) fn enqueue(
        &self,
        path: &TransitionPath,
        stamp: &Stamp,
        setters: Vec<Setter<S>>,
        optimistic: Vec<Setter<S>>,
    ) {
        let key = path.key();
        let change = {
            let mut core = lock(&self.inner.core);
            if !core.accepts(&key, stamp) {
                trace!(transition = %key, generation = stamp.generation, "stale writes dropped");
                return;
            }
            if !setters.is_empty() {
                let controller = &stamp.controller;
                core.queues
                    .entry(key.clone())
                    .or_default()
                    .extend(setters.into_iter().map(|setter| (controller.clone(), setter)));
            }
            if optimistic.is_empty() {
                None
            } else {
                core.optimistic
                    .extend(optimistic.into_iter().map(|setter| (key.clone(), setter)));
                Some(self.refresh(&mut core))
            }
        };
        self.publish(change);
    }

    /// Folds `setters` onto committed state as one write.
    pub(crate) fn commit(&self, setters: Vec<Setter<S>>, transition: Option<&str>) {
        if setters.is_empty() {
            return;
        }
        let change = {
            let _writer = lock(&self.inner.writer);
            self.write(&setters, transition)
        };
        self.publish(Some(change));
    }

    pub(crate) fn handle_error(&self, error: &StoreError) {
        self.inner.handlers.handle(error);
    }

    /// Folds `setters` onto committed state and records the result. Callers
    /// hold the writer lock; derive and history hooks run with `core` free,
    /// so they may read the store.
    fn write(&self, setters: &[Setter<S>], transition: Option<&str>) -> StateChange<S> {
        let previous = lock(&self.inner.core).committed.clone();
        let mut next = previous.clone();
        fold(&mut next, setters);
        self.inner.reducer.derive(&mut next);
        if let Some(deriver) = &self.inner.deriver {
            deriver(&mut next);
        }
        let policy = match &self.inner.history_hook {
            Some(hook) => hook(&PushContext {
                previous: &previous,
                next: &next,
                transition,
            }),
            None => HistoryPolicy::Push,
        };
        trace!(store = %self.inner.name, ?transition, setters = setters.len(), ?policy, "commit");
        let mut core = lock(&self.inner.core);
        core.history.record(next.clone(), policy);
        core.committed = next;
        self.refresh(&mut core)
    }

    fn refresh(&self, core: &mut Core<S>) -> StateChange<S> {
        let mut visible = core.committed.clone();
        for (_, layer) in &core.optimistic {
            layer.apply(&mut visible);
        }
        let previous = mem::replace(&mut core.visible, visible.clone());
        self.inner.view.set(visible.clone());
        StateChange {
            previous,
            current: visible,
        }
    }

    fn publish(&self, change: Option<StateChange<S>>) -> bool {
        match change {
            Some(change) => {
                self.inner.subject.notify(&change);
                true
            }
            None => false,
        }
    }

    /// Settles everything the store holds for `key`: queued writes,
    /// optimistic layers and completion callbacks.
    fn resolve(&self, key: &str, resolution: Resolution) {
        let (change, endings) = {
            let _writer = lock(&self.inner.writer);
            let (queued, endings, layers) = {
                let mut core = lock(&self.inner.core);
                let queued = core.queues.remove(key).unwrap_or_default();
                let endings = core.endings.remove(key).unwrap_or_default();
                let layers = core.drop_layers(key);
                // Operations still running for this generation must not write
                // once it has been rolled back.
                if matches!(resolution, Resolution::Fail(_))
                    && self
                        .inner
                        .transitions
                        .is_happening_unique(&TransitionPath::from(key))
                {
                    core.failed.insert(key.to_string());
                }
                (queued, endings, layers)
            };
            // Writes of a dispatch that was superseded within the generation
            // do not count.
            let setters: Vec<Setter<S>> = queued
                .into_iter()
                .filter(|(controller, _)| !controller.is_cancelled())
                .map(|(_, setter)| setter)
                .collect();
            let change = if matches!(resolution, Resolution::Commit) && !setters.is_empty() {
                Some(self.write(&setters, Some(key)))
            } else if layers {
                Some(self.refresh(&mut lock(&self.inner.core)))
            } else {
                None
            };
            (change, endings)
        };

        let outcome = match resolution {
            Resolution::Commit => {
                debug!(store = %self.inner.name, transition = %key, "transition committed");
                Settled::Completed(())
            }
            Resolution::Fail(error) => {
                warn!(store = %self.inner.name, transition = %key, error = %error, "transition rolled back");
                if key == BOOTSTRAP {
                    self.inner.errors.set_bootstrap(error.clone());
                }
                self.handle_error(&error);
                self.inner.internal.announce(LifecycleEvent::TransitionFailed {
                    key: key.to_string(),
                    error: error.clone(),
                });
                Settled::Failed(error)
            }
            Resolution::Cancel => {
                info!(store = %self.inner.name, transition = %key, "transition superseded");
                self.inner.internal.announce(LifecycleEvent::TransitionCancelled {
                    key: key.to_string(),
                });
                Settled::Cancelled
            }
        };
        for (controller, end) in endings {
            if controller.is_cancelled() {
                end(&Settled::Cancelled);
            } else {
                end(&outcome);
            }
        }
        self.publish(change);
    }

    /// Cleans up keys whose counters reached zero without their done
    /// callback taking care of them.
    fn sweep(&self, drained: &[String], policy: CleanupPolicy) {
        for key in drained {
            let (failed, leftover) = {
                let mut core = lock(&self.inner.core);
                let failed = core.failed.remove(key);
                core.generations.remove(key);
                let leftover = core.queues.contains_key(key)
                    || core.endings.contains_key(key)
                    || core.optimistic.iter().any(|(owner, _)| owner == key);
                (failed, leftover)
            };
            if !leftover {
                continue;
            }
            let resolution = if !failed && policy == CleanupPolicy::RunEffects {
                Resolution::Commit
            } else {
                Resolution::Cancel
            };
            self.resolve(key, resolution);
        }
    }
}
