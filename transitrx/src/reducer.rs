use crate::effect::{Body, Launch};
use crate::{
    Deps, Effect, EventEmitter, Meta, Operation, OperationKind, Payload, Setter, State, Store,
    StoreError, TransitionPath,
};
use chrono::{DateTime, Utc};
use futures::future::FutureExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Turns actions into writes against a draft of the state.
pub trait Reducer<S: State, P, D>: Send + Sync + 'static {
    fn reduce(&self, cx: &mut ReduceContext<'_, S, P, D>, action: P) -> Result<(), StoreError>;

    /// Recomputes derived fields. Runs on every commit.
    fn derive(&self, _state: &mut S) {}
}

pub(crate) struct ClosureReducer<F>(pub F);

impl<S, P, D, F> Reducer<S, P, D> for ClosureReducer<F>
where
    S: State,
    P: Payload,
    D: Deps,
    F: Fn(&mut ReduceContext<'_, S, P, D>, P) -> Result<(), StoreError> + Send + Sync + 'static,
{
    fn reduce(&self, cx: &mut ReduceContext<'_, S, P, D>, action: P) -> Result<(), StoreError> {
        (self.0)(cx, action)
    }
}

/// Everything a reducer pass produced, applied by the store once the pass
/// succeeds.
pub(crate) struct ReduceOutput<S, P, D> {
    pub setters: Vec<Setter<S>>,
    pub optimistic: Vec<Setter<S>>,
    pub operations: Vec<Launch<S, P, D>>,
}

/// The reducer's view of one dispatch.
///
/// Writes go to a draft first; the store decides when they become committed
/// state. Nothing recorded here has an effect if the reducer returns an error.
pub struct ReduceContext<'a, S, P, D> {
    store: &'a Store<S, P, D>,
    draft: S,
    transition: Option<TransitionPath>,
    controller: CancellationToken,
    started_at: DateTime<Utc>,
    setters: Vec<Setter<S>>,
    optimistic: Vec<Setter<S>>,
    dispatched: VecDeque<P>,
    operations: Vec<Launch<S, P, D>>,
}

impl<'a, S: State, P: Payload, D: Deps> ReduceContext<'a, S, P, D> {
    pub(crate) fn new(
        store: &'a Store<S, P, D>,
        draft: S,
        transition: Option<TransitionPath>,
        controller: CancellationToken,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            draft,
            transition,
            controller,
            started_at,
            setters: Vec::new(),
            optimistic: Vec::new(),
            dispatched: VecDeque::new(),
            operations: Vec::new(),
        }
    }

    /// The draft, including writes made earlier in this pass.
    pub fn state(&self) -> &S {
        &self.draft
    }

    pub fn set<F>(&mut self, f: F)
    where
        F: Fn(&mut S) + Send + Sync + 'static,
    {
        self.set_with(Setter::new(f));
    }

    pub fn set_with(&mut self, setter: Setter<S>) {
        setter.apply(&mut self.draft);
        self.setters.push(setter);
    }

    /// Shows `f` to subscribers until the transition settles. Ignored for
    /// actions without a transition.
    pub fn set_optimistic<F>(&mut self, f: F)
    where
        F: Fn(&mut S) + Send + Sync + 'static,
    {
        self.optimistic.push(Setter::new(f));
    }

    /// Queues `payload` to run against the same draft before `dispatch`
    /// returns.
    pub fn dispatch(&mut self, payload: P) {
        self.dispatched.push_back(payload);
    }

    pub fn transition(&self) -> Option<&TransitionPath> {
        self.transition.as_ref()
    }

    pub fn signal(&self) -> &CancellationToken {
        &self.controller
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn meta(&self) -> Option<Meta> {
        self.transition
            .as_ref()
            .map(|path| self.store.transitions().meta(path))
    }

    pub fn deps(&self) -> &D {
        self.store.deps()
    }

    pub fn events(&self) -> &EventEmitter<Value> {
        self.store.events()
    }

    pub fn emit(&self, event: &str, payload: Value) -> usize {
        self.store.events().emit(event, &payload)
    }

    pub fn store(&self) -> &Store<S, P, D> {
        self.store
    }

    /// Starts `f` once the reducer pass succeeds, bound to this action's
    /// transition.
    pub fn promise<F, Fut>(&mut self, f: F) -> Operation
    where
        F: FnOnce(Effect<S, P, D>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        self.push_promise(None, f)
    }

    pub fn promise_as<F, Fut>(&mut self, label: impl Into<String>, f: F) -> Operation
    where
        F: FnOnce(Effect<S, P, D>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        self.push_promise(Some(label.into()), f)
    }

    /// Runs `f` after `delay` unless the transition is aborted first.
    pub fn timer<F>(&mut self, delay: Duration, f: F) -> Operation
    where
        F: FnOnce(&Effect<S, P, D>) -> Result<(), StoreError> + Send + 'static,
    {
        let operation = Operation::new(OperationKind::Timer, None, self.transition.clone());
        self.operations.push(Launch {
            operation: operation.clone(),
            body: Body::Timer(delay, Box::new(f)),
        });
        operation
    }

    fn push_promise<F, Fut>(&mut self, label: Option<String>, f: F) -> Operation
    where
        F: FnOnce(Effect<S, P, D>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let operation = Operation::new(OperationKind::Promise, label, self.transition.clone());
        self.operations.push(Launch {
            operation: operation.clone(),
            body: Body::Promise(Box::new(move |effect: Effect<S, P, D>| f(effect).boxed())),
        });
        operation
    }

    pub(crate) fn take_dispatched(&mut self) -> VecDeque<P> {
        std::mem::take(&mut self.dispatched)
    }

    pub(crate) fn into_output(self) -> ReduceOutput<S, P, D> {
        ReduceOutput {
            setters: self.setters,
            optimistic: self.optimistic,
            operations: self.operations,
        }
    }
}
