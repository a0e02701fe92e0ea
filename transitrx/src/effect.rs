use crate::store::Stamp;
use crate::{
    lock, Action, CleanupPolicy, Deps, EventEmitter, LifecycleEvent, Operation, OperationKind,
    Payload, Setter, Settled, State, Store, StoreError, TransitionPath,
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};

type PromiseBody<S, P, D> =
    Box<dyn FnOnce(Effect<S, P, D>) -> BoxFuture<'static, Result<(), StoreError>> + Send>;
type TimerBody<S, P, D> = Box<dyn FnOnce(&Effect<S, P, D>) -> Result<(), StoreError> + Send>;

pub(crate) enum Body<S, P, D> {
    Promise(PromiseBody<S, P, D>),
    Timer(Duration, TimerBody<S, P, D>),
}

pub(crate) struct Launch<S, P, D> {
    pub operation: Operation,
    pub body: Body<S, P, D>,
}

/// Handle an asynchronous continuation uses to talk to its store.
///
/// Writes made through [`Effect::set`] are held back until the continuation
/// completes; a cancelled or failed continuation contributes nothing.
pub struct Effect<S, P, D> {
    store: Store<S, P, D>,
    operation: Operation,
    transition: Option<TransitionPath>,
    stamp: Stamp,
    pending: Arc<Mutex<Vec<Setter<S>>>>,
}

impl<S, P, D> Clone for Effect<S, P, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            operation: self.operation.clone(),
            transition: self.transition.clone(),
            stamp: self.stamp.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<S: State, P: Payload, D: Deps> Effect<S, P, D> {
    pub fn set<F>(&self, f: F)
    where
        F: Fn(&mut S) + Send + Sync + 'static,
    {
        lock(&self.pending).push(Setter::new(f));
    }

    /// Committed state, without writes still pending anywhere.
    pub fn state(&self) -> S {
        self.store.get_state()
    }

    /// Dispatches through the public path. An action on this effect's own
    /// transition joins it instead of opening a new one.
    pub fn dispatch(&self, action: impl Into<Action<P>>) {
        let active = self.transition.as_ref().map(|path| (path, &self.stamp));
        self.store.dispatch_within(action.into(), active);
    }

    /// Starts a nested operation on the same transition and controller.
    pub fn promise<F, Fut>(&self, f: F) -> Operation
    where
        F: FnOnce(Effect<S, P, D>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let operation = Operation::new(OperationKind::Promise, None, self.transition.clone());
        launch(
            &self.store,
            Launch {
                operation: operation.clone(),
                body: Body::Promise(Box::new(move |effect: Effect<S, P, D>| f(effect).boxed())),
            },
            self.transition.clone(),
            self.stamp.clone(),
        );
        operation
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

    pub fn is_cancelled(&self) -> bool {
        self.stamp.controller.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.stamp.controller.cancelled()
    }

    pub fn signal(&self) -> &CancellationToken {
        &self.stamp.controller
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn transition(&self) -> Option<&TransitionPath> {
        self.transition.as_ref()
    }

    pub fn store(&self) -> &Store<S, P, D> {
        &self.store
    }

    fn settle(self, outcome: Settled<()>) {
        let setters = mem::take(&mut *lock(&self.pending));
        let store = &self.store;
        store.internal().announce(LifecycleEvent::OperationSettled {
            operation: self.operation.clone(),
            outcome: outcome.clone(),
        });
        match (outcome, &self.transition) {
            (Settled::Completed(()), Some(path)) => {
                debug!(operation = self.operation.id(), transition = %path, "operation completed");
                store.enqueue(path, &self.stamp, setters, Vec::new());
                store.transitions().done_key(path, CleanupPolicy::RunEffects);
            }
            (Settled::Completed(()), None) => {
                debug!(operation = self.operation.id(), "operation completed");
                store.commit(setters, None);
            }
            (Settled::Failed(error), Some(path)) => {
                warn!(operation = self.operation.id(), transition = %path, error = %error, "operation failed");
                if !store.transitions().emit_error(path, error.clone()) {
                    store.handle_error(&error);
                }
                store.transitions().done_key(path, CleanupPolicy::SkipEffects);
            }
            (Settled::Failed(error), None) => {
                warn!(operation = self.operation.id(), error = %error, "operation failed");
                store.handle_error(&error);
            }
            (Settled::Cancelled, Some(path)) => {
                // A live controller means a newer dispatch took over the
                // transition; only this operation's writes are dropped.
                let policy = if store.transitions().has_live_controller(path) {
                    CleanupPolicy::RunEffects
                } else {
                    CleanupPolicy::SkipEffects
                };
                info!(operation = self.operation.id(), transition = %path, ?policy, "operation superseded");
                store.transitions().done_key(path, policy);
            }
            (Settled::Cancelled, None) => {
                info!(operation = self.operation.id(), "operation superseded");
            }
        }
    }
}

/// Registers `launch` with its transition and spawns it on the runtime.
pub(crate) fn launch<S: State, P: Payload, D: Deps>(
    store: &Store<S, P, D>,
    launch: Launch<S, P, D>,
    transition: Option<TransitionPath>,
    stamp: Stamp,
) {
    let Launch { operation, body } = launch;
    let controller = stamp.controller.clone();
    if let Some(path) = &transition {
        store.transitions().add_key(path);
    }
    store
        .internal()
        .announce(LifecycleEvent::OperationStarted(operation.clone()));
    let effect = Effect {
        store: store.clone(),
        operation,
        transition,
        stamp,
        pending: Arc::new(Mutex::new(Vec::new())),
    };
    tokio::spawn(async move {
        let outcome = match body {
            Body::Promise(f) => {
                let computation = f(effect.clone());
                tokio::select! {
                    biased;
                    _ = controller.cancelled() => Settled::Cancelled,
                    result = computation => Settled::from(result),
                }
            }
            Body::Timer(delay, f) => {
                tokio::select! {
                    biased;
                    _ = controller.cancelled() => Settled::Cancelled,
                    _ = tokio::time::sleep(delay) => Settled::from(f(&effect)),
                }
            }
        };
        // A continuation that noticed the abort itself and bailed out with an
        // error is still a cancellation.
        let outcome = match outcome {
            Settled::Failed(_) if controller.is_cancelled() => Settled::Cancelled,
            other => other,
        };
        effect.settle(outcome);
    });
}
