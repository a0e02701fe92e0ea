use crate::reducer::ClosureReducer;
use crate::store::StoreParts;
use crate::{
    Deps, Deriver, ErrorHandlers, HistoryHook, HistoryPolicy, Initializer, Inspector, Payload,
    PushContext, ReduceContext, Reducer, State, Store, StoreError,
};
use futures::future::FutureExt;
use std::future::Future;
use std::sync::Arc;

type Registrar<S> = Box<dyn FnOnce(&str, Inspector<S>) + Send>;

/// Collects the options of a [`Store`].
///
/// ```
/// use transitrx::{State, Store, StoreBuilder, StoreError};
///
/// #[derive(Clone, Default)]
/// struct Counter {
///     count: i32,
/// }
///
/// impl State for Counter {}
///
/// let store: Store<Counter, i32> = StoreBuilder::new(Counter::default(), |cx, by: i32| {
///     cx.set(move |s: &mut Counter| s.count += by);
///     Ok::<_, StoreError>(())
/// })
/// .build()
/// .unwrap();
///
/// store.dispatch(2);
/// assert_eq!(store.get_state().count, 2);
/// ```
pub struct StoreBuilder<S, P, D = ()> {
    name: String,
    initial: S,
    deps: D,
    reducer: Arc<dyn Reducer<S, P, D>>,
    deriver: Option<Deriver<S>>,
    initializer: Option<Initializer<S, D>>,
    history_hook: Option<HistoryHook<S>>,
    history_limit: Option<usize>,
    handlers: ErrorHandlers,
    registrar: Option<Registrar<S>>,
}

impl<S: State, P: Payload> StoreBuilder<S, P, ()> {
    pub fn new<F>(initial: S, reducer: F) -> Self
    where
        F: Fn(&mut ReduceContext<'_, S, P, ()>, P) -> Result<(), StoreError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_deps(initial, (), reducer)
    }
}

impl<S: State, P: Payload, D: Deps> StoreBuilder<S, P, D> {
    pub fn with_deps<F>(initial: S, deps: D, reducer: F) -> Self
    where
        F: Fn(&mut ReduceContext<'_, S, P, D>, P) -> Result<(), StoreError>
            + Send
            + Sync
            + 'static,
    {
        Self::from_reducer(initial, deps, ClosureReducer(reducer))
    }

    pub fn from_reducer(initial: S, deps: D, reducer: impl Reducer<S, P, D>) -> Self {
        Self {
            name: "store".to_string(),
            initial,
            deps,
            reducer: Arc::new(reducer),
            deriver: None,
            initializer: None,
            history_hook: None,
            history_limit: None,
            handlers: ErrorHandlers::default(),
            registrar: None,
        }
    }

    /// Name used in logs and handed to the registration hook.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Recomputes derived fields after the reducer's own `derive`.
    pub fn derive<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut S) + Send + Sync + 'static,
    {
        self.deriver = Some(Arc::new(f));
        self
    }

    /// Builds the starting state under the `bootstrap` transition. An error
    /// makes [`build`](Self::build) fail.
    pub fn on_construct<F>(mut self, f: F) -> Self
    where
        F: Fn(&D) -> Result<S, StoreError> + Send + Sync + 'static,
    {
        self.initializer = Some(Initializer::Sync(Arc::new(f)));
        self
    }

    /// Like [`on_construct`](Self::on_construct) but runs on the tokio
    /// runtime. Failures land in [`Store::errors`].
    pub fn on_construct_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, StoreError>> + Send + 'static,
    {
        self.initializer = Some(Initializer::Async(Arc::new(move |deps: Arc<D>| f(deps).boxed())));
        self
    }

    /// Chooses how each commit lands in history. The hook runs before the
    /// commit is visible and may read the store, but must not write to it.
    pub fn on_push_to_history<F>(mut self, f: F) -> Self
    where
        F: Fn(&PushContext<'_, S>) -> HistoryPolicy + Send + Sync + 'static,
    {
        self.history_hook = Some(Arc::new(f));
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn error_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.handlers.add(handler);
        self
    }

    /// Hands the host a read-only inspector once the store exists.
    pub fn on_register<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&str, Inspector<S>) + Send + 'static,
    {
        self.registrar = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<Store<S, P, D>, StoreError> {
        let store = Store::from_parts(StoreParts {
            name: self.name,
            initial: self.initial,
            reducer: self.reducer,
            deriver: self.deriver,
            deps: self.deps,
            initializer: self.initializer,
            history_hook: self.history_hook,
            history_limit: self.history_limit,
            handlers: self.handlers,
        });
        if let Some(register) = self.registrar {
            register(store.name(), store.inspector());
        }
        store.bootstrap()?;
        Ok(store)
    }
}

impl<S: State, P: Payload> Store<S, P, ()> {
    pub fn builder<F>(initial: S, reducer: F) -> StoreBuilder<S, P, ()>
    where
        F: Fn(&mut ReduceContext<'_, S, P, ()>, P) -> Result<(), StoreError>
            + Send
            + Sync
            + 'static,
    {
        StoreBuilder::new(initial, reducer)
    }
}
