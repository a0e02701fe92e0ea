use crate::{ReduceContext, State, Store, StoreBuilder, StoreError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod diff_test;
mod emitter_test;
mod errors_test;
mod path_test;
mod subject_test;
mod transitions_test;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestState {
    pub count: i32,
    pub doubled: i32,
    pub items: Vec<String>,
    pub pending: Option<String>,
}

impl State for TestState {}

impl TestState {
    pub fn with_count(count: i32) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum Msg {
    Add(i32),
    Push(String),
    /// Adds after `delay` from inside an effect.
    AddLater(i32, Duration),
    /// Adds optimistically right away and for real after `delay`.
    AddOptimistic(i32, Duration),
    Fail(String),
    FailLater(String, Duration),
    /// Fans out into `n` `Add(1)` actions on the same draft.
    FanOut(i32),
}

pub fn reduce(cx: &mut ReduceContext<'_, TestState, Msg, ()>, msg: Msg) -> Result<(), StoreError> {
    match msg {
        Msg::Add(by) => cx.set(move |s: &mut TestState| s.count += by),
        Msg::Push(item) => cx.set(move |s: &mut TestState| s.items.push(item.clone())),
        Msg::AddLater(by, delay) => {
            cx.promise(move |effect| async move {
                tokio::time::sleep(delay).await;
                effect.set(move |s: &mut TestState| s.count += by);
                Ok(())
            });
        }
        Msg::AddOptimistic(by, delay) => {
            cx.set_optimistic(move |s: &mut TestState| s.count += by);
            cx.timer(delay, move |effect| {
                effect.set(move |s: &mut TestState| s.count += by);
                Ok(())
            });
        }
        Msg::Fail(reason) => return Err(StoreError::msg(reason)),
        Msg::FailLater(reason, delay) => {
            cx.promise(move |_effect| async move {
                tokio::time::sleep(delay).await;
                Err(StoreError::msg(reason))
            });
        }
        Msg::FanOut(n) => {
            for _ in 0..n {
                cx.dispatch(Msg::Add(1));
            }
        }
    }
    Ok(())
}

pub fn test_store() -> Store<TestState, Msg> {
    StoreBuilder::new(TestState::default(), reduce)
        .derive(|s: &mut TestState| s.doubled = s.count * 2)
        .build()
        .expect("store without initializer always builds")
}

/// Collects every error routed to the handler chain.
pub fn capture_errors(store: &Store<TestState, Msg>) -> Arc<Mutex<Vec<StoreError>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    store.add_error_handler(move |error| sink.lock().unwrap().push(error.clone()));
    errors
}
