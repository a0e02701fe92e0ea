#![allow(dead_code)]

use std::time::Duration;
use transitrx::{ReduceContext, State, Store, StoreBuilder, StoreError};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Counter {
    pub count: i64,
    pub loading: bool,
}

impl State for Counter {}

#[derive(Debug, Clone)]
pub enum CounterMsg {
    Increment,
    IncrementAsync(Duration),
    Reset,
}

pub fn reduce(
    cx: &mut ReduceContext<'_, Counter, CounterMsg, ()>,
    msg: CounterMsg,
) -> Result<(), StoreError> {
    match msg {
        CounterMsg::Increment => cx.set(|s: &mut Counter| s.count += 1),
        CounterMsg::IncrementAsync(delay) => {
            cx.set_optimistic(|s: &mut Counter| s.loading = true);
            cx.promise(move |effect| async move {
                tokio::time::sleep(delay).await;
                effect.set(|s: &mut Counter| s.count += 1);
                Ok(())
            });
        }
        CounterMsg::Reset => cx.set(|s: &mut Counter| s.count = 0),
    }
    Ok(())
}

pub fn counter_store() -> Store<Counter, CounterMsg> {
    StoreBuilder::new(Counter::default(), reduce)
        .name("counter")
        .build()
        .expect("counter store builds")
}
