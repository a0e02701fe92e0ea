use crate::tracing_setup::tracing_init;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use transitrx::filters::{cancel_previous, debounce};
use transitrx::{
    path, Action, LifecycleEvent, ReduceContext, Selector, State, Store, StoreBuilder, StoreError,
};

mod tracing_setup;

#[derive(Debug, Clone, Default, PartialEq)]
struct SearchState {
    query: String,
    results: Vec<String>,
    searches: usize,
}

impl State for SearchState {}

#[derive(Debug, Clone)]
enum SearchMsg {
    Type(String),
    Search(String),
}

/// Fake index answering after a delay that shrinks with longer queries.
struct Catalog {
    words: Vec<&'static str>,
    boots: AtomicUsize,
}

impl Catalog {
    async fn find(&self, query: &str) -> Vec<String> {
        sleep(Duration::from_millis(400 / (query.len() as u64 + 1))).await;
        self.words
            .iter()
            .filter(|word| word.starts_with(query))
            .map(|word| word.to_string())
            .collect()
    }
}

fn reduce(
    cx: &mut ReduceContext<'_, SearchState, SearchMsg, Catalog>,
    msg: SearchMsg,
) -> Result<(), StoreError> {
    match msg {
        SearchMsg::Type(query) => {
            cx.set(move |state: &mut SearchState| state.query = query.clone());
        }
        SearchMsg::Search(query) => {
            cx.emit("search-started", json!({ "query": query }));
            cx.promise_as("search", move |effect| async move {
                let results = effect.deps().find(&query).await;
                effect.set(move |state: &mut SearchState| {
                    state.results = results.clone();
                    state.searches += 1;
                });
                Ok(())
            });
        }
    }
    Ok(())
}

fn build_store() -> Result<Store<SearchState, SearchMsg, Catalog>, StoreError> {
    let catalog = Catalog {
        words: vec!["rust", "rustc", "rustup", "ruby", "react", "redux"],
        boots: AtomicUsize::new(0),
    };
    StoreBuilder::with_deps(SearchState::default(), catalog, reduce)
        .name("search")
        .history_limit(16)
        .on_construct_async(|catalog: Arc<Catalog>| async move {
            sleep(Duration::from_millis(200)).await;
            if catalog.boots.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::code("E_WARMUP", "index still warming up"));
            }
            Ok(SearchState::default())
        })
        .on_register(|name, inspector| {
            debug!("registered store {name}: {:?}", inspector.inspect().map(|i| i.history_len));
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let store = build_store()?;
    store.internal().events.on(LifecycleEvent::NEW_TRANSITION, |event| {
        debug!("lifecycle: {:?}", event);
    });
    store.internal().events.on(LifecycleEvent::TRANSITION_COMPLETED, |event| {
        debug!("lifecycle: {:?}", event);
    });
    store.events().on("search-started", |payload| {
        info!("searching {}", payload["query"]);
    });

    store.ready().await;
    if let Some(error) = store.errors().bootstrap() {
        warn!("bootstrap failed: {}, retrying", error);
        store.rebootstrap()?;
        store.ready().await;
    }

    let _results = store.subscribe_selected(
        vec![Selector::value(|state: &SearchState| &state.results)],
        |state| info!("results for {:?}: {:?}", state.query, state.results),
    );

    // Keystrokes: the query commits immediately, searches are debounced
    // and only the newest one may land.
    for prefix in ["r", "ru", "rus", "rust"] {
        store.dispatch(SearchMsg::Type(prefix.to_string()));
        store.dispatch(
            Action::new(SearchMsg::Search(prefix.to_string()))
                .transition(["search"])
                .before_dispatch(debounce(Duration::from_millis(150))),
        );
        sleep(Duration::from_millis(50)).await;
    }
    sleep(Duration::from_millis(300)).await;
    store.settled(&path!["search"]).await;

    for prefix in ["re", "red"] {
        store.dispatch(
            Action::new(SearchMsg::Search(prefix.to_string()))
                .transition(["search"])
                .before_dispatch(cancel_previous()),
        );
    }
    store.settled(&path!["search"]).await;

    let state = store.get_state();
    info!("query={:?} results={:?} searches={}", state.query, state.results, state.searches);
    while store.undo() {
        debug!("undo -> {:?}", store.get_state().query);
    }
    info!("inspection: {:?}", store.inspect());
    Ok(())
}
