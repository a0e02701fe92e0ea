use crate::{path, CleanupPolicy, Internal, LifecycleEvent, StoreError, Transitions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let reader = count.clone();
    (count, move || reader.load(Ordering::SeqCst))
}

// Test every prefix of a path gets its own counter
#[tokio::test]
async fn test_prefix_counters() {
    let transitions = Transitions::default();
    transitions.add_key(&path!["todo", 7, "toggle"]);
    transitions.add_key(&path!["todo", 8]);

    assert_eq!(transitions.get(&path!["todo"]), 2);
    assert_eq!(transitions.get(&path!["todo", 7]), 1);
    assert_eq!(transitions.get(&path!["todo", 7, "toggle"]), 1);
    assert_eq!(transitions.get(&path!["todo", 8]), 1);

    assert!(transitions.is_happening(&path!["todo", 9]));
    assert!(!transitions.is_happening_unique(&path!["todo", 9]));
    assert!(!transitions.is_happening(&path!["user"]));
}

// Test done_key mirrors add_key and never goes negative
#[tokio::test]
async fn test_counter_symmetry() {
    let transitions = Transitions::default();
    let path = path!["a", "b"];
    for _ in 0..3 {
        transitions.add_key(&path);
    }
    for _ in 0..3 {
        transitions.done_key(&path, CleanupPolicy::RunEffects);
    }
    assert_eq!(transitions.get(&path), 0);
    assert!(transitions.snapshot().is_empty());

    assert!(transitions.done_key(&path, CleanupPolicy::RunEffects).is_empty());
    assert_eq!(transitions.get(&path!["a"]), 0);
    assert!(transitions.is_idle());
}

// Test the empty path is ignored
#[tokio::test]
async fn test_empty_path_is_noop() {
    let transitions = Transitions::default();
    transitions.add_key(&path![]);
    assert!(transitions.is_idle());
}

// Test the done callback fires once when the counter drains
#[tokio::test]
async fn test_done_callback_fires_once() {
    let transitions = Transitions::default();
    let path = path!["save"];
    let (count, fired) = counter();

    transitions.add_key(&path);
    transitions.add_key(&path);
    let done = count.clone();
    assert!(transitions.on_settled(
        &path,
        Box::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }),
        Box::new(|_| {}),
    ));
    assert!(!transitions.on_settled(&path, Box::new(|| {}), Box::new(|_| {})));

    transitions.done_key(&path, CleanupPolicy::RunEffects);
    assert_eq!(fired(), 0);
    let drained = transitions.done_key(&path, CleanupPolicy::RunEffects);
    assert_eq!(drained, vec!["save".to_string()]);
    assert_eq!(fired(), 1);
    assert!(!transitions.has_callbacks(&path));
}

// Test SkipEffects drops the done callback
#[tokio::test]
async fn test_skip_effects() {
    let transitions = Transitions::default();
    let path = path!["skip"];
    let (count, fired) = counter();
    transitions.add_key(&path);
    let done = count.clone();
    transitions.on_settled(
        &path,
        Box::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }),
        Box::new(|_| {}),
    );

    transitions.done_key(&path, CleanupPolicy::SkipEffects);
    assert_eq!(fired(), 0);
    assert!(!transitions.has_callbacks(&path));
}

// Test emit_error fires the error callback and clears both callbacks
#[tokio::test]
async fn test_emit_error() {
    let transitions = Transitions::default();
    let path = path!["load"];
    let received = Arc::new(Mutex::new(None));
    let sink = received.clone();
    transitions.add_key(&path);
    transitions.on_settled(
        &path,
        Box::new(|| panic!("done must not fire after an error")),
        Box::new(move |error| *sink.lock().unwrap() = Some(error)),
    );

    assert!(transitions.emit_error(&path, StoreError::msg("offline")));
    assert_eq!(*received.lock().unwrap(), Some(StoreError::msg("offline")));
    assert!(!transitions.emit_error(&path, StoreError::msg("again")));

    transitions.done_key(&path, CleanupPolicy::RunEffects);
    assert!(transitions.is_idle());
}

// Test a cancelled controller is replaced on the next add_key
#[tokio::test]
async fn test_controller_generations() {
    let transitions = Transitions::default();
    let path = path!["search"];
    transitions.add_key(&path);
    let first = transitions.controller(&path);
    assert!(transitions.has_live_controller(&path));

    assert!(transitions.abort(&path));
    assert!(first.is_cancelled());
    assert!(!transitions.abort(&path));
    assert!(!transitions.has_live_controller(&path));

    transitions.add_key(&path);
    let second = transitions.controller(&path);
    assert!(!second.is_cancelled());
    assert!(transitions.has_live_controller(&path));

    transitions.erase_key(&path, CleanupPolicy::SkipEffects);
    assert_eq!(transitions.get(&path), 0);
    assert!(!transitions.has_live_controller(&path));
}

// Test an installed controller is handed out for the key
#[tokio::test]
async fn test_set_controller() {
    let transitions = Transitions::default();
    let path = path!["upload"];
    let token = CancellationToken::new();
    transitions.set_controller(&path, token.clone());
    transitions.add_key(&path);

    assert!(transitions.has_live_controller(&path));
    transitions.abort(&path);
    assert!(token.is_cancelled());
    assert!(transitions.controller(&path).is_cancelled());

    transitions.erase_key(&path, CleanupPolicy::SkipEffects);
}

// Test metadata survives the counter draining
#[tokio::test]
async fn test_meta_outlives_generation() {
    let transitions = Transitions::default();
    let path = path!["toast"];
    transitions.add_key(&path);
    transitions.meta(&path).insert("toast_id", 42);
    transitions.done_key(&path, CleanupPolicy::RunEffects);

    let meta = transitions.meta(&path);
    assert_eq!(meta.get("toast_id"), Some(serde_json::json!(42)));
    let next = meta.update("seq", |current| {
        serde_json::json!(current.and_then(|v| v.as_u64()).unwrap_or(0) + 1)
    });
    assert_eq!(next, serde_json::json!(1));
}

// Test lifecycle announcements for a full generation
#[tokio::test]
async fn test_lifecycle_announcements() {
    let internal = Internal::new();
    let transitions = Transitions::new(internal.clone());
    let (new_count, new_fired) = counter();
    let (done_count, done_fired) = counter();
    internal.events.on(LifecycleEvent::NEW_TRANSITION, move |_| {
        new_count.fetch_add(1, Ordering::SeqCst);
    });
    internal.events.on(LifecycleEvent::TRANSITION_COMPLETED, move |_| {
        done_count.fetch_add(1, Ordering::SeqCst);
    });

    let path = path!["sync"];
    transitions.add_key(&path);
    transitions.add_key(&path);
    transitions.done_key(&path, CleanupPolicy::RunEffects);
    transitions.done_key(&path, CleanupPolicy::RunEffects);

    assert_eq!(new_fired(), 1);
    assert_eq!(done_fired(), 1);
}

// Test settled resolves once the path drains
#[tokio::test]
async fn test_settled_waits_for_drain() {
    let transitions = Transitions::default();
    let path = path!["wait"];
    transitions.add_key(&path);

    let background = transitions.clone();
    let release = path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        background.done_key(&release, CleanupPolicy::RunEffects);
    });

    tokio::time::timeout(Duration::from_secs(1), transitions.settled(&path))
        .await
        .expect("transition should drain");
    assert!(!transitions.is_happening(&path));
}
