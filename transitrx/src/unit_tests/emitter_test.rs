use crate::EventEmitter;
use std::sync::{Arc, Mutex};

fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (log.clone(), log)
}

// Test listeners receive payloads for their event only
#[tokio::test]
async fn test_on_and_emit() {
    let emitter: EventEmitter<String> = EventEmitter::new();
    let (log, sink) = recorder();
    emitter.on("got-token", move |token: &String| sink.lock().unwrap().push(token.clone()));

    assert_eq!(emitter.emit("got-token", &"abc".to_string()), 1);
    assert_eq!(emitter.emit("logout", &"ignored".to_string()), 0);
    assert_eq!(*log.lock().unwrap(), vec!["abc".to_string()]);
}

// Test once listeners are dropped after their first emission
#[tokio::test]
async fn test_once() {
    let emitter: EventEmitter<u32> = EventEmitter::new();
    let hits = Arc::new(Mutex::new(0));
    let sink = hits.clone();
    emitter.once("tick", move |n| *sink.lock().unwrap() += n);

    assert_eq!(emitter.listener_count("tick"), 1);
    emitter.emit("tick", &5);
    emitter.emit("tick", &5);
    assert_eq!(*hits.lock().unwrap(), 5);
    assert_eq!(emitter.listener_count("tick"), 0);
}

// Test off, clear and clear_all
#[tokio::test]
async fn test_removal() {
    let emitter: EventEmitter<()> = EventEmitter::new();
    let first = emitter.on("a", |_| {});
    emitter.on("a", |_| {});
    emitter.on("b", |_| {});

    assert!(emitter.off("a", first));
    assert!(!emitter.off("a", first));
    assert_eq!(emitter.listener_count("a"), 1);

    emitter.clear("a");
    assert_eq!(emitter.emit("a", &()), 0);
    emitter.clear_all();
    assert_eq!(emitter.emit("b", &()), 0);
}

// Test a listener may emit again without deadlocking
#[tokio::test]
async fn test_reentrant_emit() {
    let emitter: EventEmitter<String> = EventEmitter::new();
    let (log, sink) = recorder();
    let inner = emitter.clone();
    emitter.on("outer", move |_| {
        inner.emit("inner", &"nested".to_string());
    });
    emitter.on("inner", move |payload: &String| sink.lock().unwrap().push(payload.clone()));

    emitter.emit("outer", &String::new());
    assert_eq!(*log.lock().unwrap(), vec!["nested".to_string()]);
}
