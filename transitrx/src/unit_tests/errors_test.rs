use crate::{ErrorHandlers, ErrorsStore, Settled, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

// Test message extraction across variants
#[tokio::test]
async fn test_message() {
    assert_eq!(StoreError::msg("boom").message(), "boom");
    assert_eq!(StoreError::code("E42", "bad input").message(), "bad input");
    assert_eq!(StoreError::code("E42", "").message(), "E42");
    assert_eq!(StoreError::code("E42", "bad input").to_string(), "[E42] bad input");
    assert_eq!(StoreError::code("E42", "x").error_code(), Some("E42"));
    assert_eq!(StoreError::source_error(DiskFull).message(), "disk full");
    assert_eq!(StoreError::from("plain"), StoreError::msg("plain"));
}

// Test results convert into tagged outcomes
#[tokio::test]
async fn test_settled_from_result() {
    let ok: Settled<i32> = Ok::<_, StoreError>(3).into();
    let failed: Settled<i32> = Err::<i32, _>("nope").into();

    assert_eq!(ok.clone().value(), Some(3));
    assert!(failed.is_failed());
    assert_eq!(failed.error(), Some(&StoreError::msg("nope")));
    assert_eq!(ok.map(|n| n * 2), Settled::Completed(6));
    assert!(Settled::<()>::Cancelled.is_cancelled());
}

// Test handlers are called in order and can be removed
#[tokio::test]
async fn test_error_handlers() {
    let handlers = ErrorHandlers::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = calls.clone();
    let id = handlers.add(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    handlers.handle(&StoreError::msg("one"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(handlers.remove(id));
    assert!(handlers.is_empty());
    handlers.handle(&StoreError::msg("logged only"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// Test the errors store notifies subscribers on change
#[tokio::test]
async fn test_errors_store() {
    let errors = ErrorsStore::new();
    let notified = Arc::new(AtomicUsize::new(0));
    let sink = notified.clone();
    let _subscription = errors.subscribe(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    errors.set_bootstrap(StoreError::msg("init failed"));
    assert_eq!(errors.bootstrap(), Some(StoreError::msg("init failed")));
    errors.clear_bootstrap();
    errors.clear_bootstrap();
    assert_eq!(errors.state().bootstrap, None);
    assert_eq!(notified.load(Ordering::SeqCst), 2);
}
