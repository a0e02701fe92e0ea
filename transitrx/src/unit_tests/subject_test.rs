use crate::Subject;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Test every observer is notified until it unsubscribes
#[tokio::test]
async fn test_subscribe_notify_unsubscribe() {
    let subject: Subject<usize> = Subject::new();
    let total = Arc::new(AtomicUsize::new(0));

    let sink = total.clone();
    let first = subject.subscribe(move |n| {
        sink.fetch_add(*n, Ordering::SeqCst);
    });
    let sink = total.clone();
    let _second = subject.subscribe(move |n| {
        sink.fetch_add(*n, Ordering::SeqCst);
    });

    assert_eq!(subject.notify(&2), 2);
    assert_eq!(total.load(Ordering::SeqCst), 4);

    assert!(first.unsubscribe());
    assert_eq!(subject.len(), 1);
    assert_eq!(subject.notify(&1), 1);
    assert_eq!(total.load(Ordering::SeqCst), 5);
}

// Test unsubscribing after the subject is gone
#[tokio::test]
async fn test_unsubscribe_after_drop() {
    let subject: Subject<()> = Subject::new();
    let subscription = subject.subscribe(|_| {});
    drop(subject);
    assert!(!subscription.unsubscribe());
}
