use crate::{has_changed, path, Operation, OperationKind, Selector};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
struct Snapshot {
    count: i32,
    shared: Arc<Vec<i32>>,
    request: Option<Operation>,
}

// Test value selectors compare by equality
#[tokio::test]
async fn test_value_selector() {
    let prev = Snapshot::default();
    let next = Snapshot {
        count: 1,
        ..prev.clone()
    };
    let selectors = [Selector::value(|s: &Snapshot| &s.count)];

    assert!(has_changed(&prev, &next, &selectors));
    assert!(!has_changed(&prev, &prev.clone(), &selectors));
}

// Test shared selectors compare by identity
#[tokio::test]
async fn test_shared_selector() {
    let prev = Snapshot::default();
    let same = prev.clone();
    let rebuilt = Snapshot {
        shared: Arc::new(Vec::new()),
        ..prev.clone()
    };
    let selectors = [Selector::shared(|s: &Snapshot| &s.shared)];

    assert!(!has_changed(&prev, &same, &selectors));
    assert!(has_changed(&prev, &rebuilt, &selectors));
}

// Test operation selectors treat the same in-flight work as unchanged
#[tokio::test]
async fn test_operation_selector() {
    let operation = Operation::new(OperationKind::Promise, None, Some(path!["load"]));
    let other = Operation::new(OperationKind::Promise, None, Some(path!["load"]));
    let idle = Snapshot::default();
    let loading = Snapshot {
        request: Some(operation.clone()),
        ..Snapshot::default()
    };
    let still_loading = Snapshot {
        count: 3,
        request: Some(operation),
        ..Snapshot::default()
    };
    let reloading = Snapshot {
        request: Some(other),
        ..Snapshot::default()
    };
    let selectors = [Selector::operation(|s: &Snapshot| s.request.as_ref())];

    assert!(has_changed(&idle, &loading, &selectors));
    assert!(!has_changed(&loading, &still_loading, &selectors));
    assert!(has_changed(&loading, &reloading, &selectors));
    assert!(!has_changed(&idle, &idle, &selectors));
}

// Test an empty selection never reports a change
#[tokio::test]
async fn test_empty_selection() {
    let prev = Snapshot::default();
    let next = Snapshot {
        count: 9,
        ..Snapshot::default()
    };
    assert!(!has_changed::<Snapshot>(&prev, &next, &[]));
    assert!(has_changed(
        &prev,
        &next,
        &[Selector::custom(|a: &Snapshot, b: &Snapshot| a.count < b.count)]
    ));
}

// Test operation identity is by id, not by contents
#[tokio::test]
async fn test_operation_identity() {
    let first = Operation::new(OperationKind::Timer, Some("a".to_string()), None);
    let second = Operation::new(OperationKind::Timer, Some("a".to_string()), None);
    assert!(!first.is_same(&second));
    assert!(first.is_same(&first.clone()));
    assert_eq!(first.label(), Some("a"));
}
