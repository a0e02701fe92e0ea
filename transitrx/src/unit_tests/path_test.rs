use crate::{path, TransitionPath, BOOTSTRAP};

// Test keys and prefixes of a hierarchical path
#[tokio::test]
async fn test_keys() {
    let path = path!["todo", 7, "toggle"];
    assert_eq!(path.key(), "todo:7:toggle");
    assert_eq!(path.prefix_keys(), vec!["todo", "todo:7", "todo:7:toggle"]);
    assert_eq!(path.to_string(), "todo:7:toggle");
    assert_eq!(path.len(), 3);
}

// Test conversions agree with the macro
#[tokio::test]
async fn test_conversions() {
    assert_eq!(TransitionPath::from("todo:7"), path!["todo", "7"]);
    assert_eq!(TransitionPath::from(["todo", "7"]), path!["todo", 7]);
    assert_eq!(TransitionPath::from(""), path![]);
    assert_eq!(TransitionPath::bootstrap().key(), BOOTSTRAP);
}

// Test navigation helpers
#[tokio::test]
async fn test_navigation() {
    let todo = path!["todo"];
    let toggle = todo.child(7).child("toggle");

    assert!(toggle.starts_with(&todo));
    assert!(!todo.starts_with(&toggle));
    assert_eq!(toggle.parent(), Some(path!["todo", 7]));
    assert_eq!(todo.parent(), None);
}
