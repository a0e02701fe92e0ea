mod common;

#[cfg(test)]
mod tests {
    use crate::common::{counter_store, Counter, CounterMsg};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use transitrx::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    // Observers never see part of a transition's writes.
    #[tokio::test]
    async fn test_atomic_commit() {
        let store = counter_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store.subscribe_selected(
            vec![Selector::value(|s: &Counter| &s.count)],
            move |s| sink.lock().unwrap().push(s.count),
        );

        for delay in [5, 10, 15] {
            store.dispatch(Action::new(CounterMsg::IncrementAsync(ms(delay))).transition(["bulk"]));
        }
        store.settled(&path!["bulk"]).await;

        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_counter_symmetry() {
        let store = counter_store();
        let paths = [path!["a"], path!["a", "b"], path!["c"]];
        for path in &paths {
            store.dispatch(Action::new(CounterMsg::IncrementAsync(ms(5))).transition(path.clone()));
            store.dispatch(Action::new(CounterMsg::Increment).transition(path.clone()));
        }
        for path in &paths {
            store.settled(path).await;
        }

        assert!(store.transitions().is_idle());
        assert!(store.transitions().snapshot().is_empty());
        assert_eq!(store.get_state().count, 6);
    }

    #[tokio::test]
    async fn test_cancellation_discards_effects() {
        let store = counter_store();
        let path = path!["slow"];
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        store.add_error_handler(move |error| sink.lock().unwrap().push(error.clone()));

        store.dispatch(Action::new(CounterMsg::IncrementAsync(ms(10))).transition(path.clone()));
        store.transitions().abort(&path);
        store.settled(&path).await;
        tokio::time::sleep(ms(20)).await;

        assert_eq!(store.get_state().count, 0);
        assert!(!store.view().loading);
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_monotonicity() {
        let store = counter_store();
        let mut previous = store.history().len();
        for msg in [CounterMsg::Increment, CounterMsg::Increment, CounterMsg::Reset] {
            store.dispatch(msg);
            let len = store.history().len();
            assert_eq!(len, previous + 1);
            previous = len;
        }

        assert!(store.undo());
        assert_eq!(store.history().len(), previous - 1);
        assert_eq!(store.redo_stack().len(), 1);

        store.dispatch(CounterMsg::Increment);
        assert!(store.redo_stack().is_empty());
        assert_eq!(store.get_state().count, 3);
    }

    #[tokio::test]
    async fn test_prefix_visibility() {
        let store = counter_store();
        store.dispatch(
            Action::new(CounterMsg::IncrementAsync(ms(10))).transition(["todo", "7", "toggle"]),
        );

        let transitions = store.transitions();
        assert!(transitions.is_happening(&path!["todo"]));
        assert!(transitions.is_happening(&path!["todo", 7]));
        assert!(transitions.is_happening(&path!["todo", 8]));
        assert!(transitions.is_happening_unique(&path!["todo"]));
        assert!(!transitions.is_happening_unique(&path!["todo", 8]));
        assert!(!transitions.is_happening(&path!["user"]));

        store.settled(&path!["todo"]).await;
        assert!(!transitions.is_happening(&path!["todo"]));
    }
}
