use crate::Operation;
use std::sync::Arc;

/// One selected field of `S` together with the rule deciding whether it
/// changed between two snapshots.
pub struct Selector<S> {
    changed: Box<dyn Fn(&S, &S) -> bool + Send + Sync>,
}

impl<S: 'static> Selector<S> {
    /// Compares the selected field by value.
    pub fn value<T, F>(select: F) -> Self
    where
        T: PartialEq + ?Sized,
        F: Fn(&S) -> &T + Send + Sync + 'static,
    {
        Self {
            changed: Box::new(move |prev, next| select(prev) != select(next)),
        }
    }

    /// Compares a shared field by identity: a new allocation counts as a
    /// change even if its contents are equal.
    pub fn shared<T, F>(select: F) -> Self
    where
        T: ?Sized,
        F: Fn(&S) -> &Arc<T> + Send + Sync + 'static,
    {
        Self {
            changed: Box::new(move |prev, next| !Arc::ptr_eq(select(prev), select(next))),
        }
    }

    /// Compares a stored in-flight operation by its id, so the same work in
    /// flight never looks like a change.
    pub fn operation<F>(select: F) -> Self
    where
        F: Fn(&S) -> Option<&Operation> + Send + Sync + 'static,
    {
        Self {
            changed: Box::new(move |prev, next| match (select(prev), select(next)) {
                (Some(a), Some(b)) => !a.is_same(b),
                (None, None) => false,
                _ => true,
            }),
        }
    }

    pub fn custom<F>(changed: F) -> Self
    where
        F: Fn(&S, &S) -> bool + Send + Sync + 'static,
    {
        Self {
            changed: Box::new(changed),
        }
    }

    pub fn changed(&self, prev: &S, next: &S) -> bool {
        (self.changed)(prev, next)
    }
}

/// True if any selector reports a change. An empty selection never changes.
pub fn has_changed<S: 'static>(prev: &S, next: &S, selectors: &[Selector<S>]) -> bool {
    selectors.iter().any(|selector| selector.changed(prev, next))
}
