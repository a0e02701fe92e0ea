use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A recorded write against the state.
///
/// Setters are re-applicable: the same setter mutates the reducer's draft
/// right away and is folded again onto committed state when its transition
/// resolves. They run under the store lock and must not call back into the
/// store.
pub struct Setter<S>(Arc<dyn Fn(&mut S) + Send + Sync>);

impl<S> Clone for Setter<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> Debug for Setter<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Setter")
    }
}

impl<S: 'static> Setter<S> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut S) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Overwrites the whole state with `value`.
    pub fn replace(value: S) -> Self
    where
        S: Clone + Send + Sync,
    {
        Self::new(move |state| *state = value.clone())
    }

    pub fn apply(&self, state: &mut S) {
        (self.0)(state)
    }
}

pub(crate) fn fold<S: 'static>(state: &mut S, setters: &[Setter<S>]) {
    for setter in setters {
        setter.apply(state);
    }
}
