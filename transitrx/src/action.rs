use crate::{EventEmitter, Meta, Settled, TransitionPath, Transitions};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type OnTransitionEnd = Box<dyn FnOnce(&Settled<()>) + Send>;

pub type BeforeDispatchFn<P> =
    Box<dyn FnOnce(&BeforeDispatch<'_, P>, Action<P>) -> Option<Action<P>> + Send>;

/// A payload plus the bookkeeping that decides how it flows through the store.
pub struct Action<P> {
    pub payload: P,
    pub transition: Option<TransitionPath>,
    before_dispatch: Option<BeforeDispatchFn<P>>,
    on_transition_end: Option<OnTransitionEnd>,
    controller: Option<CancellationToken>,
}

impl<P> Action<P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            transition: None,
            before_dispatch: None,
            on_transition_end: None,
            controller: None,
        }
    }

    pub fn transition(mut self, path: impl Into<TransitionPath>) -> Self {
        let path = path.into();
        self.transition = (!path.is_empty()).then_some(path);
        self
    }

    /// Runs `filter` before anything else. Returning `None` swallows the
    /// action; returning an action dispatches that one instead.
    pub fn before_dispatch<F>(mut self, filter: F) -> Self
    where
        F: FnOnce(&BeforeDispatch<'_, P>, Action<P>) -> Option<Action<P>> + Send + 'static,
    {
        self.before_dispatch = Some(Box::new(filter));
        self
    }

    /// Called once the action's transition commits, fails or is cancelled.
    /// Actions without a transition get it right after their own commit.
    pub fn on_transition_end<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Settled<()>) + Send + 'static,
    {
        self.on_transition_end = Some(Box::new(callback));
        self
    }

    /// Uses `controller` as the transition's abort controller.
    pub fn controller(mut self, controller: CancellationToken) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn path(&self) -> Option<&TransitionPath> {
        self.transition.as_ref()
    }

    pub(crate) fn take_before_dispatch(&mut self) -> Option<BeforeDispatchFn<P>> {
        self.before_dispatch.take()
    }

    pub(crate) fn into_parts(self) -> ActionParts<P> {
        ActionParts {
            payload: self.payload,
            transition: self.transition,
            on_transition_end: self.on_transition_end,
            controller: self.controller,
        }
    }
}

impl<P> From<P> for Action<P> {
    fn from(payload: P) -> Self {
        Action::new(payload)
    }
}

impl<P: Debug> Debug for Action<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("payload", &self.payload)
            .field("transition", &self.transition)
            .field("before_dispatch", &self.before_dispatch.is_some())
            .field("on_transition_end", &self.on_transition_end.is_some())
            .field("controller", &self.controller.is_some())
            .finish()
    }
}

pub(crate) struct ActionParts<P> {
    pub payload: P,
    pub transition: Option<TransitionPath>,
    pub on_transition_end: Option<OnTransitionEnd>,
    pub controller: Option<CancellationToken>,
}

/// Sends an action back through the store later, e.g. after a debounce.
pub struct Redispatch<P>(Arc<dyn Fn(Action<P>) + Send + Sync>);

impl<P> Clone for Redispatch<P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<P> Redispatch<P> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(Action<P>) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn dispatch(&self, action: Action<P>) {
        (self.0)(action)
    }
}

/// What a `before_dispatch` filter can see and touch.
pub struct BeforeDispatch<'a, P> {
    pub(crate) path: Option<&'a TransitionPath>,
    pub(crate) transitions: &'a Transitions,
    pub(crate) events: &'a EventEmitter<Value>,
    pub(crate) meta: Option<Meta>,
    pub(crate) redispatch: Redispatch<P>,
    pub(crate) started_at: DateTime<Utc>,
}

impl<P> BeforeDispatch<'_, P> {
    pub fn path(&self) -> Option<&TransitionPath> {
        self.path
    }

    pub fn transitions(&self) -> &Transitions {
        self.transitions
    }

    pub fn events(&self) -> &EventEmitter<Value> {
        self.events
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub fn redispatch(&self) -> Redispatch<P> {
        self.redispatch.clone()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_happening(&self) -> bool {
        self.path
            .is_some_and(|path| self.transitions.is_happening_unique(path))
    }

    /// Cancels the controller of an in-flight transition on the same path.
    pub fn abort_previous(&self) -> bool {
        match self.path {
            Some(path) if self.transitions.is_happening_unique(path) => {
                self.transitions.abort(path)
            }
            _ => false,
        }
    }
}
