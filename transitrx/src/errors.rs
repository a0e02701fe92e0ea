use crate::{lock, Subject, Subscription};
use futures_signals::signal::{Mutable, MutableSignalCloned};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::error;

/// Represents failures surfaced by the store.
///
/// Cancellation is deliberately absent: a superseded transition settles as
/// [`Settled::Cancelled`](crate::Settled::Cancelled) and never reaches the
/// error handlers.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// A failure described by a plain message.
    #[error("{0}")]
    Message(String),

    /// A failure carrying a machine readable code.
    #[error("[{code}] {message}")]
    Code { code: String, message: String },

    /// A failure wrapping another error value.
    #[error("{0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn msg(message: impl Into<String>) -> Self {
        StoreError::Message(message.into())
    }

    pub fn code(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Code {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn source_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Source(Arc::new(error))
    }

    /// Best-effort human readable text: the message if there is one,
    /// otherwise the code.
    pub fn message(&self) -> String {
        match self {
            StoreError::Message(message) => message.clone(),
            StoreError::Code { code, message } if message.is_empty() => code.clone(),
            StoreError::Code { message, .. } => message.clone(),
            StoreError::Source(source) => source.to_string(),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            StoreError::Code { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl PartialEq for StoreError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StoreError::Message(a), StoreError::Message(b)) => a == b,
            (
                StoreError::Code { code, message },
                StoreError::Code {
                    code: other_code,
                    message: other_message,
                },
            ) => code == other_code && message == other_message,
            (StoreError::Source(a), StoreError::Source(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            _ => false,
        }
    }
}

impl From<String> for StoreError {
    fn from(value: String) -> Self {
        StoreError::Message(value)
    }
}

impl From<&str> for StoreError {
    fn from(value: &str) -> Self {
        StoreError::Message(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::source_error(value)
    }
}

pub type ErrorHandler = Arc<dyn Fn(&StoreError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Sinks for errors nothing recovered from locally.
#[derive(Clone, Default)]
pub struct ErrorHandlers {
    handlers: Arc<Mutex<Vec<(HandlerId, ErrorHandler)>>>,
    next_id: Arc<AtomicU64>,
}

impl ErrorHandlers {
    pub fn add<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        self.add_shared(Arc::new(handler))
    }

    pub fn add_shared(&self, handler: ErrorHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.handlers).push((id, handler));
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = lock(&self.handlers);
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Routes `error` to every registered sink, or to the logging fallback
    /// when there are none.
    pub fn handle(&self, error: &StoreError) {
        let handlers: Vec<ErrorHandler> = lock(&self.handlers)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        if handlers.is_empty() {
            error!(error = %error.message(), code = ?error.error_code(), "unhandled store error");
            return;
        }
        for handler in handlers {
            handler(error);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorsState {
    /// The last failure of the store's initializer, if any.
    pub bootstrap: Option<StoreError>,
}

/// Observable holding the last bootstrap failure, for retry screens.
#[derive(Clone, Default)]
pub struct ErrorsStore {
    state: Mutable<ErrorsState>,
    subject: Subject<ErrorsState>,
}

impl ErrorsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ErrorsState {
        self.state.get_cloned()
    }

    pub fn bootstrap(&self) -> Option<StoreError> {
        self.state.lock_ref().bootstrap.clone()
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ErrorsState) + Send + Sync + 'static,
    {
        self.subject.subscribe(observer)
    }

    pub fn to_signal(&self) -> MutableSignalCloned<ErrorsState> {
        self.state.signal_cloned()
    }

    pub fn set_bootstrap(&self, error: StoreError) {
        self.replace(ErrorsState {
            bootstrap: Some(error),
        });
    }

    pub fn clear_bootstrap(&self) {
        if self.state.lock_ref().bootstrap.is_some() {
            self.replace(ErrorsState::default());
        }
    }

    fn replace(&self, next: ErrorsState) {
        self.state.set(next.clone());
        self.subject.notify(&next);
    }
}
