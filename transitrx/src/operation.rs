use crate::{StoreError, TransitionPath};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OperationKind {
    Promise,
    Timer,
}

/// Describes one asynchronous unit of work bound to a transition.
///
/// Two `Operation` values describe the same work exactly when their ids
/// match; state that stores an operation handle is compared that way by the
/// diff engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Operation {
    id: u64,
    kind: OperationKind,
    label: Option<String>,
    created_at: DateTime<Utc>,
    transition: Option<TransitionPath>,
}

impl Operation {
    pub(crate) fn new(
        kind: OperationKind,
        label: Option<String>,
        transition: Option<TransitionPath>,
    ) -> Self {
        Self {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            label,
            created_at: Utc::now(),
            transition,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transition(&self) -> Option<&TransitionPath> {
        self.transition.as_ref()
    }

    pub fn is_same(&self, other: &Operation) -> bool {
        self.id == other.id
    }
}

/// How a unit of work ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Completed(T),
    Failed(StoreError),
    /// Aborted through its controller, usually by a newer dispatch.
    Cancelled,
}

impl<T> Settled<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Settled::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Settled::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Settled::Cancelled)
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Settled::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Settled::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> Settled<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Settled::Completed(value) => Settled::Completed(f(value)),
            Settled::Failed(error) => Settled::Failed(error),
            Settled::Cancelled => Settled::Cancelled,
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T>
where
    E: Into<StoreError>,
{
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => Settled::Completed(value),
            Err(error) => Settled::Failed(error.into()),
        }
    }
}
