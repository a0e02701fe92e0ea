use crate::{EventEmitter, Operation, Settled, StoreError};

/// Telemetry published on `store.internal().events`, for progress bars and
/// inspection tools.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    NewTransition { key: String },
    TransitionCompleted { key: String },
    TransitionFailed { key: String, error: StoreError },
    TransitionCancelled { key: String },
    OperationStarted(Operation),
    OperationSettled {
        operation: Operation,
        outcome: Settled<()>,
    },
}

impl LifecycleEvent {
    pub const NEW_TRANSITION: &'static str = "new-transition";
    pub const TRANSITION_COMPLETED: &'static str = "transition-completed";
    pub const TRANSITION_FAILED: &'static str = "transition-failed";
    pub const TRANSITION_CANCELLED: &'static str = "transition-cancelled";
    pub const OPERATION_STARTED: &'static str = "operation-started";
    pub const OPERATION_SETTLED: &'static str = "operation-settled";

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::NewTransition { .. } => Self::NEW_TRANSITION,
            LifecycleEvent::TransitionCompleted { .. } => Self::TRANSITION_COMPLETED,
            LifecycleEvent::TransitionFailed { .. } => Self::TRANSITION_FAILED,
            LifecycleEvent::TransitionCancelled { .. } => Self::TRANSITION_CANCELLED,
            LifecycleEvent::OperationStarted(_) => Self::OPERATION_STARTED,
            LifecycleEvent::OperationSettled { .. } => Self::OPERATION_SETTLED,
        }
    }
}

/// Channels meant for tooling rather than application logic.
#[derive(Clone, Default)]
pub struct Internal {
    pub events: EventEmitter<LifecycleEvent>,
}

impl Internal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce(&self, event: LifecycleEvent) -> usize {
        self.events.emit(event.name(), &event)
    }
}
