mod action;
mod builder;
mod diff;
mod effect;
mod emitter;
mod errors;
mod history;
mod lifecycle;
mod operation;
mod path;
mod reducer;
mod setter;
mod store;
mod subject;
mod transitions;
pub mod filters;
pub mod macros;

#[cfg(test)]
mod unit_tests;

pub use action::*;
pub use builder::*;
pub use diff::*;
pub use effect::*;
pub use emitter::*;
pub use errors::*;
pub use history::*;
pub use lifecycle::*;
pub use operation::*;
pub use path::*;
pub use reducer::*;
pub use setter::*;
pub use store::*;
pub use subject::*;
pub use transitions::*;

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait State: Clone + Send + Sync + 'static {}

/// Anything that can travel through `dispatch` as an action payload.
pub trait Payload: Debug + Send + 'static {}
impl<T: Debug + Send + 'static> Payload for T {}

/// Dependency bag threaded into reducers and effects.
pub trait Deps: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Deps for T {}

// Writes are folded into a scratch copy before being stored, so a panicking
// setter leaves the guarded data consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
