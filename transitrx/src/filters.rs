//! Ready-made `before_dispatch` policies.
//!
//! ```ignore
//! store.dispatch(
//!     Action::new(Msg::Search(query))
//!         .transition(["search"])
//!         .before_dispatch(filters::cancel_previous()),
//! );
//! ```

use crate::{Action, BeforeDispatch, Payload};
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

const THROTTLE_LAST: &str = "throttle.last";
const DEBOUNCE_SEQ: &str = "debounce.seq";

/// Aborts the in-flight generation of the same path, so only the newest
/// dispatch contributes its writes.
pub fn cancel_previous<P: Payload>(
) -> impl FnOnce(&BeforeDispatch<'_, P>, Action<P>) -> Option<Action<P>> + Send + 'static {
    |cx: &BeforeDispatch<'_, P>, action: Action<P>| {
        cx.abort_previous();
        Some(action)
    }
}

/// Drops the action while its path is still happening.
pub fn skip_while_happening<P: Payload>(
) -> impl FnOnce(&BeforeDispatch<'_, P>, Action<P>) -> Option<Action<P>> + Send + 'static {
    |cx: &BeforeDispatch<'_, P>, action: Action<P>| {
        if cx.is_happening() {
            trace!(transition = ?cx.path().map(|p| p.key()), "skipped, already happening");
            return None;
        }
        Some(action)
    }
}

/// Lets one action per `window` through; the rest are dropped. Actions
/// without a transition always pass.
pub fn throttle<P: Payload>(
    window: Duration,
) -> impl FnOnce(&BeforeDispatch<'_, P>, Action<P>) -> Option<Action<P>> + Send + 'static {
    move |cx: &BeforeDispatch<'_, P>, action: Action<P>| {
        let Some(meta) = cx.meta() else {
            return Some(action);
        };
        let now = cx.started_at().timestamp_millis();
        let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let last = meta.get(THROTTLE_LAST).and_then(|value| value.as_i64());
        if last.is_some_and(|last| now.saturating_sub(last) < window) {
            trace!(transition = ?cx.path().map(|p| p.key()), "throttled");
            return None;
        }
        meta.insert(THROTTLE_LAST, now);
        Some(action)
    }
}

/// Holds the action back until `delay` passes without another action on
/// the same path, then dispatches the last one. Needs a tokio runtime.
pub fn debounce<P: Payload>(
    delay: Duration,
) -> impl FnOnce(&BeforeDispatch<'_, P>, Action<P>) -> Option<Action<P>> + Send + 'static {
    move |cx: &BeforeDispatch<'_, P>, action: Action<P>| {
        let Some(meta) = cx.meta().cloned() else {
            return Some(action);
        };
        let seq = meta
            .update(DEBOUNCE_SEQ, |current| {
                Value::from(current.and_then(Value::as_u64).unwrap_or(0) + 1)
            })
            .as_u64();
        let redispatch = cx.redispatch();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if meta.get(DEBOUNCE_SEQ).and_then(|value| value.as_u64()) == seq {
                redispatch.dispatch(action);
            }
        });
        None
    }
}
