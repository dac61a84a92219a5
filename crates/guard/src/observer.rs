//! Failure observers
//!
//! An observer is an advisory hook: it sees a failure just before the caller
//! raises it and cannot suppress it. If the observer fails, its own error is
//! raised instead.

use std::sync::Arc;

use crate::error::{BoxError, GuardError};

/// Callback invoked with a failure before it propagates.
pub type Observer = Arc<dyn Fn(&GuardError) -> Result<(), BoxError> + Send + Sync>;

/// Wraps a closure as an [`Observer`].
///
/// ```rust,ignore
/// let scope = nebula_guard::begin_scope(Some(observer(|err| {
///     tracing::info!(%err, "argument rejected");
///     Ok(())
/// })));
/// ```
pub fn observer<F>(f: F) -> Observer
where
    F: Fn(&GuardError) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Runs `observer` with `error` and returns whichever error must propagate.
pub(crate) fn notify(observer: &Observer, error: GuardError) -> GuardError {
    match observer(&error) {
        Ok(()) => error,
        Err(raised) => {
            tracing::warn!(
                original = %error,
                observer_error = %raised,
                "failure observer raised; its error supersedes the original"
            );
            GuardError::observer(raised)
        }
    }
}
