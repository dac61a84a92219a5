//! Error types for guard failures
//!
//! Every fallible operation in the crate returns [`GuardError`]. Scope-tree
//! operations that can only fail because the scope is gone return the
//! narrower [`DisposedError`], which converts into `GuardError` with `?`.
//!
//! All error types are `Clone`: causes are shared behind an `Arc`, so the
//! error an observer sees is the same value the caller receives.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Boxed error returned by observers and correctors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared, cloneable error used as a failure cause.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// GUARD ERROR
// ============================================================================

/// Top-level error raised by guards, scopes and the correction protocol.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    /// An argument precondition (or a correction attempt) failed.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// The scope an operation targeted has been disposed.
    #[error(transparent)]
    Disposed(#[from] DisposedError),

    /// A failure observer raised its own error while being notified.
    ///
    /// This replaces the failure the observer was invoked with.
    #[error("failure observer raised: {0}")]
    Observer(#[source] SharedError),
}

impl GuardError {
    /// Wraps an observer's own failure.
    pub fn observer(error: BoxError) -> Self {
        Self::Observer(Arc::from(error))
    }

    /// Returns the validation failure, if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Validation(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns `true` for precondition and correction failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if the targeted scope was disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed(_))
    }

    /// Returns `true` if an observer's failure superseded the original error.
    #[must_use]
    pub fn is_observer(&self) -> bool {
        matches!(self, Self::Observer(_))
    }
}

// ============================================================================
// VALIDATION FAILURE
// ============================================================================

/// Classifies a [`ValidationFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The original, unmodified argument has no value.
    Null,
    /// The argument violates a precondition.
    ///
    /// Also reported for a missing value once the argument has been modified.
    Invalid,
    /// The argument is outside an allowed range.
    OutOfRange,
    /// The corrector failed while recovering from a failed check.
    Correction,
}

impl FailureKind {
    /// Stable code for programmatic handling.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Invalid => "invalid",
            Self::OutOfRange => "out_of_range",
            Self::Correction => "correction",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An argument precondition failure.
///
/// Carries the argument name, a message and an optional cause. Correction
/// failures are reported through the same type with
/// [`FailureKind::Correction`] and the corrector's error as cause.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (argument '{name}')")]
pub struct ValidationFailure {
    kind: FailureKind,
    name: Cow<'static, str>,
    message: Cow<'static, str>,
    #[source]
    cause: Option<SharedError>,
}

impl ValidationFailure {
    /// Creates a failure for the named argument.
    pub fn new(
        kind: FailureKind,
        name: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_cause(mut self, cause: impl Into<SharedError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The failure classification.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Name of the argument that failed.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The failure message, without the argument suffix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&SharedError> {
        self.cause.as_ref()
    }
}

// ============================================================================
// DISPOSED ERROR
// ============================================================================

/// Raised when a scope operation or an argument evaluation targets a disposed
/// scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("guard scope {scope_id} is disposed")]
pub struct DisposedError {
    scope_id: u64,
}

impl DisposedError {
    pub(crate) const fn new(scope_id: u64) -> Self {
        Self { scope_id }
    }

    /// Identifier of the disposed scope.
    #[must_use]
    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_validation_display_includes_name() {
        let failure = ValidationFailure::new(FailureKind::Invalid, "count", "Must be positive.");
        assert_eq!(failure.to_string(), "Must be positive. (argument 'count')");
        assert_eq!(failure.message(), "Must be positive.");
    }

    #[test]
    fn test_cause_is_exposed_as_source() {
        let cause: BoxError = "corrector blew up".into();
        let failure = ValidationFailure::new(FailureKind::Correction, "x", "Could not fix.")
            .with_cause(SharedError::from(cause));

        let source = failure.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("corrector blew up"));
    }

    #[test]
    fn test_disposed_converts_into_guard_error() {
        let err: GuardError = DisposedError::new(7).into();
        assert!(err.is_disposed());
        assert!(err.to_string().contains("scope 7"));
    }

    #[test]
    fn test_observer_error_is_distinct() {
        let err = GuardError::observer("boom".into());
        assert!(err.is_observer());
        assert!(!err.is_validation());
        assert!(err.as_validation().is_none());
    }
}
