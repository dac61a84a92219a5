//! Reference preconditions
//!
//! A small set of preconditions built on the [`Argument`] contract. Each one
//! checks scope liveness, evaluates its predicate and, on failure, routes the
//! failure through [`Argument::exception`].
//!
//! Preconditions borrow the argument and return it again, so they chain:
//!
//! ```rust,ignore
//! let port = nebula_guard::argument(8080).named("port");
//! port.min(1024)?.max(49151)?;
//! ```

use std::fmt;

use crate::argument::Argument;
use crate::error::{FailureKind, GuardError, ValidationFailure};
use crate::presence::{self, Presence};

// ============================================================================
// NULLABILITY
// ============================================================================

impl<T: Presence> Argument<T> {
    /// Requires the value to be present.
    ///
    /// A missing value is reported as [`FailureKind::Null`] while the
    /// argument is unmodified and as [`FailureKind::Invalid`] after a
    /// modification.
    pub fn not_null(&self) -> Result<&Self, GuardError> {
        self.ensure(presence::has_value, |arg| {
            ValidationFailure::new(
                missing_kind(arg.is_modified()),
                arg.name().into_owned(),
                format!("{} cannot be null.", arg.name()),
            )
        })
    }

    /// Requires the value to be absent.
    pub fn null(&self) -> Result<&Self, GuardError> {
        self.ensure(
            |value| !presence::has_value(value),
            |arg| {
                ValidationFailure::new(
                    FailureKind::Invalid,
                    arg.name().into_owned(),
                    format!("{} must be null.", arg.name()),
                )
            },
        )
    }
}

impl<U> Argument<Option<U>> {
    /// Requires the optional value to be present and unwraps it.
    ///
    /// The returned argument keeps the name, flags and scope binding.
    pub fn not_null_value(mut self) -> Result<Argument<U>, GuardError> {
        self.ensure_live()?;
        match self.value_mut().take() {
            Some(value) => Ok(self.rebind(value)),
            None => {
                let message = format!("{} cannot be null.", self.name());
                Err(self.fail(missing_kind(self.is_modified()), message))
            }
        }
    }
}

/// Requires at least one of two arguments to be present.
///
/// Both scopes must be live. The failure is routed through `first`.
pub fn not_all_null<A: Presence, B: Presence>(
    first: &Argument<A>,
    second: &Argument<B>,
) -> Result<(), GuardError> {
    first.ensure_live()?;
    second.ensure_live()?;
    if first.has_value() || second.has_value() {
        return Ok(());
    }

    let names = format!("{}, {}", first.name(), second.name());
    let message = format!("At least one of {names} must have a value.");
    Err(first.exception(ValidationFailure::new(FailureKind::Null, names, message)))
}

fn missing_kind(modified: bool) -> FailureKind {
    if modified {
        FailureKind::Invalid
    } else {
        FailureKind::Null
    }
}

// ============================================================================
// RANGE
// ============================================================================

impl<T: PartialOrd + fmt::Display> Argument<T> {
    /// Requires the value to be greater than or equal to `minimum`.
    pub fn min(&self, minimum: T) -> Result<&Self, GuardError> {
        self.ensure(
            |value| *value >= minimum,
            |arg| {
                let message = if arg.is_secure() {
                    format!("{} is below the allowed minimum.", arg.name())
                } else {
                    format!(
                        "{} is {} but must be {} or greater.",
                        arg.name(),
                        arg.value(),
                        minimum
                    )
                };
                ValidationFailure::new(FailureKind::OutOfRange, arg.name().into_owned(), message)
            },
        )
    }

    /// Requires the value to be less than or equal to `maximum`.
    pub fn max(&self, maximum: T) -> Result<&Self, GuardError> {
        self.ensure(
            |value| *value <= maximum,
            |arg| {
                let message = if arg.is_secure() {
                    format!("{} is above the allowed maximum.", arg.name())
                } else {
                    format!(
                        "{} is {} but must be {} or less.",
                        arg.name(),
                        arg.value(),
                        maximum
                    )
                };
                ValidationFailure::new(FailureKind::OutOfRange, arg.name().into_owned(), message)
            },
        )
    }
}

// ============================================================================
// STRINGS
// ============================================================================

impl<T: AsRef<str>> Argument<T> {
    /// Requires the string to be empty.
    pub fn empty(&self) -> Result<&Self, GuardError> {
        self.ensure(
            |value| value.as_ref().is_empty(),
            |arg| {
                let message = if arg.is_secure() {
                    format!("{} must be empty.", arg.name())
                } else {
                    format!(
                        "{} must be empty, but was '{}'.",
                        arg.name(),
                        arg.value().as_ref()
                    )
                };
                ValidationFailure::new(FailureKind::Invalid, arg.name().into_owned(), message)
            },
        )
    }

    /// Requires the string to be non-empty.
    pub fn not_empty(&self) -> Result<&Self, GuardError> {
        self.ensure(
            |value| !value.as_ref().is_empty(),
            |arg| {
                ValidationFailure::new(
                    FailureKind::Invalid,
                    arg.name().into_owned(),
                    format!("{} cannot be empty.", arg.name()),
                )
            },
        )
    }
}

// ============================================================================
// CUSTOM
// ============================================================================

impl<T> Argument<T> {
    /// Requires `predicate` to hold for the value.
    ///
    /// `message` is only called on failure.
    pub fn require<P, M>(&self, predicate: P, message: M) -> Result<&Self, GuardError>
    where
        P: FnOnce(&T) -> bool,
        M: FnOnce(&T) -> String,
    {
        self.ensure(predicate, |arg| {
            ValidationFailure::new(
                FailureKind::Invalid,
                arg.name().into_owned(),
                message(arg.value()),
            )
        })
    }
}
