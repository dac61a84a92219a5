//! Check / correct / recheck
//!
//! A soft precondition: if the check chain rejects the argument, a corrector
//! gets one chance to produce a replacement value. The corrector always sees
//! the original argument, never a value the chain rejected halfway through.
//!
//! ```rust,ignore
//! let count = nebula_guard::argument(4)
//!     .named("count")
//!     .correction(|a| a.min(5), |_| Ok(5))
//!     .with_recheck()
//!     .run()?;
//! assert!(count.is_modified());
//! ```

use std::fmt;

use crate::argument::Argument;
use crate::error::{BoxError, FailureKind, GuardError, SharedError, ValidationFailure};

type MessageFn<T> = Box<dyn FnOnce(&T) -> String>;

/// A pending check/correct/recheck run over one argument.
///
/// Built with [`Argument::correction`]; nothing is evaluated until
/// [`run`](Self::run).
pub struct Correction<T, C, F> {
    argument: Argument<T>,
    check: C,
    correct: F,
    message: Option<MessageFn<T>>,
    recheck: bool,
}

impl<T, C, F> Correction<T, C, F>
where
    C: for<'a> Fn(&'a Argument<T>) -> Result<&'a Argument<T>, GuardError>,
    F: FnOnce(&Argument<T>) -> Result<T, BoxError>,
{
    /// Sets the message used when the corrector fails.
    ///
    /// The factory receives the original value.
    #[must_use]
    pub fn with_message<M>(mut self, message: M) -> Self
    where
        M: FnOnce(&T) -> String + 'static,
    {
        self.message = Some(Box::new(message));
        self
    }

    /// Runs the check chain again on the corrected argument.
    ///
    /// A failure there propagates; there is no second correction.
    #[must_use]
    pub fn with_recheck(mut self) -> Self {
        self.recheck = true;
        self
    }

    /// Runs the protocol.
    ///
    /// Returns the original argument if the chain accepts it, otherwise the
    /// corrected (modified) argument. Only validation failures trigger a
    /// correction; disposed-scope and observer errors propagate as they are.
    pub fn run(self) -> Result<Argument<T>, GuardError> {
        let Self {
            argument,
            check,
            correct,
            message,
            recheck,
        } = self;

        let failure = match check(&argument).map(drop) {
            Ok(()) => return Ok(argument),
            Err(GuardError::Validation(failure)) => failure,
            Err(other) => return Err(other),
        };
        tracing::trace!(
            argument = %argument.name(),
            kind = %failure.kind(),
            "check failed, attempting correction"
        );

        let corrected = match correct(&argument) {
            Ok(value) => argument.modify(value),
            Err(cause) => {
                let message = match message {
                    Some(message) => message(argument.value()),
                    None => format!("{} is invalid and could not be corrected.", argument.name()),
                };
                let failure = ValidationFailure::new(
                    FailureKind::Correction,
                    argument.name().into_owned(),
                    message,
                )
                .with_cause(SharedError::from(cause));
                return Err(argument.exception(failure));
            }
        };

        if recheck {
            check(&corrected).map(drop)?;
        }
        Ok(corrected)
    }
}

impl<T> Argument<T> {
    /// Starts a check/correct/recheck run over this argument.
    pub fn correction<C, F>(self, check: C, correct: F) -> Correction<T, C, F>
    where
        C: for<'a> Fn(&'a Argument<T>) -> Result<&'a Argument<T>, GuardError>,
        F: FnOnce(&Argument<T>) -> Result<T, BoxError>,
    {
        Correction {
            argument: self,
            check,
            correct,
            message: None,
            recheck: false,
        }
    }

    /// Checks the argument and corrects it once if the check fails.
    ///
    /// Shorthand for `self.correction(check, correct).run()`: default
    /// message, no recheck.
    pub fn soft<C, F>(self, check: C, correct: F) -> Result<Argument<T>, GuardError>
    where
        C: for<'a> Fn(&'a Argument<T>) -> Result<&'a Argument<T>, GuardError>,
        F: FnOnce(&Argument<T>) -> Result<T, BoxError>,
    {
        self.correction(check, correct).run()
    }
}

impl<T: fmt::Debug, C, F> fmt::Debug for Correction<T, C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correction")
            .field("argument", &self.argument)
            .field("recheck", &self.recheck)
            .field("custom_message", &self.message.is_some())
            .finish()
    }
}
