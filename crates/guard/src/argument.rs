//! Arguments under guard
//!
//! An [`Argument`] pairs a value with the metadata preconditions need: a
//! name, whether the value was modified after creation, whether the value is
//! sensitive, and the scope it was created through.
//!
//! The argument does not own its scope. Liveness and the observer are looked
//! up when a precondition is evaluated, not when the argument is created.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::config::GuardConfig;
use crate::error::{DisposedError, FailureKind, GuardError, ValidationFailure};
use crate::observer::{self, Observer};
use crate::presence::{self, Presence};
use crate::scope::{Scope, ScopeNode};

/// A value under guard.
pub struct Argument<T> {
    value: T,
    name: Option<Cow<'static, str>>,
    modified: bool,
    secure: bool,
    scope: Weak<ScopeNode>,
    scope_id: u64,
    observer_override: Option<Observer>,
}

impl<T> Argument<T> {
    pub(crate) fn bound(value: T, scope: &Arc<ScopeNode>, observer: Option<Observer>) -> Self {
        Self {
            value,
            name: None,
            modified: false,
            secure: false,
            scope: Arc::downgrade(scope),
            scope_id: scope.id(),
            observer_override: observer,
        }
    }

    /// Sets the argument name used in failure messages.
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the argument as sensitive.
    ///
    /// Failure messages of secure arguments leave out validation parameters.
    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// The guarded value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Consumes the argument, returning its value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// The argument name, or `"The <type> argument"` when none was given.
    pub fn name(&self) -> Cow<'_, str> {
        match &self.name {
            Some(name) => Cow::Borrowed(name.as_ref()),
            None => Cow::Owned(format!("The {} argument", std::any::type_name::<T>())),
        }
    }

    /// Returns `true` if the value was replaced after the argument was created.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns `true` if the argument is marked secure.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// The scope this argument was created through.
    pub fn scope(&self) -> Result<Scope, DisposedError> {
        let node = self
            .scope
            .upgrade()
            .ok_or(DisposedError::new(self.scope_id))?;
        node.ensure_live()?;
        Ok(Scope::from_node(node))
    }

    /// Fails if the argument's scope has been disposed.
    ///
    /// Every precondition calls this before looking at the value.
    pub fn ensure_live(&self) -> Result<(), GuardError> {
        self.scope().map(drop).map_err(GuardError::from)
    }

    /// Routes `error` through this argument's observer and returns the error
    /// the caller must raise.
    ///
    /// The observer is the explicit override, if one was given at creation,
    /// otherwise the observer of the originating scope. If the observer fails,
    /// its failure is returned instead. If the scope has been disposed, the
    /// disposed error is returned and no observer runs.
    pub fn exception(&self, error: impl Into<GuardError>) -> GuardError {
        let error = error.into();
        let observer = match self.resolve_observer() {
            Ok(observer) => observer,
            Err(disposed) => return disposed.into(),
        };

        if GuardConfig::current().trace_failures {
            tracing::debug!(
                argument = %self.name(),
                scope_id = self.scope_id,
                observed = observer.is_some(),
                error = %error,
                "routing guard failure"
            );
        }

        match observer {
            Some(observer) => observer::notify(&observer, error),
            None => error,
        }
    }

    fn resolve_observer(&self) -> Result<Option<Observer>, DisposedError> {
        let scope = self.scope()?;
        if let Some(observer) = &self.observer_override {
            return Ok(Some(Arc::clone(observer)));
        }
        scope.observer()
    }

    /// Builds a [`ValidationFailure`] for this argument and routes it.
    pub fn fail(&self, kind: FailureKind, message: impl Into<Cow<'static, str>>) -> GuardError {
        let failure = ValidationFailure::new(kind, self.name().into_owned(), message);
        self.exception(failure)
    }

    /// Evaluates a precondition against the value.
    ///
    /// Checks liveness first; a disposed scope fails without evaluating
    /// `passes`. On failure the error built by `failure` is routed through
    /// [`exception`](Self::exception).
    pub fn ensure<P, F>(&self, passes: P, failure: F) -> Result<&Self, GuardError>
    where
        P: FnOnce(&T) -> bool,
        F: FnOnce(&Self) -> ValidationFailure,
    {
        self.ensure_live()?;
        if passes(&self.value) {
            Ok(self)
        } else {
            Err(self.exception(failure(self)))
        }
    }

    /// Replaces the value, marking the argument as modified.
    ///
    /// The new argument keeps the name, secure flag and scope binding.
    #[must_use]
    pub fn modify<U>(self, value: U) -> Argument<U> {
        let mut argument = self.rebind(value);
        argument.modified = true;
        argument
    }

    /// Replaces the value with `f(value)`, marking the argument as modified.
    #[must_use]
    pub fn modify_with<U>(self, f: impl FnOnce(T) -> U) -> Argument<U> {
        let Self {
            value,
            name,
            modified: _,
            secure,
            scope,
            scope_id,
            observer_override,
        } = self;
        Argument {
            value: f(value),
            name,
            modified: true,
            secure,
            scope,
            scope_id,
            observer_override,
        }
    }

    /// Moves the metadata onto a new value without touching `modified`.
    pub(crate) fn rebind<U>(self, value: U) -> Argument<U> {
        Argument {
            value,
            name: self.name,
            modified: self.modified,
            secure: self.secure,
            scope: self.scope,
            scope_id: self.scope_id,
            observer_override: self.observer_override,
        }
    }
}

impl<T: Presence> Argument<T> {
    /// Returns `true` if the value is present, per its type's presence probe.
    pub fn has_value(&self) -> bool {
        presence::has_value(&self.value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Argument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Argument");
        s.field("name", &self.name());
        if self.secure {
            s.field("value", &"[SECURE]");
        } else {
            s.field("value", &self.value);
        }
        s.field("modified", &self.modified)
            .field("scope_id", &self.scope_id)
            .field("intercepted", &self.observer_override.is_some())
            .finish()
    }
}
