//! # nebula-guard
//!
//! Scoped argument guards with explicit failure interception.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nebula_guard::prelude::*;
//!
//! fn connect(port: u16) -> Result<(), GuardError> {
//!     nebula_guard::argument(port).named("port").min(1024)?.max(49151)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Scopes
//!
//! Preconditions fail by returning a [`GuardError`]. A [`Scope`] can carry an
//! [`Observer`] that sees each failure just before it propagates:
//!
//! ```rust,ignore
//! let scope = nebula_guard::begin_scope(Some(observer(|err| {
//!     tracing::warn!(%err, "argument rejected");
//!     Ok(())
//! })))?
//! .into_guard();
//!
//! let port = scope.argument(80)?.named("port");
//! let _ = port.min(1024); // observed
//! ```
//!
//! The observer is resolved from the scope an argument was created through,
//! never from its parent or children. Disposing a scope disposes every scope
//! created below it, last first; arguments of a disposed scope fail with
//! [`GuardError::Disposed`] without evaluating anything.
//!
//! ## Correction
//!
//! [`Argument::soft`] and [`Argument::correction`] run a check chain and give a
//! corrector one chance to replace a rejected value. See [`correction`].
//!
//! ## Ambient observers
//!
//! [`ambient`] offers an opt-in per-flow observer for code that cannot pass a
//! scope around. It is independent of the scope tree.
//!
//! ## Features
//!
//! - `async` (default): ambient flows that survive `.await` via tokio
//!   task-locals.

pub mod ambient;
pub mod argument;
pub mod checks;
pub mod config;
pub mod correction;
pub mod disposer;
pub mod error;
pub mod observer;
pub mod prelude;
pub mod presence;
pub mod scope;

pub use argument::Argument;
pub use checks::not_all_null;
pub use config::GuardConfig;
pub use correction::Correction;
pub use disposer::{Dispose, ScopeDisposer};
pub use error::{BoxError, DisposedError, FailureKind, GuardError, SharedError, ValidationFailure};
pub use observer::{Observer, observer};
pub use presence::{Presence, ValueShape};
pub use scope::{DisposeGuard, Scope};

/// Creates an argument bound to the root scope.
///
/// The root has no observer, so failures propagate untouched.
pub fn argument<T>(value: T) -> Argument<T> {
    Argument::bound(value, scope::root_node(), None)
}

/// Creates a root-bound argument whose failures go to `observer`.
///
/// The observer is attached to this argument only; it does not affect the
/// root scope or any other argument.
pub fn argument_with_observer<T>(value: T, observer: Observer) -> Argument<T> {
    Argument::bound(value, scope::root_node(), Some(observer))
}

/// Begins a child scope of the root.
///
/// # Errors
///
/// Never fails in practice, since the root cannot be disposed; the result
/// mirrors [`Scope::begin_scope`].
pub fn begin_scope(observer: Option<Observer>) -> Result<Scope, DisposedError> {
    Scope::root().begin_scope(observer)
}
