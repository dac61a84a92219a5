//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use nebula_guard::prelude::*;
//!
//! let name = nebula_guard::argument("alice").named("name");
//! name.not_empty()?;
//! ```

pub use crate::argument::Argument;
pub use crate::checks::not_all_null;
pub use crate::correction::Correction;
pub use crate::disposer::Dispose;
pub use crate::error::{BoxError, FailureKind, GuardError, ValidationFailure};
pub use crate::observer::{Observer, observer};
pub use crate::presence::Presence;
pub use crate::scope::{DisposeGuard, Scope};
