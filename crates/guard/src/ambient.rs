//! Ambient interception
//!
//! An opt-in, per-flow "current observer" for callers that do not want to
//! thread a [`Scope`](crate::Scope) through their call chain. It is
//! independent of the scope tree: arguments created through a scope, or
//! through [`crate::argument`], never consult it. Only arguments created with
//! [`argument`] pick up the ambient observer, captured at creation time.
//!
//! # Flows
//!
//! Outside an async flow the current frame lives in thread-local storage.
//! Inside [`scope`] or [`flow`] (feature `async`) it lives in a tokio
//! task-local and survives `.await` points; concurrent flows never see each
//! other's frames.
//!
//! ```rust,ignore
//! use nebula_guard::{ambient, observer};
//!
//! let _guard = ambient::enter(Some(observer(|err| {
//!     tracing::warn!(%err, "rejected");
//!     Ok(())
//! })));
//! let port = ambient::argument(80).named("port");
//! assert!(port.min(1024).is_err()); // observer fired
//! ```

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::argument::Argument;
use crate::observer::Observer;

/// One entry in a flow's stack of ambient observers.
struct Frame {
    observer: Observer,
    previous: Option<Arc<Frame>>,
}

type Slot = RefCell<Option<Arc<Frame>>>;

thread_local! {
    static THREAD_FRAME: Slot = const { RefCell::new(None) };
}

#[cfg(feature = "async")]
tokio::task_local! {
    static TASK_FRAME: Slot;
}

/// Where a guard's frame was pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Thread,
    #[cfg(feature = "async")]
    Task,
}

#[cfg(feature = "async")]
fn active_storage() -> Storage {
    if TASK_FRAME.try_with(|_| ()).is_ok() {
        Storage::Task
    } else {
        Storage::Thread
    }
}

#[cfg(not(feature = "async"))]
fn active_storage() -> Storage {
    Storage::Thread
}

/// Runs `f` against the slot, or returns `None` if the slot is unreachable
/// (thread-local torn down, or a task-local guard dropped outside its task).
fn with_slot<R>(storage: Storage, f: impl FnOnce(&Slot) -> R) -> Option<R> {
    match storage {
        Storage::Thread => THREAD_FRAME.try_with(f).ok(),
        #[cfg(feature = "async")]
        Storage::Task => TASK_FRAME.try_with(f).ok(),
    }
}

fn current_frame() -> Option<Arc<Frame>> {
    with_slot(active_storage(), |slot| slot.borrow().clone()).flatten()
}

/// The observer of the innermost ambient frame in the current flow.
pub fn current_observer() -> Option<Observer> {
    current_frame().map(|frame| Arc::clone(&frame.observer))
}

/// Creates an argument whose failures go to the current ambient observer.
///
/// The argument is bound to the root scope. The observer is captured now;
/// leaving the ambient frame later does not detach it.
pub fn argument<T>(value: T) -> Argument<T> {
    match current_observer() {
        Some(observer) => crate::argument_with_observer(value, observer),
        None => crate::argument(value),
    }
}

// ============================================================================
// GUARD
// ============================================================================

/// Pushes an ambient frame for the current flow.
///
/// The previous frame is restored when the returned guard drops, on every
/// exit path including early returns and unwinding. Passing `None` pushes
/// nothing and returns an inert guard.
#[must_use = "the ambient frame ends when the guard is dropped"]
pub fn enter(observer: Option<Observer>) -> AmbientGuard {
    let Some(observer) = observer else {
        return AmbientGuard {
            restore: None,
            _not_send: PhantomData,
        };
    };

    let storage = active_storage();
    let previous = with_slot(storage, |slot| {
        let previous = slot.borrow().clone();
        *slot.borrow_mut() = Some(Arc::new(Frame {
            observer,
            previous: previous.clone(),
        }));
        previous
    })
    .flatten();
    AmbientGuard {
        restore: Some((storage, previous)),
        _not_send: PhantomData,
    }
}

/// Runs `f` with `observer` as the ambient observer.
pub fn scope_sync<R>(observer: Option<Observer>, f: impl FnOnce() -> R) -> R {
    let _guard = enter(observer);
    f()
}

/// RAII guard returned by [`enter`].
///
/// `!Send`: the frame belongs to the thread (or task poll) that pushed it.
pub struct AmbientGuard {
    restore: Option<(Storage, Option<Arc<Frame>>)>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        if let Some((storage, previous)) = self.restore.take() {
            with_slot(storage, |slot| *slot.borrow_mut() = previous);
        }
    }
}

impl fmt::Debug for AmbientGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientGuard")
            .field("active", &self.restore.is_some())
            .field("storage", &self.restore.as_ref().map(|(storage, _)| *storage))
            .finish()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("nested", &self.previous.is_some())
            .finish()
    }
}

// ============================================================================
// ASYNC FLOWS
// ============================================================================

/// Runs `future` as an isolated ambient flow with `observer` active.
///
/// The frame survives `.await` points, including work-stealing moves between
/// threads. Nested [`enter`] calls inside the flow push onto the flow's own
/// stack.
#[cfg(feature = "async")]
pub async fn scope<F: Future>(observer: Option<Observer>, future: F) -> F::Output {
    let inherited = current_frame();
    let frame = match observer {
        Some(observer) => Some(Arc::new(Frame {
            observer,
            previous: inherited,
        })),
        None => inherited,
    };
    TASK_FRAME.scope(RefCell::new(frame), future).await
}

/// Runs `future` as an isolated ambient flow inheriting the current frame.
#[cfg(feature = "async")]
pub async fn flow<F: Future>(future: F) -> F::Output {
    scope(None, future).await
}
