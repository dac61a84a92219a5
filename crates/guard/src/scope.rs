//! Guard scopes
//!
//! A [`Scope`] is a node in a tree of interception scopes. Each scope owns its
//! children through a [`ScopeDisposer`] and carries an optional failure
//! observer. The observer applies only to arguments created directly through
//! that scope: resolution never walks to a parent, child or sibling.
//!
//! The root scope lives for the whole process and is never disposed.
//!
//! ```rust,ignore
//! let scope = nebula_guard::begin_scope(Some(observer(|err| {
//!     eprintln!("{err}");
//!     Ok(())
//! })))?;
//!
//! let count = scope.argument(4)?.named("count");
//! assert!(count.min(5).is_err()); // observer fired
//!
//! scope.dispose();
//! assert!(count.min(5).unwrap_err().is_disposed());
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::ReentrantMutex;

use crate::argument::Argument;
use crate::disposer::{Dispose, ScopeDisposer};
use crate::error::DisposedError;
use crate::observer::Observer;

const LIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

static ROOT: LazyLock<Arc<ScopeNode>> = LazyLock::new(|| {
    Arc::new(ScopeNode {
        id: 0,
        depth: 0,
        parent: Weak::new(),
        observer: None,
        state: AtomicU8::new(LIVE),
        teardown_lock: ReentrantMutex::new(()),
        children: ScopeDisposer::new(),
    })
});

pub(crate) fn root_node() -> &'static Arc<ScopeNode> {
    LazyLock::force(&ROOT)
}

// ============================================================================
// SCOPE NODE
// ============================================================================

/// Shared state of a scope.
///
/// Held strongly by the parent's disposer and by [`Scope`] handles; arguments
/// only keep a weak reference.
pub struct ScopeNode {
    id: u64,
    depth: usize,
    parent: Weak<ScopeNode>,
    observer: Option<Observer>,
    state: AtomicU8,
    /// Held for the whole teardown; later `dispose` calls block on it until
    /// the subtree is drained.
    teardown_lock: ReentrantMutex<()>,
    children: ScopeDisposer,
}

impl ScopeNode {
    fn child_of(parent: &Arc<Self>, observer: Option<Observer>) -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            depth: parent.depth + 1,
            parent: Arc::downgrade(parent),
            observer,
            state: AtomicU8::new(LIVE),
            teardown_lock: ReentrantMutex::new(()),
            children: ScopeDisposer::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn is_root(&self) -> bool {
        self.id == 0
    }

    /// Disposing and disposed scopes both count as disposed.
    fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) != LIVE
    }

    pub(crate) fn ensure_live(&self) -> Result<(), DisposedError> {
        if self.is_disposed() {
            Err(DisposedError::new(self.id))
        } else {
            Ok(())
        }
    }

    pub(crate) fn observer(&self) -> Result<Option<Observer>, DisposedError> {
        self.ensure_live()?;
        Ok(self.observer.clone())
    }

    fn teardown(&self) {
        if self.is_root() {
            tracing::warn!("ignoring attempt to dispose the root guard scope");
            return;
        }
        // Reentrant: an item released by this teardown may dispose the scope
        // again on the same thread, which must return instead of deadlocking.
        let _teardown = self.teardown_lock.lock();
        if self
            .state
            .compare_exchange(LIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let released = self.children.dispose_all();
        self.state.store(DISPOSED, Ordering::Release);
        tracing::debug!(
            scope_id = self.id,
            depth = self.depth,
            released,
            "disposed guard scope"
        );
    }
}

impl Dispose for ScopeNode {
    fn dispose(&self) {
        self.teardown();
    }

    fn is_disposed(&self) -> bool {
        ScopeNode::is_disposed(self)
    }
}

impl fmt::Debug for ScopeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeNode")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("disposed", &self.is_disposed())
            .field("has_observer", &self.observer.is_some())
            .field("children", &self.children.len())
            .finish()
    }
}

// ============================================================================
// SCOPE HANDLE
// ============================================================================

/// Handle to a guard scope.
///
/// Cloning is cheap and yields a handle to the same scope. Dropping a handle
/// does not dispose the scope; call [`dispose`](Self::dispose) or use
/// [`into_guard`](Self::into_guard).
#[derive(Clone)]
pub struct Scope {
    node: Arc<ScopeNode>,
}

impl Scope {
    /// The process-wide root scope.
    pub fn root() -> Self {
        Self {
            node: Arc::clone(&ROOT),
        }
    }

    pub(crate) fn from_node(node: Arc<ScopeNode>) -> Self {
        Self { node }
    }

    /// Creates a child scope owned by this one.
    ///
    /// The child's observer applies only to arguments created through the
    /// child itself.
    pub fn begin_scope(&self, observer: Option<Observer>) -> Result<Scope, DisposedError> {
        self.node.ensure_live()?;

        let child = Arc::new(ScopeNode::child_of(&self.node, observer));
        if self.node.children.push(child.clone()).is_err() {
            // Lost a race with `dispose`; the child was released immediately.
            return Err(DisposedError::new(self.node.id));
        }

        tracing::trace!(
            scope_id = child.id,
            parent_id = self.node.id,
            depth = child.depth,
            observed = child.observer.is_some(),
            "began guard scope"
        );
        Ok(Self { node: child })
    }

    /// Creates an argument bound to this scope.
    pub fn argument<T>(&self, value: T) -> Result<Argument<T>, DisposedError> {
        self.node.ensure_live()?;
        Ok(Argument::bound(value, &self.node, None))
    }

    /// Registers an item to be disposed together with this scope.
    ///
    /// Items are released in reverse registration order, interleaved with
    /// child scopes. If the scope is already disposed, `item` is disposed
    /// immediately and an error is returned.
    pub fn register(&self, item: Arc<dyn Dispose>) -> Result<(), DisposedError> {
        self.node.ensure_live().inspect_err(|_| item.dispose())?;
        self.node
            .children
            .push(item)
            .map_err(|_| DisposedError::new(self.node.id))
    }

    /// Disposes this scope and, last created first, all of its descendants.
    ///
    /// Idempotent and safe to call concurrently: exactly one caller performs
    /// the teardown, and every other caller returns only once it is complete.
    /// Disposing the root is ignored.
    pub fn dispose(&self) {
        self.node.teardown();
    }

    /// The observer configured for this scope.
    pub fn observer(&self) -> Result<Option<Observer>, DisposedError> {
        self.node.observer()
    }

    /// Returns `true` once disposal has started.
    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    /// Returns `true` for the root scope.
    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    /// Unique identifier of the scope; the root is `0`.
    pub fn id(&self) -> u64 {
        self.node.id
    }

    /// Distance from the root.
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    /// The parent scope, if this is not the root.
    pub fn parent(&self) -> Option<Scope> {
        self.node.parent.upgrade().map(Self::from_node)
    }

    /// Number of live entries held by this scope's disposer.
    pub fn child_count(&self) -> usize {
        self.node.children.len()
    }

    /// Wraps the scope in a guard that disposes it when dropped.
    pub fn into_guard(self) -> DisposeGuard {
        DisposeGuard { scope: Some(self) }
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scope").field(&self.node).finish()
    }
}

// ============================================================================
// DISPOSE GUARD
// ============================================================================

/// RAII guard that disposes its scope on drop.
///
/// Use [`into_inner`](Self::into_inner) to take the scope back without
/// disposing it.
pub struct DisposeGuard {
    scope: Option<Scope>,
}

impl DisposeGuard {
    /// Takes the scope out of the guard, preventing disposal.
    #[must_use]
    pub fn into_inner(mut self) -> Scope {
        match self.scope.take() {
            Some(scope) => scope,
            None => unreachable!("scope is only taken by into_inner or drop"),
        }
    }
}

impl Deref for DisposeGuard {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        match &self.scope {
            Some(scope) => scope,
            None => unreachable!("scope is only taken by into_inner or drop"),
        }
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.dispose();
        }
    }
}

impl fmt::Debug for DisposeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeGuard")
            .field("scope", &self.scope)
            .finish()
    }
}
