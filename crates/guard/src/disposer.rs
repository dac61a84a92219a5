//! LIFO disposal stack owned by a scope

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::config::GuardConfig;

/// Something a scope can release when it is torn down.
///
/// `dispose` must be idempotent: it may be reached both directly and through
/// the owning scope's cascade.
pub trait Dispose: Send + Sync {
    /// Releases the item. Repeated calls are no-ops.
    fn dispose(&self);

    /// Returns `true` once the item has been disposed.
    fn is_disposed(&self) -> bool;
}

/// An owned, append-only list of disposables, drained exactly once in
/// reverse order of registration.
pub struct ScopeDisposer {
    entries: Mutex<Entries>,
    drained: AtomicBool,
}

#[derive(Default)]
struct Entries {
    items: Vec<Arc<dyn Dispose>>,
    /// Length at which the next compaction runs; doubles with the live set.
    compact_at: usize,
    compactions: usize,
}

impl Entries {
    fn maybe_compact(&mut self, threshold: usize) {
        if self.items.len() < self.compact_at.max(threshold) {
            return;
        }
        let before = self.items.len();
        self.items.retain(|item| !item.is_disposed());
        self.compact_at = threshold.max(self.items.len() * 2);
        self.compactions += 1;
        tracing::trace!(
            before,
            after = self.items.len(),
            next = self.compact_at,
            compactions = self.compactions,
            "compacted disposer"
        );
    }
}

impl ScopeDisposer {
    /// Creates an empty disposer.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            drained: AtomicBool::new(false),
        }
    }

    /// Registers `item` for disposal.
    ///
    /// If the disposer has already been drained, `item` is disposed right
    /// away and handed back as `Err`.
    pub fn push(&self, item: Arc<dyn Dispose>) -> Result<(), Arc<dyn Dispose>> {
        {
            let mut entries = self.entries.lock();
            if !self.drained.load(Ordering::Acquire) {
                entries.maybe_compact(GuardConfig::current().compaction_threshold);
                entries.items.push(item);
                return Ok(());
            }
        }

        item.dispose();
        Err(item)
    }

    /// Disposes every registered item, last registered first.
    ///
    /// Only the first call does any work; it returns the number of items it
    /// released. Later calls return 0.
    pub fn dispose_all(&self) -> usize {
        let items = {
            let mut entries = self.entries.lock();
            if self.drained.swap(true, Ordering::AcqRel) {
                return 0;
            }
            std::mem::take(&mut entries.items)
        };

        let count = items.len();
        for item in items.into_iter().rev() {
            item.dispose();
        }
        count
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().items.len()
    }

    /// Returns `true` if no items are held.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().items.is_empty()
    }

    /// Returns `true` once [`dispose_all`](Self::dispose_all) has run.
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }
}

impl Default for ScopeDisposer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeDisposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeDisposer")
            .field("len", &self.len())
            .field("drained", &self.is_drained())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
        disposed: AtomicBool,
    }

    impl Recorder {
        fn new(id: usize, log: &Arc<Mutex<Vec<usize>>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                log: Arc::clone(log),
                disposed: AtomicBool::new(false),
            })
        }
    }

    impl Dispose for Recorder {
        fn dispose(&self) {
            if !self.disposed.swap(true, Ordering::AcqRel) {
                self.log.lock().push(self.id);
            }
        }

        fn is_disposed(&self) -> bool {
            self.disposed.load(Ordering::Acquire)
        }
    }

    #[test]
    fn test_disposes_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let disposer = ScopeDisposer::new();
        for id in 0..4 {
            assert!(disposer.push(Recorder::new(id, &log)).is_ok());
        }

        assert_eq!(disposer.dispose_all(), 4);
        assert_eq!(*log.lock(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_second_drain_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let disposer = ScopeDisposer::new();
        disposer.push(Recorder::new(1, &log)).ok();

        assert_eq!(disposer.dispose_all(), 1);
        assert_eq!(disposer.dispose_all(), 0);
        assert_eq!(*log.lock(), vec![1]);
        assert!(disposer.is_empty());
    }

    #[test]
    fn test_push_after_drain_disposes_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let disposer = ScopeDisposer::new();
        disposer.dispose_all();

        let late = Recorder::new(9, &log);
        assert!(disposer.push(late.clone()).is_err());
        assert!(late.is_disposed());
        assert_eq!(*log.lock(), vec![9]);
    }

    #[test]
    fn test_compaction_drops_disposed_entries() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let disposer = ScopeDisposer::new();
        let threshold = GuardConfig::current().compaction_threshold;

        for id in 0..threshold {
            let item = Recorder::new(id, &log);
            disposer.push(item.clone()).ok();
            item.dispose();
        }
        let survivor = Recorder::new(usize::MAX, &log);
        disposer.push(survivor).ok();

        assert_eq!(disposer.len(), 1);
    }

    #[test]
    fn test_compaction_is_amortized_over_live_entries() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let disposer = ScopeDisposer::new();
        let threshold = GuardConfig::current().compaction_threshold;
        let total = threshold * 64;

        for id in 0..total {
            disposer.push(Recorder::new(id, &log)).ok();
        }

        // Live entries survive every pass, so the trigger doubles each time.
        let compactions = disposer.entries.lock().compactions;
        assert_eq!(disposer.len(), total);
        assert!(compactions <= 7, "{compactions} compactions for {total} live entries");
    }
}
