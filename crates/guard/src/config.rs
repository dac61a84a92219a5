//! Process-wide guard configuration
//!
//! The configuration is stored in a global `ArcSwap`: reads are lock-free and
//! a later [`GuardConfig::install`] replaces the previous value.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

static CONFIG: LazyLock<ArcSwap<GuardConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(GuardConfig::default()));

/// Default number of entries a disposer holds before compacting.
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 64;

/// Tuning knobs for scopes and failure routing.
///
/// # Examples
///
/// ```rust,ignore
/// use nebula_guard::GuardConfig;
///
/// GuardConfig::default().with_trace_failures(true).install();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Once a disposer holds this many entries, entries that were already
    /// disposed on their own are dropped before the next push.
    pub compaction_threshold: usize,
    /// Emit a `debug` event for every failure routed through an argument.
    pub trace_failures: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            trace_failures: false,
        }
    }
}

impl GuardConfig {
    /// Sets the compaction threshold (clamped to at least 1).
    #[must_use]
    pub fn with_compaction_threshold(mut self, threshold: usize) -> Self {
        self.compaction_threshold = threshold.max(1);
        self
    }

    /// Enables or disables failure tracing.
    #[must_use]
    pub fn with_trace_failures(mut self, enabled: bool) -> Self {
        self.trace_failures = enabled;
        self
    }

    /// Installs this configuration process-wide.
    pub fn install(self) {
        CONFIG.store(Arc::new(self));
    }

    /// Returns the active configuration.
    #[inline]
    pub fn current() -> Arc<Self> {
        CONFIG.load_full()
    }
}
