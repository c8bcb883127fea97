//! Global atomic counters for modplane observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    reconciliations: AtomicU64,
    config_fallbacks: AtomicU64,
    decrypt_failures: AtomicU64,
    consistency_evaluations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            reconciliations: AtomicU64::new(0),
            config_fallbacks: AtomicU64::new(0),
            decrypt_failures: AtomicU64::new(0),
            consistency_evaluations: AtomicU64::new(0),
        }
    }

    /// Increment the reconciliations counter by one.
    pub fn inc_reconciliations(&self) {
        self.reconciliations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reconciliations", "counter incremented");
    }

    /// Increment the config-fallbacks counter by one.
    pub fn inc_config_fallbacks(&self) {
        self.config_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "config_fallbacks", "counter incremented");
    }

    pub fn inc_decrypt_failures(&self) {
        self.decrypt_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "decrypt_failures", "counter incremented");
    }

    pub fn inc_consistency_evaluations(&self) {
        self.consistency_evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "consistency_evaluations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            reconciliations = self.reconciliations(),
            config_fallbacks = self.config_fallbacks(),
            decrypt_failures = self.decrypt_failures(),
            consistency_evaluations = self.consistency_evaluations(),
        );
    }

    pub fn reconciliations(&self) -> u64 {
        self.reconciliations.load(Ordering::Relaxed)
    }

    pub fn config_fallbacks(&self) -> u64 {
        self.config_fallbacks.load(Ordering::Relaxed)
    }

    pub fn decrypt_failures(&self) -> u64 {
        self.decrypt_failures.load(Ordering::Relaxed)
    }

    pub fn consistency_evaluations(&self) -> u64 {
        self.consistency_evaluations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.reconciliations.store(0, Ordering::Relaxed);
        self.config_fallbacks.store(0, Ordering::Relaxed);
        self.decrypt_failures.store(0, Ordering::Relaxed);
        self.consistency_evaluations.store(0, Ordering::Relaxed);
    }
}
