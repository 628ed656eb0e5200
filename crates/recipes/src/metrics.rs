use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the synchronization service, surfaced through `status()`.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    reloads: AtomicU64,
    skipped_reloads: AtomicU64,
    stale_discards: AtomicU64,
    store_failures: AtomicU64,
    mutations: AtomicU64,
}

impl SyncMetrics {
    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_reload(&self) {
        self.skipped_reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reloads(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    pub fn skipped_reloads(&self) -> u64 {
        self.skipped_reloads.load(Ordering::Relaxed)
    }

    pub fn stale_discards(&self) -> u64 {
        self.stale_discards.load(Ordering::Relaxed)
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }
}
