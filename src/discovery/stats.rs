//! 桥接器运行统计

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 桥接器计数器
#[derive(Debug, Default)]
pub struct BridgeStats {
    imported: AtomicU64,
    removed: AtomicU64,
    lookups_local: AtomicU64,
    lookups_fallback: AtomicU64,
    lookups_missed: AtomicU64,
    dropped_events: AtomicU64,
    failed_reconciliations: AtomicU64,
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub imported: u64,
    pub removed: u64,
    pub lookups_local: u64,
    pub lookups_fallback: u64,
    pub lookups_missed: u64,
    pub dropped_events: u64,
    pub failed_reconciliations: u64,
}

impl BridgeStats {
    pub fn record_imported(&self) {
        self.imported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self, count: usize) {
        self.removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_local_hit(&self) {
        self.lookups_local.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_hit(&self) {
        self.lookups_fallback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.lookups_missed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_reconciliation(&self) {
        self.failed_reconciliations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            imported: self.imported.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            lookups_local: self.lookups_local.load(Ordering::Relaxed),
            lookups_fallback: self.lookups_fallback.load(Ordering::Relaxed),
            lookups_missed: self.lookups_missed.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            failed_reconciliations: self.failed_reconciliations.load(Ordering::Relaxed),
        }
    }
}
