//! Lookup statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Running counters, updated lock-free by every lookup
#[derive(Debug)]
pub(crate) struct LookupStats {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    error_replays: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    coalesced: AtomicU64,
    refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
    since: SystemTime,
}

impl Default for LookupStats {
    fn default() -> Self {
        Self {
            fresh_hits: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            error_replays: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
            since: SystemTime::now(),
        }
    }
}

impl LookupStats {
    pub fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_replay(&self) {
        self.error_replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self, succeeded: bool) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> LookupStatsSnapshot {
        LookupStatsSnapshot {
            fresh_hits: self.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            error_replays: self.error_replays.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.failed_refreshes.load(Ordering::Relaxed),
            since: self.since,
        }
    }
}

/// Point-in-time copy of the lookup counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupStatsSnapshot {
    /// Served from a fresh cache entry
    pub fresh_hits: u64,
    /// Served from a stale entry
    pub stale_hits: u64,
    /// Cached failures returned without calling through
    pub error_replays: u64,
    /// Lookups that had to wait for a real call, their own or a joined one
    pub misses: u64,
    /// Calls with no policy, or a disabled one
    pub bypasses: u64,
    /// Misses that joined another caller's in-flight call
    pub coalesced: u64,
    /// Background refreshes that ran to completion
    pub refreshes: u64,
    /// Background refreshes whose real call failed
    pub failed_refreshes: u64,
    pub since: SystemTime,
}

impl LookupStatsSnapshot {
    /// Share of cached lookups answered without waiting on the real call
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fresh_hits + self.stale_hits + self.error_replays;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
