//! Process-wide counters for profile sync activity.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static PROFILES_LOADED: AtomicU64 = AtomicU64::new(0);
static PROFILES_BOOTSTRAPPED: AtomicU64 = AtomicU64::new(0);
static DELTAS_APPLIED: AtomicU64 = AtomicU64::new(0);
static LEVEL_UPS: AtomicU64 = AtomicU64::new(0);
static SYNC_FAILURES: AtomicU64 = AtomicU64::new(0);
static RENAMES: AtomicU64 = AtomicU64::new(0);
static STALE_RESULTS_DISCARDED: AtomicU64 = AtomicU64::new(0);
static SYNC_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static SYNC_LATENCY_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn inc_profiles_loaded() {
    PROFILES_LOADED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_profiles_bootstrapped() {
    PROFILES_BOOTSTRAPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_deltas_applied() {
    DELTAS_APPLIED.fetch_add(1, Ordering::Relaxed);
}

pub fn add_level_ups(levels: u64) {
    LEVEL_UPS.fetch_add(levels, Ordering::Relaxed);
}

pub fn inc_sync_failures() {
    SYNC_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_renames() {
    RENAMES.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_stale_results_discarded() {
    STALE_RESULTS_DISCARDED.fetch_add(1, Ordering::Relaxed);
}

pub fn observe_sync_latency(started_at: Instant) {
    let ms = started_at.elapsed().as_millis() as u64;
    SYNC_LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    SYNC_LATENCY_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub profiles_loaded: u64,
    pub profiles_bootstrapped: u64,
    pub deltas_applied: u64,
    pub level_ups: u64,
    pub sync_failures: u64,
    pub renames: u64,
    pub stale_results_discarded: u64,
    pub sync_latency_avg_ms: Option<u64>,
}

pub fn snapshot() -> Snapshot {
    let sum = SYNC_LATENCY_SUM_MS.load(Ordering::Relaxed);
    let count = SYNC_LATENCY_COUNT.load(Ordering::Relaxed);
    Snapshot {
        profiles_loaded: PROFILES_LOADED.load(Ordering::Relaxed),
        profiles_bootstrapped: PROFILES_BOOTSTRAPPED.load(Ordering::Relaxed),
        deltas_applied: DELTAS_APPLIED.load(Ordering::Relaxed),
        level_ups: LEVEL_UPS.load(Ordering::Relaxed),
        sync_failures: SYNC_FAILURES.load(Ordering::Relaxed),
        renames: RENAMES.load(Ordering::Relaxed),
        stale_results_discarded: STALE_RESULTS_DISCARDED.load(Ordering::Relaxed),
        sync_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
    }
}
