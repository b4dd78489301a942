//! Per-manager transition counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters a [`ServiceManager`](crate::ServiceManager) keeps about its own transitions.
#[derive(Debug, Default)]
pub struct ManagerMetrics {
    creations: AtomicU64,
    rebuilds: AtomicU64,
    dynamic_updates: AtomicU64,
    disposals: AtomicU64,
    teardowns: AtomicU64,
    ignored_notifications: AtomicU64,
    lifecycle_failures: AtomicU64,
}

/// Point-in-time copy of [`ManagerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Services built by a first creation attempt
    pub creations: u64,
    /// Services replaced by a static rebuild
    pub rebuilds: u64,
    /// Calls into `handle_dependency_change`
    pub dynamic_updates: u64,
    /// Services disposed, for any reason
    pub disposals: u64,
    /// Services withdrawn because a required dependency went away
    pub teardowns: u64,
    /// Notifications dropped (stopped manager or unknown dependency)
    pub ignored_notifications: u64,
    /// Lifecycle calls that returned an error
    pub lifecycle_failures: u64,
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_creation(&self) {
        self.creations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dynamic_update(&self) {
        self.dynamic_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disposal(&self) {
        self.disposals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lifecycle_failure(&self) {
        self.lifecycle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            creations: self.creations.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            dynamic_updates: self.dynamic_updates.load(Ordering::Relaxed),
            disposals: self.disposals.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            ignored_notifications: self.ignored_notifications.load(Ordering::Relaxed),
            lifecycle_failures: self.lifecycle_failures.load(Ordering::Relaxed),
        }
    }
}
