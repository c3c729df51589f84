use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for coordinator activity
pub struct LiveMetrics {
    saves: AtomicU64,
    media_dispatched: AtomicU64,
    observers_registered: AtomicU64,
    observers_removed: AtomicU64,
    references_updated: AtomicU64,
    published: AtomicU64,
    publish_failed: AtomicU64,
    save_failed: AtomicU64,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self {
            saves: AtomicU64::new(0),
            media_dispatched: AtomicU64::new(0),
            observers_registered: AtomicU64::new(0),
            observers_removed: AtomicU64::new(0),
            references_updated: AtomicU64::new(0),
            published: AtomicU64::new(0),
            publish_failed: AtomicU64::new(0),
            save_failed: AtomicU64::new(0),
        }
    }

    pub fn increment_saves(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_media_dispatched(&self, count: usize) {
        self.media_dispatched.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn increment_observers_registered(&self) {
        self.observers_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_observers_removed(&self) {
        self.observers_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_references_updated(&self) {
        self.references_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_publish_failed(&self) {
        self.publish_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_save_failed(&self) {
        self.save_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn media_dispatched(&self) -> u64 {
        self.media_dispatched.load(Ordering::Relaxed)
    }

    pub fn observers_registered(&self) -> u64 {
        self.observers_registered.load(Ordering::Relaxed)
    }

    pub fn observers_removed(&self) -> u64 {
        self.observers_removed.load(Ordering::Relaxed)
    }

    pub fn references_updated(&self) -> u64 {
        self.references_updated.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn publish_failed(&self) -> u64 {
        self.publish_failed.load(Ordering::Relaxed)
    }

    pub fn save_failed(&self) -> u64 {
        self.save_failed.load(Ordering::Relaxed)
    }

    /// Observers currently alive according to the counters
    pub fn active_observers(&self) -> u64 {
        self.observers_registered().saturating_sub(self.observers_removed())
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            saves: self.saves(),
            media_dispatched: self.media_dispatched(),
            observers_registered: self.observers_registered(),
            observers_removed: self.observers_removed(),
            references_updated: self.references_updated(),
            published: self.published(),
            publish_failed: self.publish_failed(),
            save_failed: self.save_failed(),
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub saves: u64,
    pub media_dispatched: u64,
    pub observers_registered: u64,
    pub observers_removed: u64,
    pub references_updated: u64,
    pub published: u64,
    pub publish_failed: u64,
    pub save_failed: u64,
}
