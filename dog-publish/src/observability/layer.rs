use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::LiveMetrics;
use crate::{CoordinatorEvent, MediaId, ObserverId, PostId, RemoteStatus, SaveFailure};

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Broadcasts coordinator events and keeps live counters
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<CoordinatorEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Slow subscribers lag once more than `capacity` events are buffered
    pub fn with_capacity(capacity: usize) -> Self {
        let (event_broadcaster, _) = broadcast::channel(capacity.max(1));

        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    pub fn record_save_started(&self, post_id: &PostId) {
        self.metrics.increment_saves();
        debug!("Recorded save started: {}", post_id);
    }

    pub fn record_status_changed(&self, post_id: &PostId, status: RemoteStatus) {
        self.emit(CoordinatorEvent::StatusChanged {
            post_id: post_id.clone(),
            status,
            at: Utc::now(),
        });
        debug!("Recorded status change: {} -> {}", post_id, status.name());
    }

    pub fn record_media_dispatched(&self, post_id: &PostId, media_ids: Vec<MediaId>, automated_retry: bool) {
        self.metrics.add_media_dispatched(media_ids.len());
        self.emit(CoordinatorEvent::MediaDispatched {
            post_id: post_id.clone(),
            media_ids,
            automated_retry,
            at: Utc::now(),
        });
    }

    pub fn record_observer_registered(&self, post_id: &PostId, observer_id: ObserverId) {
        self.metrics.increment_observers_registered();
        self.emit(CoordinatorEvent::ObserverRegistered {
            post_id: post_id.clone(),
            observer_id,
            at: Utc::now(),
        });
    }

    pub fn record_observer_removed(&self, post_id: &PostId, observer_id: ObserverId) {
        self.metrics.increment_observers_removed();
        self.emit(CoordinatorEvent::ObserverRemoved {
            post_id: post_id.clone(),
            observer_id,
            at: Utc::now(),
        });
    }

    pub fn record_references_updated(&self, post_id: &PostId, media_id: &MediaId) {
        self.metrics.increment_references_updated();
        self.emit(CoordinatorEvent::ReferencesUpdated {
            post_id: post_id.clone(),
            media_id: media_id.clone(),
            at: Utc::now(),
        });
    }

    pub fn record_published(&self, post_id: &PostId, remote_id: Option<i64>) {
        self.metrics.increment_published();
        self.emit(CoordinatorEvent::Published {
            post_id: post_id.clone(),
            remote_id,
            at: Utc::now(),
        });
        debug!("Recorded post published: {}", post_id);
    }

    pub fn record_publish_failed(&self, post_id: &PostId, error: &str) {
        self.metrics.increment_publish_failed();
        self.emit(CoordinatorEvent::PublishFailed {
            post_id: post_id.clone(),
            error: error.to_string(),
            at: Utc::now(),
        });
        debug!("Recorded publish failure: {} ({})", post_id, error);
    }

    pub fn record_save_failed(&self, post_id: &PostId, failure: SaveFailure) {
        self.metrics.increment_save_failed();
        debug!("Recorded save failure: {} ({})", post_id, failure);
        self.emit(CoordinatorEvent::SaveFailed {
            post_id: post_id.clone(),
            failure,
            at: Utc::now(),
        });
    }

    /// Subscribe to every event recorded from now on
    pub fn event_stream(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.event_broadcaster.subscribe()
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No receivers is fine
        let _ = self.event_broadcaster.send(event);
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}
