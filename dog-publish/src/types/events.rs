use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{MediaId, ObserverId, PostId, RemoteStatus};
use crate::error::SaveFailure;

/// Upload state reported by the media gateway for one asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MediaUploadState {
    Uploading,
    Progress(f32),
    Processing,
    Ended,
    Failed,
}

impl MediaUploadState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Progress(_) => "progress",
            Self::Processing => "processing",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }
}

/// Media completion message delivered to the coordinator's event worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEvent {
    pub post_id: PostId,
    /// Subscription the event was delivered under
    pub observer_id: ObserverId,
    pub media_id: MediaId,
    pub state: MediaUploadState,
}

/// Sending half handed to the gateway when a post is observed.
/// Cloneable and safe to call from any gateway-owned task. Every event it
/// emits is stamped with the sink's own observer id.
#[derive(Debug, Clone)]
pub struct MediaEventSink {
    post_id: PostId,
    observer_id: ObserverId,
    tx: mpsc::UnboundedSender<MediaEvent>,
}

impl MediaEventSink {
    pub fn new(post_id: PostId, tx: mpsc::UnboundedSender<MediaEvent>) -> Self {
        Self {
            post_id,
            observer_id: ObserverId::new(),
            tx,
        }
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn observer_id(&self) -> ObserverId {
        self.observer_id
    }

    /// Push a state change for `media_id`. Returns false once the
    /// coordinator has stopped listening.
    pub fn emit(&self, media_id: MediaId, state: MediaUploadState) -> bool {
        self.tx
            .send(MediaEvent {
                post_id: self.post_id.clone(),
                observer_id: self.observer_id,
                media_id,
                state,
            })
            .is_ok()
    }
}

/// Structured coordinator events for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorEvent {
    /// Remote status of a post was written
    StatusChanged {
        post_id: PostId,
        status: RemoteStatus,
        at: DateTime<Utc>,
    },

    /// Media uploads were (re)started for a save
    MediaDispatched {
        post_id: PostId,
        media_ids: Vec<MediaId>,
        automated_retry: bool,
        at: DateTime<Utc>,
    },

    ObserverRegistered {
        post_id: PostId,
        observer_id: ObserverId,
        at: DateTime<Utc>,
    },

    ObserverRemoved {
        post_id: PostId,
        observer_id: ObserverId,
        at: DateTime<Utc>,
    },

    /// Content was rewritten to point at an uploaded asset
    ReferencesUpdated {
        post_id: PostId,
        media_id: MediaId,
        at: DateTime<Utc>,
    },

    Published {
        post_id: PostId,
        remote_id: Option<i64>,
        at: DateTime<Utc>,
    },

    PublishFailed {
        post_id: PostId,
        error: String,
        at: DateTime<Utc>,
    },

    /// Save ended with the post marked failed
    SaveFailed {
        post_id: PostId,
        failure: SaveFailure,
        at: DateTime<Utc>,
    },
}

impl CoordinatorEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status_changed",
            Self::MediaDispatched { .. } => "media_dispatched",
            Self::ObserverRegistered { .. } => "observer_registered",
            Self::ObserverRemoved { .. } => "observer_removed",
            Self::ReferencesUpdated { .. } => "references_updated",
            Self::Published { .. } => "published",
            Self::PublishFailed { .. } => "publish_failed",
            Self::SaveFailed { .. } => "save_failed",
        }
    }

    /// Get the post ID from any event
    pub fn post_id(&self) -> &PostId {
        match self {
            Self::StatusChanged { post_id, .. } => post_id,
            Self::MediaDispatched { post_id, .. } => post_id,
            Self::ObserverRegistered { post_id, .. } => post_id,
            Self::ObserverRemoved { post_id, .. } => post_id,
            Self::ReferencesUpdated { post_id, .. } => post_id,
            Self::Published { post_id, .. } => post_id,
            Self::PublishFailed { post_id, .. } => post_id,
            Self::SaveFailed { post_id, .. } => post_id,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::StatusChanged { at, .. } => at,
            Self::MediaDispatched { at, .. } => at,
            Self::ObserverRegistered { at, .. } => at,
            Self::ObserverRemoved { at, .. } => at,
            Self::ReferencesUpdated { at, .. } => at,
            Self::Published { at, .. } => at,
            Self::PublishFailed { at, .. } => at,
            Self::SaveFailed { at, .. } => at,
        }
    }
}
