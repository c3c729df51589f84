use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::MemoryPostStore;
use crate::{
    gateway::{MediaUploadGateway, VideoUrlResolver},
    Media, MediaEventSink, MediaId, MediaRemoteStatus, MediaUploadState, ObserverId, Post, PostId,
    PublishError, PublishResult,
};

/// Automated retries allowed per asset before it is left for the user
pub const DEFAULT_MAX_AUTOMATED_RETRIES: u32 = 3;

/// In-memory media upload gateway. Transfers never run on their own;
/// tests drive them with [`complete_upload`](Self::complete_upload) and
/// [`fail_upload`](Self::fail_upload).
pub struct MemoryMediaGateway {
    store: Arc<MemoryPostStore>,
    subscribers: RwLock<HashMap<ObserverId, MediaEventSink>>,
    dispatched: Mutex<Vec<(MediaId, bool)>>,
    video_urls: RwLock<HashMap<MediaId, Result<String, String>>>,
    max_automated_retries: u32,
}

impl MemoryMediaGateway {
    pub fn new(store: Arc<MemoryPostStore>) -> Self {
        Self {
            store,
            subscribers: RwLock::new(HashMap::new()),
            dispatched: Mutex::new(Vec::new()),
            video_urls: RwLock::new(HashMap::new()),
            max_automated_retries: DEFAULT_MAX_AUTOMATED_RETRIES,
        }
    }

    pub fn with_max_automated_retries(mut self, max: u32) -> Self {
        self.max_automated_retries = max;
        self
    }

    /// Every (asset, automated) pair handed to `start_or_retry_upload`
    pub fn dispatched(&self) -> Vec<(MediaId, bool)> {
        self.dispatched.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Land an upload and notify observers of its post
    pub fn complete_upload(
        &self,
        media_id: &MediaId,
        remote_url: &str,
        server_media_id: i64,
    ) -> PublishResult<()> {
        let media = self.store.update_media(media_id, |media| {
            media.remote_status = MediaRemoteStatus::Ended;
            media.remote_url = Some(remote_url.to_string());
            media.server_media_id = Some(server_media_id);
        })?;
        self.notify(&media.post_id, media_id, MediaUploadState::Ended);
        Ok(())
    }

    /// Give up on an upload and notify observers of its post
    pub fn fail_upload(&self, media_id: &MediaId) -> PublishResult<()> {
        let media = self.store.update_media(media_id, |media| {
            media.remote_status = MediaRemoteStatus::Failed;
        })?;
        self.notify(&media.post_id, media_id, MediaUploadState::Failed);
        Ok(())
    }

    /// Script the playable URL lookup for a video
    pub fn set_video_url<S: Into<String>>(&self, media_id: &MediaId, url: S) {
        self.video_urls.write().insert(media_id.clone(), Ok(url.into()));
    }

    /// Make the playable URL lookup for a video fail
    pub fn fail_video_lookup<S: Into<String>>(&self, media_id: &MediaId, reason: S) {
        self.video_urls.write().insert(media_id.clone(), Err(reason.into()));
    }

    fn notify(&self, post_id: &PostId, media_id: &MediaId, state: MediaUploadState) {
        let sinks: Vec<MediaEventSink> = self
            .subscribers
            .read()
            .values()
            .filter(|sink| sink.post_id() == post_id)
            .cloned()
            .collect();

        for sink in sinks {
            if !sink.emit(media_id.clone(), state) {
                debug!("Observer of post {} is gone", post_id);
            }
        }
    }

    fn post_media(&self, post_id: &PostId) -> Vec<Media> {
        self.store.snapshot(post_id).map(|post| post.media).unwrap_or_default()
    }
}

#[async_trait]
impl MediaUploadGateway for MemoryMediaGateway {
    async fn failed_media_for_upload(&self, post: &Post, automated_retry: bool) -> Vec<Media> {
        post.media
            .iter()
            .filter(|media| media.is_failed())
            .filter(|media| !automated_retry || media.automated_retry_count < self.max_automated_retries)
            .cloned()
            .collect()
    }

    async fn start_or_retry_upload(&self, media: &[Media], automated_retry: bool) {
        for asset in media {
            let updated = self.store.update_media(&asset.id, |media| {
                media.remote_status = MediaRemoteStatus::Uploading;
                if automated_retry {
                    media.automated_retry_count += 1;
                }
            });

            match updated {
                Ok(updated) => {
                    self.dispatched.lock().push((asset.id.clone(), automated_retry));
                    self.notify(&updated.post_id, &asset.id, MediaUploadState::Uploading);
                }
                Err(e) => warn!("Could not restart upload of {}: {}", asset.id, e),
            }
        }
    }

    async fn is_any_media_uploading(&self, post_id: &PostId) -> bool {
        self.post_media(post_id).iter().any(|media| media.remote_status.is_pending())
    }

    async fn has_any_failed_media(&self, post_id: &PostId) -> bool {
        self.post_media(post_id).iter().any(Media::is_failed)
    }

    fn subscribe(&self, _post_id: &PostId, sink: MediaEventSink) -> ObserverId {
        let observer_id = sink.observer_id();
        self.subscribers.write().insert(observer_id, sink);
        observer_id
    }

    fn unsubscribe(&self, observer_id: ObserverId) {
        self.subscribers.write().remove(&observer_id);
    }
}

#[async_trait]
impl VideoUrlResolver for MemoryMediaGateway {
    async fn resolve_video_url(&self, media: &Media, _post: &Post) -> PublishResult<String> {
        match self.video_urls.read().get(&media.id) {
            Some(Ok(url)) => return Ok(url.clone()),
            Some(Err(reason)) => return Err(PublishError::video_url(&media.id, reason.clone())),
            None => {}
        }

        media
            .remote_url
            .clone()
            .ok_or_else(|| PublishError::video_url(&media.id, "no remote URL"))
    }
}
