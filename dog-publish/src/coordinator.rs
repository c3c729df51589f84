use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::CoordinatorConfig,
    content::{ContentReferenceUpdater, MarkupContentUpdater, UploadedMedia},
    gateway::{
        MediaUploadGateway, NoopSearchIndexer, NoticeSink, PostStore, PublishGateway,
        RemoteUrlVideoResolver, SearchIndexer, TracingNoticeSink, VideoUrlResolver,
    },
    observability::ObservabilityLayer,
    registry::{ObserverRegistry, Registration},
    resume::Uploader,
    Media, MediaEvent, MediaEventSink, MediaId, MediaKind, MediaRemoteStatus, MediaUploadState,
    ObserverId, Post, PostId, PostNotice, PublishError, PublishResult, RemoteStatus, SaveFailure,
};

/// Which branch a [`PostCoordinator::save`] call took
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing to wait for; the remote service accepted the post
    Published(Post),
    /// Nothing to wait for, but the push failed. The publish gateway has
    /// already applied its status policy.
    PublishFailed(String),
    /// Media is still in flight; a new observer will publish once it lands
    WaitingForMedia(ObserverId),
    /// Media is still in flight and the post was already observed
    AlreadyObserving(ObserverId),
    /// Not every asset could be (re)started; the post was marked failed
    MediaDispatchIncomplete { dispatched: usize, total: usize },
}

impl SaveOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    /// Check if completion will be signalled later through media events
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::WaitingForMedia(_) | Self::AlreadyObserving(_))
    }
}

/// Handle for managing the event worker lifecycle
pub struct CoordinatorHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<PublishResult<()>>,
}

impl CoordinatorHandle {
    /// Gracefully stop the worker. Returns the fatal error that stopped
    /// it earlier, if any.
    pub async fn shutdown(self) -> PublishResult<()> {
        let _ = self.shutdown_tx.send(());
        self.join_handle
            .await
            .map_err(|e| PublishError::Internal(format!("Worker join error: {}", e)))?
    }

    /// Check if the worker has exited, either on shutdown or on a fatal error
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

/// Drives posts from save to publish while their media uploads finish.
///
/// One instance is created at startup with its collaborators and shared
/// by cloning. Media state changes arrive on a channel and are applied by
/// a single worker (see [`start`](Self::start)), so status writes for a
/// post triggered by uploads never race each other.
pub struct PostCoordinator {
    store: Arc<dyn PostStore>,
    media: Arc<dyn MediaUploadGateway>,
    video_urls: Arc<dyn VideoUrlResolver>,
    content: Arc<dyn ContentReferenceUpdater>,
    publisher: Arc<dyn PublishGateway>,
    notices: Arc<dyn NoticeSink>,
    indexer: Arc<dyn SearchIndexer>,
    registry: Arc<ObserverRegistry>,
    observability: Arc<ObservabilityLayer>,
    config: CoordinatorConfig,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
    events_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>>,
}

impl PostCoordinator {
    /// Create a coordinator with the default video resolver, markup
    /// updater, log-only notices and no search indexing
    pub fn new(
        store: Arc<dyn PostStore>,
        media: Arc<dyn MediaUploadGateway>,
        publisher: Arc<dyn PublishGateway>,
    ) -> Self {
        Self::with_config(store, media, publisher, CoordinatorConfig::default())
    }

    /// Create coordinator with custom configuration
    pub fn with_config(
        store: Arc<dyn PostStore>,
        media: Arc<dyn MediaUploadGateway>,
        publisher: Arc<dyn PublishGateway>,
        config: CoordinatorConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            store,
            registry: Arc::new(ObserverRegistry::new(media.clone())),
            media,
            video_urls: Arc::new(RemoteUrlVideoResolver),
            content: Arc::new(MarkupContentUpdater::new()),
            publisher,
            notices: Arc::new(TracingNoticeSink),
            indexer: Arc::new(NoopSearchIndexer),
            observability: Arc::new(ObservabilityLayer::with_capacity(config.observability_capacity)),
            config,
            events_tx,
            events_rx: Arc::new(Mutex::new(Some(events_rx))),
        }
    }

    pub fn with_video_resolver(mut self, resolver: Arc<dyn VideoUrlResolver>) -> Self {
        self.video_urls = resolver;
        self
    }

    pub fn with_content_updater(mut self, updater: Arc<dyn ContentReferenceUpdater>) -> Self {
        self.content = updater;
        self
    }

    pub fn with_notice_sink(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = notices;
        self
    }

    pub fn with_search_indexer(mut self, indexer: Arc<dyn SearchIndexer>) -> Self {
        self.indexer = indexer;
        self
    }

    pub fn with_observability(mut self, observability: ObservabilityLayer) -> Self {
        self.observability = Arc::new(observability);
        self
    }

    /// Save a post locally and push it to the remote service, waiting on
    /// its media first when needed. Never blocks on uploads.
    ///
    /// Errors are infrastructure failures only. A save that ends with the
    /// post marked failed is still `Ok`, see [`SaveOutcome`].
    #[instrument(skip(self, post), fields(post_id = %post.id))]
    pub async fn save(&self, post: &Post, automated_retry: bool) -> PublishResult<SaveOutcome> {
        self.observability.record_save_started(&post.id);
        let post = self.canonical_post(post).await?;

        let (dispatched, pushing_all_media) = self.dispatch_media(&post, automated_retry).await;
        if !pushing_all_media {
            let total = post.media.len();
            warn!("Only {} of {} media of post {} could be pushed", dispatched, total, post.id);
            self.change_status(&post.id, RemoteStatus::Failed).await?;
            self.save_failed(&post.id, SaveFailure::PartialMediaDispatch { dispatched, total })
                .await?;
            return Ok(SaveOutcome::MediaDispatchIncomplete { dispatched, total });
        }

        self.change_status(&post.id, RemoteStatus::Pushing).await?;

        if self.has_unresolved_media(&post.id).await {
            self.change_status(&post.id, RemoteStatus::PushingMedia).await?;

            let sink = MediaEventSink::new(post.id.clone(), self.events_tx.clone());
            let observer_id = match self.registry.register(&post.id, sink) {
                Registration::New(observer_id) => {
                    self.observability.record_observer_registered(&post.id, observer_id);
                    observer_id
                }
                Registration::Existing(observer_id) => {
                    debug!("Post {} is already observed", post.id);
                    return Ok(SaveOutcome::AlreadyObserving(observer_id));
                }
            };

            return self.settle_new_observer(&post.id, observer_id).await;
        }

        self.drop_observer(&post.id);
        let post = self.refresh_references(post).await?;
        self.publish(&post).await
    }

    /// Push a post whose media is resolved. Indexing and notices follow
    /// the configuration.
    #[instrument(skip(self, post), fields(post_id = %post.id))]
    pub async fn publish(&self, post: &Post) -> PublishResult<SaveOutcome> {
        match self.publisher.publish(post).await {
            Ok(published) => {
                if self.config.index_published_posts {
                    self.indexer.index(&published);
                }
                if self.config.post_notices {
                    self.notices.post(PostNotice::success(&published));
                }

                self.observability.record_published(&published.id, published.remote_id);
                info!("Published post {}", published.id);
                Ok(SaveOutcome::Published(published))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let reason = e.to_string();
                if self.config.post_notices {
                    self.notices.post(PostNotice::failure(post, &reason));
                }

                self.observability.record_publish_failed(&post.id, &reason);
                self.observability
                    .record_save_failed(&post.id, SaveFailure::Publish(reason.clone()));
                warn!("Publishing post {} failed: {}", post.id, reason);
                Ok(SaveOutcome::PublishFailed(reason))
            }
        }
    }

    /// Apply one media state change. Events delivered under a subscription
    /// that is no longer the post's live one (cancelled, already published
    /// or replaced) are dropped.
    #[instrument(skip(self, event), fields(post_id = %event.post_id, media_id = %event.media_id, state = event.state.name()))]
    pub async fn handle_media_event(&self, event: MediaEvent) -> PublishResult<()> {
        if self.registry.observer_for(&event.post_id) != Some(event.observer_id) {
            debug!("Dropping media event of stale observer {} for post {}", event.observer_id, event.post_id);
            return Ok(());
        }

        match event.state {
            MediaUploadState::Ended => self.media_ended(&event.post_id, &event.media_id).await,
            MediaUploadState::Failed => self.media_failed(&event.post_id, event.media_id).await,
            state => {
                info!("Media {} of post {}: {}", event.media_id, event.post_id, state.name());
                Ok(())
            }
        }
    }

    /// Stop listening for the post's media. Uploads keep running and the
    /// post's status is left as is.
    pub fn cancel_pending_save(&self, post: &Post) -> Option<ObserverId> {
        let removed = self.drop_observer(&post.id);
        if removed.is_some() {
            info!("Cancelled pending save of post {}", post.id);
        }
        removed
    }

    /// Check if the post is being pushed right now
    pub fn is_uploading(&self, post: &Post) -> bool {
        post.remote_status == RemoteStatus::Pushing
    }

    /// Spawn the worker that applies media events. Only one worker may run
    /// per coordinator.
    pub async fn start(&self) -> PublishResult<CoordinatorHandle> {
        let events_rx = self.events_rx.lock().take().ok_or(PublishError::AlreadyRunning)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = EventWorker {
            coordinator: self.clone(),
            events_rx,
            shutdown_rx,
        };
        let join_handle = tokio::spawn(worker.run());

        info!("Started post coordinator worker");
        Ok(CoordinatorHandle {
            shutdown_tx,
            join_handle,
        })
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    pub fn observability(&self) -> &ObservabilityLayer {
        &self.observability
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn PostStore {
        self.store.as_ref()
    }

    pub(crate) fn publisher(&self) -> &dyn PublishGateway {
        self.publisher.as_ref()
    }

    /// Write a remote status. Failure goes through the publish gateway so
    /// its demote-to-draft policy applies.
    pub(crate) async fn change_status(&self, post_id: &PostId, status: RemoteStatus) -> PublishResult<()> {
        match status {
            RemoteStatus::Failed => self.publisher.mark_failed(post_id).await?,
            status => self.store.set_remote_status(post_id, status).await?,
        }
        self.observability.record_status_changed(post_id, status);
        Ok(())
    }

    /// Merge an unpushed revision into its original, then reload the post
    async fn canonical_post(&self, post: &Post) -> PublishResult<Post> {
        if post.is_revision() && !post.has_remote() {
            let canonical = self.store.apply_revision(&post.id).await?;
            debug!("Applied revision {} onto post {}", post.id, canonical.id);
            return Ok(canonical);
        }
        self.store.get(&post.id).await
    }

    /// Start or retry uploads. Returns how many assets were handed to the
    /// gateway and whether that covers every asset of the post.
    async fn dispatch_media(&self, post: &Post, automated_retry: bool) -> (usize, bool) {
        let (selected, pushing_all_media) = if automated_retry {
            let selected = self.media.failed_media_for_upload(post, true).await;
            let all = selected.len() == post.media.len();
            (selected, all)
        } else {
            (post.failed_media(), true)
        };

        if !selected.is_empty() {
            self.media.start_or_retry_upload(&selected, automated_retry).await;
            let media_ids = selected.iter().map(|media| media.id.clone()).collect();
            self.observability
                .record_media_dispatched(&post.id, media_ids, automated_retry);
        }

        (selected.len(), pushing_all_media)
    }

    async fn media_ended(&self, post_id: &PostId, media_id: &MediaId) -> PublishResult<()> {
        let post = self.store.get(post_id).await?;
        let Some(media) = post.media_by_id(media_id).cloned() else {
            warn!("Media {} is no longer attached to post {}", media_id, post_id);
            return Ok(());
        };

        let media = match media.kind {
            MediaKind::Video => match self.video_urls.resolve_video_url(&media, &post).await {
                Ok(url) => {
                    self.store.set_media_remote_url(&media.id, url.clone()).await?;
                    media.with_remote_url(url)
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Could not resolve video URL of {}: {}", media.id, e);
                    self.change_status(post_id, RemoteStatus::Failed).await?;
                    let failure = SaveFailure::VideoUrlResolution {
                        media_id: media.id.clone(),
                        reason: e.to_string(),
                    };
                    return self.save_failed(post_id, failure).await;
                }
            },
            MediaKind::Image | MediaKind::Document => media,
        };

        self.update_references(&post, &media).await?;

        if self.has_unresolved_media(post_id).await {
            debug!("Post {} still has pending or failed media", post_id);
            return Ok(());
        }

        if self.drop_observer(post_id).is_none() {
            return Ok(());
        }

        let post = self.store.get(post_id).await?;
        self.publish(&post).await?;
        Ok(())
    }

    async fn media_failed(&self, post_id: &PostId, media_id: MediaId) -> PublishResult<()> {
        warn!("Media {} of post {} failed to upload", media_id, post_id);
        self.change_status(post_id, RemoteStatus::Failed).await?;
        self.save_failed(post_id, SaveFailure::MediaPermanentFailure { media_id })
            .await
    }

    /// Record a save that ended with the post marked failed and tell the user
    async fn save_failed(&self, post_id: &PostId, failure: SaveFailure) -> PublishResult<()> {
        if self.config.post_notices {
            let post = self.store.get(post_id).await?;
            self.notices.post(PostNotice::failure(&post, &failure.to_string()));
        }
        self.observability.record_save_failed(post_id, failure);
        Ok(())
    }

    async fn has_unresolved_media(&self, post_id: &PostId) -> bool {
        self.media.is_any_media_uploading(post_id).await || self.media.has_any_failed_media(post_id).await
    }

    /// Remove the post's observer if it has one
    fn drop_observer(&self, post_id: &PostId) -> Option<ObserverId> {
        let removed = self.registry.unregister(post_id);
        if let Some(observer_id) = removed {
            self.observability.record_observer_removed(post_id, observer_id);
        }
        removed
    }

    /// Uploads that landed or failed between the readiness check and the
    /// subscription emitted their events to nobody. Look again now that
    /// the observer is in place.
    async fn settle_new_observer(&self, post_id: &PostId, observer_id: ObserverId) -> PublishResult<SaveOutcome> {
        let post = self.store.get(post_id).await?;

        if let Some(failed) = post.failed_media().into_iter().next() {
            self.media_failed(post_id, failed.id).await?;
            return Ok(SaveOutcome::WaitingForMedia(observer_id));
        }

        if self.media.is_any_media_uploading(post_id).await {
            info!("Waiting on media of post {}", post_id);
            return Ok(SaveOutcome::WaitingForMedia(observer_id));
        }

        // The worker may have published already; whoever removes the
        // observer publishes.
        if self.drop_observer(post_id).is_none() {
            return Ok(SaveOutcome::WaitingForMedia(observer_id));
        }

        debug!("Media of post {} landed before its observer was in place", post_id);
        let post = self.refresh_references(post).await?;
        self.publish(&post).await
    }

    /// Point the content at every landed asset whose placeholder is still
    /// there, then return the stored post
    async fn refresh_references(&self, post: Post) -> PublishResult<Post> {
        let Some(content) = post.content.as_deref() else {
            return Ok(post);
        };

        let mut rewritten = content.to_string();
        let mut updated = Vec::new();
        for media in post.media.iter().filter(|media| media.remote_status == MediaRemoteStatus::Ended) {
            let Some(uploaded) = UploadedMedia::from_media(media) else {
                continue;
            };
            let next = self.content.rewrite(&rewritten, &uploaded);
            if next != rewritten {
                rewritten = next;
                updated.push(media.id.clone());
            }
        }

        if updated.is_empty() {
            return Ok(post);
        }

        self.store.set_content(&post.id, rewritten).await?;
        for media_id in &updated {
            self.observability.record_references_updated(&post.id, media_id);
        }
        self.store.get(&post.id).await
    }

    /// Point the post's content at the uploaded asset
    async fn update_references(&self, post: &Post, media: &Media) -> PublishResult<()> {
        if media.is_failed() {
            debug!("Skipping references to failed media {}", media.id);
            return Ok(());
        }
        let Some(content) = post.content.as_deref() else {
            return Ok(());
        };
        let Some(uploaded) = UploadedMedia::from_media(media) else {
            debug!("Media {} has no remote reference yet", media.id);
            return Ok(());
        };

        let rewritten = self.content.rewrite(content, &uploaded);
        if rewritten != content {
            self.store.set_content(&post.id, rewritten).await?;
            self.observability.record_references_updated(&post.id, &media.id);
        }
        Ok(())
    }
}

impl Clone for PostCoordinator {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            media: self.media.clone(),
            video_urls: self.video_urls.clone(),
            content: self.content.clone(),
            publisher: self.publisher.clone(),
            notices: self.notices.clone(),
            indexer: self.indexer.clone(),
            registry: self.registry.clone(),
            observability: self.observability.clone(),
            config: self.config.clone(),
            events_tx: self.events_tx.clone(),
            events_rx: self.events_rx.clone(),
        }
    }
}

/// Applies media events one at a time
struct EventWorker {
    coordinator: PostCoordinator,
    events_rx: mpsc::UnboundedReceiver<MediaEvent>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl EventWorker {
    async fn run(mut self) -> PublishResult<()> {
        if self.coordinator.config.resume_on_start {
            let repaired = self.coordinator.refresh_post_status().await?;
            let summary = self.coordinator.resume().await?;
            info!(
                "Recovered {} interrupted posts, retried {}, skipped {}",
                repaired.len(),
                summary.retried.len(),
                summary.skipped.len()
            );
        }

        info!("Worker listening for media events");

        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => {
                    info!("Worker shutdown requested");
                    break;
                }

                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };

                    if let Err(e) = self.coordinator.handle_media_event(event).await {
                        if e.is_fatal() {
                            error!("Worker stopping on fatal error: {}", e);
                            return Err(e);
                        }
                        warn!("Error handling media event: {}", e);
                    }
                }
            }
        }

        info!("Worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMediaGateway, MemoryNoticeSink, MemoryPostStore, MemoryPublishGateway};
    use crate::PostStatus;
    use tracing_test::traced_test;

    struct Fixture {
        store: Arc<MemoryPostStore>,
        media: Arc<MemoryMediaGateway>,
        publisher: Arc<MemoryPublishGateway>,
        notices: Arc<MemoryNoticeSink>,
        coordinator: PostCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryPostStore::new());
        let media = Arc::new(MemoryMediaGateway::new(store.clone()));
        let publisher = Arc::new(MemoryPublishGateway::new(store.clone()));
        let notices = Arc::new(MemoryNoticeSink::new());
        let coordinator = PostCoordinator::new(store.clone(), media.clone(), publisher.clone())
            .with_video_resolver(media.clone())
            .with_notice_sink(notices.clone());

        Fixture {
            store,
            media,
            publisher,
            notices,
            coordinator,
        }
    }

    /// Event as the post's live observer would deliver it
    fn event(coordinator: &PostCoordinator, post_id: &PostId, media_id: &str, state: MediaUploadState) -> MediaEvent {
        MediaEvent {
            post_id: post_id.clone(),
            observer_id: coordinator.registry().observer_for(post_id).unwrap_or_default(),
            media_id: MediaId::from(media_id),
            state,
        }
    }

    fn ended(coordinator: &PostCoordinator, post_id: &PostId, media_id: &str) -> MediaEvent {
        event(coordinator, post_id, media_id, MediaUploadState::Ended)
    }

    #[tokio::test]
    async fn test_post_without_media_publishes_immediately() {
        let fx = fixture();
        let post = Post::new().with_status(PostStatus::Publish);
        fx.store.insert(post.clone());

        let outcome = fx.coordinator.save(&post, false).await.unwrap();

        assert!(outcome.is_published());
        assert_eq!(fx.publisher.publish_count(), 1);
        assert!(fx.coordinator.registry().is_empty());
        assert_eq!(fx.notices.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_second_save_does_not_observe_twice() {
        let fx = fixture();
        let post = Post::new().with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());

        let first = fx.coordinator.save(&post, false).await.unwrap();
        let second = fx.coordinator.save(&post, false).await.unwrap();

        let SaveOutcome::WaitingForMedia(observer_id) = first else {
            panic!("expected to wait for media, got {:?}", first);
        };
        assert_eq!(second, SaveOutcome::AlreadyObserving(observer_id));
        assert_eq!(fx.media.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_ended_event_for_unobserved_post_is_dropped() {
        let fx = fixture();
        let post = Post::new().with_media(
            Media::image(PostId::new())
                .with_id("m1")
                .with_status(MediaRemoteStatus::Ended)
                .with_remote_url("https://cdn.example/x.jpg")
                .with_server_media_id(9),
        );
        fx.store.insert(post.clone());

        fx.coordinator.handle_media_event(ended(&fx.coordinator, &post.id, "m1")).await.unwrap();

        assert_eq!(fx.publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_video_lookup_failure_marks_post_failed() {
        let fx = fixture();
        let post = Post::new().with_media(Media::video(PostId::new()).with_id("v1"));
        fx.store.insert(post.clone());
        fx.coordinator.save(&post, false).await.unwrap();

        fx.media.fail_video_lookup(&MediaId::from("v1"), "still transcoding");
        fx.media.complete_upload(&MediaId::from("v1"), "https://cdn.example/v.mov", 3).unwrap();
        fx.coordinator.handle_media_event(ended(&fx.coordinator, &post.id, "v1")).await.unwrap();

        let stored = fx.store.snapshot(&post.id).unwrap();
        assert_eq!(stored.remote_status, RemoteStatus::Failed);
        assert_eq!(fx.publisher.publish_count(), 0);
        assert!(fx.coordinator.registry().is_registered(&post.id));
    }

    #[tokio::test]
    async fn test_resolved_video_url_is_stored_and_published() {
        let fx = fixture();
        let post = Post::new()
            .with_content(r#"<video data-wp_upload_id="v1" src="file:///tmp/v.mov"></video>"#)
            .with_media(Media::video(PostId::new()).with_id("v1"));
        fx.store.insert(post.clone());
        fx.coordinator.save(&post, false).await.unwrap();

        fx.media.set_video_url(&MediaId::from("v1"), "https://videos.example/v.mp4");
        fx.media.complete_upload(&MediaId::from("v1"), "https://cdn.example/v.mov", 3).unwrap();
        fx.coordinator.handle_media_event(ended(&fx.coordinator, &post.id, "v1")).await.unwrap();

        let stored = fx.store.snapshot(&post.id).unwrap();
        let video = stored.media_by_id(&MediaId::from("v1")).unwrap();
        assert_eq!(video.remote_url.as_deref(), Some("https://videos.example/v.mp4"));
        assert!(stored.content.unwrap().contains("https://videos.example/v.mp4"));
        assert_eq!(stored.remote_status, RemoteStatus::Sync);
    }

    #[tokio::test]
    async fn test_publish_failure_notifies_and_keeps_gateway_status() {
        let fx = fixture();
        let post = Post::new().with_title("Hello").with_status(PostStatus::Publish);
        fx.store.insert(post.clone());
        fx.publisher.reject_next("server error");

        let outcome = fx.coordinator.save(&post, false).await.unwrap();

        assert_eq!(outcome, SaveOutcome::PublishFailed("Remote service rejected the post: server error".to_string()));
        let stored = fx.store.snapshot(&post.id).unwrap();
        assert_eq!(stored.remote_status, RemoteStatus::Failed);
        assert_eq!(stored.status, PostStatus::Draft);

        let notices = fx.notices.for_post(&post.id);
        assert_eq!(notices.len(), 1);
        assert!(!notices[0].is_success());
    }

    #[tokio::test]
    async fn test_notices_and_indexing_follow_config() {
        let store = Arc::new(MemoryPostStore::new());
        let media = Arc::new(MemoryMediaGateway::new(store.clone()));
        let publisher = Arc::new(MemoryPublishGateway::new(store.clone()));
        let notices = Arc::new(MemoryNoticeSink::new());
        let index = Arc::new(crate::memory::MemorySearchIndex::new());
        let config = CoordinatorConfig::new()
            .with_post_notices(false)
            .with_index_published_posts(false);
        let coordinator = PostCoordinator::with_config(store.clone(), media, publisher, config)
            .with_notice_sink(notices.clone())
            .with_search_indexer(index.clone());

        let post = Post::new();
        store.insert(post.clone());
        coordinator.save(&post, false).await.unwrap();

        assert!(notices.notices().is_empty());
        assert!(index.indexed().is_empty());
    }

    #[tokio::test]
    async fn test_is_uploading() {
        let fx = fixture();
        let pushing = Post::new().with_remote_status(RemoteStatus::Pushing);
        let waiting = Post::new().with_remote_status(RemoteStatus::PushingMedia);

        assert!(fx.coordinator.is_uploading(&pushing));
        assert!(!fx.coordinator.is_uploading(&waiting));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let fx = fixture();
        let handle = fx.coordinator.start().await.unwrap();

        let second = fx.coordinator.clone().start().await;
        assert!(matches!(second, Err(PublishError::AlreadyRunning)));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_informational_states_are_logged() {
        let fx = fixture();
        let post = Post::new().with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());
        fx.coordinator.save(&post, false).await.unwrap();

        fx.coordinator
            .handle_media_event(event(&fx.coordinator, &post.id, "m1", MediaUploadState::Processing))
            .await
            .unwrap();

        assert!(logs_contain("processing"));
        assert_eq!(fx.store.snapshot(&post.id).unwrap().remote_status, RemoteStatus::PushingMedia);
    }

    /// Gateway whose upload settles while `save` sits between its readiness
    /// check and the subscription
    struct SettlesDuringSave {
        inner: Arc<MemoryMediaGateway>,
        settle: parking_lot::Mutex<Option<Box<dyn FnOnce(&MemoryMediaGateway) + Send>>>,
    }

    #[async_trait::async_trait]
    impl MediaUploadGateway for SettlesDuringSave {
        async fn failed_media_for_upload(&self, post: &Post, automated_retry: bool) -> Vec<Media> {
            self.inner.failed_media_for_upload(post, automated_retry).await
        }

        async fn start_or_retry_upload(&self, media: &[Media], automated_retry: bool) {
            self.inner.start_or_retry_upload(media, automated_retry).await
        }

        async fn is_any_media_uploading(&self, post_id: &PostId) -> bool {
            let uploading = self.inner.is_any_media_uploading(post_id).await;
            if uploading {
                if let Some(settle) = self.settle.lock().take() {
                    settle(&self.inner);
                }
            }
            uploading
        }

        async fn has_any_failed_media(&self, post_id: &PostId) -> bool {
            self.inner.has_any_failed_media(post_id).await
        }

        fn subscribe(&self, post_id: &PostId, sink: MediaEventSink) -> ObserverId {
            self.inner.subscribe(post_id, sink)
        }

        fn unsubscribe(&self, observer_id: ObserverId) {
            self.inner.unsubscribe(observer_id)
        }
    }

    fn settling_fixture<F>(settle: F) -> (Fixture, Arc<SettlesDuringSave>)
    where
        F: FnOnce(&MemoryMediaGateway) + Send + 'static,
    {
        let fx = fixture();
        let gateway = Arc::new(SettlesDuringSave {
            inner: fx.media.clone(),
            settle: parking_lot::Mutex::new(Some(Box::new(settle))),
        });
        let coordinator = PostCoordinator::new(fx.store.clone(), gateway.clone(), fx.publisher.clone())
            .with_notice_sink(fx.notices.clone());
        (Fixture { coordinator, ..fx }, gateway)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<crate::CoordinatorEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.event_name());
        }
        names
    }

    #[tokio::test]
    async fn test_resave_after_video_lookup_failure_releases_observer() {
        let fx = fixture();
        let post = Post::new()
            .with_content(r#"<video data-wp_upload_id="v1" src="file:///tmp/v.mov"></video>"#)
            .with_media(Media::video(PostId::new()).with_id("v1"));
        fx.store.insert(post.clone());
        fx.coordinator.save(&post, false).await.unwrap();

        fx.media.fail_video_lookup(&MediaId::from("v1"), "still transcoding");
        fx.media.complete_upload(&MediaId::from("v1"), "https://cdn.example/v.mov", 3).unwrap();
        fx.coordinator.handle_media_event(ended(&fx.coordinator, &post.id, "v1")).await.unwrap();
        assert!(fx.coordinator.registry().is_registered(&post.id));

        let outcome = fx.coordinator.save(&post, false).await.unwrap();

        assert!(outcome.is_published());
        assert!(!fx.coordinator.registry().is_registered(&post.id));
        assert_eq!(fx.media.subscriber_count(), 0);
        let published = &fx.publisher.published()[0];
        let content = published.content.as_deref().unwrap();
        assert!(content.contains("https://cdn.example/v.mov"));
        assert!(!content.contains("data-wp_upload_id"));
    }

    #[tokio::test]
    async fn test_upload_landing_before_subscription_still_publishes() {
        let (fx, _gateway) = settling_fixture(|media| {
            media.complete_upload(&MediaId::from("m1"), "https://cdn.example/x.jpg", 42).unwrap();
        });
        let post = Post::new()
            .with_content(r#"<img data-wp_upload_id="m1" src="file:///tmp/x.jpg">"#)
            .with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());

        let outcome = fx.coordinator.save(&post, false).await.unwrap();

        assert!(outcome.is_published());
        let stored = fx.store.snapshot(&post.id).unwrap();
        assert_eq!(stored.remote_status, RemoteStatus::Sync);
        assert!(stored.content.unwrap().contains("https://cdn.example/x.jpg"));
        assert_eq!(fx.publisher.publish_count(), 1);
        assert!(!fx.coordinator.registry().is_registered(&post.id));
        assert_eq!(fx.media.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_failing_before_subscription_marks_post_failed() {
        let (fx, _gateway) = settling_fixture(|media| {
            media.fail_upload(&MediaId::from("m1")).unwrap();
        });
        let post = Post::new().with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());

        let outcome = fx.coordinator.save(&post, false).await.unwrap();

        assert!(matches!(outcome, SaveOutcome::WaitingForMedia(_)));
        assert_eq!(fx.store.snapshot(&post.id).unwrap().remote_status, RemoteStatus::Failed);
        assert_eq!(fx.publisher.publish_count(), 0);
        assert!(fx.coordinator.registry().is_registered(&post.id));
    }

    #[tokio::test]
    async fn test_asset_failed_before_rewrite_leaves_content() {
        let fx = fixture();
        let content = r#"<img data-wp_upload_id="m1" src="file:///tmp/x.jpg">"#;
        let post = Post::new()
            .with_content(content)
            .with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());
        fx.coordinator.save(&post, false).await.unwrap();

        fx.store
            .update_media(&MediaId::from("m1"), |media| {
                media.remote_status = crate::MediaRemoteStatus::Failed;
                media.remote_url = Some("https://cdn.example/x.jpg".to_string());
                media.server_media_id = Some(42);
            })
            .unwrap();
        let mut rx = fx.coordinator.observability().event_stream();
        fx.coordinator.handle_media_event(ended(&fx.coordinator, &post.id, "m1")).await.unwrap();

        assert_eq!(fx.store.snapshot(&post.id).unwrap().content.as_deref(), Some(content));
        assert!(!drain(&mut rx).contains(&"references_updated"));
        assert_eq!(fx.publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_events_of_replaced_observer_are_dropped() {
        let fx = fixture();
        let post = Post::new().with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());

        let SaveOutcome::WaitingForMedia(stale) = fx.coordinator.save(&post, false).await.unwrap() else {
            panic!("expected to wait for media");
        };
        fx.coordinator.cancel_pending_save(&post);
        let SaveOutcome::WaitingForMedia(live) = fx.coordinator.save(&post, false).await.unwrap() else {
            panic!("expected a new observer");
        };
        assert_ne!(stale, live);

        fx.coordinator
            .handle_media_event(MediaEvent {
                post_id: post.id.clone(),
                observer_id: stale,
                media_id: MediaId::from("m1"),
                state: MediaUploadState::Failed,
            })
            .await
            .unwrap();

        assert_eq!(fx.store.snapshot(&post.id).unwrap().remote_status, RemoteStatus::PushingMedia);
        assert_eq!(fx.coordinator.registry().observer_for(&post.id), Some(live));
    }

    #[tokio::test]
    async fn test_media_failure_posts_failure_notice() {
        let fx = fixture();
        let post = Post::new().with_title("Trip").with_media(Media::image(PostId::new()).with_id("m1"));
        fx.store.insert(post.clone());
        fx.coordinator.save(&post, false).await.unwrap();

        fx.media.fail_upload(&MediaId::from("m1")).unwrap();
        fx.coordinator
            .handle_media_event(event(&fx.coordinator, &post.id, "m1", MediaUploadState::Failed))
            .await
            .unwrap();

        let notices = fx.notices.for_post(&post.id);
        assert_eq!(notices.len(), 1);
        assert!(!notices[0].is_success());
        assert!(notices[0].message.contains("Media m1 failed to upload"));
    }
}
