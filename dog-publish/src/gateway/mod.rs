//! Contracts with the collaborators the coordinator drives but does not own:
//! durable storage, the media upload subsystem, the publishing transport,
//! and the user-facing side effects of a finished save.

mod defaults;

use async_trait::async_trait;

use crate::{
    Media, MediaEventSink, MediaId, ObserverId, Post, PostId, PostNotice, PublishResult,
    RemoteStatus,
};

pub use defaults::{NoopNoticeSink, NoopSearchIndexer, RemoteUrlVideoResolver, TracingNoticeSink};

/// Durable store holding posts and their media
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Load the current state of a post
    async fn get(&self, id: &PostId) -> PublishResult<Post>;

    /// Write the remote sync status of a post
    async fn set_remote_status(&self, id: &PostId, status: RemoteStatus) -> PublishResult<()>;

    /// Replace the post's content markup
    async fn set_content(&self, id: &PostId, content: String) -> PublishResult<()>;

    /// Record the final remote URL of an asset
    async fn set_media_remote_url(&self, id: &MediaId, url: String) -> PublishResult<()>;

    /// Merge a revision into its original, delete the revision and
    /// return the canonical post
    async fn apply_revision(&self, revision: &PostId) -> PublishResult<Post>;

    /// All posts whose remote status is one of `statuses`
    async fn find_by_remote_status(&self, statuses: &[RemoteStatus]) -> PublishResult<Vec<Post>>;
}

/// Media upload subsystem. Owns transfers, retry budgets and the
/// remote status of every asset.
#[async_trait]
pub trait MediaUploadGateway: Send + Sync {
    /// Assets of `post` eligible for a retry under the gateway's policy
    async fn failed_media_for_upload(&self, post: &Post, automated_retry: bool) -> Vec<Media>;

    /// Start or retry uploads. Returns once dispatched, never waits for transfers.
    async fn start_or_retry_upload(&self, media: &[Media], automated_retry: bool);

    /// Check if any asset of the post is queued or transferring
    async fn is_any_media_uploading(&self, post_id: &PostId) -> bool;

    /// Check if any asset of the post is in a permanent failure state
    async fn has_any_failed_media(&self, post_id: &PostId) -> bool;

    /// Start delivering state changes for the post's media into `sink`.
    /// Returns `sink.observer_id()`, the id its events are stamped with.
    /// Must not block: it runs under the observer registry lock.
    fn subscribe(&self, post_id: &PostId, sink: MediaEventSink) -> ObserverId;

    /// Stop delivering events for a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, observer_id: ObserverId);
}

/// Lookup of the playable URL of an uploaded video
#[async_trait]
pub trait VideoUrlResolver: Send + Sync {
    async fn resolve_video_url(&self, media: &Media, post: &Post) -> PublishResult<String>;
}

/// Transport that pushes a resolved post to the remote service
#[async_trait]
pub trait PublishGateway: Send + Sync {
    /// Push the post. On failure the gateway applies its own status policy
    /// before returning the error.
    async fn publish(&self, post: &Post) -> PublishResult<Post>;

    /// Posts whose last save failed
    async fn failed_posts(&self) -> PublishResult<Vec<Post>>;

    /// Mark the post failed, demoting it to draft if it cannot be published
    async fn mark_failed(&self, post_id: &PostId) -> PublishResult<()>;
}

/// Receives user-facing notices. Fire and forget.
pub trait NoticeSink: Send + Sync {
    fn post(&self, notice: PostNotice);
}

/// Downstream indexing of published posts. Fire and forget.
pub trait SearchIndexer: Send + Sync {
    fn index(&self, post: &Post);
}
