//! Recovery after the process stopped in the middle of a save.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{coordinator::PostCoordinator, PostId, PostStatus, PublishResult, RemoteStatus};

/// Posts [`Uploader::resume`] looked at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSummary {
    /// Saves re-entered as automated retries
    pub retried: Vec<PostId>,
    /// Failed posts left alone because they exist remotely or are not drafts
    pub skipped: Vec<PostId>,
}

/// Something that can pick interrupted uploads back up
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn resume(&self) -> PublishResult<ResumeSummary>;
}

#[async_trait]
impl Uploader for PostCoordinator {
    /// Re-save every failed local draft with `automated_retry` set.
    /// Restarts the whole save, not the byte transfers.
    #[instrument(skip(self))]
    async fn resume(&self) -> PublishResult<ResumeSummary> {
        let mut summary = ResumeSummary::default();

        for post in self.publisher().failed_posts().await? {
            if post.status != PostStatus::Draft || post.has_remote() {
                summary.skipped.push(post.id);
                continue;
            }

            match self.save(&post, true).await {
                Ok(outcome) => info!("Resumed post {}: {:?}", post.id, outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Could not resume post {}: {}", post.id, e),
            }
            summary.retried.push(post.id);
        }

        Ok(summary)
    }
}

impl PostCoordinator {
    /// Mark posts left pushing by a killed process as failed, so that
    /// [`Uploader::resume`] can retry them. Returns the repaired ids.
    #[instrument(skip(self))]
    pub async fn refresh_post_status(&self) -> PublishResult<Vec<PostId>> {
        let stuck = self.store().find_by_remote_status(&RemoteStatus::IN_FLIGHT).await?;
        let mut repaired = Vec::with_capacity(stuck.len());

        for post in stuck {
            self.change_status(&post.id, RemoteStatus::Failed).await?;
            repaired.push(post.id);
        }

        if !repaired.is_empty() {
            info!("Marked {} interrupted posts as failed", repaired.len());
        }
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMediaGateway, MemoryPostStore, MemoryPublishGateway};
    use crate::{Media, MediaRemoteStatus, Post};
    use std::sync::Arc;

    fn coordinator() -> (Arc<MemoryPostStore>, Arc<MemoryMediaGateway>, PostCoordinator) {
        let store = Arc::new(MemoryPostStore::new());
        let media = Arc::new(MemoryMediaGateway::new(store.clone()));
        let publisher = Arc::new(MemoryPublishGateway::new(store.clone()));
        let coordinator = PostCoordinator::new(store.clone(), media.clone(), publisher);
        (store, media, coordinator)
    }

    #[tokio::test]
    async fn test_refresh_marks_in_flight_posts_failed() {
        let (store, _media, coordinator) = coordinator();
        let pushing = Post::new().with_status(PostStatus::Publish).with_remote_status(RemoteStatus::Pushing);
        let waiting = Post::new().with_remote_id(5).with_remote_status(RemoteStatus::PushingMedia);
        let synced = Post::new().with_remote_status(RemoteStatus::Sync);
        store.insert(pushing.clone());
        store.insert(waiting.clone());
        store.insert(synced.clone());

        let mut repaired = coordinator.refresh_post_status().await.unwrap();
        repaired.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut expected = vec![pushing.id.clone(), waiting.id.clone()];
        expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(repaired, expected);

        let pushing = store.snapshot(&pushing.id).unwrap();
        assert_eq!(pushing.remote_status, RemoteStatus::Failed);
        assert_eq!(pushing.status, PostStatus::Draft);

        let waiting = store.snapshot(&waiting.id).unwrap();
        assert_eq!(waiting.remote_status, RemoteStatus::Failed);
        assert_eq!(store.snapshot(&synced.id).unwrap().remote_status, RemoteStatus::Sync);
    }

    #[tokio::test]
    async fn test_resume_skips_remote_and_non_draft_posts() {
        let (store, media, coordinator) = coordinator();
        let local_draft = Post::new()
            .with_remote_status(RemoteStatus::Failed)
            .with_media(Media::image(PostId::new()).with_status(MediaRemoteStatus::Failed));
        let remote_draft = Post::new().with_remote_id(3).with_remote_status(RemoteStatus::Failed);
        let scheduled = Post::new()
            .with_status(PostStatus::Scheduled)
            .with_remote_status(RemoteStatus::Failed);
        store.insert(local_draft.clone());
        store.insert(remote_draft.clone());
        store.insert(scheduled.clone());

        let summary = coordinator.resume().await.unwrap();

        assert_eq!(summary.retried, vec![local_draft.id.clone()]);
        assert_eq!(summary.skipped.len(), 2);
        assert_eq!(media.dispatched(), vec![(local_draft.media[0].id.clone(), true)]);
    }
}
