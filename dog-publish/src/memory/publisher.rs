use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::MemoryPostStore;
use crate::{
    gateway::{PostStore, PublishGateway},
    Post, PostId, PostStatus, PublishError, PublishResult, RemoteStatus,
};

/// In-memory publishing transport. Accepts every push unless a rejection
/// was scripted with [`reject_next`](Self::reject_next).
pub struct MemoryPublishGateway {
    store: Arc<MemoryPostStore>,
    published: Mutex<Vec<Post>>,
    rejections: Mutex<VecDeque<String>>,
    next_remote_id: AtomicI64,
}

impl MemoryPublishGateway {
    pub fn new(store: Arc<MemoryPostStore>) -> Self {
        Self {
            store,
            published: Mutex::new(Vec::new()),
            rejections: Mutex::new(VecDeque::new()),
            next_remote_id: AtomicI64::new(1000),
        }
    }

    /// Fail the next push with `reason`
    pub fn reject_next<S: Into<String>>(&self, reason: S) {
        self.rejections.lock().push_back(reason.into());
    }

    /// Posts exactly as they were handed to `publish`
    pub fn published(&self) -> Vec<Post> {
        self.published.lock().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().len()
    }
}

#[async_trait]
impl PublishGateway for MemoryPublishGateway {
    async fn publish(&self, post: &Post) -> PublishResult<Post> {
        self.published.lock().push(post.clone());

        let rejection = self.rejections.lock().pop_front();
        if let Some(reason) = rejection {
            self.mark_failed(&post.id).await?;
            return Err(PublishError::rejected(reason));
        }

        let remote_id = match post.remote_id {
            Some(id) if id > 0 => id,
            _ => self.next_remote_id.fetch_add(1, Ordering::SeqCst),
        };

        let updated = self.store.update_post(&post.id, |stored| {
            stored.remote_id = Some(remote_id);
            stored.remote_status = RemoteStatus::Sync;
            stored.permalink = Some(format!("https://blog.example/?p={}", remote_id));
        })?;
        debug!("Published post {} as {}", post.id, remote_id);
        Ok(updated)
    }

    async fn failed_posts(&self) -> PublishResult<Vec<Post>> {
        self.store.find_by_remote_status(&[RemoteStatus::Failed]).await
    }

    async fn mark_failed(&self, post_id: &PostId) -> PublishResult<()> {
        self.store.update_post(post_id, |post| {
            post.remote_status = RemoteStatus::Failed;
            if !post.has_remote() {
                post.status = PostStatus::Draft;
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_assigns_remote_identity() {
        let store = Arc::new(MemoryPostStore::new());
        let post = Post::new().with_status(PostStatus::Publish);
        store.insert(post.clone());
        let publisher = MemoryPublishGateway::new(store.clone());

        let published = publisher.publish(&post).await.unwrap();

        assert!(published.has_remote());
        assert_eq!(published.remote_status, RemoteStatus::Sync);
        assert!(published.permalink.is_some());
        assert_eq!(publisher.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_demotes_local_only_post() {
        let store = Arc::new(MemoryPostStore::new());
        let local = Post::new().with_status(PostStatus::Publish);
        let remote = Post::new().with_status(PostStatus::Publish).with_remote_id(7);
        store.insert(local.clone());
        store.insert(remote.clone());
        let publisher = MemoryPublishGateway::new(store.clone());

        publisher.reject_next("title too long");
        publisher.reject_next("server down");
        assert!(matches!(publisher.publish(&local).await, Err(PublishError::PublishRejected(_))));
        assert!(publisher.publish(&remote).await.is_err());

        let local = store.snapshot(&local.id).unwrap();
        assert_eq!(local.remote_status, RemoteStatus::Failed);
        assert_eq!(local.status, PostStatus::Draft);

        let remote = store.snapshot(&remote.id).unwrap();
        assert_eq!(remote.status, PostStatus::Publish);
        assert_eq!(publisher.failed_posts().await.unwrap().len(), 2);
    }
}
