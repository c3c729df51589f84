use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::{
    gateway::PostStore, Media, MediaId, Post, PostId, PublishError, PublishResult, RemoteStatus,
};

/// In-memory post store for testing and development
pub struct MemoryPostStore {
    posts: RwLock<HashMap<PostId, Post>>,

    /// When set every write fails, simulating an unreachable store
    fail_writes: AtomicBool,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Insert or replace a post
    pub fn insert(&self, post: Post) {
        self.posts.write().insert(post.id.clone(), post);
    }

    pub fn snapshot(&self, id: &PostId) -> Option<Post> {
        self.posts.read().get(id).cloned()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.posts.read().contains_key(id)
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.read().values().cloned().collect()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> PublishResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PublishError::persistence("memory store is read-only"));
        }
        Ok(())
    }

    /// Mutate a post in place and return the updated copy
    pub(crate) fn update_post<F>(&self, id: &PostId, f: F) -> PublishResult<Post>
    where
        F: FnOnce(&mut Post),
    {
        self.check_writable()?;
        let mut posts = self.posts.write();
        let post = posts.get_mut(id).ok_or_else(|| PublishError::post_not_found(id))?;
        f(post);
        Ok(post.clone())
    }

    /// Mutate an asset in place and return the updated copy
    pub(crate) fn update_media<F>(&self, id: &MediaId, f: F) -> PublishResult<Media>
    where
        F: FnOnce(&mut Media),
    {
        self.check_writable()?;
        let mut posts = self.posts.write();
        let media = posts
            .values_mut()
            .flat_map(|post| post.media.iter_mut())
            .find(|media| &media.id == id)
            .ok_or_else(|| PublishError::media_not_found(id))?;
        f(media);
        Ok(media.clone())
    }
}

impl Default for MemoryPostStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn get(&self, id: &PostId) -> PublishResult<Post> {
        self.snapshot(id).ok_or_else(|| PublishError::post_not_found(id))
    }

    async fn set_remote_status(&self, id: &PostId, status: RemoteStatus) -> PublishResult<()> {
        self.update_post(id, |post| post.remote_status = status)?;
        Ok(())
    }

    async fn set_content(&self, id: &PostId, content: String) -> PublishResult<()> {
        self.update_post(id, |post| post.content = Some(content))?;
        Ok(())
    }

    async fn set_media_remote_url(&self, id: &MediaId, url: String) -> PublishResult<()> {
        self.update_media(id, |media| media.remote_url = Some(url))?;
        Ok(())
    }

    async fn apply_revision(&self, revision: &PostId) -> PublishResult<Post> {
        self.check_writable()?;
        let mut posts = self.posts.write();

        let working = posts
            .get(revision)
            .cloned()
            .ok_or_else(|| PublishError::post_not_found(revision))?;
        let original_id = working
            .original
            .clone()
            .ok_or_else(|| PublishError::NotARevision(revision.to_string()))?;

        let original = posts
            .get_mut(&original_id)
            .ok_or_else(|| PublishError::post_not_found(&original_id))?;
        original.title = working.title;
        original.content = working.content;
        original.status = working.status;
        original.media = working
            .media
            .into_iter()
            .map(|mut media| {
                media.post_id = original_id.clone();
                media
            })
            .collect();
        original.date_modified = Utc::now();
        let canonical = original.clone();

        posts.remove(revision);
        Ok(canonical)
    }

    async fn find_by_remote_status(&self, statuses: &[RemoteStatus]) -> PublishResult<Vec<Post>> {
        Ok(self
            .posts
            .read()
            .values()
            .filter(|post| statuses.contains(&post.remote_status))
            .cloned()
            .collect())
    }
}
