use parking_lot::Mutex;

use crate::{
    gateway::{NoticeSink, SearchIndexer},
    Post, PostId, PostNotice,
};

/// Keeps every notice it receives
#[derive(Default)]
pub struct MemoryNoticeSink {
    notices: Mutex<Vec<PostNotice>>,
}

impl MemoryNoticeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<PostNotice> {
        self.notices.lock().clone()
    }

    pub fn for_post(&self, post_id: &PostId) -> Vec<PostNotice> {
        self.notices
            .lock()
            .iter()
            .filter(|notice| &notice.post_id == post_id)
            .cloned()
            .collect()
    }
}

impl NoticeSink for MemoryNoticeSink {
    fn post(&self, notice: PostNotice) {
        self.notices.lock().push(notice);
    }
}

/// Records indexed post ids in order
#[derive(Default)]
pub struct MemorySearchIndex {
    indexed: Mutex<Vec<PostId>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indexed(&self) -> Vec<PostId> {
        self.indexed.lock().clone()
    }

    pub fn contains(&self, post_id: &PostId) -> bool {
        self.indexed.lock().contains(post_id)
    }
}

impl SearchIndexer for MemorySearchIndex {
    fn index(&self, post: &Post) {
        self.indexed.lock().push(post.id.clone());
    }
}
