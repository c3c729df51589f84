use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Media, MediaId, PostId};

/// Editorial status of a post. Read-only for the coordinator; only the
/// publish gateway's failure policy may demote it to draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Publish,
    Scheduled,
    Pending,
    Private,
    Trash,
}

impl PostStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Publish => "publish",
            Self::Scheduled => "scheduled",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Trash => "trash",
        }
    }
}

/// Sync state of a post against the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Never pushed
    Local,
    /// Save in progress
    Pushing,
    /// Save waiting on media uploads
    PushingMedia,
    /// Last save failed
    Failed,
    /// In sync with the remote copy
    Sync,
}

impl RemoteStatus {
    /// Statuses a save was in the middle of when the process went away
    pub const IN_FLIGHT: [RemoteStatus; 2] = [RemoteStatus::Pushing, RemoteStatus::PushingMedia];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Pushing => "pushing",
            Self::PushingMedia => "pushing_media",
            Self::Failed => "failed",
            Self::Sync => "sync",
        }
    }
}

/// A content document plus the media it references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,

    /// Canonical post this one is a working copy of
    pub original: Option<PostId>,

    /// Id assigned by the remote service once the post exists there
    pub remote_id: Option<i64>,

    pub status: PostStatus,

    pub remote_status: RemoteStatus,

    pub title: Option<String>,

    /// Markup with local media placeholders until uploads land
    pub content: Option<String>,

    pub permalink: Option<String>,

    pub media: Vec<Media>,

    pub date_modified: DateTime<Utc>,
}

impl Post {
    /// Create a local draft
    pub fn new() -> Self {
        Self {
            id: PostId::new(),
            original: None,
            remote_id: None,
            status: PostStatus::Draft,
            remote_status: RemoteStatus::Local,
            title: None,
            content: None,
            permalink: None,
            media: Vec::new(),
            date_modified: Utc::now(),
        }
    }

    /// Create an unsaved working copy of `original`
    pub fn revision_of(original: &Post) -> Self {
        Self {
            id: PostId::new(),
            original: Some(original.id.clone()),
            media: original.media.clone(),
            ..original.clone()
        }
    }

    pub fn with_id<I: Into<PostId>>(mut self, id: I) -> Self {
        let id = id.into();
        for media in &mut self.media {
            media.post_id = id.clone();
        }
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_remote_status(mut self, status: RemoteStatus) -> Self {
        self.remote_status = status;
        self
    }

    pub fn with_remote_id(mut self, remote_id: i64) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Attach an asset; its owner is rewritten to this post
    pub fn with_media(mut self, mut media: Media) -> Self {
        media.post_id = self.id.clone();
        self.media.push(media);
        self
    }

    pub fn is_revision(&self) -> bool {
        self.original.is_some()
    }

    pub fn has_remote(&self) -> bool {
        self.remote_id.map(|id| id > 0).unwrap_or(false)
    }

    pub fn failed_media(&self) -> Vec<Media> {
        self.media.iter().filter(|m| m.is_failed()).cloned().collect()
    }

    pub fn media_by_id(&self, id: &MediaId) -> Option<&Media> {
        self.media.iter().find(|m| &m.id == id)
    }

    /// Title shown to users, falling back to a placeholder
    pub fn title_for_display(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => "(no title)".to_string(),
        }
    }
}

impl Default for Post {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_links_original() {
        let original = Post::new().with_title("Hello").with_remote_id(12);
        let revision = Post::revision_of(&original);

        assert!(revision.is_revision());
        assert_eq!(revision.original.as_ref(), Some(&original.id));
        assert_ne!(revision.id, original.id);
        assert_eq!(revision.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_has_remote_requires_positive_id() {
        assert!(!Post::new().has_remote());
        assert!(!Post::new().with_remote_id(0).has_remote());
        assert!(Post::new().with_remote_id(7).has_remote());
    }

    #[test]
    fn test_with_media_takes_ownership() {
        let post = Post::new().with_media(Media::image(PostId::from("other")));
        assert_eq!(post.media[0].post_id, post.id);
    }

    #[test]
    fn test_title_for_display() {
        assert_eq!(Post::new().title_for_display(), "(no title)");
        assert_eq!(Post::new().with_title("  ").title_for_display(), "(no title)");
        assert_eq!(Post::new().with_title("Trip").title_for_display(), "Trip");
    }
}
