use serde::{Deserialize, Serialize};

use super::{Post, PostId, PostStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    Success,
    Failure,
}

/// Follow-up the user can take from a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeAction {
    View,
    Publish,
    Retry,
}

/// User-facing payload describing how a save ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostNotice {
    pub post_id: PostId,
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    pub action: Option<NoticeAction>,
}

impl PostNotice {
    /// Build the notice for a post the remote service accepted
    pub fn success(post: &Post) -> Self {
        let (title, action) = match post.status {
            PostStatus::Draft => ("Draft uploaded", NoticeAction::Publish),
            PostStatus::Scheduled => ("Post scheduled", NoticeAction::View),
            PostStatus::Private => ("Published privately", NoticeAction::View),
            PostStatus::Pending => ("Post pending review", NoticeAction::View),
            PostStatus::Publish | PostStatus::Trash => ("Post published", NoticeAction::View),
        };

        Self {
            post_id: post.id.clone(),
            kind: NoticeKind::Success,
            title: title.to_string(),
            message: post.title_for_display(),
            action: Some(action),
        }
    }

    /// Build the notice for a post that could not be pushed
    pub fn failure(post: &Post, error: &str) -> Self {
        let title = match post.status {
            PostStatus::Draft => "Unable to upload draft",
            PostStatus::Scheduled => "Unable to schedule post",
            PostStatus::Private => "Unable to publish post privately",
            PostStatus::Pending => "Unable to submit post for review",
            PostStatus::Publish | PostStatus::Trash => "Unable to publish post",
        };

        Self {
            post_id: post.id.clone(),
            kind: NoticeKind::Failure,
            title: title.to_string(),
            message: format!("{}: {}", post.title_for_display(), error),
            action: Some(NoticeAction::Retry),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }
}
