use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MediaId;

/// Result type for coordinator operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Infrastructure errors raised by the coordinator and its collaborators
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Post {0} is not a revision")]
    NotARevision(String),

    /// The durable store refused a write. Never recovered from.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Could not resolve video URL for {media_id}: {reason}")]
    VideoUrlResolution { media_id: String, reason: String },

    #[error("Remote service rejected the post: {0}")]
    PublishRejected(String),

    #[error("Coordinator worker is already running")]
    AlreadyRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PublishError {
    pub fn post_not_found(id: impl ToString) -> Self {
        Self::PostNotFound(id.to_string())
    }

    pub fn media_not_found(id: impl ToString) -> Self {
        Self::MediaNotFound(id.to_string())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn video_url(media_id: &MediaId, reason: impl Into<String>) -> Self {
        Self::VideoUrlResolution {
            media_id: media_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::PublishRejected(msg.into())
    }

    /// Errors that must stop the coordinator instead of becoming a post status
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Internal(_))
    }
}

/// Why a save ended with the post marked failed
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaveFailure {
    /// Not every asset of the post could be (re)started; the caller must save again
    #[error("Only {dispatched} of {total} media could be pushed")]
    PartialMediaDispatch { dispatched: usize, total: usize },

    /// The gateway gave up on one asset; siblings keep uploading
    #[error("Media {media_id} failed to upload")]
    MediaPermanentFailure { media_id: MediaId },

    #[error("Video URL lookup failed for {media_id}: {reason}")]
    VideoUrlResolution { media_id: MediaId, reason: String },

    #[error("Publishing failed: {0}")]
    Publish(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(PublishError::persistence("disk gone").is_fatal());
        assert!(!PublishError::rejected("bad title").is_fatal());
        assert!(!PublishError::post_not_found("p1").is_fatal());
    }

    #[test]
    fn test_failure_messages() {
        let failure = SaveFailure::PartialMediaDispatch { dispatched: 1, total: 3 };
        assert_eq!(failure.to_string(), "Only 1 of 3 media could be pushed");

        let error = PublishError::video_url(&MediaId::from("m1"), "404");
        assert_eq!(error.to_string(), "Could not resolve video URL for m1: 404");
    }
}
