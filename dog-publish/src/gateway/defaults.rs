use async_trait::async_trait;
use tracing::{info, warn};

use super::{NoticeSink, SearchIndexer, VideoUrlResolver};
use crate::{Media, Post, PostNotice, PublishError, PublishResult};

/// Uses the URL the upload reported as the playable URL
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteUrlVideoResolver;

#[async_trait]
impl VideoUrlResolver for RemoteUrlVideoResolver {
    async fn resolve_video_url(&self, media: &Media, _post: &Post) -> PublishResult<String> {
        media
            .remote_url
            .clone()
            .ok_or_else(|| PublishError::video_url(&media.id, "upload reported no remote URL"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNoticeSink;

impl NoticeSink for NoopNoticeSink {
    fn post(&self, _notice: PostNotice) {}
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn post(&self, notice: PostNotice) {
        if notice.is_success() {
            info!(post_id = %notice.post_id, "{}: {}", notice.title, notice.message);
        } else {
            warn!(post_id = %notice.post_id, "{}: {}", notice.title, notice.message);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearchIndexer;

impl SearchIndexer for NoopSearchIndexer {
    fn index(&self, _post: &Post) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Media, Post};

    #[test]
    fn test_remote_url_resolver() {
        let post = Post::new();
        let uploaded = Media::video(post.id.clone()).with_remote_url("https://cdn.example/v.mp4");
        let url = tokio_test::block_on(RemoteUrlVideoResolver.resolve_video_url(&uploaded, &post)).unwrap();
        assert_eq!(url, "https://cdn.example/v.mp4");

        let missing = Media::video(post.id.clone());
        let result = tokio_test::block_on(RemoteUrlVideoResolver.resolve_video_url(&missing, &post));
        assert!(matches!(result, Err(PublishError::VideoUrlResolution { .. })));
    }

    #[test]
    fn test_noop_sinks_accept_anything() {
        let post = Post::new();
        NoopNoticeSink.post(PostNotice::success(&post));
        TracingNoticeSink.post(PostNotice::failure(&post, "offline"));
        NoopSearchIndexer.index(&post);
    }
}
