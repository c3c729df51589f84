//! # dog-publish: Post Publishing Coordinator
//!
//! **Saves posts whose media is still uploading, and publishes them once it lands**
//!
//! A post may reference images, videos and documents that have to reach the
//! remote service before the post itself can be pushed. Uploads run on their
//! own schedule, fail independently and may span process restarts.
//! dog-publish keeps the post's remote status consistent through all of it.
//!
//! ## Features
//!
//! - **Non-blocking saves**: `save` dispatches uploads and returns; completion
//!   arrives as media events
//! - **One observer per post**: registrations are idempotent and torn down
//!   only on success or explicit cancel
//! - **Serial event handling**: a single worker applies media events, so status
//!   writes never race
//! - **Content rewriting**: local placeholders are replaced with remote
//!   references as each asset lands
//! - **Crash recovery**: `refresh_post_status` and `resume` pick interrupted
//!   saves back up
//! - **Structured observability**: broadcast event stream and live counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dog_publish::prelude::*;
//! use dog_publish::memory::{MemoryMediaGateway, MemoryPostStore, MemoryPublishGateway};
//!
//! # async fn example() -> PublishResult<()> {
//! let store = Arc::new(MemoryPostStore::new());
//! let media = Arc::new(MemoryMediaGateway::new(store.clone()));
//! let publisher = Arc::new(MemoryPublishGateway::new(store.clone()));
//!
//! let coordinator = PostCoordinator::new(store.clone(), media.clone(), publisher);
//! let worker = coordinator.start().await?;
//!
//! let post = Post::new()
//!     .with_title("Trip report")
//!     .with_media(Media::image(PostId::new()));
//! store.insert(post.clone());
//!
//! // Waits for the image, publishes when the gateway reports it ended
//! coordinator.save(&post, false).await?;
//!
//! worker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod observability;
pub mod registry;
pub mod resume;
pub mod types;

pub use config::CoordinatorConfig;
pub use content::{ContentReferenceUpdater, MarkupContentUpdater, MediaPayload, UploadedMedia};
pub use coordinator::{CoordinatorHandle, PostCoordinator, SaveOutcome};
pub use error::{PublishError, PublishResult, SaveFailure};
pub use gateway::{
    MediaUploadGateway, NoticeSink, PostStore, PublishGateway, SearchIndexer, VideoUrlResolver,
};
pub use observability::{LiveMetrics, ObservabilityLayer};
pub use registry::{ObserverRegistry, Registration};
pub use resume::{ResumeSummary, Uploader};
pub use types::{
    CoordinatorEvent, Media, MediaEvent, MediaEventSink, MediaId, MediaKind, MediaRemoteStatus,
    MediaUploadState, NoticeAction, NoticeKind, ObserverId, Post, PostId, PostNotice, PostStatus,
    RemoteStatus,
};

/// Everything needed to wire up and drive a coordinator
pub mod prelude {
    pub use crate::{
        CoordinatorConfig, CoordinatorHandle, PostCoordinator, SaveOutcome, Uploader,
    };

    pub use crate::{
        MediaUploadGateway, NoticeSink, PostStore, PublishGateway, SearchIndexer, VideoUrlResolver,
    };

    pub use crate::{
        Media, MediaId, MediaKind, MediaRemoteStatus, Post, PostId, PostStatus, PublishError,
        PublishResult, RemoteStatus,
    };
}
