pub mod ids;
pub mod media;
pub mod post;
pub mod events;
pub mod notice;

pub use ids::{MediaId, ObserverId, PostId};
pub use media::{Media, MediaKind, MediaRemoteStatus};
pub use post::{Post, PostStatus, RemoteStatus};
pub use events::{CoordinatorEvent, MediaEvent, MediaEventSink, MediaUploadState};
pub use notice::{NoticeAction, NoticeKind, PostNotice};
