use serde::{Deserialize, Serialize};

use super::{MediaId, PostId};

/// Kind of an attached asset. Drives the content rewrite and the
/// extra URL lookup videos need before their reference can be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

/// Upload state of an asset. Only the media upload gateway advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRemoteStatus {
    /// Stored on the device, queued for upload
    Local,
    /// Transfer in flight
    Uploading,
    /// Last attempt failed permanently
    Failed,
    /// Landed on the remote service
    Ended,
}

impl MediaRemoteStatus {
    /// Check if the asset has not landed yet and has not failed
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Local | Self::Uploading)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Uploading => "uploading",
            Self::Failed => "failed",
            Self::Ended => "ended",
        }
    }
}

/// A media asset referenced by a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,

    /// Post that owns the upload of this asset
    pub post_id: PostId,

    pub kind: MediaKind,

    pub remote_status: MediaRemoteStatus,

    pub local_url: Option<String>,

    pub remote_url: Option<String>,

    /// Numeric id assigned by the remote media library
    pub server_media_id: Option<i64>,

    /// Correlation id embedded in classic editor markup
    pub upload_id: String,

    /// Correlation id embedded in block editor markup
    pub block_upload_id: i64,

    pub width: Option<u32>,

    pub height: Option<u32>,

    pub videopress_guid: Option<String>,

    pub local_thumbnail_url: Option<String>,

    /// Automated retries already spent on this asset
    pub automated_retry_count: u32,
}

impl Media {
    /// Create a local asset waiting to be uploaded for `post_id`
    pub fn new(post_id: PostId, kind: MediaKind) -> Self {
        let id = MediaId::new();
        Self {
            upload_id: id.as_str().to_string(),
            block_upload_id: -1,
            id,
            post_id,
            kind,
            remote_status: MediaRemoteStatus::Local,
            local_url: None,
            remote_url: None,
            server_media_id: None,
            width: None,
            height: None,
            videopress_guid: None,
            local_thumbnail_url: None,
            automated_retry_count: 0,
        }
    }

    pub fn image(post_id: PostId) -> Self {
        Self::new(post_id, MediaKind::Image)
    }

    pub fn video(post_id: PostId) -> Self {
        Self::new(post_id, MediaKind::Video)
    }

    pub fn document(post_id: PostId) -> Self {
        Self::new(post_id, MediaKind::Document)
    }

    /// Replace the id. A default upload id follows the new id.
    pub fn with_id<I: Into<MediaId>>(mut self, id: I) -> Self {
        let id = id.into();
        if self.upload_id == self.id.as_str() {
            self.upload_id = id.as_str().to_string();
        }
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: MediaRemoteStatus) -> Self {
        self.remote_status = status;
        self
    }

    pub fn with_remote_url<S: Into<String>>(mut self, url: S) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_server_media_id(mut self, id: i64) -> Self {
        self.server_media_id = Some(id);
        self
    }

    pub fn with_upload_id<S: Into<String>>(mut self, upload_id: S) -> Self {
        self.upload_id = upload_id.into();
        self
    }

    pub fn with_block_upload_id(mut self, block_upload_id: i64) -> Self {
        self.block_upload_id = block_upload_id;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_videopress_guid<S: Into<String>>(mut self, guid: S) -> Self {
        self.videopress_guid = Some(guid.into());
        self
    }

    pub fn with_local_thumbnail_url<S: Into<String>>(mut self, url: S) -> Self {
        self.local_thumbnail_url = Some(url.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.remote_status == MediaRemoteStatus::Failed
    }
}
