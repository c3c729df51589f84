//! Rewriting of local media placeholders once an upload lands.
//!
//! The coordinator decides *when* a rewrite runs and with *which* asset;
//! the [`ContentReferenceUpdater`] decides *how* the markup changes.

mod markup;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Media, MediaId, MediaKind};

pub use markup::MarkupContentUpdater;

/// Substitutes an uploaded asset's remote reference into post content.
/// Best effort: content it cannot match comes back unchanged.
pub trait ContentReferenceUpdater: Send + Sync {
    fn rewrite(&self, content: &str, media: &UploadedMedia) -> String;
}

/// Kind-specific data a rewrite needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaPayload {
    Image {
        width: Option<u32>,
        height: Option<u32>,
    },
    Video {
        videopress_guid: Option<String>,
        local_thumbnail_url: Option<String>,
    },
    Document {
        title: String,
    },
}

/// A finished upload, ready to be referenced from content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub media_id: MediaId,
    pub upload_id: String,
    pub block_upload_id: i64,
    pub server_media_id: i64,
    pub remote_url: String,
    pub payload: MediaPayload,
}

impl UploadedMedia {
    /// Build from an asset record. `None` when the upload has not produced
    /// a remote URL and server id yet, or when a document URL has no file name.
    pub fn from_media(media: &Media) -> Option<Self> {
        let remote_url = media.remote_url.clone()?;
        let server_media_id = media.server_media_id?;

        let payload = match media.kind {
            MediaKind::Image => MediaPayload::Image {
                width: media.width,
                height: media.height,
            },
            MediaKind::Video => MediaPayload::Video {
                videopress_guid: media.videopress_guid.clone(),
                local_thumbnail_url: media.local_thumbnail_url.clone(),
            },
            MediaKind::Document => MediaPayload::Document {
                title: document_title(&remote_url)?,
            },
        };

        Some(Self {
            media_id: media.id.clone(),
            upload_id: media.upload_id.clone(),
            block_upload_id: media.block_upload_id,
            server_media_id,
            remote_url,
            payload,
        })
    }
}

/// Last path segment of the URL, used as link text for documents
fn document_title(remote_url: &str) -> Option<String> {
    let url = Url::parse(remote_url).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostId;

    #[test]
    fn test_requires_remote_fields() {
        let media = Media::image(PostId::from("p1"));
        assert!(UploadedMedia::from_media(&media).is_none());

        let media = media.with_remote_url("https://cdn.example/x.jpg");
        assert!(UploadedMedia::from_media(&media).is_none());

        let media = media.with_server_media_id(42).with_size(640, 480);
        let uploaded = UploadedMedia::from_media(&media).unwrap();
        assert_eq!(uploaded.server_media_id, 42);
        assert_eq!(
            uploaded.payload,
            MediaPayload::Image { width: Some(640), height: Some(480) }
        );
    }

    #[test]
    fn test_document_title_from_url() {
        let media = Media::document(PostId::from("p1"))
            .with_remote_url("https://cdn.example/files/2024/report.pdf")
            .with_server_media_id(7);
        let uploaded = UploadedMedia::from_media(&media).unwrap();
        assert_eq!(uploaded.payload, MediaPayload::Document { title: "report.pdf".to_string() });

        let broken = Media::document(PostId::from("p1"))
            .with_remote_url("not a url")
            .with_server_media_id(7);
        assert!(UploadedMedia::from_media(&broken).is_none());
    }
}
