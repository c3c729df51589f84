use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::{ContentReferenceUpdater, MediaPayload, UploadedMedia};

/// Attribute carrying the classic editor correlation id
const UPLOAD_ATTR: &str = "data-wp_upload_id";

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*"([^"]*)""#).expect("valid attribute pattern")
});

static IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<img\b([^>]*?)(/?)>").expect("valid img pattern"));

static VIDEO_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<video\b([^>]*?)(/?)>").expect("valid video pattern"));

static VIDEO_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<video\b([^>]*)>(.*?)</video>").expect("valid video pattern"));

static ANCHOR_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a\b([^>]*)>(.*?)</a>").expect("valid anchor pattern"));

static IMAGE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!-- wp:image (\{.*?\}) -->(.*?)<!-- /wp:image -->").expect("valid image block pattern")
});

static VIDEO_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!-- wp:video (\{.*?\}) -->(.*?)<!-- /wp:video -->").expect("valid video block pattern")
});

/// Rewrites classic editor tags and block editor blocks that point at a
/// local upload so they reference the uploaded asset instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupContentUpdater;

impl MarkupContentUpdater {
    pub fn new() -> Self {
        Self
    }
}

impl ContentReferenceUpdater for MarkupContentUpdater {
    fn rewrite(&self, content: &str, media: &UploadedMedia) -> String {
        match &media.payload {
            MediaPayload::Image { width, height } => {
                let content = rewrite_classic_image(content, media, *width, *height);
                rewrite_image_block(&content, media)
            }
            MediaPayload::Video { videopress_guid, local_thumbnail_url } => {
                let content = rewrite_classic_video(content, media, videopress_guid.as_deref());
                rewrite_video_block(&content, media, local_thumbnail_url.as_deref())
            }
            MediaPayload::Document { title } => rewrite_document(content, media, title),
        }
    }
}

/// Ordered tag attributes; unquoted attributes are not preserved
struct Attributes(Vec<(String, String)>);

impl Attributes {
    fn parse(raw: &str) -> Self {
        Self(
            ATTRIBUTE
                .captures_iter(raw)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
                .collect(),
        )
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    fn set(&mut self, name: &str, value: &str) {
        let value = value.replace('"', "&quot;");
        match self.0.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    fn remove(&mut self, name: &str) {
        self.0.retain(|(key, _)| key != name);
    }

    fn render(&self, tag: &str, self_closing: bool) -> String {
        let mut out = format!("<{}", tag);
        for (key, value) in &self.0 {
            out.push_str(&format!(" {}=\"{}\"", key, value));
        }
        out.push_str(if self_closing { " />" } else { ">" });
        out
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Block comment attributes with `id` swapped to the server id, if the
/// block belongs to the upload
fn block_attributes(raw: &str, block_upload_id: i64, server_media_id: i64) -> Option<String> {
    let mut attrs: Map<String, Value> = serde_json::from_str(raw).ok()?;
    if attrs.get("id")?.as_i64()? != block_upload_id {
        return None;
    }
    attrs.insert("id".to_string(), Value::from(server_media_id));
    serde_json::to_string(&attrs).ok()
}

fn rewrite_classic_image(
    content: &str,
    media: &UploadedMedia,
    width: Option<u32>,
    height: Option<u32>,
) -> String {
    IMG_TAG
        .replace_all(content, |caps: &Captures| {
            let mut attrs = Attributes::parse(&caps[1]);
            if attrs.get(UPLOAD_ATTR) != Some(media.upload_id.as_str()) {
                return caps[0].to_string();
            }
            attrs.remove(UPLOAD_ATTR);
            attrs.set("src", &media.remote_url);
            if let Some(width) = width {
                attrs.set("width", &width.to_string());
            }
            if let Some(height) = height {
                attrs.set("height", &height.to_string());
            }
            attrs.render("img", !caps[2].is_empty())
        })
        .into_owned()
}

fn rewrite_image_block(content: &str, media: &UploadedMedia) -> String {
    let old_class = format!("wp-image-{}", media.block_upload_id);
    let new_class = format!("wp-image-{}", media.server_media_id);

    IMAGE_BLOCK
        .replace_all(content, |caps: &Captures| {
            let Some(block_attrs) =
                block_attributes(&caps[1], media.block_upload_id, media.server_media_id)
            else {
                return caps[0].to_string();
            };

            let inner = IMG_TAG.replace_all(&caps[2], |img: &Captures| {
                let mut attrs = Attributes::parse(&img[1]);
                attrs.set("src", &media.remote_url);
                let class = attrs.get("class").map(|class| {
                    class
                        .split_whitespace()
                        .map(|c| if c == old_class { new_class.as_str() } else { c })
                        .collect::<Vec<_>>()
                        .join(" ")
                });
                if let Some(class) = class {
                    attrs.set("class", &class);
                }
                attrs.render("img", !img[2].is_empty())
            });

            format!("<!-- wp:image {} -->{}<!-- /wp:image -->", block_attrs, inner)
        })
        .into_owned()
}

fn rewrite_classic_video(content: &str, media: &UploadedMedia, videopress_guid: Option<&str>) -> String {
    VIDEO_ELEMENT
        .replace_all(content, |caps: &Captures| {
            let mut attrs = Attributes::parse(&caps[1]);
            if attrs.get(UPLOAD_ATTR) != Some(media.upload_id.as_str()) {
                return caps[0].to_string();
            }
            if let Some(guid) = videopress_guid {
                return format!("[wpvideo {}]", guid);
            }
            attrs.remove(UPLOAD_ATTR);
            attrs.set("src", &media.remote_url);
            format!("{}{}</video>", attrs.render("video", false), &caps[2])
        })
        .into_owned()
}

fn rewrite_video_block(content: &str, media: &UploadedMedia, local_thumbnail_url: Option<&str>) -> String {
    VIDEO_BLOCK
        .replace_all(content, |caps: &Captures| {
            let Some(block_attrs) =
                block_attributes(&caps[1], media.block_upload_id, media.server_media_id)
            else {
                return caps[0].to_string();
            };

            let inner = VIDEO_OPEN_TAG.replace_all(&caps[2], |video: &Captures| {
                let mut attrs = Attributes::parse(&video[1]);
                attrs.set("src", &media.remote_url);
                if local_thumbnail_url.is_some() && attrs.get("poster") == local_thumbnail_url {
                    attrs.remove("poster");
                }
                attrs.render("video", !video[2].is_empty())
            });

            format!("<!-- wp:video {} -->{}<!-- /wp:video -->", block_attrs, inner)
        })
        .into_owned()
}

fn rewrite_document(content: &str, media: &UploadedMedia, title: &str) -> String {
    ANCHOR_ELEMENT
        .replace_all(content, |caps: &Captures| {
            let attrs = Attributes::parse(&caps[1]);
            if attrs.get(UPLOAD_ATTR) != Some(media.upload_id.as_str()) {
                return caps[0].to_string();
            }
            format!(
                "<a href=\"{}\">{}</a>",
                media.remote_url.replace('"', "&quot;"),
                escape_text(title)
            )
        })
        .into_owned()
}
