use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw image bytes plus the metadata the upload needs.
///
/// Owned by whichever acquisition produced it, then moved into the upload
/// task and dropped once the request settles.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Keep the bytes out of logs.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// `data:` URI rendering of a payload, used for the local preview.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewString(String);

impl PreviewString {
    pub fn encode(payload: &ImagePayload) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&payload.bytes);
        Self(format!("data:{};base64,{}", payload.mime_type, b64))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Media type recorded in the URI header.
    pub fn mime_type(&self) -> Option<&str> {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(mime, _)| mime)
    }
}

impl fmt::Debug for PreviewString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mime_type() {
            Some(mime) => write!(f, "PreviewString({mime}, {} chars)", self.0.len()),
            None => write!(f, "PreviewString({} chars)", self.0.len()),
        }
    }
}

/// Whether a declared media type names an image (`image/<subtype>`).
pub fn is_image_type(mime_type: &str) -> bool {
    mime_type.trim().strip_prefix("image/").is_some_and(|subtype| {
        !subtype.is_empty()
            && subtype
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'))
    })
}

/// Guess MIME type from filename extension.
pub fn guess_mime_type(filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
    .to_string()
}
