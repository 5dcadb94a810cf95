//! Image acquisition. Drops, file selections and camera captures all end up
//! as one [`AcquiredImage`].

pub mod camera;
pub mod payload;

pub use camera::{CameraDevice, CameraSession, FileCamera, MediaStream, TrackKind};
pub use payload::{guess_mime_type, is_image_type, ImagePayload, PreviewString};

use std::path::PathBuf;

/// Failures that end an acquisition before anything reaches the network.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("unsupported file type `{mime_type}` ({filename})")]
    UnsupportedType { filename: String, mime_type: String },

    #[error("camera access denied: {0}")]
    CameraAccessDenied(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("no file provided")]
    Empty,
}

/// Where the bytes of a [`FileHandle`] live.
#[derive(Debug, Clone)]
enum FileBody {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// An opaque file as handed over by a drop event or a file dialog.
///
/// The declared media type is whatever the source claims; it is not sniffed.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub mime_type: String,
    body: FileBody,
}

impl FileHandle {
    /// A file on disk, typed by its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = guess_mime_type(&name);
        Self {
            name,
            mime_type,
            body: FileBody::Path(path),
        }
    }

    pub fn in_memory(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            body: FileBody::Memory(bytes),
        }
    }

    /// Override the declared media type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Read the bytes into a payload.
    pub async fn read(self) -> Result<ImagePayload, AcquireError> {
        let bytes = match self.body {
            FileBody::Memory(bytes) => bytes,
            FileBody::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|source| AcquireError::Io { path, source })?,
        };
        Ok(ImagePayload::new(bytes, self.mime_type, self.name))
    }
}

/// An image obtained from one of the three supported sources.
#[derive(Debug, Clone)]
pub enum AcquiredImage {
    Dropped(ImagePayload),
    Selected(ImagePayload),
    Captured(ImagePayload),
}

impl AcquiredImage {
    /// Take the first dropped file, rejecting anything not declared as an image.
    pub async fn from_drop(files: Vec<FileHandle>) -> Result<Self, AcquireError> {
        let file = files.into_iter().next().ok_or(AcquireError::Empty)?;
        if !is_image_type(&file.mime_type) {
            return Err(AcquireError::UnsupportedType {
                filename: file.name,
                mime_type: file.mime_type,
            });
        }
        Ok(Self::Dropped(file.read().await?))
    }

    /// Take the first selected file as-is; the dialog already filtered by type.
    pub async fn from_selection(files: Vec<FileHandle>) -> Result<Self, AcquireError> {
        let file = files.into_iter().next().ok_or(AcquireError::Empty)?;
        Ok(Self::Selected(file.read().await?))
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Dropped(_) => "drop",
            Self::Selected(_) => "select",
            Self::Captured(_) => "camera",
        }
    }

    pub fn payload(&self) -> &ImagePayload {
        match self {
            Self::Dropped(p) | Self::Selected(p) | Self::Captured(p) => p,
        }
    }

    pub fn into_payload(self) -> ImagePayload {
        match self {
            Self::Dropped(p) | Self::Selected(p) | Self::Captured(p) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_rejects_non_images() {
        let files = vec![FileHandle::in_memory("manual.pdf", "application/pdf", b"%PDF".to_vec())];
        let err = AcquiredImage::from_drop(files).await.unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedType { ref mime_type, .. } if mime_type == "application/pdf"));
    }

    #[tokio::test]
    async fn drop_takes_first_file_only() {
        let files = vec![
            FileHandle::in_memory("a.png", "image/png", vec![1]),
            FileHandle::in_memory("b.png", "image/png", vec![2]),
        ];
        let acquired = AcquiredImage::from_drop(files).await.unwrap();
        assert_eq!(acquired.source(), "drop");
        assert_eq!(acquired.payload().filename, "a.png");
    }

    #[tokio::test]
    async fn selection_skips_type_validation() {
        let files = vec![FileHandle::in_memory("scan.bin", "application/octet-stream", vec![7])];
        let acquired = AcquiredImage::from_selection(files).await.unwrap();
        assert!(matches!(acquired, AcquiredImage::Selected(_)));
    }

    #[tokio::test]
    async fn reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mug.jpg");
        std::fs::write(&path, [0xff, 0xd8]).unwrap();

        let handle = FileHandle::from_path(&path);
        assert_eq!(handle.mime_type, "image/jpeg");
        let payload = handle.read().await.unwrap();
        assert_eq!(payload.bytes, vec![0xff, 0xd8]);
        assert_eq!(payload.filename, "mug.jpg");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = FileHandle::from_path("/nonexistent/search-me/x.png")
            .read()
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Io { .. }));
    }

    #[tokio::test]
    async fn empty_drop_is_rejected() {
        assert!(matches!(
            AcquiredImage::from_drop(Vec::new()).await,
            Err(AcquireError::Empty)
        ));
    }
}
