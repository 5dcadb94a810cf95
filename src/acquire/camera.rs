use super::{AcquireError, ImagePayload};
use async_trait::async_trait;
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::PathBuf;

/// Kind of a media track carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A live media stream handed out by a camera device.
pub trait MediaStream: Send {
    fn tracks(&self) -> Vec<TrackKind>;

    /// The frame currently shown by the video track.
    fn current_frame(&mut self) -> Result<DynamicImage, AcquireError>;

    /// Stop every underlying track. Must be idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Something that can be asked for a video stream.
///
/// Opening is where permission is requested; a refusal or a missing device
/// surfaces as [`AcquireError::CameraAccessDenied`].
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self) -> Result<Box<dyn MediaStream>, AcquireError>;

    fn label(&self) -> String;
}

/// An engaged camera. Dropping it releases the stream.
pub struct CameraSession {
    stream: Option<Box<dyn MediaStream>>,
    jpeg_quality: u8,
}

impl CameraSession {
    pub async fn open(device: &dyn CameraDevice, jpeg_quality: u8) -> Result<Self, AcquireError> {
        let stream = device.open().await?;
        if !stream.tracks().contains(&TrackKind::Video) {
            let mut stream = stream;
            stream.stop();
            return Err(AcquireError::CameraAccessDenied(format!(
                "{} has no video track",
                device.label()
            )));
        }
        tracing::debug!(device = %device.label(), "camera stream acquired");
        Ok(Self {
            stream: Some(stream),
            jpeg_quality,
        })
    }

    pub fn is_live(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_live())
    }

    /// Snapshot the current frame as a JPEG and end the session.
    ///
    /// The stream is released whether or not encoding succeeds.
    pub fn capture(mut self) -> Result<ImagePayload, AcquireError> {
        let frame = match self.stream.as_mut() {
            Some(stream) => stream.current_frame(),
            None => Err(AcquireError::Capture("camera session already released".into())),
        };
        self.release();

        let frame = frame?;
        let bytes = encode_jpeg(&frame, self.jpeg_quality)?;
        let filename = format!("capture-{}.jpg", Local::now().format("%Y%m%d-%H%M%S"));
        Ok(ImagePayload::new(bytes, "image/jpeg", filename))
    }

    /// End the session without producing a payload.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::debug!("camera stream released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<Vec<u8>, AcquireError> {
    let rgb = frame.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| AcquireError::Capture(e.to_string()))?;
    Ok(buf)
}

/// A virtual camera whose video feed is a still image on disk.
pub struct FileCamera {
    source: PathBuf,
}

impl FileCamera {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl CameraDevice for FileCamera {
    async fn open(&self) -> Result<Box<dyn MediaStream>, AcquireError> {
        let bytes = tokio::fs::read(&self.source)
            .await
            .map_err(|e| AcquireError::CameraAccessDenied(format!("{}: {e}", self.source.display())))?;
        let frame = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| AcquireError::CameraAccessDenied(e.to_string()))?
            .map_err(|e| AcquireError::CameraAccessDenied(format!("{}: {e}", self.source.display())))?;
        Ok(Box::new(StillStream {
            frame,
            live: true,
        }))
    }

    fn label(&self) -> String {
        format!("file:{}", self.source.display())
    }
}

struct StillStream {
    frame: DynamicImage,
    live: bool,
}

impl MediaStream for StillStream {
    fn tracks(&self) -> Vec<TrackKind> {
        vec![TrackKind::Video]
    }

    fn current_frame(&mut self) -> Result<DynamicImage, AcquireError> {
        if !self.live {
            return Err(AcquireError::Capture("stream stopped".into()));
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeStream {
        stopped: Arc<AtomicBool>,
        stops: Arc<AtomicUsize>,
        tracks: Vec<TrackKind>,
    }

    impl MediaStream for FakeStream {
        fn tracks(&self) -> Vec<TrackKind> {
            self.tracks.clone()
        }
        fn current_frame(&mut self) -> Result<DynamicImage, AcquireError> {
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]))))
        }
        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        fn is_live(&self) -> bool {
            !self.stopped.load(Ordering::SeqCst)
        }
    }

    struct FakeCamera {
        stopped: Arc<AtomicBool>,
        stops: Arc<AtomicUsize>,
        tracks: Vec<TrackKind>,
    }

    impl FakeCamera {
        fn new(tracks: Vec<TrackKind>) -> Self {
            Self {
                stopped: Arc::new(AtomicBool::new(false)),
                stops: Arc::new(AtomicUsize::new(0)),
                tracks,
            }
        }
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn open(&self) -> Result<Box<dyn MediaStream>, AcquireError> {
            Ok(Box::new(FakeStream {
                stopped: self.stopped.clone(),
                stops: self.stops.clone(),
                tracks: self.tracks.clone(),
            }))
        }
        fn label(&self) -> String {
            "fake".into()
        }
    }

    #[tokio::test]
    async fn capture_yields_jpeg_and_releases_stream() {
        let cam = FakeCamera::new(vec![TrackKind::Video, TrackKind::Audio]);
        let session = CameraSession::open(&cam, 90).await.unwrap();
        assert!(session.is_live());

        let payload = session.capture().unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(&payload.bytes[..2], &[0xff, 0xd8]);
        assert!(payload.filename.ends_with(".jpg"));
        assert!(cam.stopped.load(Ordering::SeqCst));
        assert_eq!(cam.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_and_drop_release_exactly_once() {
        let cam = FakeCamera::new(vec![TrackKind::Video]);
        CameraSession::open(&cam, 90).await.unwrap().cancel();
        assert_eq!(cam.stops.load(Ordering::SeqCst), 1);

        let cam = FakeCamera::new(vec![TrackKind::Video]);
        {
            let _session = CameraSession::open(&cam, 90).await.unwrap();
        }
        assert!(cam.stopped.load(Ordering::SeqCst));
        assert_eq!(cam.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_without_video_is_refused_and_stopped() {
        let cam = FakeCamera::new(vec![TrackKind::Audio]);
        let err = CameraSession::open(&cam, 90).await.err().unwrap();
        assert!(matches!(err, AcquireError::CameraAccessDenied(_)));
        assert!(cam.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn file_camera_serves_still_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(8, 6, Rgb([0, 128, 255])).save(&path).unwrap();

        let session = CameraSession::open(&FileCamera::new(&path), 80).await.unwrap();
        let payload = session.capture().unwrap();
        let decoded = image::load_from_memory(&payload.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[tokio::test]
    async fn missing_file_camera_is_access_denied() {
        let cam = FileCamera::new("/nonexistent/search-me/frame.png");
        let err = CameraSession::open(&cam, 80).await.err().unwrap();
        assert!(matches!(err, AcquireError::CameraAccessDenied(_)));
    }
}
