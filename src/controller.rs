//! The upload area: turns drag, drop, select and camera gestures into
//! uploads, and settles every upload into the shared state.
//!
//! ```text
//!            drag_enter            drop / select / capture
//!   Idle ───────────────▶ Dragging ──────────────────────▶ Uploading
//!    │ ▲ ◀─────────────── drag_leave                          │
//!    │ └──────────────────────── settled (results or fallback)┘
//!    │ start_camera (granted)
//!    ▼
//!  CameraActive ── capture ──▶ Uploading
//!               ── cancel  ──▶ Idle
//! ```
//!
//! A new acquisition replaces the in-flight upload: the old request is
//! cancelled and nothing it produces is committed.

use crate::acquire::{AcquireError, AcquiredImage, CameraDevice, CameraSession, FileHandle, PreviewString};
use crate::config::Config;
use crate::notify::{Notification, Notifier};
use crate::progress::ProgressSimulator;
use crate::state::{AppState, UiMode};
use crate::upload::{
    FallbackDataset, HttpRecognitionClient, Recognition, RecognitionBackend, UploadError, FALLBACK_NOTICE,
};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

const FOUND: &str = "Product found! Showing comparisons";
const FAILED: &str = "Failed to process image. Please try again.";
const NOT_AN_IMAGE: &str = "Please upload an image file";
const NO_CAMERA: &str = "Unable to access camera. Please check permissions.";
const CAPTURE_FAILED: &str = "Failed to capture photo. Please try again.";

/// How an upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Live results were published.
    Recognized,
    /// The backend failed; the fallback dataset was published instead.
    Degraded { error: String },
    /// A newer acquisition or teardown took over; nothing was committed.
    Superseded,
}

/// Handle to a running upload.
pub struct UploadHandle {
    attempt: u64,
    task: JoinHandle<UploadOutcome>,
}

impl UploadHandle {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Wait for the upload to settle.
    pub async fn outcome(self) -> UploadOutcome {
        self.task.await.unwrap_or(UploadOutcome::Superseded)
    }

    /// A handle for an acquisition that was never uploaded. Attempt 0 is
    /// never current, so it cannot be confused with a live upload.
    fn refused() -> Self {
        Self {
            attempt: 0,
            task: tokio::spawn(std::future::ready(UploadOutcome::Superseded)),
        }
    }
}

/// Everything a spawned upload needs, detached from the controller.
#[derive(Clone)]
struct Pipeline {
    state: AppState,
    notifier: Arc<dyn Notifier>,
    backend: Arc<dyn RecognitionBackend>,
    fallback: Arc<FallbackDataset>,
    progress: ProgressSimulator,
    notice_duration: Duration,
}

impl Pipeline {
    async fn run(self, attempt: u64, acquired: AcquiredImage, cancel: CancellationToken) -> UploadOutcome {
        let payload = acquired.into_payload();
        let ticker = self.progress.start(&self.state, attempt, cancel.child_token());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.backend.recognize(&payload) => Some(result),
        };
        drop(payload);

        let Some(result) = result else {
            ticker.abandon();
            tracing::info!("upload superseded");
            return UploadOutcome::Superseded;
        };
        ticker.finish();

        match result {
            Ok(recognition) => self.publish_results(attempt, recognition),
            Err(err) => self.publish_fallback(attempt, err),
        }
    }

    fn publish_results(&self, attempt: u64, recognition: Recognition) -> UploadOutcome {
        let Recognition {
            s3_url,
            product_details,
            search_results,
        } = recognition;
        let offers = search_results.len();

        let committed = self.state.commit(attempt, |tx| {
            tx.set_s3_url(Some(s3_url));
            tx.set_product_details(Some(product_details));
            tx.set_search_results(Some(search_results));
            tx.set_degraded(false);
            tx.set_loading(false);
            tx.set_mode(UiMode::Idle);
        });
        if !committed {
            return UploadOutcome::Superseded;
        }

        tracing::info!(offers, "product recognized");
        self.notifier.notify(Notification::success(FOUND));
        UploadOutcome::Recognized
    }

    fn publish_fallback(&self, attempt: u64, err: UploadError) -> UploadOutcome {
        let message = err.user_message();
        let fallback = &self.fallback;

        let committed = self.state.commit(attempt, |tx| {
            tx.set_loading(false);
            tx.set_error(Some(message.clone()));
            tx.set_s3_url(fallback.s3_url.clone());
            tx.set_product_details(Some(fallback.product_details.clone()));
            tx.set_search_results(Some(fallback.search_results.clone()));
            tx.set_degraded(true);
            tx.set_mode(UiMode::Idle);
        });
        if !committed {
            return UploadOutcome::Superseded;
        }

        tracing::warn!(error = %err, status = ?err.status(), "recognition failed; serving fallback dataset");
        self.notifier.notify(Notification::error(FAILED));
        self.notifier
            .notify(Notification::info(FALLBACK_NOTICE).lasting(self.notice_duration));
        UploadOutcome::Degraded { error: message }
    }
}

pub struct UploadController {
    pipeline: Pipeline,
    jpeg_quality: u8,
    camera: Mutex<Option<CameraSession>>,
    inflight: Mutex<Option<CancellationToken>>,
    lifetime: CancellationToken,
}

impl UploadController {
    pub fn new(state: AppState, backend: Arc<dyn RecognitionBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pipeline: Pipeline {
                state,
                notifier,
                backend,
                fallback: Arc::new(FallbackDataset::builtin()),
                progress: ProgressSimulator::default(),
                notice_duration: Duration::from_secs(10),
            },
            jpeg_quality: 92,
            camera: Mutex::new(None),
            inflight: Mutex::new(None),
            lifetime: CancellationToken::new(),
        }
    }

    /// Wire an HTTP backend and fallback dataset from configuration.
    pub fn from_config(config: &Config, state: AppState, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let backend = HttpRecognitionClient::new(&config.api)?;
        let fallback = FallbackDataset::resolve(config.fallback_dataset_path().as_deref());
        Ok(Self::new(state, Arc::new(backend), notifier)
            .with_fallback(fallback)
            .with_progress(ProgressSimulator::from_config(&config.progress))
            .with_notice_duration(Duration::from_secs(config.fallback.notice_secs))
            .with_jpeg_quality(config.camera.jpeg_quality))
    }

    pub fn with_fallback(mut self, fallback: FallbackDataset) -> Self {
        self.pipeline.fallback = Arc::new(fallback);
        self
    }

    pub fn with_progress(mut self, progress: ProgressSimulator) -> Self {
        self.pipeline.progress = progress;
        self
    }

    pub fn with_notice_duration(mut self, duration: Duration) -> Self {
        self.pipeline.notice_duration = duration;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.pipeline.state
    }

    pub fn mode(&self) -> UiMode {
        self.pipeline.state.mode()
    }

    pub fn camera_active(&self) -> bool {
        self.camera.lock().is_some()
    }

    pub fn drag_enter(&self) {
        if self.mode() == UiMode::Idle {
            self.pipeline.state.set_mode(UiMode::Dragging);
        }
    }

    pub fn drag_leave(&self) {
        self.leave_dragging();
    }

    /// Handle a drop. Only the first file is considered, and it must be
    /// declared as an image.
    pub async fn drop_files(&self, files: Vec<FileHandle>) -> Result<UploadHandle, AcquireError> {
        self.leave_dragging();
        let acquired = AcquiredImage::from_drop(files).await;
        self.accept(acquired)
    }

    /// Handle a file-dialog selection. Only the first file is considered.
    pub async fn select_files(&self, files: Vec<FileHandle>) -> Result<UploadHandle, AcquireError> {
        let acquired = AcquiredImage::from_selection(files).await;
        self.accept(acquired)
    }

    /// Ask `device` for a stream and enter camera mode.
    ///
    /// On refusal the mode is left untouched and a notification is sent.
    pub async fn start_camera(&self, device: &dyn CameraDevice) -> Result<(), AcquireError> {
        if self.camera_active() || self.is_shut_down() {
            return Ok(());
        }

        let session = match CameraSession::open(device, self.jpeg_quality).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(device = %device.label(), error = %err, "camera unavailable");
                self.pipeline.notifier.notify(Notification::error(NO_CAMERA));
                return Err(err);
            }
        };

        if self.cancel_inflight() {
            let state = &self.pipeline.state;
            state.set_loading(false);
            state.set_progress(None);
        }

        // A racing start may have won while we waited on the device; the
        // loser's session is dropped and released here.
        let mut camera = self.camera.lock();
        if camera.is_none() {
            *camera = Some(session);
            self.pipeline.state.set_mode(UiMode::CameraActive);
            tracing::info!(device = %device.label(), "camera mode engaged");
        }
        Ok(())
    }

    /// Snapshot the live frame and upload it. Camera mode ends either way.
    pub async fn capture(&self) -> Result<UploadHandle, AcquireError> {
        let Some(session) = self.camera.lock().take() else {
            return Err(AcquireError::Capture("camera is not active".into()));
        };

        let captured = tokio::task::spawn_blocking(move || session.capture())
            .await
            .unwrap_or_else(|e| Err(AcquireError::Capture(e.to_string())));

        match captured {
            Ok(payload) => Ok(self.submit(AcquiredImage::Captured(payload))),
            Err(err) => {
                tracing::warn!(error = %err, "frame capture failed");
                self.pipeline.state.set_mode(UiMode::Idle);
                self.pipeline.notifier.notify(Notification::error(CAPTURE_FAILED));
                Err(err)
            }
        }
    }

    /// Leave camera mode without capturing.
    pub fn cancel_camera(&self) {
        let session = self.camera.lock().take();
        if let Some(session) = session {
            session.cancel();
            self.pipeline.state.set_mode(UiMode::Idle);
            tracing::info!("camera mode cancelled");
        }
    }

    /// Start uploading `acquired`, replacing any upload still in flight.
    ///
    /// The preview is published before this returns, and so before the
    /// request is issued. After [`shutdown`](Self::shutdown) nothing is
    /// uploaded and the state is left alone.
    pub fn submit(&self, acquired: AcquiredImage) -> UploadHandle {
        let state = &self.pipeline.state;
        if let Some(session) = self.camera.lock().take() {
            session.cancel();
        }
        if self.is_shut_down() {
            tracing::debug!(source = acquired.source(), "controller shut down; acquisition ignored");
            return UploadHandle::refused();
        }
        let token = self.lifetime.child_token();
        if let Some(previous) = self.inflight.lock().replace(token.clone()) {
            previous.cancel();
        }

        let attempt = state.begin_attempt();
        let source = acquired.source();
        let preview = PreviewString::encode(acquired.payload());
        tracing::info!(attempt, source, bytes = acquired.payload().len(), "image acquired");

        state.commit(attempt, |tx| {
            tx.set_progress(None);
            tx.set_loading(true);
            tx.set_error(None);
            tx.set_image(Some(preview));
            tx.set_mode(UiMode::Uploading);
        });

        let span = tracing::info_span!("upload", attempt, source);
        let task = tokio::spawn(self.pipeline.clone().run(attempt, acquired, token).instrument(span));
        UploadHandle { attempt, task }
    }

    /// Tear down: cancel any upload, release the camera, return to idle.
    ///
    /// The controller is single-use; later acquisitions are ignored.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
        self.cancel_inflight();
        if let Some(session) = self.camera.lock().take() {
            session.cancel();
        }
        let state = &self.pipeline.state;
        state.set_loading(false);
        state.set_mode(UiMode::Idle);
        tracing::debug!("upload controller shut down");
    }

    fn accept(&self, acquired: Result<AcquiredImage, AcquireError>) -> Result<UploadHandle, AcquireError> {
        match acquired {
            Ok(acquired) => Ok(self.submit(acquired)),
            Err(err) => {
                tracing::info!(error = %err, "acquisition rejected");
                if let Some(notice) = rejection_notice(&err) {
                    self.pipeline.notifier.notify(notice);
                }
                Err(err)
            }
        }
    }

    fn is_shut_down(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    fn leave_dragging(&self) {
        if self.mode() == UiMode::Dragging {
            self.pipeline.state.set_mode(UiMode::Idle);
        }
    }

    /// Cancel the in-flight upload, if any, and void its attempt.
    fn cancel_inflight(&self) -> bool {
        let Some(token) = self.inflight.lock().take() else {
            return false;
        };
        token.cancel();
        self.pipeline.state.begin_attempt();
        true
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

fn rejection_notice(err: &AcquireError) -> Option<Notification> {
    match err {
        AcquireError::UnsupportedType { .. } => Some(Notification::error(NOT_AN_IMAGE)),
        AcquireError::Io { path, .. } => Some(Notification::error(format!(
            "Could not read {}",
            path.display()
        ))),
        AcquireError::CameraAccessDenied(_) => Some(Notification::error(NO_CAMERA)),
        AcquireError::Capture(_) => Some(Notification::error(CAPTURE_FAILED)),
        AcquireError::Empty => None,
    }
}
