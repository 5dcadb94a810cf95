//! search-me: snap a product, find comparable offers.
//!
//! Turns a product photo (dropped file, selected file, or camera capture)
//! into a recognition request and publishes the result, or a canned
//! fallback when the backend is unavailable, into an explicit shared state
//! container that a UI renders from.

pub mod acquire;
pub mod config;
pub mod controller;
pub mod notify;
pub mod progress;
pub mod state;
pub mod upload;

pub use acquire::{AcquireError, AcquiredImage, FileHandle};
pub use config::Config;
pub use controller::{UploadController, UploadHandle, UploadOutcome};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use state::{AppSnapshot, AppState, StateChange, UiMode};
pub use upload::{FallbackDataset, HttpRecognitionClient, RecognitionBackend, UploadError};
