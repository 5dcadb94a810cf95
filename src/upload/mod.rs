//! Recognition backend exchange and the fallback dataset used when it fails.

pub mod client;
pub mod fallback;
pub mod schema;

pub use client::{HttpRecognitionClient, Recognition, RecognitionBackend, UploadError, IMAGE_FIELD, UPLOAD_PATH};
pub use fallback::{FallbackDataset, FALLBACK_NOTICE};
pub use schema::{ProductDetails, SearchResultItem, SearchResults};
