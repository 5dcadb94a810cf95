use super::schema::{ErrorBody, ProductDetails, SearchResults, UploadData, UploadEnvelope};
use crate::acquire::ImagePayload;
use crate::config::ApiConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Endpoint path, relative to the configured base URL.
pub const UPLOAD_PATH: &str = "/api/upload";

/// Multipart field the image is bound to.
pub const IMAGE_FIELD: &str = "image";

const GENERIC_FAILURE: &str = "Failed to process image";

/// A successful identification.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub s3_url: String,
    pub product_details: ProductDetails,
    pub search_results: SearchResults,
}

/// Every way the backend exchange can fail.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Non-2xx response.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// 2xx response whose `status` was not `"success"`.
    #[error("{0}")]
    Rejected(String),

    /// 2xx response that could not be interpreted.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Connection, DNS, TLS or timeout failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    Request(String),
}

impl UploadError {
    /// Text for the shared error slot.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The recognition service, seen as a single upload call.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn recognize(&self, payload: &ImagePayload) -> Result<Recognition, UploadError>;
}

/// Talks to the recognition backend over HTTP.
pub struct HttpRecognitionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognitionClient {
    pub fn new(config: &ApiConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UploadError::Request(e.to_string()))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), UPLOAD_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecognitionBackend for HttpRecognitionClient {
    async fn recognize(&self, payload: &ImagePayload) -> Result<Recognition, UploadError> {
        let part = reqwest::multipart::Part::bytes(payload.bytes.clone())
            .file_name(payload.filename.clone())
            .mime_str(&payload.mime_type)
            .map_err(|e| UploadError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        tracing::debug!(endpoint = %self.endpoint, bytes = payload.len(), "posting image");
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        interpret_success(&response.bytes().await?)
    }
}

fn non_blank(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}

fn status_error(status: u16, body: &[u8]) -> UploadError {
    let message = non_blank(serde_json::from_slice::<ErrorBody>(body).ok().and_then(|b| b.message))
        .unwrap_or_else(|| format!("Error: {status}"));
    UploadError::Status { status, message }
}

fn interpret_success(body: &[u8]) -> Result<Recognition, UploadError> {
    let envelope: UploadEnvelope =
        serde_json::from_slice(body).map_err(|e| UploadError::Malformed(e.to_string()))?;

    if envelope.status.as_deref() != Some("success") {
        return Err(UploadError::Rejected(
            non_blank(envelope.message).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        ));
    }

    let data = envelope
        .data
        .ok_or_else(|| UploadError::Malformed("missing `data`".into()))?;
    let data: UploadData =
        serde_json::from_value(data).map_err(|e| UploadError::Malformed(e.to_string()))?;

    Ok(Recognition {
        s3_url: data.s3_url,
        product_details: data.product_details,
        search_results: data.search_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_message_is_preferred() {
        let err = status_error(500, br#"{"status": "error", "message": "db down"}"#);
        assert_eq!(err.user_message(), "db down");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn unparseable_error_body_uses_status_code() {
        assert_eq!(status_error(502, b"<html>Bad Gateway</html>").user_message(), "Error: 502");
        assert_eq!(status_error(404, br#"{"message": ""}"#).user_message(), "Error: 404");
    }

    #[test]
    fn success_body_is_unwrapped() {
        let body = br#"{
            "status": "success",
            "data": {
                "s3_url": "https://bucket/x.jpg",
                "product_details": {"name": "Kettle", "brand": "Acme", "confidence": 0.9},
                "search_results": {"products": [{"title": "Kettle 1L", "price": "$20"}]}
            }
        }"#;
        let rec = interpret_success(body).unwrap();
        assert_eq!(rec.s3_url, "https://bucket/x.jpg");
        assert_eq!(rec.product_details.brand.as_deref(), Some("Acme"));
        assert_eq!(rec.search_results.len(), 1);
    }

    #[test]
    fn non_success_status_field_is_rejected() {
        let err = interpret_success(br#"{"status": "error", "message": "no product found"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Rejected(ref m) if m == "no product found"));

        let err = interpret_success(br#"{"status": "pending"}"#).unwrap_err();
        assert_eq!(err.user_message(), "Failed to process image");
    }

    #[test]
    fn missing_status_or_blank_message_still_rejects() {
        let err = interpret_success(br#"{"message": "quota exceeded"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Rejected(ref m) if m == "quota exceeded"));

        let err = interpret_success(b"{}").unwrap_err();
        assert!(matches!(err, UploadError::Rejected(ref m) if m == "Failed to process image"));

        let err = interpret_success(br#"{"status": "error", "message": "  "}"#).unwrap_err();
        assert_eq!(err.user_message(), "Failed to process image");
        let err = interpret_success(br#"{"status": "error", "message": ""}"#).unwrap_err();
        assert_eq!(err.user_message(), "Failed to process image");
    }

    #[test]
    fn garbage_and_partial_bodies_are_malformed() {
        assert!(matches!(interpret_success(b"not json"), Err(UploadError::Malformed(_))));
        assert!(matches!(
            interpret_success(br#"{"status": "success"}"#),
            Err(UploadError::Malformed(_))
        ));
        assert!(matches!(
            interpret_success(br#"{"status": "success", "data": {"s3_url": "x"}}"#),
            Err(UploadError::Malformed(_))
        ));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = HttpRecognitionClient::with_client(reqwest::Client::new(), "http://api.local:8000/");
        assert_eq!(client.endpoint(), "http://api.local:8000/api/upload");
    }
}
