use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub progress: ProgressConfig,
    pub fallback: FallbackConfig,
    pub camera: CameraConfig,
}

/// Recognition backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; `/api/upload` is appended.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// Simulated progress indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProgressConfig {
    pub interval_ms: u64,
    pub step: u8,
    /// Value the indicator holds at until the request settles. Below 100.
    pub ceiling: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            step: 10,
            ceiling: 90,
        }
    }
}

/// Degraded-mode results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FallbackConfig {
    /// JSON fixture replacing the built-in dataset. `~` is expanded.
    pub dataset_path: Option<String>,
    /// How long the degraded-mode notice stays up.
    pub notice_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            notice_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CameraConfig {
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { jpeg_quality: 92 }
    }
}
