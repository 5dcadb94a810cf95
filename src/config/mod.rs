//! Configuration loading from a TOML file with an environment override.

pub mod schema;

pub use schema::{ApiConfig, CameraConfig, Config, FallbackConfig, ProgressConfig};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "SEARCH_ME_API_URL";

/// Default location of `config.toml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "search-me").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides(std::env::var(API_URL_ENV).ok());
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    fn apply_env_overrides(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!(%url, "api.base_url overridden from {API_URL_ENV}");
            self.api.base_url = url.trim().to_string();
        }
    }

    fn normalize(&mut self) {
        let trimmed = self.api.base_url.trim_end_matches('/').len();
        self.api.base_url.truncate(trimmed);
    }

    pub fn validate(&self) -> Result<()> {
        let url = &self.api.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("api.base_url must start with http:// or https:// (got `{url}`)");
        }
        if self.progress.interval_ms == 0 {
            bail!("progress.interval_ms must be greater than 0");
        }
        if self.progress.step == 0 {
            bail!("progress.step must be greater than 0");
        }
        if self.progress.ceiling >= 100 {
            bail!("progress.ceiling must be below 100");
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            bail!("camera.jpeg_quality must be between 1 and 100");
        }
        Ok(())
    }

    /// Fallback fixture path with `~` expanded.
    pub fn fallback_dataset_path(&self) -> Option<PathBuf> {
        self.fallback
            .dataset_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}
