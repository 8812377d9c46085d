//! Configuration loading.
//!
//! Values are layered: built-in defaults, then an optional `config.json` in
//! the platform config directory (e.g. `~/.config/snapcrop/config.json`),
//! then environment variables (a `.env` file is honoured).

use crate::error::{AppError, Result};
use crate::viewport::ZoomConfig;
use directories::ProjectDirs;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Backend used when nothing else is configured.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";

pub const DEFAULT_OCR_PATH: &str = "/api/ocr";
pub const DEFAULT_BOXES_PATH: &str = "/api/ocr/boxes";
pub const DEFAULT_UPLOAD_PATH: &str = "/api/upload";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Near-black, fully opaque.
pub const DEFAULT_COVER_COLOR: [u8; 4] = [10, 10, 10, 255];

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: Url,
    pub ocr_path: String,
    pub boxes_path: String,
    pub upload_path: String,
    pub request_timeout: Duration,
    pub zoom: ZoomConfig,
    pub cover_color: [u8; 4],
}

/// Subset of [`Config`] that may appear in `config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_base: Option<String>,
    ocr_path: Option<String>,
    boxes_path: Option<String>,
    upload_path: Option<String>,
    timeout_secs: Option<u64>,
    min_scale: Option<f32>,
    max_scale: Option<f32>,
    zoom_intensity: Option<f32>,
    cover_color: Option<[u8; 4]>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let file = Self::config_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .map(|content| serde_json::from_str::<FileConfig>(&content))
            .transpose()?
            .unwrap_or_default();

        let mut builder = ConfigBuilder::default().apply_file(file);

        if let Ok(base) = env::var("SNAPCROP_API_BASE") {
            builder = builder.with_api_base(base);
        }
        if let Ok(path) = env::var("SNAPCROP_OCR_PATH") {
            builder.ocr_path = Some(path);
        }
        if let Ok(path) = env::var("SNAPCROP_BOXES_PATH") {
            builder.boxes_path = Some(path);
        }
        if let Ok(path) = env::var("SNAPCROP_UPLOAD_PATH") {
            builder.upload_path = Some(path);
        }
        if let Ok(secs) = env::var("SNAPCROP_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|_| AppError::config("SNAPCROP_TIMEOUT_SECS must be a whole number of seconds"))?;
            builder = builder.with_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Resolves an endpoint path below the configured base URL, keeping any
    /// path prefix the base carries.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::config(format!("Invalid endpoint path '{}': {}", path, e)))
    }

    /// Replaces the base URL, keeping every other setting.
    pub fn override_api_base(mut self, base: &str) -> Result<Self> {
        self.api_base = parse_api_base(base)?;
        Ok(self)
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "snapcrop").map(|dirs| dirs.config_dir().join("config.json"))
    }
}

fn parse_api_base(raw: &str) -> Result<Url> {
    // Trailing slash so relative joins land below the base path.
    let api_base = Url::parse(&format!("{}/", raw.trim_end_matches('/')))
        .map_err(|e| AppError::config(format!("Invalid API base URL '{}': {}", raw, e)))?;
    if !matches!(api_base.scheme(), "http" | "https") {
        return Err(AppError::config(format!(
            "API base must use http or https, got '{}'",
            api_base.scheme()
        )));
    }
    Ok(api_base)
}

/// Builder for [`Config`], used by the CLI overrides and in tests.
#[derive(Default, Debug, Clone)]
pub struct ConfigBuilder {
    api_base: Option<String>,
    ocr_path: Option<String>,
    boxes_path: Option<String>,
    upload_path: Option<String>,
    timeout: Option<Duration>,
    zoom: Option<ZoomConfig>,
    cover_color: Option<[u8; 4]>,
}

impl ConfigBuilder {
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_ocr_path(mut self, path: impl Into<String>) -> Self {
        self.ocr_path = Some(path.into());
        self
    }

    pub fn with_boxes_path(mut self, path: impl Into<String>) -> Self {
        self.boxes_path = Some(path.into());
        self
    }

    pub fn with_upload_path(mut self, path: impl Into<String>) -> Self {
        self.upload_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_zoom(mut self, zoom: ZoomConfig) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_cover_color(mut self, color: [u8; 4]) -> Self {
        self.cover_color = Some(color);
        self
    }

    fn apply_file(mut self, file: FileConfig) -> Self {
        let defaults = ZoomConfig::default();
        if file.min_scale.is_some() || file.max_scale.is_some() || file.zoom_intensity.is_some() {
            self.zoom = Some(ZoomConfig {
                min_scale: file.min_scale.unwrap_or(defaults.min_scale),
                max_scale: file.max_scale.unwrap_or(defaults.max_scale),
                intensity: file.zoom_intensity.unwrap_or(defaults.intensity),
            });
        }
        self.api_base = file.api_base.or(self.api_base);
        self.ocr_path = file.ocr_path.or(self.ocr_path);
        self.boxes_path = file.boxes_path.or(self.boxes_path);
        self.upload_path = file.upload_path.or(self.upload_path);
        self.timeout = file.timeout_secs.map(Duration::from_secs).or(self.timeout);
        self.cover_color = file.cover_color.or(self.cover_color);
        self
    }

    pub fn build(self) -> Result<Config> {
        let api_base = parse_api_base(self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE))?;

        let zoom = self.zoom.unwrap_or_default();
        if !(zoom.min_scale > 0.0 && zoom.min_scale <= zoom.max_scale) {
            return Err(AppError::config(format!(
                "Zoom bounds are invalid: min {} max {}",
                zoom.min_scale, zoom.max_scale
            )));
        }

        Ok(Config {
            api_base,
            ocr_path: self.ocr_path.unwrap_or_else(|| DEFAULT_OCR_PATH.to_string()),
            boxes_path: self.boxes_path.unwrap_or_else(|| DEFAULT_BOXES_PATH.to_string()),
            upload_path: self.upload_path.unwrap_or_else(|| DEFAULT_UPLOAD_PATH.to_string()),
            request_timeout: self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            zoom,
            cover_color: self.cover_color.unwrap_or(DEFAULT_COVER_COLOR),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.api_base.as_str(), "http://127.0.0.1:5000/");
        assert_eq!(
            config.endpoint(&config.ocr_path).unwrap().as_str(),
            "http://127.0.0.1:5000/api/ocr"
        );
        assert_eq!(
            config.endpoint(&config.boxes_path).unwrap().as_str(),
            "http://127.0.0.1:5000/api/ocr/boxes"
        );
    }

    #[test]
    fn api_base_override_keeps_other_settings() {
        let config = Config::builder().with_upload_path("/files").build().unwrap();
        let config = config.override_api_base("https://ocr.example.com/").unwrap();
        assert_eq!(config.endpoint(&config.upload_path).unwrap().as_str(), "https://ocr.example.com/files");
        assert!(config.override_api_base("not a url").is_err());
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let config = Config::builder().with_api_base("http://host:8080/backend").build().unwrap();
        assert_eq!(
            config.endpoint(&config.ocr_path).unwrap().as_str(),
            "http://host:8080/backend/api/ocr"
        );

        let config = config.override_api_base("http://host:8080/proxy/").unwrap();
        assert_eq!(
            config.endpoint("api/upload").unwrap().as_str(),
            "http://host:8080/proxy/api/upload"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        let err = Config::builder().with_api_base("ftp://example.com").build();
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_inverted_zoom_bounds() {
        let zoom = ZoomConfig {
            min_scale: 3.0,
            max_scale: 1.0,
            intensity: 0.001,
        };
        assert!(Config::builder().with_zoom(zoom).build().is_err());
    }

    #[test]
    fn file_values_fill_gaps_in_defaults() {
        let file: FileConfig =
            serde_json::from_str(r#"{"api_base": "https://ocr.example.com", "max_scale": 8.0}"#).unwrap();
        let config = ConfigBuilder::default().apply_file(file).build().unwrap();
        assert_eq!(config.api_base.host_str(), Some("ocr.example.com"));
        assert_eq!(config.zoom.max_scale, 8.0);
        assert_eq!(config.zoom.min_scale, ZoomConfig::default().min_scale);
        assert_eq!(config.upload_path, DEFAULT_UPLOAD_PATH);
    }
}
