//! Client for the text-recognition backend.
//!
//! Every call is a single multipart POST with the image under the
//! [`IMAGE_FIELD`] field. There is no retry; callers decide what to do
//! with a failed attempt.

use crate::compositor::CoverRect;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::image_store::ImageBlob;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// File name sent when the blob has none.
pub const DEFAULT_UPLOAD_NAME: &str = "selected-image.png";

/// Image plus scalar fields, ready to post.
#[derive(Debug, Clone)]
pub struct Payload {
    pub image: ImageBlob,
    pub fields: Vec<(String, String)>,
}

impl Payload {
    fn into_form(self) -> Result<Form> {
        let name = if self.image.name.trim().is_empty() {
            DEFAULT_UPLOAD_NAME.to_string()
        } else {
            self.image.name
        };
        let mime = image::ImageFormat::from_path(&name)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/png");

        let part = Part::bytes(self.image.data.to_vec()).file_name(name).mime_str(mime)?;
        let form = self
            .fields
            .into_iter()
            .fold(Form::new().part(IMAGE_FIELD, part), |form, (key, value)| form.text(key, value));
        Ok(form)
    }
}

/// Builds a payload from the current blob. Fields with no value are skipped.
///
/// Returns `None` when there is no image.
pub fn build_payload(blob: Option<ImageBlob>, extra_fields: &[(&str, Option<String>)]) -> Option<Payload> {
    let image = blob?;
    let fields = extra_fields
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|value| (key.to_string(), value.clone())))
        .collect();
    Some(Payload { image, fields })
}

/// Result of one POST. Never an error: failures are values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// 2xx response.
    Ok { status: u16, body: String },
    /// The backend answered with a non-success status.
    Rejected { status: u16, body: String },
    /// No image was available to send.
    NoImage,
    /// No endpoint is configured for this operation.
    MissingEndpoint,
    /// The request never produced a response.
    Failed(String),
}

impl SendOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Ok { status, .. } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short machine-readable reason for outcomes without a status.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::NoImage => Some("no-image"),
            Self::MissingEndpoint => Some("missing-endpoint"),
            Self::Failed(_) => Some("network"),
            _ => None,
        }
    }

    /// The response body of a successful call, or the matching error.
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Ok { body, .. } => Ok(body),
            Self::Rejected { status, body } => Err(AppError::Http {
                status,
                message: error_message(&body),
            }),
            Self::NoImage => Err(AppError::NoImage),
            Self::MissingEndpoint => Err(AppError::config("No endpoint configured")),
            Self::Failed(message) => Err(AppError::Network(message)),
        }
    }
}

pub struct RemoteClient {
    http: reqwest::Client,
    ocr: Option<Url>,
    boxes: Option<Url>,
    upload: Option<Url>,
}

impl RemoteClient {
    /// Creates a client for the endpoints in `config`.
    ///
    /// An empty endpoint path leaves that operation unconfigured.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint path cannot be joined to the base URL
    /// or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let resolve = |path: &str| -> Result<Option<Url>> {
            if path.trim().is_empty() {
                Ok(None)
            } else {
                config.endpoint(path).map(Some)
            }
        };

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("snapcrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            ocr: resolve(&config.ocr_path)?,
            boxes: resolve(&config.boxes_path)?,
            upload: resolve(&config.upload_path)?,
        })
    }

    /// Posts `payload` to `endpoint` once.
    pub async fn send(&self, endpoint: Option<&Url>, payload: Option<Payload>) -> SendOutcome {
        let Some(payload) = payload else {
            return SendOutcome::NoImage;
        };
        let Some(endpoint) = endpoint else {
            return SendOutcome::MissingEndpoint;
        };

        let form = match payload.into_form() {
            Ok(form) => form,
            Err(e) => return SendOutcome::Failed(e.to_string()),
        };

        debug!(%endpoint, "posting image");
        let response = match self.http.post(endpoint.clone()).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%endpoint, error = %e, "request failed");
                return SendOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        // A body read failure after the status arrived still reports the status.
        let body = response.text().await.unwrap_or_default();
        info!(%endpoint, status = status.as_u16(), "backend responded");

        if status.is_success() {
            SendOutcome::Ok {
                status: status.as_u16(),
                body,
            }
        } else {
            SendOutcome::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }

    /// Posts the image to the upload endpoint; only the status matters.
    pub async fn upload(&self, blob: Option<ImageBlob>) -> SendOutcome {
        self.send(self.upload.as_ref(), build_payload(blob, &[])).await
    }

    /// Recognises the text in the image.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`] with the backend's `error`/`message` for a
    /// non-success status, [`AppError::Network`] when the request fails and
    /// [`AppError::MalformedResponse`] when the body carries no text.
    pub async fn extract_text(&self, blob: Option<ImageBlob>) -> Result<String> {
        let body = self
            .send(self.ocr.as_ref(), build_payload(blob, &[]))
            .await
            .into_result()?;
        parse_text_response(&body)
    }

    /// Finds text regions, returned as covers in image-pixel space.
    ///
    /// Malformed boxes are dropped; only a failed call is an error.
    pub async fn detect_text_regions(&self, blob: Option<ImageBlob>) -> Result<Vec<CoverRect>> {
        let body = self
            .send(self.boxes.as_ref(), build_payload(blob, &[]))
            .await
            .into_result()?;
        let value: Value = serde_json::from_str(&body)?;
        let regions = parse_region_boxes(&value);
        info!(count = regions.len(), "text regions detected");
        Ok(regions)
    }
}

/// Pulls `text` out of a recognition response.
pub fn parse_text_response(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)?;
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return Ok(text.to_string());
    }
    Err(AppError::MalformedResponse(error_message(body)))
}

/// Best human-readable message from an error body.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Accepts `{boxes: [...]}` or a bare array. Each entry is either an object
/// with numeric `x`, `y`, `width`, `height` (and optional `id`) or an
/// `[x, y, width, height]` array. Anything else is dropped.
pub fn parse_region_boxes(value: &Value) -> Vec<CoverRect> {
    let entries = match value {
        Value::Array(entries) => entries.as_slice(),
        other => match other.get("boxes").and_then(Value::as_array) {
            Some(entries) => entries.as_slice(),
            None => return Vec::new(),
        },
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let region = parse_region(entry, index);
            if region.is_none() {
                debug!(index, "dropping malformed region box");
            }
            region
        })
        .collect()
}

fn parse_region(entry: &Value, index: usize) -> Option<CoverRect> {
    let number = |value: Option<&Value>| value.and_then(Value::as_f64).map(|n| n as f32).filter(|n| n.is_finite());

    let (x, y, width, height, id) = match entry {
        Value::Object(map) => {
            let id = match map.get("id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            };
            (
                number(map.get("x"))?,
                number(map.get("y"))?,
                number(map.get("width"))?,
                number(map.get("height"))?,
                id,
            )
        }
        Value::Array(items) if items.len() == 4 => (
            number(items.first())?,
            number(items.get(1))?,
            number(items.get(2))?,
            number(items.get(3))?,
            None,
        ),
        _ => return None,
    };

    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    Some(CoverRect {
        id: id.unwrap_or_else(|| format!("ocr-{}", index)),
        x,
        y,
        width,
        height,
        color: None,
    })
}
