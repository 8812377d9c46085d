//! UI state types and background task events.

use crate::compositor::CoverRect;
use crate::error::AppError;
use crate::remote::SendOutcome;
use std::path::PathBuf;

/// State of the text-recognition card in the side panel.
///
/// `Idle` -> `Loading` -> `Text` or `Error`; a new request starts over.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OcrState {
    #[default]
    Idle,
    Loading,
    Text(String),
    Error(String),
}

impl OcrState {
    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            OcrState::Idle => None,
            OcrState::Loading => Some("Reading text from the selected area..."),
            OcrState::Text(_) => Some("Text detected, copy or edit below."),
            OcrState::Error(_) => Some("Could not read text."),
        }
    }
}

/// Results sent back from background jobs, one per job.
pub(crate) enum TaskEvent {
    Copied(Result<(), String>),
    Exported(Result<PathBuf, String>),
    Text {
        generation: u64,
        result: Result<String, String>,
    },
    Regions {
        generation: u64,
        result: Result<Vec<CoverRect>, AppError>,
    },
    Uploaded(SendOutcome),
    /// The job could not run at all.
    Failed(String),
}

/// Human-readable summary of an upload.
pub fn describe_upload(outcome: &SendOutcome) -> String {
    match outcome {
        SendOutcome::Ok { status, .. } => format!("Uploaded (HTTP {})", status),
        SendOutcome::Rejected { status, .. } => format!("Upload rejected (HTTP {})", status),
        SendOutcome::NoImage => "Nothing to upload".to_string(),
        SendOutcome::MissingEndpoint => "No upload endpoint configured".to_string(),
        SendOutcome::Failed(message) => format!("Upload failed: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_summaries() {
        let ok = SendOutcome::Ok {
            status: 201,
            body: String::new(),
        };
        assert_eq!(describe_upload(&ok), "Uploaded (HTTP 201)");
        assert_eq!(describe_upload(&SendOutcome::MissingEndpoint), "No upload endpoint configured");
        assert_eq!(OcrState::Loading.status_message(), Some("Reading text from the selected area..."));
        assert_eq!(OcrState::default().status_message(), None);
    }
}
