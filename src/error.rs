use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the render server
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Invalid caption data: {0}")]
    InvalidCaptions(String),

    #[error("Failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to write subtitle file: {0}")]
    SubtitleWrite(#[source] std::io::Error),

    #[error("FFmpeg binary not found: {0}")]
    EngineNotFound(String),

    #[error("Failed to run FFmpeg: {0}")]
    EngineIo(#[source] std::io::Error),

    #[error("FFmpeg exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("FFmpeg did not finish within {0} seconds")]
    EngineTimeout(u64),

    #[error("Failed to read rendered output: {0}")]
    Output(#[source] std::io::Error),

    #[error("Too many concurrent renders")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RenderError>;

/// JSON error body returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RenderError {
    /// HTTP status for this fault class
    pub fn status(&self) -> StatusCode {
        match self {
            RenderError::MissingFields(_) | RenderError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            RenderError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable summary naming the phase that failed
    pub fn summary(&self) -> &'static str {
        match self {
            RenderError::MissingFields(_) => "Missing required fields",
            RenderError::InvalidBody(_) => "Invalid request body",
            RenderError::InvalidCaptions(_) | RenderError::SubtitleWrite(_) => {
                "Subtitle generation failed"
            }
            RenderError::Workspace(_) => "Workspace allocation failed",
            RenderError::Download { .. } => "Download failed",
            RenderError::EngineNotFound(_)
            | RenderError::EngineIo(_)
            | RenderError::EngineFailed { .. }
            | RenderError::EngineTimeout(_) => "FFmpeg failed",
            RenderError::Busy => "Too many concurrent renders",
            _ => "Rendering failed",
        }
    }

    /// Client-facing body; the summary plus the underlying message
    pub fn body(&self) -> ErrorBody {
        let details = match self {
            RenderError::MissingFields(fields) => Some(fields.join(", ")),
            RenderError::Busy => None,
            RenderError::EngineFailed { stderr, .. } if !stderr.is_empty() => Some(stderr.clone()),
            other => Some(other.to_string()),
        };
        ErrorBody {
            error: self.summary(),
            details,
        }
    }
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Render request failed: {}", self);
        } else {
            tracing::debug!("Render request rejected: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_is_bad_request() {
        let err = RenderError::MissingFields(vec!["voiceover"]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let body = err.body();
        assert_eq!(body.error, "Missing required fields");
        assert_eq!(body.details.as_deref(), Some("voiceover"));
    }

    #[test]
    fn test_download_is_server_error() {
        let err = RenderError::Download {
            url: "http://example.invalid/a.mp4".to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.summary(), "Download failed");
        assert!(err.body().details.unwrap().contains("404"));
    }

    #[test]
    fn test_engine_failure_details_carry_stderr() {
        let err = RenderError::EngineFailed {
            status: "exit status: 1".to_string(),
            stderr: "Invalid data found when processing input".to_string(),
        };
        let body = err.body();
        assert_eq!(body.error, "FFmpeg failed");
        assert_eq!(
            body.details.as_deref(),
            Some("Invalid data found when processing input")
        );
    }

    #[test]
    fn test_busy_has_no_details() {
        let body = serde_json::to_value(RenderError::Busy.body()).unwrap();
        assert_eq!(RenderError::Busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.get("details").is_none());
    }
}
