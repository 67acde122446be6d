use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use thiserror::Error;

/// Every failure a flow can surface. Callers match on the variant, never on
/// the message text.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("authentication required")]
    Auth,

    #[error("analysis quota exceeded: the free plan allows {limit} batch analyses")]
    QuotaExceeded { limit: i64 },

    #[error("invalid data from {origin}: {message}")]
    Validation { origin: String, message: String },

    #[error("{flow} returned no structured output")]
    OutputMissing { flow: String },

    #[error("{service} returned HTTP {status}: {body}")]
    UpstreamHttp {
        service: String,
        status: u16,
        body: String,
    },

    #[error("profile {uid} was modified by a concurrent request")]
    Conflict { uid: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{feature} is not configured on this server")]
    Unavailable { feature: &'static str },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub fn validation(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Validation {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn output_missing(flow: impl Into<String>) -> Self {
        Self::OutputMissing { flow: flow.into() }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth => "AUTH_REQUIRED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::OutputMissing { .. } => "OUTPUT_MISSING",
            Self::UpstreamHttp { .. } => "UPSTREAM_HTTP",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::Http(_) => "UPSTREAM_UNREACHABLE",
            Self::Database(_) => "STORAGE",
            Self::Json(_) => "SERIALIZATION",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation { .. }
            | Self::OutputMissing { .. }
            | Self::UpstreamHttp { .. }
            | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
