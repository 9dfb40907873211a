//! Error types for the render service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Main error type for render service operations
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Template too large")]
    TemplateTooLarge { size: usize, limit: usize },

    /// A submission filter matched; the message is shown to the caller as-is
    #[error("{0}")]
    Filtered(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("Render page not found (operator error).")]
    RenderPageMissing,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::TemplateTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AdminError::Filtered(_) | AdminError::Template(_) | AdminError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AdminError::NotFound => StatusCode::NOT_FOUND,
            AdminError::RenderPageMissing
            | AdminError::Configuration(_)
            | AdminError::Network(_)
            | AdminError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message used in JSON error bodies. Evaluation errors are reported
    /// without the `Template error:` prefix there.
    pub fn detail(&self) -> String {
        match self {
            AdminError::Template(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Renders an [`AdminError`] as `{"error": "..."}`
#[derive(Debug)]
pub struct JsonError(pub AdminError);

impl From<AdminError> for JsonError {
    fn from(err: AdminError) -> Self {
        JsonError(err)
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.0.detail() });
        (self.0.status(), Json(body)).into_response()
    }
}
