//! Error types for the gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ctf_common::CommonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing 'url' parameter")]
    MissingUrl,

    #[error("Unsupported URL scheme or missing hostname")]
    UnsupportedUrl,

    /// The target failed the allow-list. The host is kept for logging only.
    #[error("Blocked by SSRF filter: external hosts not allowed")]
    Blocked { host: String },

    #[error("Error fetching target: {0}")]
    Upstream(String),

    #[error("Feedback must not be empty")]
    EmptyFeedback,

    #[error("Could not record feedback")]
    FeedbackWrite(#[source] CommonError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingUrl
            | GatewayError::UnsupportedUrl
            | GatewayError::EmptyFeedback => StatusCode::BAD_REQUEST,
            GatewayError::Blocked { .. } => StatusCode::FORBIDDEN,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::FeedbackWrite(_)
            | GatewayError::Template(_)
            | GatewayError::Configuration(_)
            | GatewayError::Network(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `X-Proxy-Status` header when this error ends a fetch
    pub fn proxy_status(&self) -> &'static str {
        match self {
            GatewayError::MissingUrl | GatewayError::UnsupportedUrl => "rejected",
            GatewayError::Blocked { .. } => "blocked",
            GatewayError::Upstream(_) => "upstream-error",
            _ => "error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::MissingUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::Blocked { host: "evil.example.com".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::Upstream("timed out".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::FeedbackWrite(CommonError::Logging("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        let blocked = GatewayError::Blocked { host: "evil.example.com".into() };
        assert_eq!(
            blocked.to_string(),
            "Blocked by SSRF filter: external hosts not allowed"
        );
        assert_eq!(blocked.proxy_status(), "blocked");
        assert_eq!(
            GatewayError::Upstream("connection refused".into()).to_string(),
            "Error fetching target: connection refused"
        );
    }
}
