//! Outbound requests for `/fetch`

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::{header, redirect, Client};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What the caller sent that is passed upstream
#[derive(Debug, Clone, Default)]
pub struct Outbound {
    /// Present for POST; its absence means GET
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
}

impl Outbound {
    pub fn get() -> Self {
        Self::default()
    }

    fn method_name(&self) -> &'static str {
        if self.body.is_some() {
            "POST"
        } else {
            "GET"
        }
    }
}

/// Upstream response, fully buffered
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    pub content_type: String,
    /// URL after redirects
    pub final_url: String,
    pub body: Bytes,
}

impl Fetched {
    pub fn is_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/html")
    }
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
}

impl Forwarder {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn forward(&self, url: &Url, outbound: Outbound) -> Result<Fetched, GatewayError> {
        debug!("Forwarding {} {}", outbound.method_name(), url);

        let mut request = match outbound.body {
            Some(body) => self.client.post(url.clone()).body(body),
            None => self.client.get(url.clone()),
        };
        if let Some(content_type) = outbound.content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(accept) = outbound.accept {
            request = request.header(header::ACCEPT, accept);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        info!(
            target_url = %url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            "Fetched upstream"
        );

        Ok(Fetched {
            status,
            content_type,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_detection() {
        let fetched = Fetched {
            status: StatusCode::OK,
            content_type: "Text/HTML; charset=utf-8".to_string(),
            final_url: "http://admin-api:9000/".to_string(),
            body: Bytes::new(),
        };
        assert!(fetched.is_html());

        let json = Fetched {
            content_type: "application/json".to_string(),
            ..fetched
        };
        assert!(!json.is_html());
    }

    #[tokio::test]
    async fn test_connection_failure_is_upstream_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let forwarder = Forwarder::new(&GatewayConfig::default()).unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = forwarder.forward(&url, Outbound::get()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
        assert!(err.to_string().starts_with("Error fetching target: "));
    }
}
