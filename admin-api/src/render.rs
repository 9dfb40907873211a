//! Submission handling: parse, size-check, log, filter, evaluate, and record
//! captures.

use crate::config::{AdminConfig, FLAG_MARKER};
use crate::error::AdminError;
use crate::evaluator::{RenderContext, TemplateEvaluator};
use crate::filter::SubmissionFilter;
use crate::image_policy::ImageUrlPolicy;
use chrono::{DateTime, Utc};
use ctf_common::{escape_newlines, truncate_chars, Journal};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Body accepted by `POST /render` and `POST /render/json`
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderRequest {
    /// Template source text
    #[serde(default)]
    pub template: Option<String>,
    /// Optional image shown by the template
    #[serde(default)]
    pub image_url: Option<String>,
}

impl RenderRequest {
    /// Read a submission from a form, a JSON object, or a raw body.
    ///
    /// Form and JSON bodies supply both fields; anything else (including a
    /// JSON body without a `template` field) is taken verbatim as the
    /// template text.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == "application/x-www-form-urlencoded" {
            let mut request = RenderRequest::default();
            for (key, value) in url::form_urlencoded::parse(body) {
                match key.as_ref() {
                    "template" if request.template.is_none() => {
                        request.template = Some(value.into_owned())
                    }
                    "image_url" if request.image_url.is_none() => {
                        request.image_url = Some(value.into_owned())
                    }
                    _ => {}
                }
            }
            return request;
        }

        if mime == "application/json" || mime.ends_with("+json") {
            if let Ok(request) = serde_json::from_slice::<RenderRequest>(body) {
                if request.template.is_some() {
                    return request;
                }
            }
        }

        RenderRequest {
            template: Some(String::from_utf8_lossy(body).into_owned()),
            image_url: None,
        }
    }
}

/// A template submission as it moves through the pipeline
#[derive(Debug, Clone)]
pub struct Submission {
    pub template: String,
    pub image_url: Option<String>,
    pub client: String,
    pub received_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(request: RenderRequest, client: impl Into<String>) -> Self {
        Self {
            template: request.template.unwrap_or_default(),
            image_url: request.image_url.filter(|u| !u.is_empty()),
            client: client.into(),
            received_at: Utc::now(),
        }
    }
}

/// Which route a submission arrived on; only changes the log label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRoute {
    Html,
    Json,
}

impl RenderRoute {
    fn label(self) -> &'static str {
        match self {
            RenderRoute::Html => "Submission",
            RenderRoute::Json => "Submission (json)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub rendered: String,
    pub flag_observed: bool,
}

/// Everything needed to turn a submission into output
#[derive(Debug)]
pub struct Renderer {
    evaluator: TemplateEvaluator,
    filter: SubmissionFilter,
    image_policy: ImageUrlPolicy,
    submissions: Journal,
    captures: Journal,
    max_template_bytes: usize,
    log_truncate: usize,
}

impl Renderer {
    pub fn new(config: &AdminConfig) -> Result<Self, AdminError> {
        Ok(Self {
            evaluator: TemplateEvaluator::new(config.capabilities, &config.flag.path),
            filter: SubmissionFilter::new(&config.filter)?,
            image_policy: ImageUrlPolicy::default(),
            submissions: Journal::new(config.submissions_log()),
            captures: Journal::new(config.capture_marker()),
            max_template_bytes: config.max_template_bytes,
            log_truncate: config.log_truncate,
        })
    }

    pub async fn render(
        &self,
        submission: Submission,
        route: RenderRoute,
    ) -> Result<RenderOutcome, AdminError> {
        let size = submission.template.len();
        if size > self.max_template_bytes {
            return Err(AdminError::TemplateTooLarge {
                size,
                limit: self.max_template_bytes,
            });
        }

        let image_url = self.image_policy.sanitize(submission.image_url.clone());

        self.log_submission(&submission, route).await;

        self.filter.check(&submission.template)?;

        let ctx = RenderContext::new(image_url);
        let rendered = self
            .evaluator
            .render(&submission.template, &ctx)
            .map_err(|e| AdminError::Template(e.to_string()))?;

        let flag_observed = rendered.contains(FLAG_MARKER);
        if flag_observed {
            self.record_capture(&submission).await;
        }

        Ok(RenderOutcome {
            rendered,
            flag_observed,
        })
    }

    async fn log_submission(&self, submission: &Submission, route: RenderRoute) {
        let logged = escape_newlines(truncate_chars(&submission.template, self.log_truncate));
        let line = format!(
            "{} {} from {}: {}",
            submission.received_at.format("%Y-%m-%d %H:%M:%S,%3f"),
            route.label(),
            submission.client,
            logged
        );

        info!(client = %submission.client, bytes = submission.template.len(), "{} received", route.label());
        if let Err(e) = self.submissions.append_line(&line).await {
            warn!("Failed to log submission to {}: {}", self.submissions.path().display(), e);
        }
    }

    async fn record_capture(&self, submission: &Submission) {
        let line = format!("{} {}", submission.client, Utc::now().to_rfc3339());
        info!(client = %submission.client, "Flag marker observed in rendered output");
        if let Err(e) = self.captures.append_line(&line).await {
            warn!("Failed to record capture in {}: {}", self.captures.path().display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterConfig;
    use std::path::Path;

    fn config_in(dir: &Path) -> AdminConfig {
        AdminConfig {
            log_dir: dir.join("log"),
            status_dir: dir.join("status"),
            ..AdminConfig::default()
        }
    }

    fn submission(template: &str) -> Submission {
        Submission::new(
            RenderRequest {
                template: Some(template.to_string()),
                image_url: None,
            },
            "10.0.0.7",
        )
    }

    #[test]
    fn test_from_body_form() {
        let req = RenderRequest::from_body(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"template=%7B%7B+username+%7D%7D&image_url=https%3A%2F%2Fexample.org%2Fa.jpg",
        );
        assert_eq!(req.template.as_deref(), Some("{{ username }}"));
        assert_eq!(req.image_url.as_deref(), Some("https://example.org/a.jpg"));
    }

    #[test]
    fn test_from_body_json() {
        let req = RenderRequest::from_body(
            Some("application/json"),
            br#"{"template": "{{ 7*6 }}", "image_url": null}"#,
        );
        assert_eq!(req.template.as_deref(), Some("{{ 7*6 }}"));
        assert!(req.image_url.is_none());
    }

    #[test]
    fn test_from_body_raw_fallback() {
        let req = RenderRequest::from_body(Some("text/plain"), b"{{ notice }}");
        assert_eq!(req.template.as_deref(), Some("{{ notice }}"));

        let req = RenderRequest::from_body(Some("application/json"), br#"{"other": 1}"#);
        assert_eq!(req.template.as_deref(), Some(r#"{"other": 1}"#));

        let req = RenderRequest::from_body(None, b"");
        assert_eq!(req.template.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_render_logs_escaped_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let config = AdminConfig {
            log_truncate: 12,
            ..config_in(dir.path())
        };
        let renderer = Renderer::new(&config).unwrap();

        let outcome = renderer
            .render(submission("line1\nline2 {{ username }}"), RenderRoute::Html)
            .await
            .unwrap();
        assert_eq!(outcome.rendered, "line1\nline2 guest_user");
        assert!(!outcome.flag_observed);

        let log = std::fs::read_to_string(config.submissions_log()).unwrap();
        assert!(log.ends_with("Submission from 10.0.0.7: line1\\nline2 \n"), "log was {log:?}");
    }

    #[tokio::test]
    async fn test_oversized_template_rejected_before_logging() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let renderer = Renderer::new(&config).unwrap();

        let big = "a".repeat(MAX_BYTES + 1);
        let err = renderer
            .render(submission(&big), RenderRoute::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::TemplateTooLarge { .. }));
        assert!(!config.submissions_log().exists());

        let exact = "a".repeat(MAX_BYTES);
        assert!(renderer.render(submission(&exact), RenderRoute::Json).await.is_ok());
    }

    const MAX_BYTES: usize = crate::config::MAX_TEMPLATE_BYTES;

    #[tokio::test]
    async fn test_filtered_submission_is_logged_then_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = AdminConfig {
            filter: FilterConfig {
                deny_keywords: vec![],
                block_arithmetic_probe: true,
            },
            ..config_in(dir.path())
        };
        let renderer = Renderer::new(&config).unwrap();

        let err = renderer
            .render(submission("{{ 7*6 }}"), RenderRoute::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Filtered(_)));
        assert!(std::fs::read_to_string(config.submissions_log())
            .unwrap()
            .contains("{{ 7*6 }}"));
    }

    #[tokio::test]
    async fn test_flag_marker_records_capture() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let renderer = Renderer::new(&config).unwrap();

        let outcome = renderer
            .render(
                submission("{{ 'FLAG{non_root_' ~ 'rce_obtained}' }}"),
                RenderRoute::Html,
            )
            .await
            .unwrap();
        assert!(outcome.flag_observed);

        let marker = std::fs::read_to_string(config.capture_marker()).unwrap();
        assert!(marker.starts_with("10.0.0.7 "));
        assert_eq!(marker.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_banned_image_url_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(&config_in(dir.path())).unwrap();

        let sub = Submission::new(
            RenderRequest {
                template: Some("{{ image_url }}".into()),
                image_url: Some("http://127.0.0.1/pwn.png".into()),
            },
            "10.0.0.7",
        );
        let outcome = renderer.render(sub, RenderRoute::Json).await.unwrap();
        assert_eq!(outcome.rendered, crate::evaluator::DEFAULT_IMAGE_URL);
    }
}
