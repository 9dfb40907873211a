//! Visitor feedback, appended to a plain-text journal

use crate::error::GatewayError;
use chrono::{DateTime, Utc};
use ctf_common::{escape_newlines, Journal};
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackForm {
    #[serde(default)]
    pub feedback: Option<String>,
}

/// One journal line: `[<timestamp>] <ip>: <escaped text>`
pub fn feedback_line(text: &str, client: &str, at: DateTime<Utc>) -> String {
    let escaped = minijinja::HtmlEscape(text).to_string();
    format!("[{}] {}: {}", at.to_rfc3339(), client, escape_newlines(&escaped))
}

#[derive(Debug, Clone)]
pub struct FeedbackLog {
    journal: Journal,
}

impl FeedbackLog {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }

    pub async fn record(&self, form: FeedbackForm, client: &str) -> Result<(), GatewayError> {
        let text = form.feedback.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(GatewayError::EmptyFeedback);
        }

        let line = feedback_line(text, client, Utc::now());
        self.journal.append_line(&line).await.map_err(|e| {
            error!("Failed to write feedback to {}: {}", self.journal.path().display(), e);
            GatewayError::FeedbackWrite(e)
        })?;

        info!(client = %client, chars = text.chars().count(), "Feedback recorded");
        Ok(())
    }
}
