//! Submission filters ("rungs").
//!
//! These are exercise difficulty steps, not mitigations: plain substring
//! containment over a deny-list and a regex for the classic `{{7*7}}` probe.

use crate::error::AdminError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches `{{ 7*7 }}`, `{{-3 + 4}}`, `{{ 10 // 2 }}` and friends
pub const ARITHMETIC_PROBE_PATTERN: &str = r"\{\{\s*-?\d+\s*(?:\*\*|//|[-+*/%])\s*-?\d+\s*\}\}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Case-insensitive substrings that reject a submission
    pub deny_keywords: Vec<String>,
    pub block_arithmetic_probe: bool,
}

/// Why a submission was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRejection {
    Keyword(String),
    ArithmeticProbe,
}

impl FilterRejection {
    pub fn taunt(&self) -> String {
        match self {
            FilterRejection::Keyword(keyword) => {
                format!("Nice try. '{}' is not welcome here.", keyword)
            }
            FilterRejection::ArithmeticProbe => {
                "Arithmetic probes? How original. Try harder.".to_string()
            }
        }
    }
}

impl From<FilterRejection> for AdminError {
    fn from(rejection: FilterRejection) -> Self {
        AdminError::Filtered(rejection.taunt())
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionFilter {
    deny_keywords: Vec<String>,
    arithmetic_probe: Option<Regex>,
}

impl SubmissionFilter {
    pub fn new(config: &FilterConfig) -> Result<Self, AdminError> {
        let arithmetic_probe = if config.block_arithmetic_probe {
            Some(Regex::new(ARITHMETIC_PROBE_PATTERN).map_err(|e| {
                AdminError::Configuration(format!("Invalid probe pattern: {}", e))
            })?)
        } else {
            None
        };

        Ok(Self {
            deny_keywords: config
                .deny_keywords
                .iter()
                .filter(|k| !k.is_empty())
                .map(|k| k.to_lowercase())
                .collect(),
            arithmetic_probe,
        })
    }

    /// A filter that accepts everything
    pub fn disabled() -> Self {
        Self {
            deny_keywords: Vec::new(),
            arithmetic_probe: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.deny_keywords.is_empty() || self.arithmetic_probe.is_some()
    }

    pub fn check(&self, template: &str) -> Result<(), FilterRejection> {
        if !self.deny_keywords.is_empty() {
            let lowered = template.to_lowercase();
            if let Some(keyword) = self.deny_keywords.iter().find(|k| lowered.contains(k.as_str())) {
                return Err(FilterRejection::Keyword(keyword.clone()));
            }
        }

        if let Some(probe) = &self.arithmetic_probe {
            if probe.is_match(template) {
                return Err(FilterRejection::ArithmeticProbe);
            }
        }

        Ok(())
    }
}
