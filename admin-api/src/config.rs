//! Configuration types and utilities

use crate::evaluator::EvaluatorCapabilities;
use crate::filter::FilterConfig;
use clap::Parser;
use ctf_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Marker string whose appearance in rendered output counts as a capture
pub const FLAG_MARKER: &str = "FLAG{non_root_rce_obtained}";

/// Largest accepted template, in UTF-8 bytes
pub const MAX_TEMPLATE_BYTES: usize = 64 * 1024;

/// Submissions are logged up to this many characters
pub const LOG_TRUNCATE: usize = 2000;

/// Startup configuration for the render service.
/// Built once and shared read-only by every handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Address to listen on
    pub listen_address: String,
    /// Port to listen on
    pub listen_port: u16,
    /// Directory listed by `/templates/list`
    pub templates_dir: PathBuf,
    /// Directory holding `render_page.html`
    pub pages_dir: PathBuf,
    /// Directory for `render_submissions.log`
    pub log_dir: PathBuf,
    /// Directory for `fake_flag_retrieved.txt`
    pub status_dir: PathBuf,
    pub max_template_bytes: usize,
    pub log_truncate: usize,
    pub flag: FlagConfig,
    pub capabilities: EvaluatorCapabilities,
    pub filter: FilterConfig,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 9000,
            templates_dir: PathBuf::from("templates"),
            pages_dir: PathBuf::from("pages"),
            log_dir: PathBuf::from("/var/log/ctf_admin"),
            status_dir: PathBuf::from("/var/ctf_status"),
            max_template_bytes: MAX_TEMPLATE_BYTES,
            log_truncate: LOG_TRUNCATE,
            flag: FlagConfig::default(),
            capabilities: EvaluatorCapabilities::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl AdminConfig {
    pub fn submissions_log(&self) -> PathBuf {
        self.log_dir.join("render_submissions.log")
    }

    pub fn capture_marker(&self) -> PathBuf {
        self.status_dir.join("fake_flag_retrieved.txt")
    }

    pub fn render_page(&self) -> PathBuf {
        self.pages_dir.join("render_page.html")
    }
}

/// Where the proof-of-compromise file is planted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagConfig {
    pub path: PathBuf,
    /// Account that should own the file
    pub owner: String,
    pub contents: String,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/home/monkey/flag.txt"),
            owner: "monkey".to_string(),
            contents: format!("{}\n", FLAG_MARKER),
        }
    }
}

/// Command line arguments for the render service
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Template render service (CTF admin API)", long_about = None)]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_addr: String,

    /// Port to listen on
    #[arg(long, default_value_t = 9000)]
    pub port: u16,

    /// Directory of browsable templates
    #[arg(long, default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Directory holding render_page.html
    #[arg(long, default_value = "pages")]
    pub pages_dir: PathBuf,

    /// Directory for the submissions log
    #[arg(long, default_value = "/var/log/ctf_admin")]
    pub log_dir: PathBuf,

    /// Directory for the capture marker file
    #[arg(long, default_value = "/var/ctf_status")]
    pub status_dir: PathBuf,

    /// Path of the planted flag file
    #[arg(long, default_value = "/home/monkey/flag.txt")]
    pub flag_path: PathBuf,

    /// Account that should own the flag file
    #[arg(long, default_value = "monkey")]
    pub flag_owner: String,

    /// Reject submissions containing this substring (repeatable)
    #[arg(long = "deny-keyword")]
    pub deny_keywords: Vec<String>,

    /// Reject trivial arithmetic probes such as `{{ 7*7 }}`
    #[arg(long)]
    pub block_arithmetic_probe: bool,

    /// Hide the `runtime` host object from templates
    #[arg(long)]
    pub restrict_attributes: bool,

    /// Do not register host functions in templates
    #[arg(long)]
    pub restrict_callables: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    pub log_level: String,

    /// Emit JSON formatted logs
    #[arg(long)]
    pub log_json: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<String>,
}

fn parse_level(level: &str) -> Result<String, String> {
    if ctf_common::logging::levels::is_valid_level(level) {
        Ok(level.to_lowercase())
    } else {
        Err(format!("invalid log level: {}", level))
    }
}

impl Args {
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            json_format: self.log_json,
            log_file: self.log_file.clone(),
            ..LoggingConfig::for_service("admin-api", &self.log_level)
        }
    }
}

impl From<Args> for AdminConfig {
    fn from(args: Args) -> Self {
        Self {
            listen_address: args.listen_addr,
            listen_port: args.port,
            templates_dir: args.templates_dir,
            pages_dir: args.pages_dir,
            log_dir: args.log_dir,
            status_dir: args.status_dir,
            flag: FlagConfig {
                path: args.flag_path,
                owner: args.flag_owner,
                ..FlagConfig::default()
            },
            capabilities: EvaluatorCapabilities {
                allow_attribute_access: !args.restrict_attributes,
                allow_callables: !args.restrict_callables,
            },
            filter: FilterConfig {
                deny_keywords: args.deny_keywords,
                block_arithmetic_probe: args.block_arithmetic_probe,
            },
            ..AdminConfig::default()
        }
    }
}
