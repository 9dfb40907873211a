//! Configuration types and utilities

use clap::Parser;
use ctf_common::LoggingConfig;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const USER_AGENT: &str = "CTF-Fetcher/1.0";

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Authority that `/fetch/<subpath>` targets and that loopback:9000 is
/// rewritten to
pub const INTERNAL_HOST: &str = "admin-api:9000";

/// Hostnames accepted without looking at their addresses
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "admin-api",
    "suid-sim",
    "public-app",
    "localhost",
    "127.0.0.1",
    "res.cloudinary.com",
];

/// Networks a resolved address must fall in when the host is not listed
pub const DEFAULT_ALLOWED_NETWORKS: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
];

/// Startup configuration for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub listen_address: String,
    pub listen_port: u16,
    /// `host:port` of the render service as seen from the gateway
    pub internal_host: String,
    /// Wildcard patterns (`*.example.com`) matched against the target host
    pub allowed_hosts: Vec<String>,
    pub allowed_networks: Vec<IpNet>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Served under `/static/thumbs`
    pub thumbs_dir: PathBuf,
    pub feedback_log: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 8080,
            internal_host: INTERNAL_HOST.to_string(),
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            allowed_networks: default_networks(),
            user_agent: USER_AGENT.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            thumbs_dir: PathBuf::from("static/thumbs"),
            feedback_log: PathBuf::from("/var/log/ctf_public/feedback.log"),
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_networks() -> Vec<IpNet> {
    DEFAULT_ALLOWED_NETWORKS
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
}

/// Command line arguments for the gateway
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Image gallery and fetch gateway (CTF public app)", long_about = None)]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_addr: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Render service authority used for /fetch/<subpath> and loopback rewrites
    #[arg(long, default_value = INTERNAL_HOST)]
    pub internal_host: String,

    /// Extra allow-listed host pattern (repeatable)
    #[arg(long = "allow-host")]
    pub allow_hosts: Vec<String>,

    /// Extra allowed network in CIDR form (repeatable)
    #[arg(long = "allow-network")]
    pub allow_networks: Vec<IpNet>,

    /// Outbound request timeout in seconds
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Directory served under /static/thumbs
    #[arg(long, default_value = "static/thumbs")]
    pub thumbs_dir: PathBuf,

    /// Feedback journal path
    #[arg(long, default_value = "/var/log/ctf_public/feedback.log")]
    pub feedback_log: PathBuf,

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
            ..LoggingConfig::for_service("public-app", &self.log_level)
        }
    }
}

impl From<Args> for GatewayConfig {
    fn from(args: Args) -> Self {
        let mut config = GatewayConfig {
            listen_address: args.listen_addr,
            listen_port: args.port,
            internal_host: args.internal_host,
            request_timeout_secs: args.timeout,
            thumbs_dir: args.thumbs_dir,
            feedback_log: args.feedback_log,
            ..GatewayConfig::default()
        };
        config.allowed_hosts.extend(args.allow_hosts);
        config.allowed_networks.extend(args.allow_networks);
        config
    }
}
