use crate::CommonError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Logging configuration shared by both services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to enable JSON formatted logs
    pub json_format: bool,

    /// Whether to include file and line number information
    pub include_file_info: bool,

    /// Whether to enable colored output (only for non-JSON format)
    pub enable_colors: bool,

    /// Log file path (optional, if None logs only to stdout)
    pub log_file: Option<String>,

    /// Module-specific log levels
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();

        module_levels.insert("hyper".to_string(), "warn".to_string());
        module_levels.insert("reqwest".to_string(), "warn".to_string());
        module_levels.insert("tower_http".to_string(), "info".to_string());

        Self {
            level: "info".to_string(),
            json_format: false,
            include_file_info: false,
            enable_colors: true,
            log_file: None,
            module_levels,
        }
    }
}

impl LoggingConfig {
    /// Default configuration with `crate_name` pinned to `level`
    pub fn for_service(crate_name: &str, level: &str) -> Self {
        let mut config = Self {
            level: level.to_string(),
            ..Self::default()
        };
        config
            .module_levels
            .insert(crate_name.replace('-', "_"), level.to_string());
        config
    }
}

/// Initialize logging based on the provided configuration.
///
/// `RUST_LOG` wins over the configured levels when it is set. Calling this
/// twice is harmless; the second call is ignored.
pub fn init_logging(config: &LoggingConfig) -> Result<(), CommonError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(config)?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.json_format {
        layers.push(fmt::layer().json().with_target(true).boxed());
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_file(config.include_file_info)
                .with_line_number(config.include_file_info)
                .with_ansi(config.enable_colors)
                .boxed(),
        );
    }

    if let Some(log_file) = &config.log_file {
        let appender = create_file_appender(log_file)?;
        layers.push(fmt::layer().with_writer(appender).with_ansi(false).boxed());
    }

    let result = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();

    match result {
        Ok(_) => tracing::info!("Logging initialized with config level: {}", config.level),
        Err(_) => tracing::debug!("Logging already initialized, skipping"),
    }

    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, CommonError> {
    let mut filter = EnvFilter::new(&config.level);

    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| CommonError::Logging(format!("Invalid log directive: {}", e)))?,
        );
    }

    Ok(filter)
}

/// Create a non-rotating file appender
fn create_file_appender(
    log_file: &str,
) -> Result<tracing_appender::rolling::RollingFileAppender, CommonError> {
    let log_path = Path::new(log_file);
    let directory = log_path
        .parent()
        .ok_or_else(|| CommonError::Logging("Invalid log file path".to_string()))?;
    let filename = log_path
        .file_name()
        .ok_or_else(|| CommonError::Logging("Invalid log file name".to_string()))?;

    std::fs::create_dir_all(directory)
        .map_err(|e| CommonError::Logging(format!("Failed to create log directory: {}", e)))?;

    Ok(tracing_appender::rolling::never(directory, filename))
}

/// Log level utilities
pub mod levels {
    /// Check if a log level string is valid
    pub fn is_valid_level(level: &str) -> bool {
        matches!(
            level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        )
    }
}
