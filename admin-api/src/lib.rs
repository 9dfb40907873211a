//! Template render service ("admin API") for the SSTI/SSRF training range.
//!
//! Renders caller-supplied template text against a fixed context with an
//! evaluator whose capabilities are deliberately left open. Reachable from
//! the outside only through the gateway's fetch proxy.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod flag;
pub mod image_policy;
pub mod render;
pub mod routes;
pub mod templates;

pub use config::{AdminConfig, Args, FlagConfig, FLAG_MARKER, MAX_TEMPLATE_BYTES};
pub use error::{AdminError, JsonError};
pub use evaluator::{EvaluatorCapabilities, RenderContext, TemplateEvaluator};
pub use filter::{FilterConfig, FilterRejection, SubmissionFilter};
pub use image_policy::ImageUrlPolicy;
pub use routes::{build_router, ApiDoc, AppState};

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Result type alias for render service operations
pub type Result<T> = std::result::Result<T, AdminError>;

/// Create working directories and plant the flag file. Never fails.
pub fn prepare_environment(config: &AdminConfig) {
    ctf_common::ensure_dirs(&[
        &config.log_dir,
        &config.templates_dir,
        &config.pages_dir,
        &config.status_dir,
    ]);
    flag::plant_flag(&config.flag);
}

/// Serve the render service on an already bound listener
pub async fn serve(listener: TcpListener, config: AdminConfig) -> Result<()> {
    let state = AppState::new(config)?;
    let app = build_router(state);

    let addr = listener
        .local_addr()
        .map_err(|e| AdminError::Network(format!("Failed to read local address: {}", e)))?;
    info!("Render service listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AdminError::Network(format!("Render service failed: {}", e)))
}

/// Bind the configured address and serve
pub async fn run_server(config: AdminConfig) -> Result<()> {
    let addr = format!("{}:{}", config.listen_address, config.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AdminError::Network(format!("Failed to bind {}: {}", addr, e)))?;
    serve(listener, config).await
}
