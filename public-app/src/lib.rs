//! Public image gallery with a server-side fetch proxy.
//!
//! `/fetch` is the only way from the outside into the internal network. Its
//! allow-list is checked after loopback targets on the render service port
//! have already been rewritten to the internal render host.

pub mod config;
pub mod error;
pub mod feedback;
pub mod fetch;
pub mod gallery;
pub mod policy;
pub mod resolver;
pub mod rewrite;
pub mod routes;

pub use config::{Args, GatewayConfig};
pub use error::GatewayError;
pub use policy::{FetchPolicy, TargetRules, Verdict};
pub use resolver::{HostResolver, StaticResolver, SystemResolver};
pub use rewrite::HtmlRewriter;
pub use routes::{build_router, AppState};

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Create the thumbs directory and the feedback journal's directory
pub fn prepare_environment(config: &GatewayConfig) {
    let mut dirs = vec![config.thumbs_dir.clone()];
    if let Some(parent) = config.feedback_log.parent() {
        dirs.push(parent.to_path_buf());
    }
    ctf_common::ensure_dirs(&dirs);
}

/// Serve the gateway on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = build_router(state);

    let addr = listener
        .local_addr()
        .map_err(|e| GatewayError::Network(format!("Failed to read local address: {}", e)))?;
    info!("Gateway listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| GatewayError::Network(format!("Gateway failed: {}", e)))
}

/// Bind the configured address and serve with the system resolver
pub async fn run_server(config: GatewayConfig) -> Result<()> {
    let addr = format!("{}:{}", config.listen_address, config.listen_port);
    let state = AppState::new(config)?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Network(format!("Failed to bind {}: {}", addr, e)))?;
    serve(listener, state).await
}
