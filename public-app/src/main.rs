//! Gateway binary entry point

use clap::Parser;
use public_app::{prepare_environment, run_server, Args, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ctf_common::init_logging(&args.logging())?;

    let config = GatewayConfig::from(args);
    tracing::info!("Starting gateway...");
    tracing::info!("  Listen:        {}:{}", config.listen_address, config.listen_port);
    tracing::info!("  Internal host: {}", config.internal_host);
    tracing::info!("  Allow-list:    {}", config.allowed_hosts.join(", "));
    tracing::info!("  Timeout:       {}s", config.request_timeout_secs);

    prepare_environment(&config);

    tokio::select! {
        result = run_server(config) => {
            if let Err(e) = result {
                tracing::error!("Gateway failed: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping gateway...");
        }
    }

    Ok(())
}
