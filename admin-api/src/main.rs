//! Render service binary entry point

use admin_api::{prepare_environment, run_server, AdminConfig, Args};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ctf_common::init_logging(&args.logging())?;

    let config = AdminConfig::from(args);
    tracing::info!("Starting render service...");
    tracing::info!("  Listen:    {}:{}", config.listen_address, config.listen_port);
    tracing::info!("  Templates: {}", config.templates_dir.display());
    tracing::info!("  Log dir:   {}", config.log_dir.display());
    tracing::info!("  Evaluator: {:?}", config.capabilities);

    prepare_environment(&config);

    tokio::select! {
        result = run_server(config) => {
            if let Err(e) = result {
                tracing::error!("Render service failed: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping render service...");
        }
    }

    Ok(())
}
