//! Harness for booting the render service and the gateway side by side on
//! loopback ports.

use admin_api::AdminConfig;
use public_app::{AppState, GatewayConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A running pair of services and the scratch directory they write to
pub struct Range {
    pub dir: TempDir,
    pub admin: SocketAddr,
    pub gateway: SocketAddr,
    pub admin_config: AdminConfig,
    pub gateway_config: GatewayConfig,
}

impl Range {
    pub fn gateway_url(&self, path: &str) -> String {
        format!("http://{}{}", self.gateway, path)
    }

    /// `/fetch?url=<target>` on the gateway
    pub fn fetch_url(&self, target: &str) -> String {
        self.gateway_url(&format!("/fetch?url={}", urlencoding::encode(target)))
    }
}

pub async fn bind_loopback() -> anyhow::Result<TcpListener> {
    Ok(TcpListener::bind("127.0.0.1:0").await?)
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Boot both services. The gateway's internal host points at the render
/// service's loopback port.
pub async fn start_range() -> anyhow::Result<Range> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    let admin_listener = bind_loopback().await?;
    let admin = admin_listener.local_addr()?;

    let mut admin_config = AdminConfig {
        templates_dir: root.join("templates"),
        pages_dir: root.join("pages"),
        log_dir: root.join("admin-log"),
        status_dir: root.join("status"),
        ..AdminConfig::default()
    };
    admin_config.flag.path = root.join("home").join("flag.txt");
    admin_api::prepare_environment(&admin_config);
    std::fs::write(
        admin_config.templates_dir.join("welcome.html"),
        "<h2>Welcome back, {{ username }}!</h2>",
    )?;

    let gateway_listener = bind_loopback().await?;
    let gateway = gateway_listener.local_addr()?;
    let gateway_config = GatewayConfig {
        internal_host: admin.to_string(),
        thumbs_dir: root.join("thumbs"),
        feedback_log: root.join("public-log").join("feedback.log"),
        ..GatewayConfig::default()
    };
    public_app::prepare_environment(&gateway_config);

    let served_admin = admin_config.clone();
    tokio::spawn(async move {
        if let Err(e) = admin_api::serve(admin_listener, served_admin).await {
            tracing::error!("render service stopped: {}", e);
        }
    });

    let state = AppState::new(gateway_config.clone())?;
    tokio::spawn(async move {
        if let Err(e) = public_app::serve(gateway_listener, state).await {
            tracing::error!("gateway stopped: {}", e);
        }
    });

    Ok(Range {
        dir,
        admin,
        gateway,
        admin_config,
        gateway_config,
    })
}

/// Client for talking to the gateway from the "outside"
pub fn client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?)
}
