//! Hostname resolution used by the fetch policy

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::debug;

#[async_trait]
pub trait HostResolver: Send + Sync {
    /// All addresses `host` resolves to. Failure yields an empty list.
    async fn resolve(&self, host: &str) -> Vec<IpAddr>;
}

/// System resolver backed by `tokio::net::lookup_host`
#[derive(Debug, Clone, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![ip];
        }

        match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => {
                let mut ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
                ips.sort();
                ips.dedup();
                ips
            }
            Err(e) => {
                debug!("Resolution of {} failed: {}", host, e);
                Vec::new()
            }
        }
    }
}

/// Fixed host table; unknown hosts resolve to nothing
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, ips: &[IpAddr]) -> Self {
        self.table.insert(host.to_ascii_lowercase(), ips.to_vec());
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![ip];
        }
        self.table
            .get(&host.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}
