//! Fetch target selection and the outbound allow-list.
//!
//! Target selection runs first and may rewrite loopback on port 9000 to the
//! internal render service. The allow-list sees the rewritten host.

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::resolver::HostResolver;
use ipnet::IpNet;
use std::net::IpAddr;
use tracing::{debug, warn};
use url::Url;
use wildmatch::WildMatch;

const OPENAPI_ALIAS_FROM: &str = "http://localhost/openapi.json";
const OPENAPI_ALIAS_TO: &str = "http://localhost:9000/openapi/openapi.json";

const ADMIN_PORT: u16 = 9000;
const LOOPBACK_NAMES: &[&str] = &["localhost", "127.0.0.1"];

/// Turns caller input into the URL the gateway will request
#[derive(Debug, Clone)]
pub struct TargetRules {
    internal_host: String,
    internal_port: Option<u16>,
}

impl TargetRules {
    /// `internal` is a `host[:port]` authority
    pub fn new(internal: &str) -> Result<Self, GatewayError> {
        let parsed = Url::parse(&format!("http://{}/", internal))
            .map_err(|e| GatewayError::Configuration(format!("internal host {}: {}", internal, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| GatewayError::Configuration(format!("internal host {} has no host", internal)))?;

        Ok(Self {
            internal_host: host.to_string(),
            internal_port: parsed.port(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(&config.internal_host)
    }

    /// Target from the `url` query parameter. The value is decoded once more
    /// after the query string decoding, so doubly-encoded input is accepted.
    pub fn from_query(&self, raw: &str) -> Result<Url, GatewayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::MissingUrl);
        }

        let decoded = urlencoding::decode(trimmed)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| trimmed.to_string());

        let target = if decoded == OPENAPI_ALIAS_FROM {
            OPENAPI_ALIAS_TO
        } else {
            decoded.as_str()
        };

        self.finish(target)
    }

    /// Target for `/fetch/<subpath>`: always the internal host
    pub fn from_subpath(&self, subpath: &str, query: Option<&str>) -> Result<Url, GatewayError> {
        let mut target = format!("http://{}/{}", self.authority(), subpath.trim_start_matches('/'));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }
        self.finish(&target)
    }

    fn authority(&self) -> String {
        match self.internal_port {
            Some(port) => format!("{}:{}", self.internal_host, port),
            None => self.internal_host.clone(),
        }
    }

    fn finish(&self, target: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(target).map_err(|_| GatewayError::UnsupportedUrl)?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
            return Err(GatewayError::UnsupportedUrl);
        }

        self.rewrite_loopback(&mut url)?;
        Ok(url)
    }

    fn rewrite_loopback(&self, url: &mut Url) -> Result<(), GatewayError> {
        let is_loopback = url
            .host_str()
            .map_or(false, |host| LOOPBACK_NAMES.contains(&host));
        if !is_loopback || url.port_or_known_default() != Some(ADMIN_PORT) {
            return Ok(());
        }

        let before = url.to_string();
        url.set_host(Some(&self.internal_host))
            .map_err(|e| GatewayError::Configuration(format!("internal host: {}", e)))?;
        url.set_port(self.internal_port)
            .map_err(|_| GatewayError::Configuration("internal port".to_string()))?;
        debug!("Rewrote {} to {}", before, url);
        Ok(())
    }
}

/// Outcome of the allow-list check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Host matched an allow-listed pattern
    AllowedHost,
    /// Every resolved address is inside an allowed network
    AllowedNetwork,
    Blocked,
}

impl Verdict {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Verdict::Blocked)
    }
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    hosts: Vec<WildMatch>,
    networks: Vec<IpNet>,
}

impl FetchPolicy {
    pub fn new(hosts: &[String], networks: &[IpNet]) -> Self {
        Self {
            hosts: hosts
                .iter()
                .map(|pattern| WildMatch::new(&pattern.to_ascii_lowercase()))
                .collect(),
            networks: networks.to_vec(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(&config.allowed_hosts, &config.allowed_networks)
    }

    pub fn host_listed(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|pattern| pattern.matches(&host))
    }

    pub fn address_allowed(&self, ip: &IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }

    /// Allowed if the host is listed, or if it resolved to at least one
    /// address and all of them are inside the allowed networks.
    pub fn evaluate(&self, host: &str, resolved: &[IpAddr]) -> Verdict {
        if self.host_listed(host) {
            Verdict::AllowedHost
        } else if !resolved.is_empty() && resolved.iter().all(|ip| self.address_allowed(ip)) {
            Verdict::AllowedNetwork
        } else {
            Verdict::Blocked
        }
    }

    /// Resolve the URL's host (only when it is not listed) and evaluate
    pub async fn check(
        &self,
        url: &Url,
        resolver: &dyn HostResolver,
    ) -> Result<Verdict, GatewayError> {
        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .ok_or(GatewayError::UnsupportedUrl)?;

        let resolved = if self.host_listed(host) {
            Vec::new()
        } else {
            resolver.resolve(host).await
        };

        match self.evaluate(host, &resolved) {
            Verdict::Blocked => {
                warn!(host = %host, resolved = ?resolved, "Fetch blocked by allow-list");
                Err(GatewayError::Blocked {
                    host: host.to_string(),
                })
            }
            verdict => Ok(verdict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use proptest::prelude::*;

    fn rules() -> TargetRules {
        TargetRules::new("admin-api:9000").unwrap()
    }

    fn policy() -> FetchPolicy {
        FetchPolicy::from_config(&GatewayConfig::default())
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_query_target_parsing() {
        let rules = rules();
        assert!(matches!(rules.from_query("   "), Err(GatewayError::MissingUrl)));
        assert!(matches!(
            rules.from_query("file:///etc/passwd"),
            Err(GatewayError::UnsupportedUrl)
        ));
        assert!(matches!(
            rules.from_query("not a url"),
            Err(GatewayError::UnsupportedUrl)
        ));

        let url = rules.from_query(" https://res.cloudinary.com/demo/a.jpg ").unwrap();
        assert_eq!(url.as_str(), "https://res.cloudinary.com/demo/a.jpg");

        let url = rules.from_query("http%3A%2F%2Fpublic-app%3A8080%2Fstatus").unwrap();
        assert_eq!(url.as_str(), "http://public-app:8080/status");
    }

    #[test]
    fn test_loopback_admin_port_rewritten() {
        let rules = rules();
        let url = rules.from_query("http://127.0.0.1:9000/status").unwrap();
        assert_eq!(url.as_str(), "http://admin-api:9000/status");

        let url = rules.from_query("http://localhost:9000/render?x=1").unwrap();
        assert_eq!(url.as_str(), "http://admin-api:9000/render?x=1");

        let url = rules.from_query("http://localhost:8080/").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
    }

    #[test]
    fn test_openapi_alias() {
        let url = rules().from_query("http://localhost/openapi.json").unwrap();
        assert_eq!(url.as_str(), "http://admin-api:9000/openapi/openapi.json");
    }

    #[test]
    fn test_subpath_targets_internal_host() {
        let rules = rules();
        let url = rules.from_subpath("templates/get", Some("name=welcome.html")).unwrap();
        assert_eq!(url.as_str(), "http://admin-api:9000/templates/get?name=welcome.html");

        let url = rules.from_subpath("status", None).unwrap();
        assert_eq!(url.as_str(), "http://admin-api:9000/status");
    }

    #[test]
    fn test_rewrite_uses_configured_authority() {
        let rules = TargetRules::new("127.0.0.1:19000").unwrap();
        let url = rules.from_query("http://localhost:9000/status").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:19000/status");
    }

    #[test]
    fn test_evaluate() {
        let policy = policy();
        assert_eq!(policy.evaluate("admin-api", &[]), Verdict::AllowedHost);
        assert_eq!(policy.evaluate("RES.cloudinary.com", &[]), Verdict::AllowedHost);
        assert_eq!(
            policy.evaluate("db.internal", &[ip("10.0.0.4"), ip("192.168.1.9")]),
            Verdict::AllowedNetwork
        );
        assert_eq!(
            policy.evaluate("mixed.example", &[ip("10.0.0.4"), ip("8.8.8.8")]),
            Verdict::Blocked
        );
        assert_eq!(policy.evaluate("evil.example.com", &[]), Verdict::Blocked);
        assert_eq!(policy.evaluate("172.32.0.1", &[ip("172.32.0.1")]), Verdict::Blocked);
    }

    #[test]
    fn test_wildcard_patterns() {
        let policy = FetchPolicy::new(&["*.lab.internal".to_string()], &[]);
        assert!(policy.host_listed("api.lab.internal"));
        assert!(!policy.host_listed("lab.internal.evil.com"));
    }

    #[tokio::test]
    async fn test_check_uses_resolver() {
        let policy = policy();
        let resolver = StaticResolver::new()
            .with("intranet.corp", &[ip("10.20.30.40")])
            .with("evil.example.com", &[ip("93.184.216.34")]);

        let url = Url::parse("http://intranet.corp/").unwrap();
        assert_eq!(
            policy.check(&url, &resolver).await.unwrap(),
            Verdict::AllowedNetwork
        );

        let url = Url::parse("http://evil.example.com/").unwrap();
        assert!(matches!(
            policy.check(&url, &resolver).await,
            Err(GatewayError::Blocked { .. })
        ));

        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert!(policy.check(&url, &resolver).await.is_err());
    }

    proptest! {
        #[test]
        fn public_addresses_on_unlisted_hosts_are_blocked(raw in any::<u32>(), label in "[a-z]{3,12}") {
            let policy = policy();
            let addr = IpAddr::from(std::net::Ipv4Addr::from(raw));
            prop_assume!(!policy.address_allowed(&addr));

            let host = format!("{}.example.com", label);
            prop_assert_eq!(policy.evaluate(&host, &[addr]), Verdict::Blocked);
            prop_assert_eq!(policy.evaluate(&host, &[ip("10.0.0.1"), addr]), Verdict::Blocked);
        }

        #[test]
        fn private_addresses_are_allowed(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255) {
            let policy = policy();
            let addr = IpAddr::from(std::net::Ipv4Addr::new(10, a, b, c));
            prop_assert_eq!(policy.evaluate("unlisted.example", &[addr]), Verdict::AllowedNetwork);
        }
    }
}
