use std::collections::HashSet;
use url::Url;

pub const ALLOWED_IMAGE_SCHEMES: &[&str] = &["http", "https"];
pub const BANNED_HOSTNAMES: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Scheme and host checks for the optional `image_url` of a submission.
///
/// A URL that fails is dropped from the context; it never fails the request.
#[derive(Debug, Clone)]
pub struct ImageUrlPolicy {
    allowed_schemes: HashSet<String>,
    banned_hosts: HashSet<String>,
}

impl Default for ImageUrlPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: ALLOWED_IMAGE_SCHEMES.iter().map(|s| s.to_string()).collect(),
            banned_hosts: BANNED_HOSTNAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ImageUrlPolicy {
    pub fn is_safe(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return false;
        }

        match parsed.host_str() {
            Some(host) => {
                let host = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();
                !host.is_empty() && !self.banned_hosts.contains(&host)
            }
            None => false,
        }
    }

    /// Keep `url` only when it passes the policy
    pub fn sanitize(&self, url: Option<String>) -> Option<String> {
        url.filter(|u| self.is_safe(u))
    }
}
