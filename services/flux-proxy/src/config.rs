//! Proxy configuration from flags and environment.

use std::time::Duration;

use clap::Args;

/// 50 MB
pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Smallest body accepted as a GeoTIFF.
pub const DEFAULT_MIN_BYTES: u64 = 100;

pub const DEFAULT_ALLOWED_DOMAINS: [&str; 3] = [
    "solar.googleapis.com",
    "earthengine.googleapis.com",
    "storage.googleapis.com",
];

#[derive(Debug, Clone, Args)]
pub struct ProxyConfig {
    /// Listen address
    #[arg(short, long, env = "PROXY_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Largest upstream body forwarded, in bytes
    #[arg(long, env = "PROXY_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: u64,

    /// Smallest upstream body accepted, in bytes
    #[arg(long, env = "PROXY_MIN_BYTES", default_value_t = DEFAULT_MIN_BYTES)]
    pub min_bytes: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "PROXY_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Hosts the proxy forwards to; subdomains match too
    #[arg(
        long = "allowed-domain",
        env = "PROXY_ALLOWED_DOMAINS",
        value_delimiter = ',',
        default_value = "solar.googleapis.com,earthengine.googleapis.com,storage.googleapis.com"
    )]
    pub allowed_domains: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
            min_bytes: DEFAULT_MIN_BYTES,
            upstream_timeout_secs: 30,
            allowed_domains: DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl ProxyConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// True when `host` is an allowed domain or a subdomain of one.
    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_domains.iter().any(|domain| {
            let domain = domain.trim().to_ascii_lowercase();
            !domain.is_empty()
                && (host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.')))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_matches_host_not_substring() {
        let config = ProxyConfig::default();
        assert!(config.is_allowed_host("solar.googleapis.com"));
        assert!(config.is_allowed_host("SOLAR.googleapis.com"));
        assert!(config.is_allowed_host("eu.storage.googleapis.com"));
        assert!(!config.is_allowed_host("evil-solar.googleapis.com.example.org"));
        assert!(!config.is_allowed_host("notsolar.googleapis.com"));
        assert!(!config.is_allowed_host("example.com"));
    }
}
