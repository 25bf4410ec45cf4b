//! Configuration management for urlhawk.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (URLHAWK__ prefix, `__` separator)
//! 2. Config file (urlhawk.toml)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Top-level configuration, one field per `urlhawk.toml` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HawkConfig {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub probes: ProbeSettings,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Orchestrator budget and concurrency.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Wall-clock budget for one scan. Leaves headroom under a 10 s
    /// serverless ceiling for serialization.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Return partial results once `max_duration_ms + deadline_grace_ms`
    /// has passed, even if some probe ignores its deadline.
    #[serde(default = "default_true")]
    pub enforce_deadline: bool,

    #[serde(default = "default_grace_ms")]
    pub deadline_grace_ms: u64,

    /// Maximum probes in flight per scan. 0 means unbounded.
    #[serde(default)]
    pub max_concurrent_probes: usize,
}

impl ScanConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    pub fn deadline_grace(&self) -> Duration {
        Duration::from_millis(self.deadline_grace_ms)
    }
}

/// Knobs consumed by the individual probes.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Paths checked by `exposed_files`.
    #[serde(default = "default_sensitive_paths")]
    pub sensitive_paths: Vec<String>,

    /// Ports checked by `open_ports`.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Per-port connect budget, capped by the scan deadline.
    #[serde(default = "default_port_timeout_ms")]
    pub port_timeout_ms: u64,

    #[serde(default = "default_tls_port")]
    pub tls_port: u16,

    /// Base URL of the ip-api compatible geolocation service.
    #[serde(default = "default_geo_endpoint")]
    pub geo_endpoint: String,

    /// Base URL of the Wayback Machine availability API.
    #[serde(default = "default_archive_endpoint")]
    pub archive_endpoint: String,

    /// Query this `host:port` instead of IANA referral when set.
    #[serde(default)]
    pub whois_server: Option<String>,

    /// Socket timeout for the blocking WHOIS client.
    #[serde(default = "default_whois_timeout_secs")]
    pub whois_timeout_secs: u64,
}

impl ProbeSettings {
    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_secs)
    }
}

/// HTTP API server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_max_duration_ms() -> u64 {
    8_000
}

fn default_grace_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "URLHawkScanner/1.0".to_string()
}

fn default_sensitive_paths() -> Vec<String> {
    ["/.env", "/.git/config", "/docker-compose.yml", "/backup.sql"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_ports() -> Vec<u16> {
    vec![
        21,   // FTP
        22,   // SSH
        23,   // Telnet
        25,   // SMTP
        53,   // DNS
        80,   // HTTP
        110,  // POP3
        143,  // IMAP
        443,  // HTTPS
        445,  // SMB
        3306, // MySQL
        5432, // PostgreSQL
        6379, // Redis
        8080, // HTTP alt
    ]
}

fn default_port_timeout_ms() -> u64 {
    1_000
}

fn default_tls_port() -> u16 {
    443
}

fn default_geo_endpoint() -> String {
    "http://ip-api.com".to_string()
}

fn default_archive_endpoint() -> String {
    "http://archive.org".to_string()
}

fn default_whois_timeout_secs() -> u64 {
    10
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: default_max_duration_ms(),
            enforce_deadline: default_true(),
            deadline_grace_ms: default_grace_ms(),
            max_concurrent_probes: 0,
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            sensitive_paths: default_sensitive_paths(),
            ports: default_ports(),
            port_timeout_ms: default_port_timeout_ms(),
            tls_port: default_tls_port(),
            geo_endpoint: default_geo_endpoint(),
            archive_endpoint: default_archive_endpoint(),
            whois_server: None,
            whois_timeout_secs: default_whois_timeout_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Load configuration from `<file_prefix>.toml` (optional) and `URLHAWK__`
/// environment variables, falling back to defaults for anything unset.
pub fn load(file_prefix: &str) -> Result<HawkConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("URLHAWK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let loaded: HawkConfig = cfg.try_deserialize()?;
    tracing::debug!(
        max_duration_ms = loaded.scan.max_duration_ms,
        max_concurrent_probes = loaded.scan.max_concurrent_probes,
        "Configuration loaded"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HawkConfig::default();
        assert_eq!(config.scan.max_duration(), Duration::from_secs(8));
        assert!(config.scan.enforce_deadline);
        assert_eq!(config.scan.max_concurrent_probes, 0);
        assert_eq!(config.probes.sensitive_paths.len(), 4);
        assert_eq!(config.probes.ports.len(), 14);
        assert_eq!(config.probes.tls_port, 443);
        assert_eq!(config.api.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urlhawk-test.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[scan]\nmax_duration_ms = 3000\nmax_concurrent_probes = 4\n\n[probes]\nports = [22, 443]"
        )
        .unwrap();

        let prefix = dir.path().join("urlhawk-test");
        let config = load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.scan.max_duration_ms, 3000);
        assert_eq!(config.scan.max_concurrent_probes, 4);
        assert_eq!(config.probes.ports, vec![22, 443]);
        // Untouched keys keep their defaults.
        assert_eq!(config.scan.deadline_grace_ms, 250);
        assert_eq!(config.probes.user_agent, "URLHawkScanner/1.0");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("does-not-exist");
        let config = load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.scan.max_duration_ms, 8000);
    }
}
