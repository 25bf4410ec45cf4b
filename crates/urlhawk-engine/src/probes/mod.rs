//! Built-in probes.
//!
//! Each submodule implements one family of checks. [`builtin_registry`] is
//! the single place that decides which probes a scan runs.

pub mod dns;
pub mod files;
pub mod headers;
pub mod intel;
pub mod ports;
pub mod social;
pub mod tls;
pub mod whois;

use std::sync::Arc;

use urlhawk_core::Outcome;

use crate::error::Result;
use crate::registry::Registry;

pub const INVALID_DOMAIN: &str = "Invalid domain";

/// Outcome for a target whose host cannot be extracted.
pub(crate) fn invalid_domain() -> Outcome {
    Outcome::error(INVALID_DOMAIN)
}

/// The registry of every built-in probe.
pub fn builtin_registry() -> Result<Registry> {
    let mut registry = Registry::new();

    registry.register(
        "missing_headers",
        "Checks for missing critical security headers",
        Arc::new(headers::MissingHeaders),
    )?;
    registry.register(
        "http_methods",
        "Identifies allowed HTTP methods",
        Arc::new(headers::HttpMethods),
    )?;
    registry.register(
        "tech_stack",
        "Guesses the backend technology stack from HTTP headers and meta tags",
        Arc::new(headers::TechStack),
    )?;
    registry.register(
        "exposed_files",
        "Checks for commonly exposed sensitive files",
        Arc::new(files::ExposedFiles),
    )?;
    registry.register(
        "robots_txt",
        "Extracts disallowed or hidden paths from robots.txt",
        Arc::new(files::RobotsTxt),
    )?;
    registry.register(
        "security_txt",
        "Checks for a standard security.txt policy file",
        Arc::new(files::SecurityTxt),
    )?;
    registry.register(
        "dns_records",
        "Retrieves A, AAAA, MX, NS, and TXT records",
        Arc::new(dns::DnsRecords),
    )?;
    registry.register(
        "geolocation",
        "Locates the server IP geographically using ip-api.com",
        Arc::new(intel::Geolocation),
    )?;
    registry.register(
        "wayback_machine",
        "Checks for historical snapshots on archive.org",
        Arc::new(intel::WaybackMachine),
    )?;
    registry.register(
        "social_links",
        "Finds potential social media profiles linked on the homepage",
        Arc::new(social::SocialLinks),
    )?;
    registry.register(
        "ssl_certificate",
        "Analyzes SSL/TLS certificate details",
        Arc::new(tls::SslCertificate),
    )?;
    registry.register(
        "whois_info",
        "Fetches domain registration data like Registrar and Expiry Dates",
        Arc::new(whois::WhoisInfo),
    )?;
    registry.register(
        "open_ports",
        "Scans common ports to see what services are exposed",
        Arc::new(ports::OpenPorts),
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 13);
        for name in ["missing_headers", "exposed_files", "whois_info", "open_ports"] {
            assert!(registry.lookup(name).is_some(), "{name} missing");
        }
    }
}
