//! Target URL normalization.
//!
//! Every scan dispatches on a normalized target: scheme present, no trailing
//! slash. Probes append sub-paths (`/robots.txt`) directly onto it.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_SCHEME: &str = "http://";
const KNOWN_SCHEMES: [&str; 2] = ["http://", "https://"];

/// A normalized target URL. Construct through [`normalize`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a path (expected to start with `/`) to the target.
    pub fn join(&self, path: &str) -> String {
        format!("{}{path}", self.0)
    }

    /// Host part of the target, empty when it cannot be parsed.
    pub fn domain(&self) -> String {
        extract_domain(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Standardize a raw URL: insert `http://` when no known scheme is present
/// and strip trailing slashes.
pub fn normalize(raw: &str) -> Target {
    let trimmed = raw.trim();
    let has_scheme = KNOWN_SCHEMES.iter().any(|scheme| {
        trimmed
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });

    let with_scheme = if has_scheme {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{trimmed}")
    };

    Target(with_scheme.trim_end_matches('/').to_string())
}

/// Extract the bare host from a URL: no scheme, userinfo, port, path, or
/// IPv6 brackets. Returns an empty string for unparsable input.
pub fn extract_domain(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };

    parsed
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .unwrap_or_default()
}
