//! Response-header probes: security headers, allowed methods, tech stack.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

use urlhawk_core::{Outcome, Target};

use crate::probe::{Probe, ProbeContext};

/// Headers whose absence weakens clickjacking, XSS, and downgrade defenses.
pub const SECURITY_HEADERS: [&str; 3] = [
    "X-Frame-Options",
    "Content-Security-Policy",
    "Strict-Transport-Security",
];

pub struct MissingHeaders;

#[async_trait]
impl Probe for MissingHeaders {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        match ctx.get(target.as_str()).await {
            Ok(response) => Outcome::list(missing_security_headers(response.headers())),
            Err(e) => {
                tracing::debug!(target = %target, error = %e, "Header probe request failed");
                Outcome::list(vec!["Host Unreachable".to_string()])
            }
        }
    }
}

/// Security headers absent (or empty) in `headers`, in canonical order.
pub fn missing_security_headers(headers: &HeaderMap) -> Vec<String> {
    SECURITY_HEADERS
        .iter()
        .filter(|name| header_value(headers, name).is_none())
        .map(|name| name.to_string())
        .collect()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

pub struct HttpMethods;

#[async_trait]
impl Probe for HttpMethods {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let request = ctx.http().request(Method::OPTIONS, target.as_str());
        match ctx.send(request).await {
            Ok(response) => {
                let allowed = header_value(response.headers(), "Allow")
                    .unwrap_or("Not explicitly defined (No Allow header)")
                    .to_string();
                Outcome::map([("Allowed Methods", allowed)])
            }
            Err(_) => Outcome::error("Host unreachable"),
        }
    }
}

pub struct TechStack;

/// Only the head of the page is inspected for markers.
const TECH_BODY_LIMIT: usize = 2048;

#[async_trait]
impl Probe for TechStack {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let response = match ctx.get(target.as_str()).await {
            Ok(r) => r,
            Err(_) => return Outcome::error("Failed to reach host"),
        };

        let mut stack = header_fingerprint(response.headers());
        let body = ctx
            .read_text(response, TECH_BODY_LIMIT)
            .await
            .unwrap_or_default();
        stack.extend(body_fingerprint(&body));

        Outcome::list(
            stack
                .into_iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect(),
        )
    }
}

fn header_fingerprint(headers: &HeaderMap) -> BTreeMap<&'static str, String> {
    let mut stack = BTreeMap::new();
    for (header, label) in [
        ("Server", "Server"),
        ("X-Powered-By", "Powered-By"),
        ("X-AspNet-Version", "ASP.NET"),
    ] {
        if let Some(value) = header_value(headers, header) {
            stack.insert(label, value.to_string());
        }
    }
    stack
}

/// CMS and frontend guesses from page markup.
pub fn body_fingerprint(body: &str) -> BTreeMap<&'static str, String> {
    let content = body.to_lowercase();
    let mut stack = BTreeMap::new();

    if content.contains("wp-content") || content.contains("wordpress") {
        stack.insert("CMS", "WordPress".to_string());
    } else if content.contains("shopify") {
        stack.insert("CMS", "Shopify".to_string());
    }

    if content.contains("react") || content.contains("data-reactroot") {
        stack.insert("Frontend", "React".to_string());
    } else if content.contains("ng-app") || content.contains("angular") {
        stack.insert("Frontend", "Angular".to_string());
    }

    stack
}
