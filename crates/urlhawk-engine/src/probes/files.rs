//! Well-known file probes: exposed secrets, robots.txt, security.txt.

use async_trait::async_trait;
use reqwest::StatusCode;

use urlhawk_core::{Outcome, Target};

use crate::fanout::{run_concurrently, TaskOutcome};
use crate::probe::{looks_like_html, Probe, ProbeContext, HTML_MARKERS};

const SENSITIVE_BODY_LIMIT: usize = 512;
const ROBOTS_BODY_LIMIT: usize = 10 * 1024;
const SECURITY_TXT_BODY_LIMIT: usize = 2048;

const ROBOTS_MAX_PATHS: usize = 15;
const ROBOTS_TRUNCATED: &str = "... (more hidden paths found in file)";
const SECURITY_TXT_PATH: &str = "/.well-known/security.txt";
const SNIPPET_CHARS: usize = 100;

pub struct ExposedFiles;

#[async_trait]
impl Probe for ExposedFiles {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let paths = ctx.settings().sensitive_paths.clone();

        let checked = run_concurrently(&ctx.deadline, paths.clone(), |path: String| {
            let ctx = ctx.clone();
            let url = target.join(&path);
            async move { is_exposed(&ctx, &url).await }
        })
        .await;

        // Report in configured order.
        let exposed = paths
            .into_iter()
            .filter(|path| match checked.get(path) {
                Some(TaskOutcome::Completed(hit)) => *hit,
                Some(TaskOutcome::Faulted(detail)) => {
                    tracing::warn!(path = %path, detail = %detail, "Sensitive path check panicked");
                    false
                }
                _ => false,
            })
            .collect();

        Outcome::list(exposed)
    }
}

async fn is_exposed(ctx: &ProbeContext, url: &str) -> bool {
    let Ok(response) = ctx.get(url).await else {
        return false;
    };
    if response.status() != StatusCode::OK {
        return false;
    }
    match ctx.read_text(response, SENSITIVE_BODY_LIMIT).await {
        Ok(body) => !looks_like_html(&body, &HTML_MARKERS),
        Err(_) => false,
    }
}

pub struct RobotsTxt;

#[async_trait]
impl Probe for RobotsTxt {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let Ok(response) = ctx.get(&target.join("/robots.txt")).await else {
            return Outcome::Empty;
        };
        if response.status() != StatusCode::OK {
            return Outcome::Empty;
        }
        let Ok(body) = ctx.read_text(response, ROBOTS_BODY_LIMIT).await else {
            return Outcome::Empty;
        };
        if looks_like_html(&body, &HTML_MARKERS[..1]) {
            return Outcome::Empty;
        }

        Outcome::list(disallowed_paths(&body))
    }
}

/// `Disallow:` values from a robots.txt body, skipping empty and `/`.
/// Long lists are cut at fifteen entries plus a marker.
pub fn disallowed_paths(body: &str) -> Vec<String> {
    let mut paths: Vec<String> = body
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let (directive, value) = line.split_once(':')?;
            if !directive.trim().eq_ignore_ascii_case("disallow") {
                return None;
            }
            let path = value.trim();
            (!path.is_empty() && path != "/").then(|| path.to_string())
        })
        .collect();

    if paths.len() > ROBOTS_MAX_PATHS {
        paths.truncate(ROBOTS_MAX_PATHS);
        paths.push(ROBOTS_TRUNCATED.to_string());
    }
    paths
}

pub struct SecurityTxt;

#[async_trait]
impl Probe for SecurityTxt {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let response = match ctx.get(&target.join(SECURITY_TXT_PATH)).await {
            Ok(r) => r,
            Err(_) => return policy_found("Connection Failed"),
        };
        if response.status() != StatusCode::OK {
            return policy_found("No (404/Denied)");
        }
        let body = match ctx.read_text(response, SECURITY_TXT_BODY_LIMIT).await {
            Ok(b) => b,
            Err(_) => return policy_found("Read Error"),
        };
        if looks_like_html(&body, &HTML_MARKERS[..1]) {
            return policy_found("No (Redirected to HTML)");
        }

        let snippet: String = body.chars().take(SNIPPET_CHARS).collect();
        Outcome::map([
            ("Policy Found", "Yes".to_string()),
            ("Path", SECURITY_TXT_PATH.to_string()),
            ("Snippet", format!("{snippet}...")),
        ])
    }
}

fn policy_found(status: &str) -> Outcome {
    Outcome::map([("Policy Found", status)])
}
