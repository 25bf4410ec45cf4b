//! The probe capability contract and the context every probe receives.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use reqwest::{RequestBuilder, Response};
use tokio_rustls::TlsConnector;

use urlhawk_core::config::ProbeSettings;
use urlhawk_core::{Outcome, Target};

use crate::deadline::Deadline;
use crate::error::Result;
use crate::probes::tls;

/// Body markers that identify an HTML document.
pub const HTML_MARKERS: [&str; 2] = ["<html", "<body"];

/// One independent check against a target.
///
/// Implementations must stop waiting once `ctx.deadline` fires, must not
/// touch the network for an unparsable target, and must express every
/// failure as an [`Outcome::ErrorMarker`] rather than panicking.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome;
}

/// Adapter turning an async closure into a [`Probe`].
pub struct FnProbe<F>(F);

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(ProbeContext, Target) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        (self.0)(ctx, target).await
    }
}

/// Wrap an async closure as a shareable probe.
pub fn probe_fn<F, Fut>(f: F) -> Arc<dyn Probe>
where
    F: Fn(ProbeContext, Target) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(FnProbe(f))
}

/// Outbound clients shared read-only by every probe of every scan.
pub struct NetClients {
    /// Accepts invalid certificates and keeps no idle connections.
    pub http: reqwest::Client,
    pub resolver: TokioResolver,
    pub tls: TlsConnector,
    pub settings: ProbeSettings,
}

impl NetClients {
    pub fn new(settings: ProbeSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            resolver: build_resolver(),
            tls: tls::insecure_connector()?,
            settings,
        })
    }
}

fn build_resolver() -> TokioResolver {
    match TokioResolver::builder(TokioConnectionProvider::default()) {
        Ok(builder) => builder.build(),
        Err(e) => {
            tracing::warn!(error = %e, "System resolver config unavailable, using public resolvers");
            TokioResolver::builder_with_config(
                ResolverConfig::cloudflare(),
                TokioConnectionProvider::default(),
            )
            .build()
        }
    }
}

/// Why an outbound HTTP exchange produced no usable response.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("deadline exceeded")]
    Expired,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Everything a probe invocation may use: the scan deadline and the shared
/// clients. Cheap to clone.
#[derive(Clone)]
pub struct ProbeContext {
    pub deadline: Deadline,
    net: Arc<NetClients>,
}

impl ProbeContext {
    pub fn new(deadline: Deadline, net: Arc<NetClients>) -> Self {
        Self { deadline, net }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.net.http
    }

    pub fn resolver(&self) -> &TokioResolver {
        &self.net.resolver
    }

    pub fn tls(&self) -> &TlsConnector {
        &self.net.tls
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.net.settings
    }

    /// Same context under a different deadline, for nested sub-checks.
    pub fn with_deadline(&self, deadline: Deadline) -> Self {
        Self {
            deadline,
            net: Arc::clone(&self.net),
        }
    }

    /// Send a request, abandoning it when the deadline fires.
    pub async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, FetchError> {
        match self.deadline.race(request.send()).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(FetchError::Expired),
        }
    }

    pub async fn get(&self, url: &str) -> std::result::Result<Response, FetchError> {
        self.send(self.http().get(url)).await
    }

    /// Read at most `limit` bytes of the body as lossy UTF-8.
    pub async fn read_text(
        &self,
        mut response: Response,
        limit: usize,
    ) -> std::result::Result<String, FetchError> {
        let read = async move {
            let mut buf = Vec::new();
            while buf.len() < limit {
                match response.chunk().await? {
                    Some(chunk) => buf.extend_from_slice(&chunk),
                    None => break,
                }
            }
            buf.truncate(limit);
            Ok::<_, reqwest::Error>(String::from_utf8_lossy(&buf).into_owned())
        };

        match self.deadline.race(read).await {
            Ok(body) => Ok(body?),
            Err(_) => Err(FetchError::Expired),
        }
    }
}

/// True when `body` contains any of `markers`, case-insensitively.
pub fn looks_like_html(body: &str, markers: &[&str]) -> bool {
    let lower = body.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_marker_detection() {
        assert!(looks_like_html("<!DOCTYPE html><HTML><body>", &HTML_MARKERS));
        assert!(looks_like_html("<Body>hi</Body>", &HTML_MARKERS));
        assert!(!looks_like_html("<body>", &HTML_MARKERS[..1]));
        assert!(!looks_like_html("DB_PASSWORD=secret", &HTML_MARKERS));
    }
}
