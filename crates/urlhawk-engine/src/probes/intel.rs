//! Third-party intelligence lookups: IP geolocation and archive history.

use async_trait::async_trait;
use serde::Deserialize;

use urlhawk_core::{Outcome, Target};

use crate::probe::{Probe, ProbeContext};
use crate::probes::invalid_domain;

pub struct Geolocation;

/// Subset of the ip-api.com JSON response.
#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    status: String,
    country: Option<String>,
    city: Option<String>,
    isp: Option<String>,
}

#[async_trait]
impl Probe for Geolocation {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let domain = target.domain();
        if domain.is_empty() {
            return invalid_domain();
        }

        let resolved = ctx.deadline.race(ctx.resolver().lookup_ip(domain.as_str())).await;
        let ip = match resolved {
            Ok(Ok(lookup)) => match lookup.iter().next() {
                Some(ip) => ip.to_string(),
                None => return Outcome::error("Could not resolve IP"),
            },
            _ => return Outcome::error("Could not resolve IP"),
        };

        let url = format!("{}/json/{ip}", ctx.settings().geo_endpoint.trim_end_matches('/'));
        let response = match ctx.get(&url).await {
            Ok(r) => r,
            Err(_) => return Outcome::error("Geo API unavailable"),
        };
        let geo = match ctx.deadline.race(response.json::<GeoResponse>()).await {
            Ok(Ok(geo)) => geo,
            _ => return Outcome::error("Failed to parse Geo data"),
        };

        if geo.status == "success" {
            let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "Unknown".to_string());
            Outcome::map([
                ("IP Address", ip),
                ("Country", or_unknown(geo.country)),
                ("City", or_unknown(geo.city)),
                ("ISP", or_unknown(geo.isp)),
            ])
        } else {
            Outcome::map([
                ("IP Address", ip),
                ("Info", "Geo-location skipped or failed".to_string()),
            ])
        }
    }
}

pub struct WaybackMachine;

#[derive(Debug, Default, Deserialize)]
struct WaybackResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    #[serde(default)]
    closest: Option<Snapshot>,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    #[serde(default)]
    url: String,
    #[serde(default)]
    timestamp: String,
}

#[async_trait]
impl Probe for WaybackMachine {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let domain = target.domain();
        if domain.is_empty() {
            return invalid_domain();
        }

        let endpoint = format!(
            "{}/wayback/available",
            ctx.settings().archive_endpoint.trim_end_matches('/')
        );
        let request = ctx.http().get(endpoint).query(&[("url", domain.as_str())]);
        let response = match ctx.send(request).await {
            Ok(r) => r,
            Err(_) => return Outcome::error("Archive API unreachable"),
        };
        let parsed = match ctx.deadline.race(response.json::<WaybackResponse>()).await {
            Ok(Ok(parsed)) => parsed,
            _ => return Outcome::error("Failed to parse Archive data"),
        };

        match parsed.archived_snapshots.closest {
            Some(snapshot) if snapshot.available => Outcome::map([
                ("Archived", "Yes".to_string()),
                ("Latest Snapshot", snapshot.url),
                ("Timestamp", snapshot.timestamp),
            ]),
            _ => Outcome::map([("Archived", "No snapshots found")]),
        }
    }
}
