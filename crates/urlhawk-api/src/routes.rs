//! Router and handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use urlhawk_core::{normalize, ProbeInfo, ScanResult};
use urlhawk_engine::Orchestrator;

use crate::error::{ApiError, Result};

/// Build the API router around a shared orchestrator.
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/scan", get(scan_handler))
        .route("/api/probes", get(probes_handler))
        .with_state(orchestrator)
        .layer(middleware::map_response(allow_any_origin))
}

#[derive(Debug, Deserialize)]
struct ScanQuery {
    url: Option<String>,
    probe: Option<String>,
}

async fn scan_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<ScanResult>> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or(ApiError::MissingUrl)?;

    let result = match query.probe {
        Some(name) => {
            let outcome = orchestrator.run_probe(&name, &url).await?;
            ScanResult::new(normalize(&url), BTreeMap::from([(name, outcome)]))
        }
        None => orchestrator.scan(&url).await,
    };

    Ok(Json(result))
}

async fn probes_handler(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<ProbeInfo>> {
    Json(orchestrator.registry().infos())
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
