// src/routes/health.rs
//! Health check endpoint for the alert engine daemon.
//!
//! Used by container orchestrators (e.g., Docker, Kubernetes) and CI
//! pipelines to verify that the process is up and able to respond. The
//! poll loop itself has no interactive surface; this route is the only
//! HTTP endpoint the engine exposes.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

/// Handle `GET /health`.
///
/// Returns a static JSON object indicating the daemon is reachable. This
/// endpoint is deliberately lightweight and does not touch the database;
/// store outages surface in the logs and the poll loop's retry behavior,
/// not here.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "smartapt-alert-engine",
    })
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges cleanly with the
/// gateway router regardless of state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
