//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Request validation
//! - Response formatting
//!
//! Read-only surface over the engine's snapshots and the retained
//! event log; verification itself is driven by the orchestration loop.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::models::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/status", get(property_status))
        .route("/api/events", get(list_events))
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let retained = state.event_log.count().await;
    tracing::debug!(retained_events = retained, "Health check");
    Json(response)
}

/// Query parameters for property status
#[derive(Deserialize)]
struct StatusQuery {
    company: Option<i64>,
}

/// Current per-property camera status, optionally filtered by company
async fn property_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let snapshot = match query.company {
        Some(company) => state.engine.snapshot_for_company(company).await,
        None => state.engine.snapshot().await,
    };
    let property_count = snapshot.len();
    Json(ApiResponse::success(json!({
        "properties": snapshot,
        "property_count": property_count,
    })))
}

/// Query parameters for events
#[derive(Deserialize)]
struct EventQuery {
    limit: Option<usize>,
}

/// Recent down/recovered events, newest first
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100);
    let events = state.event_log.latest(limit).await;
    Json(ApiResponse::success(events))
}
