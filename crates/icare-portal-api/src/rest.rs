//! HTTP REST API over the portal engine.
//!
//! Every handler is a thin shim: it turns the request into an engine call,
//! and the engine's result into JSON. Errors become
//! `{"success": false, "code", "detail"}` with a status chosen by
//! [`ApiError::status`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use icare_portal::Engine;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

use crate::types::{
    AddressSearchRequest, ApiError, ApiResult, MapNumberRequest, SearchResponse,
    TaxSummaryParams, TaxSummaryResponse,
};

/// Build the axum Router with all REST endpoints.
pub fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/search/address", post(search_address))
        .route("/search/map-number", post(search_map_number))
        .route("/tax-summary", get(tax_summary))
        .layer(cors)
        .with_state(engine)
}

/// Bind `addr` and serve the REST API until the process is stopped.
pub async fn serve(addr: &str, engine: Arc<Engine>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);
    tracing::info!("Portal: {}", engine.config().base_url);

    axum::serve(listener, router(engine)).await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn service_info() -> Json<Value> {
    Json(serde_json::json!({
        "message": "Fairfax County Property Search API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "search": "POST /search/address",
            "map_number": "POST /search/map-number",
            "tax_summary": "GET /tax-summary?detail_url=...",
            "health": "GET /health",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn search_address(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<AddressSearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let records = engine.search(&request.into_query()).await?;
    Ok(Json(SearchResponse::new(records)))
}

async fn search_map_number(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<MapNumberRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let records = engine.search_map_number(&request.map_number).await?;
    Ok(Json(SearchResponse::new(records)))
}

async fn tax_summary(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<TaxSummaryParams>,
) -> ApiResult<Json<TaxSummaryResponse>> {
    let detail_url = decode_detail_url(params.detail_url.as_deref().unwrap_or_default());
    let summary = engine.tax_summary(&detail_url).await?;
    Ok(Json(summary.into()))
}

// ── Helpers ─────────────────────────────────────────────────────

/// Undo a second layer of percent-encoding.
///
/// The query extractor has already decoded once; clients that encode the
/// link themselves before putting it in the query string leave `http%3A...`.
fn decode_detail_url(raw: &str) -> String {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if !(lower.starts_with("http%3a") || lower.starts_with("https%3a")) {
        return raw.to_string();
    }
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
