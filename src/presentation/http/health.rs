use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use super::rest::{Envelope, Rest};
use crate::bootstrap::app_context::AppContext;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResp {
    pub status: &'static str,
    pub database: &'static str,
    /// Distinct feature modules with at least one mounted route.
    pub modules: usize,
    pub routes: usize,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, body = Envelope))
)]
pub async fn health(State(ctx): State<AppContext>) -> Envelope {
    let db = ctx.db();
    let database = if !db.is_initialized().await {
        "disabled"
    } else if db.ping().await.is_ok() {
        "up"
    } else {
        "down"
    };
    let status = if database == "down" { "degraded" } else { "ok" };
    let (modules, routes) = ctx
        .routes()
        .map(|r| (r.modules().len(), r.registered.len()))
        .unwrap_or_default();
    let body = HealthResp {
        status,
        database,
        modules,
        routes,
    };
    Rest::format(
        StatusCode::OK,
        Some("OK"),
        serde_json::to_value(body).ok(),
        None,
    )
}

pub fn routes(api_prefix: &str) -> Router<AppContext> {
    Router::new().route(&format!("{api_prefix}/health"), get(health))
}
