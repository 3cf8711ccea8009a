//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use blog_core::query::PostQuery;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub timestamp: String,
}

/// Health check endpoint - returns server status and probes the store.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let reachable = state.posts.exists(&PostQuery::all()).await.is_ok();
    if !reachable {
        tracing::warn!("Health check could not reach the post store");
    }

    let response = HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        storage: if reachable { "up" } else { "down" },
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if reachable {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
