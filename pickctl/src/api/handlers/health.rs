//! Health endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
    pub catalog_loaded: bool,
    pub catalog_products: usize,
}

/// Liveness and readiness: pings the database and reports catalog state.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let catalog = state.catalog.load_full();
    let (catalog_loaded, catalog_products) = match catalog {
        Some(catalog) => (true, catalog.len()),
        None => (false, 0),
    };

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
        catalog_loaded,
        catalog_products,
    })
}
