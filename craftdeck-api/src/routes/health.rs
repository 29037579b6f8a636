use crate::{error::ApiResult, state::AppState};
use axum::{extract::State, routing::get, Json, Router};
use craftdeck_orchestrator::Connectivity;
use serde::Serialize;
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/test", get(connection_test))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TestResponse {
    pub success: bool,
    #[serde(flatten)]
    pub connectivity: Connectivity,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Round-trip to Spacelift with the configured API key
#[utoipa::path(
    get,
    path = "/test",
    responses(
        (status = 200, description = "Spacelift is reachable", body = TestResponse),
        (status = 500, description = "Credential exchange or request failed")
    )
)]
pub async fn connection_test(State(state): State<AppState>) -> ApiResult<Json<TestResponse>> {
    let connectivity = state.service.connectivity().await?;

    Ok(Json(TestResponse {
        success: true,
        connectivity,
    }))
}
