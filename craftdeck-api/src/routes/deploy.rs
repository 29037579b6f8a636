use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use craftdeck_orchestrator::{DeployOutcome, DeployRequest};
use serde::Serialize;
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new().route("/deploy", post(deploy_server))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeployResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: DeployOutcome,
}

/// Create a new environment from the configured blueprint
#[utoipa::path(
    post,
    path = "/deploy",
    request_body = DeployRequest,
    responses(
        (status = 200, description = "Stacks created", body = DeployResponse),
        (status = 400, description = "Missing fields or malformed body"),
        (status = 404, description = "Blueprint not found")
    )
)]
pub async fn deploy_server(
    State(state): State<AppState>,
    payload: Result<Json<DeployRequest>, JsonRejection>,
) -> ApiResult<Json<DeployResponse>> {
    let Json(request) = payload?;
    let outcome = state.service.deploy(request).await?;

    Ok(Json(DeployResponse {
        success: true,
        outcome,
    }))
}
