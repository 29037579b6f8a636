use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use craftdeck_orchestrator::{EnvironmentGroup, RunLogs, SaveOutcome, ServerDetail, TeardownReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_servers))
        .route("/servers/{id}", get(get_server).delete(delete_server))
        .route("/servers/{id}/save", post(save_server))
        .route("/servers/{id}/spacelift-logs", get(server_logs))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServersResponse {
    pub success: bool,
    pub servers: Vec<EnvironmentGroup>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServerResponse {
    pub success: bool,
    pub server: ServerDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: SaveOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub logs: RunLogs,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: TeardownReport,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    #[serde(default)]
    pub save_world: bool,
}

impl DeleteRequest {
    /// The body is optional; an empty one means no world save
    fn from_body(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
    }
}

/// Every managed environment, grouped
#[utoipa::path(
    get,
    path = "/servers",
    responses((status = 200, description = "Environment groups", body = ServersResponse))
)]
pub async fn list_servers(State(state): State<AppState>) -> ApiResult<Json<ServersResponse>> {
    let servers = state.service.list().await?;

    Ok(Json(ServersResponse {
        success: true,
        servers,
    }))
}

#[utoipa::path(
    get,
    path = "/servers/{id}",
    params(("id" = String, Path, description = "Stack id")),
    responses(
        (status = 200, description = "Stack detail", body = ServerResponse),
        (status = 404, description = "Server not found")
    )
)]
pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ServerResponse>> {
    let server = state.service.get(&id).await?;

    Ok(Json(ServerResponse {
        success: true,
        server,
    }))
}

/// Start the world-save task on the environment's configuration stack
#[utoipa::path(
    post,
    path = "/servers/{id}/save",
    params(("id" = String, Path, description = "Stack id or group key")),
    responses(
        (status = 200, description = "Save task started", body = SaveResponse),
        (status = 404, description = "No configuration stack")
    )
)]
pub async fn save_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SaveResponse>> {
    let outcome = state.service.save(&id).await?;

    Ok(Json(SaveResponse {
        success: true,
        outcome,
    }))
}

#[utoipa::path(
    get,
    path = "/servers/{id}/spacelift-logs",
    params(("id" = String, Path, description = "Stack id")),
    responses(
        (status = 200, description = "Run history, newest first", body = LogsResponse),
        (status = 404, description = "Server not found")
    )
)]
pub async fn server_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LogsResponse>> {
    let logs = state.service.logs(&id).await?;

    Ok(Json(LogsResponse {
        success: true,
        logs,
    }))
}

/// Tear down a stack or a whole environment.
///
/// Per-stack failures do not fail the request; check `destroyResults`.
#[utoipa::path(
    delete,
    path = "/servers/{id}",
    params(("id" = String, Path, description = "Stack id or group key")),
    request_body(content = DeleteRequest, description = "Optional; an empty body means no world save"),
    responses(
        (status = 200, description = "Teardown attempted", body = DeleteResponse),
        (status = 404, description = "Server not found")
    )
)]
pub async fn delete_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<DeleteResponse>> {
    let request = DeleteRequest::from_body(&body)?;
    let report = state.service.delete(&id, request.save_world).await?;

    Ok(Json(DeleteResponse {
        success: true,
        report,
    }))
}
