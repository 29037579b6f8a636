pub mod deploy;
pub mod health;
pub mod servers;

use crate::{api_docs::ApiDoc, state::AppState};
use axum::{routing::get, Json, Router};
use craftdeck_orchestrator::EnvironmentService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

pub fn create_app(service: EnvironmentService) -> Router {
    let state = AppState::new(service);

    // The UI is served from a different origin
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(health::routes())
        .merge(deploy::routes())
        .merge(servers::routes())
        .route("/api-docs/openapi.json", get(openapi_spec))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
