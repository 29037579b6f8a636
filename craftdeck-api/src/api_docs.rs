use crate::routes::{
    deploy::DeployResponse,
    health::{HealthResponse, TestResponse},
    servers::{
        DeleteRequest, DeleteResponse, LogsResponse, SaveResponse, ServerResponse,
        ServersResponse,
    },
};
use craftdeck_orchestrator::{
    AggregateStatus, Connectivity, DeployOutcome, DeployRequest, EnvironmentGroup, LogLevel,
    MemberSummary, PassThrough, RunLogs, SaveOutcome, ServerDetail, StatusEntry, StepAction,
    StepResult, StepStatus, TeardownMode, TeardownReport,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::connection_test,
        crate::routes::deploy::deploy_server,
        crate::routes::servers::list_servers,
        crate::routes::servers::get_server,
        crate::routes::servers::save_server,
        crate::routes::servers::server_logs,
        crate::routes::servers::delete_server,
    ),
    components(
        schemas(
            HealthResponse,
            TestResponse,
            Connectivity,
            DeployRequest,
            DeployResponse,
            DeployOutcome,
            ServersResponse,
            EnvironmentGroup,
            AggregateStatus,
            MemberSummary,
            PassThrough,
            ServerResponse,
            ServerDetail,
            SaveResponse,
            SaveOutcome,
            LogsResponse,
            RunLogs,
            DeleteRequest,
            DeleteResponse,
            TeardownReport,
            TeardownMode,
            StepAction,
            StepResult,
            StepStatus,
            StatusEntry,
            LogLevel
        )
    ),
    tags(
        (name = "craftdeck-api", description = "Game server environments on Spacelift")
    )
)]
pub struct ApiDoc;
