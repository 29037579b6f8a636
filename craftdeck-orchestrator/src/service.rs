//! Request-level environment operations
//!
//! `EnvironmentService` is what the HTTP layer calls. Each operation is a
//! short sequence of [`StackApi`] calls followed by a reshape into the types
//! below; nothing is cached between requests.

use crate::error::{Result, ServiceError};
use crate::grouping::{group_units, EnvironmentGroup, PassThrough};
use crate::resolve::{self, GroupMembers};
use crate::teardown::{Teardown, TeardownOptions, TeardownReport, TeardownSettings};
use chrono::{DateTime, Utc};
use craftdeck_client::{
    BlueprintSummary, ClientError, InfraUnit, RunSummary, StackApi, TemplateInput, UnitRole,
    UnitState, Viewer,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    /// Blueprint every deploy is created from
    pub blueprint_id: String,
    pub teardown: TeardownSettings,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Connectivity {
    #[schema(value_type = Object)]
    pub viewer: Viewer,
    #[schema(value_type = Vec<Object>)]
    pub blueprints: Vec<BlueprintSummary>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub instance_type: Option<String>,
    pub s3_bucket: Option<String>,
    pub motd: Option<String>,
    /// Accepted as a number or a string
    #[schema(value_type = Option<String>)]
    pub max_players: Option<Value>,
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => present(Some(s)),
        other => Some(other.to_string()),
    }
}

impl DeployRequest {
    /// Blueprint template inputs, or an error naming every missing field
    pub fn template_inputs(&self) -> Result<Vec<TemplateInput>> {
        let fields = [
            ("instanceType", "instance_type", present(self.instance_type.as_deref())),
            ("s3Bucket", "s3_bucket", present(self.s3_bucket.as_deref())),
            ("motd", "motd", present(self.motd.as_deref())),
            ("maxPlayers", "max_players", scalar(self.max_players.as_ref())),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, _, value)| value.is_none())
            .map(|(name, _, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        Ok(fields
            .into_iter()
            .filter_map(|(_, input, value)| value.map(|v| TemplateInput::new(input, v)))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub stack_id: String,
    pub all_stack_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetail {
    pub id: String,
    pub name: String,
    #[schema(value_type = String)]
    pub state: UnitState,
    #[schema(value_type = String)]
    pub role: UnitRole,
    pub group_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: PassThrough,
    pub outputs: BTreeMap<String, String>,
    pub labels: Vec<String>,
}

impl From<InfraUnit> for ServerDetail {
    fn from(unit: InfraUnit) -> Self {
        Self {
            details: PassThrough::from_unit(&unit),
            role: unit.role().effective(),
            group_key: unit.group_key().to_string(),
            id: unit.id,
            name: unit.name,
            state: unit.state,
            created_at: unit.created_at,
            outputs: unit.outputs,
            labels: unit.labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub task_id: String,
    pub stack_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunLogs {
    /// One line per run, newest first
    pub logs: String,
    pub run_count: usize,
    #[schema(value_type = Option<Object>)]
    pub latest_run: Option<RunSummary>,
}

impl RunLogs {
    fn from_runs(mut runs: Vec<RunSummary>) -> Self {
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let logs = runs.iter().map(format_run).collect::<Vec<_>>().join("\n");
        Self {
            logs,
            run_count: runs.len(),
            latest_run: runs.into_iter().next(),
        }
    }
}

fn format_run(run: &RunSummary) -> String {
    let mut line = format!(
        "[{}] {} {} ({})",
        run.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.run_type,
        run.state,
        run.id
    );
    if let Some(title) = run.title.as_deref().filter(|t| !t.is_empty()) {
        line.push_str(&format!(" {title}"));
    }
    if let Some(by) = &run.triggered_by {
        line.push_str(&format!(" by {by}"));
    }
    if let Some(message) = run.commit_message.as_deref().and_then(|m| m.lines().next()) {
        line.push_str(&format!(": {message}"));
    }
    line
}

#[derive(Clone)]
pub struct EnvironmentService {
    api: Arc<dyn StackApi>,
    settings: Arc<ServiceSettings>,
}

impl EnvironmentService {
    pub fn new(api: Arc<dyn StackApi>, settings: ServiceSettings) -> Self {
        Self {
            api,
            settings: Arc::new(settings),
        }
    }

    fn label(&self) -> &str {
        &self.settings.teardown.managed_label
    }

    async fn managed_stacks(&self) -> Result<Vec<InfraUnit>> {
        Ok(resolve::managed(self.api.stacks().await?, self.label()))
    }

    /// A stack by id, only if it carries the management label
    async fn managed_stack(&self, id: &str) -> Result<Option<InfraUnit>> {
        Ok(self
            .api
            .stack(id)
            .await?
            .filter(|unit| unit.is_managed(self.label())))
    }

    #[instrument(skip(self))]
    pub async fn connectivity(&self) -> Result<Connectivity> {
        let viewer = self.api.viewer().await?;
        let blueprints = self.api.blueprints().await?;
        info!(viewer = %viewer.name, blueprints = blueprints.len(), "Spacelift reachable");
        Ok(Connectivity { viewer, blueprints })
    }

    #[instrument(skip_all)]
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome> {
        let inputs = request.template_inputs()?;

        let blueprint_id = &self.settings.blueprint_id;
        let blueprint = self.api.blueprint(blueprint_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Blueprint {blueprint_id} not found"))
        })?;

        let all_stack_ids = self
            .api
            .create_stacks_from_blueprint(&blueprint.id, &inputs)
            .await?;
        let stack_id = all_stack_ids.first().cloned().ok_or_else(|| {
            ServiceError::Client(ClientError::InvalidResponse(
                "blueprint created no stacks".to_string(),
            ))
        })?;

        info!(blueprint = %blueprint.name, stacks = ?all_stack_ids, "Deployed environment");
        Ok(DeployOutcome {
            stack_id,
            all_stack_ids,
        })
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<EnvironmentGroup>> {
        let units = self.managed_stacks().await?;
        Ok(group_units(&units))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<ServerDetail> {
        self.managed_stack(id)
            .await?
            .map(ServerDetail::from)
            .ok_or_else(ServiceError::server_not_found)
    }

    /// Start the world-save task on an environment's configuration stack.
    ///
    /// `id` may name any stack of the environment or be its exact group key.
    #[instrument(skip(self))]
    pub async fn save(&self, id: &str) -> Result<SaveOutcome> {
        let target = match self.managed_stack(id).await? {
            Some(unit) if unit.role() == UnitRole::Configuration => unit,
            Some(unit) => {
                let units = self.managed_stacks().await?;
                resolve::partner(&units, &unit, UnitRole::Configuration)
                    .cloned()
                    .ok_or_else(ServiceError::server_not_found)?
            }
            None => {
                let units = self.managed_stacks().await?;
                GroupMembers::exact(&units, id)
                    .configuration
                    .ok_or_else(ServiceError::server_not_found)?
            }
        };

        let task_id = self
            .api
            .run_task(&target.id, &self.settings.teardown.save_task_command)
            .await?;
        info!(stack = %target.name, task = %task_id, "World save started");

        Ok(SaveOutcome {
            task_id,
            stack_id: target.id,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str, save_world: bool) -> Result<TeardownReport> {
        Teardown::new(self.api.as_ref(), &self.settings.teardown)
            .run(
                id,
                TeardownOptions {
                    save_world_first: save_world,
                },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn logs(&self, id: &str) -> Result<RunLogs> {
        if self.managed_stack(id).await?.is_none() {
            return Err(ServiceError::server_not_found());
        }

        let runs = match self.api.stack_runs(id, true).await {
            Ok(runs) => runs,
            Err(ClientError::Orchestrator(message)) => {
                warn!(%message, "Detailed run query rejected, retrying with basic fields");
                self.api.stack_runs(id, false).await?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(RunLogs::from_runs(runs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> DeployRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn deploy_request_builds_inputs() {
        let inputs = request(json!({
            "instanceType": "t3.medium",
            "s3Bucket": "worlds",
            "motd": "hello",
            "maxPlayers": 20
        }))
        .template_inputs()
        .unwrap();

        assert_eq!(
            inputs,
            vec![
                TemplateInput::new("instance_type", "t3.medium"),
                TemplateInput::new("s3_bucket", "worlds"),
                TemplateInput::new("motd", "hello"),
                TemplateInput::new("max_players", "20"),
            ]
        );
    }

    #[test]
    fn deploy_request_names_every_missing_field() {
        let err = request(json!({ "instanceType": "t3.medium", "motd": "  " }))
            .template_inputs()
            .unwrap_err();

        match err {
            ServiceError::InvalidInput(msg) => {
                assert_eq!(msg, "Missing required fields: s3Bucket, motd, maxPlayers")
            }
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn max_players_accepts_strings() {
        let inputs = request(json!({
            "instanceType": "t3.small",
            "s3Bucket": "b",
            "motd": "m",
            "maxPlayers": "10"
        }))
        .template_inputs()
        .unwrap();

        assert_eq!(inputs[3], TemplateInput::new("max_players", "10"));
    }

    #[test]
    fn run_logs_are_newest_first() {
        let run = |id: &str, secs: i64| RunSummary {
            id: id.to_string(),
            state: "FINISHED".to_string(),
            run_type: "TRACKED".to_string(),
            created_at: DateTime::from_timestamp(secs, 0).unwrap(),
            title: None,
            triggered_by: Some("bot".to_string()),
            commit_message: Some("bump\n\nbody".to_string()),
        };

        let logs = RunLogs::from_runs(vec![run("old", 100), run("new", 200)]);

        assert_eq!(logs.run_count, 2);
        assert_eq!(logs.latest_run.unwrap().id, "new");
        let lines: Vec<_> = logs.logs.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("(new) by bot: bump"));
        assert!(lines[1].contains("(old)"));
    }
}
