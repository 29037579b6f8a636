//! Typed Spacelift operations
//!
//! [`StackApi`] is the seam the rest of craftdeck programs against;
//! [`SpaceliftClient`] implements it on top of [`GraphqlClient`].

use crate::error::{ClientError, Result};
use crate::graphql::GraphqlClient;
use crate::unit::{InfraUnit, UnitState};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

const TEMPLATE_INPUT_ENV_PREFIX: &str = "TF_VAR_";

const VIEWER_QUERY: &str = r#"
query Viewer {
  viewer {
    id
    name
  }
}"#;

const BLUEPRINTS_QUERY: &str = r#"
query Blueprints {
  searchBlueprints(input: { first: 50, orderBy: { field: "name", direction: ASC } }) {
    edges {
      node {
        id
        name
        state
      }
    }
  }
}"#;

const BLUEPRINT_QUERY: &str = r#"
query Blueprint($id: ID!) {
  blueprint(id: $id) {
    id
    name
    state
  }
}"#;

const CREATE_FROM_BLUEPRINT: &str = r#"
mutation CreateStacksFromBlueprint($id: ID!, $input: BlueprintStackCreateInput!) {
  blueprintCreateStack(id: $id, input: $input) {
    stackIds
  }
}"#;

const STACKS_QUERY: &str = r#"
query Stacks {
  stacks {
    id
    name
    state
    createdAt
    labels
    outputs { id value }
    config { id value }
  }
}"#;

const STACK_QUERY: &str = r#"
query Stack($id: ID!) {
  stack(id: $id) {
    id
    name
    state
    createdAt
    labels
    outputs { id value }
    config { id value }
  }
}"#;

const DELETE_STACK: &str = r#"
mutation DeleteStack($id: ID!) {
  stackDelete(id: $id, destroyResources: true) {
    id
  }
}"#;

const CREATE_TASK: &str = r#"
mutation CreateTask($stack: ID!, $command: String!) {
  taskCreate(stack: $stack, command: $command, skipInitialization: false) {
    id
  }
}"#;

const STACK_RUNS_DETAILED: &str = r#"
query StackRuns($id: ID!) {
  stack(id: $id) {
    runs {
      id
      state
      type
      createdAt
      title
      triggeredBy
      commit { message }
    }
  }
}"#;

const STACK_RUNS_BASIC: &str = r#"
query StackRuns($id: ID!) {
  stack(id: $id) {
    runs {
      id
      state
      type
      createdAt
    }
  }
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintSummary {
    pub id: String,
    pub name: String,
    pub state: String,
}

/// One `{id, value}` blueprint template input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub id: String,
    pub value: String,
}

impl TemplateInput {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub state: String,
    pub run_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

/// Operations craftdeck needs from the orchestrator
#[async_trait::async_trait]
pub trait StackApi: Send + Sync {
    async fn viewer(&self) -> Result<Viewer>;

    async fn blueprints(&self) -> Result<Vec<BlueprintSummary>>;

    async fn blueprint(&self, id: &str) -> Result<Option<BlueprintSummary>>;

    /// Instantiate a blueprint; returns the ids of every stack it created
    async fn create_stacks_from_blueprint(
        &self,
        blueprint_id: &str,
        inputs: &[TemplateInput],
    ) -> Result<Vec<String>>;

    async fn stacks(&self) -> Result<Vec<InfraUnit>>;

    async fn stack(&self, id: &str) -> Result<Option<InfraUnit>>;

    /// Delete a stack and destroy the resources it manages
    async fn delete_stack(&self, id: &str) -> Result<()>;

    /// Start a one-off task on a stack; returns the task's run id
    async fn run_task(&self, stack_id: &str, command: &str) -> Result<String>;

    /// Runs of a stack. `detailed` asks for commit and trigger metadata that
    /// some API keys are not allowed to read.
    async fn stack_runs(&self, stack_id: &str, detailed: bool) -> Result<Vec<RunSummary>>;
}

#[derive(Deserialize)]
struct KeyValueNode {
    id: String,
    value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackNode {
    id: String,
    name: String,
    state: UnitState,
    created_at: i64,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    outputs: Vec<KeyValueNode>,
    #[serde(default)]
    config: Vec<KeyValueNode>,
}

/// Spacelift hands output values back JSON-encoded (`"\"1.2.3.4\""`)
fn decode_output_value(raw: String) -> String {
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::String(inner)) => inner,
        Ok(Value::Number(n)) => n.to_string(),
        Ok(Value::Bool(b)) => b.to_string(),
        _ => raw,
    }
}

impl From<StackNode> for InfraUnit {
    fn from(node: StackNode) -> Self {
        let created_at = DateTime::from_timestamp(node.created_at, 0).unwrap_or_default();
        let mut unit = InfraUnit::new(node.id, node.name, node.state, created_at);
        unit.labels = node.labels;
        unit.outputs = node
            .outputs
            .into_iter()
            .filter_map(|kv| kv.value.map(|v| (kv.id, decode_output_value(v))))
            .collect();
        unit.inputs = node
            .config
            .into_iter()
            .filter_map(|kv| {
                let key = kv.id.strip_prefix(TEMPLATE_INPUT_ENV_PREFIX)?.to_lowercase();
                kv.value.map(|v| (key, v))
            })
            .collect::<BTreeMap<_, _>>();
        unit
    }
}

#[derive(Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunNode {
    id: String,
    state: String,
    #[serde(rename = "type")]
    run_type: String,
    created_at: i64,
    title: Option<String>,
    triggered_by: Option<String>,
    commit: Option<CommitNode>,
}

#[derive(Deserialize)]
struct CommitNode {
    message: Option<String>,
}

impl From<RunNode> for RunSummary {
    fn from(node: RunNode) -> Self {
        Self {
            id: node.id,
            state: node.state,
            run_type: node.run_type,
            created_at: DateTime::from_timestamp(node.created_at, 0).unwrap_or_default(),
            title: node.title,
            triggered_by: node.triggered_by,
            commit_message: node.commit.and_then(|c| c.message),
        }
    }
}

/// Pull the value at `pointer` out of a `data` object and decode it
fn extract<T: DeserializeOwned>(data: &Value, pointer: &str) -> Result<T> {
    let value = data.pointer(pointer).cloned().ok_or_else(|| {
        ClientError::InvalidResponse(format!("missing field {pointer} in response"))
    })?;
    Ok(serde_json::from_value(value)?)
}

#[derive(Clone)]
pub struct SpaceliftClient {
    graphql: GraphqlClient,
}

impl SpaceliftClient {
    pub fn new(graphql: GraphqlClient) -> Self {
        Self { graphql }
    }
}

#[async_trait::async_trait]
impl StackApi for SpaceliftClient {
    async fn viewer(&self) -> Result<Viewer> {
        let data = self.graphql.execute(VIEWER_QUERY, json!({})).await?;
        extract(&data, "/viewer")
    }

    async fn blueprints(&self) -> Result<Vec<BlueprintSummary>> {
        let data = self.graphql.execute(BLUEPRINTS_QUERY, json!({})).await?;
        let connection: Connection<BlueprintSummary> = extract(&data, "/searchBlueprints")?;
        Ok(connection.edges.into_iter().map(|e| e.node).collect())
    }

    async fn blueprint(&self, id: &str) -> Result<Option<BlueprintSummary>> {
        let data = self
            .graphql
            .execute(BLUEPRINT_QUERY, json!({ "id": id }))
            .await?;
        extract(&data, "/blueprint")
    }

    async fn create_stacks_from_blueprint(
        &self,
        blueprint_id: &str,
        inputs: &[TemplateInput],
    ) -> Result<Vec<String>> {
        debug!(blueprint_id, inputs = inputs.len(), "Creating stacks from blueprint");
        let variables = json!({
            "id": blueprint_id,
            "input": { "templateInputs": inputs },
        });
        let data = self
            .graphql
            .execute(CREATE_FROM_BLUEPRINT, variables)
            .await?;
        extract(&data, "/blueprintCreateStack/stackIds")
    }

    async fn stacks(&self) -> Result<Vec<InfraUnit>> {
        let data = self.graphql.execute(STACKS_QUERY, json!({})).await?;
        let nodes: Vec<StackNode> = extract(&data, "/stacks")?;
        Ok(nodes.into_iter().map(InfraUnit::from).collect())
    }

    async fn stack(&self, id: &str) -> Result<Option<InfraUnit>> {
        let data = self
            .graphql
            .execute(STACK_QUERY, json!({ "id": id }))
            .await?;
        let node: Option<StackNode> = extract(&data, "/stack")?;
        Ok(node.map(InfraUnit::from))
    }

    async fn delete_stack(&self, id: &str) -> Result<()> {
        debug!(stack_id = id, "Deleting stack");
        self.graphql
            .execute(DELETE_STACK, json!({ "id": id }))
            .await?;
        Ok(())
    }

    async fn run_task(&self, stack_id: &str, command: &str) -> Result<String> {
        debug!(stack_id, command, "Creating task");
        let data = self
            .graphql
            .execute(CREATE_TASK, json!({ "stack": stack_id, "command": command }))
            .await?;
        extract(&data, "/taskCreate/id")
    }

    async fn stack_runs(&self, stack_id: &str, detailed: bool) -> Result<Vec<RunSummary>> {
        let operation = if detailed {
            STACK_RUNS_DETAILED
        } else {
            STACK_RUNS_BASIC
        };
        let data = self
            .graphql
            .execute(operation, json!({ "id": stack_id }))
            .await?;
        let runs: Option<Vec<RunNode>> = extract(&data, "/stack/runs").or_else(|err| {
            // stack(id) comes back null for an unknown id
            if data.pointer("/stack").is_some_and(Value::is_null) {
                Ok(None)
            } else {
                Err(err)
            }
        })?;
        Ok(runs
            .unwrap_or_default()
            .into_iter()
            .map(RunSummary::from)
            .collect())
    }
}
