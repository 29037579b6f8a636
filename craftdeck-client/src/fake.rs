//! In-memory [`StackApi`] for tests
//!
//! Records every call in order and lets a test make individual operations fail.

use crate::error::{ClientError, Result};
use crate::spacelift::{BlueprintSummary, RunSummary, StackApi, TemplateInput, Viewer};
use crate::unit::InfraUnit;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Viewer,
    Blueprints,
    Blueprint(String),
    CreateStacks {
        blueprint_id: String,
        inputs: Vec<TemplateInput>,
    },
    Stacks,
    Stack(String),
    DeleteStack(String),
    RunTask {
        stack_id: String,
        command: String,
    },
    StackRuns {
        stack_id: String,
        detailed: bool,
    },
}

#[derive(Default)]
struct FakeState {
    stacks: Vec<InfraUnit>,
    blueprints: Vec<BlueprintSummary>,
    runs: HashMap<String, Vec<RunSummary>>,
    calls: Vec<Call>,
    delete_failures: HashMap<String, ClientError>,
    task_failures: HashMap<String, ClientError>,
    detailed_runs_failure: Option<ClientError>,
    stacks_failure: Option<ClientError>,
    created: usize,
}

#[derive(Default)]
pub struct FakeStackApi {
    state: Mutex<FakeState>,
}

impl FakeStackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stacks(stacks: Vec<InfraUnit>) -> Self {
        let fake = Self::new();
        fake.lock().stacks = stacks;
        fake
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }

    pub fn add_stack(&self, unit: InfraUnit) {
        self.lock().stacks.push(unit);
    }

    pub fn add_blueprint(&self, blueprint: BlueprintSummary) {
        self.lock().blueprints.push(blueprint);
    }

    pub fn set_runs(&self, stack_id: &str, runs: Vec<RunSummary>) {
        self.lock().runs.insert(stack_id.to_string(), runs);
    }

    pub fn fail_delete(&self, stack_id: &str, error: ClientError) {
        self.lock()
            .delete_failures
            .insert(stack_id.to_string(), error);
    }

    pub fn fail_task(&self, stack_id: &str, error: ClientError) {
        self.lock().task_failures.insert(stack_id.to_string(), error);
    }

    pub fn fail_detailed_runs(&self, error: ClientError) {
        self.lock().detailed_runs_failure = Some(error);
    }

    pub fn fail_stacks(&self, error: ClientError) {
        self.lock().stacks_failure = Some(error);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Stack ids passed to `delete_stack`, in order
    pub fn deleted(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::DeleteStack(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn remaining_stacks(&self) -> Vec<InfraUnit> {
        self.lock().stacks.clone()
    }
}

#[async_trait::async_trait]
impl StackApi for FakeStackApi {
    async fn viewer(&self) -> Result<Viewer> {
        self.lock().calls.push(Call::Viewer);
        Ok(Viewer {
            id: "api-key-user".to_string(),
            name: "craftdeck".to_string(),
        })
    }

    async fn blueprints(&self) -> Result<Vec<BlueprintSummary>> {
        let mut state = self.lock();
        state.calls.push(Call::Blueprints);
        Ok(state.blueprints.clone())
    }

    async fn blueprint(&self, id: &str) -> Result<Option<BlueprintSummary>> {
        let mut state = self.lock();
        state.calls.push(Call::Blueprint(id.to_string()));
        Ok(state.blueprints.iter().find(|b| b.id == id).cloned())
    }

    async fn create_stacks_from_blueprint(
        &self,
        blueprint_id: &str,
        inputs: &[TemplateInput],
    ) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.calls.push(Call::CreateStacks {
            blueprint_id: blueprint_id.to_string(),
            inputs: inputs.to_vec(),
        });
        state.created += 1;
        let n = state.created;
        Ok(vec![
            format!("{blueprint_id}-opentofu-{n}"),
            format!("{blueprint_id}-ansible-{n}"),
        ])
    }

    async fn stacks(&self) -> Result<Vec<InfraUnit>> {
        let mut state = self.lock();
        state.calls.push(Call::Stacks);
        if let Some(err) = state.stacks_failure.clone() {
            return Err(err);
        }
        Ok(state.stacks.clone())
    }

    async fn stack(&self, id: &str) -> Result<Option<InfraUnit>> {
        let mut state = self.lock();
        state.calls.push(Call::Stack(id.to_string()));
        Ok(state.stacks.iter().find(|s| s.id == id).cloned())
    }

    async fn delete_stack(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteStack(id.to_string()));
        if let Some(err) = state.delete_failures.get(id).cloned() {
            return Err(err);
        }
        let before = state.stacks.len();
        state.stacks.retain(|s| s.id != id);
        if state.stacks.len() == before {
            return Err(ClientError::Orchestrator(format!("stack {id} not found")));
        }
        Ok(())
    }

    async fn run_task(&self, stack_id: &str, command: &str) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(Call::RunTask {
            stack_id: stack_id.to_string(),
            command: command.to_string(),
        });
        if let Some(err) = state.task_failures.get(stack_id).cloned() {
            return Err(err);
        }
        Ok(format!("task-{}", state.calls.len()))
    }

    async fn stack_runs(&self, stack_id: &str, detailed: bool) -> Result<Vec<RunSummary>> {
        let mut state = self.lock();
        state.calls.push(Call::StackRuns {
            stack_id: stack_id.to_string(),
            detailed,
        });
        if detailed {
            if let Some(err) = state.detailed_runs_failure.clone() {
                return Err(err);
            }
        }
        let mut runs = state.runs.get(stack_id).cloned().unwrap_or_default();
        if !detailed {
            for run in &mut runs {
                run.title = None;
                run.triggered_by = None;
                run.commit_message = None;
            }
        }
        Ok(runs)
    }
}
