//! Ordered environment teardown
//!
//! A teardown resolves its target, builds a [`TeardownPlan`], then runs the
//! steps strictly one after another. The configuration stack always goes
//! before the provisioning stack it runs on. A failing step is recorded and the
//! remaining steps still run; callers inspect `destroy_results` for the real
//! per-stack outcome.
//!
//! Waits between steps are fixed settle delays, not completion polls. A world
//! save is considered done once its task has been accepted and the delay has
//! elapsed.

use crate::error::{Result, ServiceError};
use crate::resolve::{self, GroupMembers};
use chrono::{DateTime, Utc};
use craftdeck_client::{InfraUnit, StackApi, UnitRole, UnitState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_SAVE_COMMAND: &str = "ansible-playbook -i inventory save-world.yml";
pub const DEFAULT_MANAGED_LABEL: &str = "minecraft";

#[derive(Debug, Clone)]
pub struct TeardownSettings {
    pub managed_label: String,
    pub save_task_command: String,
    pub settle_delay: Duration,
}

impl Default for TeardownSettings {
    fn default() -> Self {
        Self {
            managed_label: DEFAULT_MANAGED_LABEL.to_string(),
            save_task_command: DEFAULT_SAVE_COMMAND.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TeardownOptions {
    /// Run the world-save task on the configuration stack before destroying it
    pub save_world_first: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeardownMode {
    /// A single stack was targeted by id
    Direct,
    /// A whole environment was resolved from its group key
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    SaveState,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settle {
    Never,
    Always,
    OnSuccess,
}

impl Settle {
    fn applies(self, succeeded: bool) -> bool {
        match self {
            Settle::Never => false,
            Settle::Always => true,
            Settle::OnSuccess => succeeded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeardownStep {
    pub stack_id: String,
    pub stack_name: String,
    #[schema(value_type = String)]
    pub role: UnitRole,
    pub action: StepAction,
    /// A failure is downgraded to a warning
    pub best_effort: bool,
    #[serde(skip)]
    pub(crate) settle: Settle,
}

impl TeardownStep {
    fn new(unit: &InfraUnit, action: StepAction, best_effort: bool, settle: Settle) -> Self {
        Self {
            stack_id: unit.id.clone(),
            stack_name: unit.name.clone(),
            role: unit.role().effective(),
            action,
            best_effort,
            settle,
        }
    }

    fn destroy(unit: &InfraUnit, best_effort: bool, settle: Settle) -> Self {
        Self::new(unit, StepAction::Destroy, best_effort, settle)
    }

    fn save(unit: &InfraUnit) -> Self {
        Self::new(unit, StepAction::SaveState, false, Settle::OnSuccess)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeardownPlan {
    pub mode: TeardownMode,
    pub steps: Vec<TeardownStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub stack_id: String,
    pub stack_name: String,
    #[schema(value_type = String)]
    pub role: UnitRole,
    pub action: StepAction,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    fn new(step: &TeardownStep, status: StepStatus, error: Option<String>) -> Self {
        Self {
            stack_id: step.stack_id.clone(),
            stack_name: step.stack_name.clone(),
            role: step.role,
            action: step.action,
            status,
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Audit trail of one teardown, mirrored into tracing as it is written
#[derive(Debug, Default)]
struct StatusLog {
    entries: Vec<StatusEntry>,
}

impl StatusLog {
    fn push(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info | LogLevel::Success => info!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        self.entries.push(StatusEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message.into());
    }

    fn success(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Success, message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeardownReport {
    pub mode: TeardownMode,
    pub steps: Vec<TeardownStep>,
    pub destroy_results: Vec<StepResult>,
    /// Outcome of the world-save step, when one was planned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_result: Option<StepResult>,
    pub status_updates: Vec<StatusEntry>,
    /// The save task was accepted; it is not known to have completed
    pub world_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_task_id: Option<String>,
}

impl TeardownReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.destroy_results
            .iter()
            .filter(|r| r.status != StepStatus::Success)
    }
}

fn describe(unit: Option<&InfraUnit>) -> &str {
    unit.map_or("none", |u| u.name.as_str())
}

pub struct Teardown<'a> {
    api: &'a dyn StackApi,
    settings: &'a TeardownSettings,
}

impl<'a> Teardown<'a> {
    pub fn new(api: &'a dyn StackApi, settings: &'a TeardownSettings) -> Self {
        Self { api, settings }
    }

    /// Tear down a stack (by id) or a whole environment (by id of an unmarked
    /// stack, or by group key).
    #[instrument(skip(self), fields(save_world_first = options.save_world_first))]
    pub async fn run(&self, target_id: &str, options: TeardownOptions) -> Result<TeardownReport> {
        let mut log = StatusLog::default();
        log.info(format!("Starting teardown of {target_id}"));

        let plan = self.plan(target_id, options, &mut log).await?;
        Ok(self.execute(plan, log).await)
    }

    async fn plan(
        &self,
        target_id: &str,
        options: TeardownOptions,
        log: &mut StatusLog,
    ) -> Result<TeardownPlan> {
        match self.api.stack(target_id).await? {
            Some(unit) if !unit.is_managed(&self.settings.managed_label) => {
                Err(ServiceError::server_not_found())
            }
            Some(unit) if unit.role() != UnitRole::Unassigned => {
                if options.save_world_first {
                    log.warning(format!(
                        "World save skipped: {} was targeted directly",
                        unit.name
                    ));
                }
                Ok(self.plan_direct(unit, log).await)
            }
            Some(unit) => self.plan_group(unit.group_key(), options, log).await,
            None => self.plan_group(target_id, options, log).await,
        }
    }

    async fn plan_direct(&self, unit: InfraUnit, log: &mut StatusLog) -> TeardownPlan {
        log.info(format!(
            "Direct teardown of {} stack {}",
            unit.role().as_str(),
            unit.name
        ));
        let mut steps = Vec::new();

        if unit.role() == UnitRole::Provisioning {
            match self.find_partner(&unit).await {
                Ok(Some(partner)) => {
                    log.info(format!(
                        "Found dependent configuration stack {}",
                        partner.name
                    ));
                    steps.push(TeardownStep::destroy(&partner, true, Settle::OnSuccess));
                }
                Ok(None) => log.warning(format!(
                    "No configuration stack found for {}, continuing",
                    unit.name
                )),
                Err(e) => log.warning(format!(
                    "Could not look up configuration stack for {}: {e}, continuing",
                    unit.name
                )),
            }
        }

        steps.push(TeardownStep::destroy(&unit, false, Settle::Never));
        TeardownPlan {
            mode: TeardownMode::Direct,
            steps,
        }
    }

    async fn find_partner(&self, unit: &InfraUnit) -> Result<Option<InfraUnit>> {
        let units = resolve::managed(self.api.stacks().await?, &self.settings.managed_label);
        Ok(resolve::partner(&units, unit, UnitRole::Configuration).cloned())
    }

    async fn plan_group(
        &self,
        key: &str,
        options: TeardownOptions,
        log: &mut StatusLog,
    ) -> Result<TeardownPlan> {
        let units = resolve::managed(self.api.stacks().await?, &self.settings.managed_label);
        let members = GroupMembers::exact(&units, key);
        if members.is_empty() {
            return Err(ServiceError::server_not_found());
        }

        log.info(format!(
            "Resolved environment {key}: provisioning={}, configuration={}",
            describe(members.provisioning.as_ref()),
            describe(members.configuration.as_ref()),
        ));

        let mut steps = Vec::new();

        match &members.configuration {
            Some(config) => {
                if options.save_world_first {
                    if config.state == UnitState::Finished {
                        steps.push(TeardownStep::save(config));
                    } else {
                        log.warning(format!(
                            "World save skipped: {} is {} rather than FINISHED",
                            config.name, config.state
                        ));
                    }
                }
                let settle = if members.provisioning.is_some() {
                    Settle::Always
                } else {
                    Settle::Never
                };
                steps.push(TeardownStep::destroy(config, false, settle));
            }
            None if options.save_world_first => {
                log.warning("World save skipped: environment has no configuration stack");
            }
            None => {}
        }

        if let Some(provisioning) = &members.provisioning {
            steps.push(TeardownStep::destroy(provisioning, false, Settle::Never));
        }

        Ok(TeardownPlan {
            mode: TeardownMode::Group,
            steps,
        })
    }

    async fn execute(&self, plan: TeardownPlan, mut log: StatusLog) -> TeardownReport {
        let mut results = Vec::new();
        let mut save_result = None;
        let mut save_task_id = None;

        for step in &plan.steps {
            let succeeded = match step.action {
                StepAction::SaveState => {
                    log.info(format!("Saving world on {}", step.stack_name));
                    match self
                        .api
                        .run_task(&step.stack_id, &self.settings.save_task_command)
                        .await
                    {
                        Ok(task_id) => {
                            log.success(format!(
                                "World save task {task_id} started on {}",
                                step.stack_name
                            ));
                            save_task_id = Some(task_id);
                            save_result = Some(StepResult::new(step, StepStatus::Success, None));
                            true
                        }
                        Err(e) => {
                            log.error(format!("World save on {} failed: {e}", step.stack_name));
                            save_result = Some(StepResult::new(
                                step,
                                StepStatus::Error,
                                Some(e.to_string()),
                            ));
                            false
                        }
                    }
                }
                StepAction::Destroy => {
                    log.info(format!(
                        "Destroying {} stack {}",
                        step.role.as_str(),
                        step.stack_name
                    ));
                    match self.api.delete_stack(&step.stack_id).await {
                        Ok(()) => {
                            log.success(format!("Destroyed {}", step.stack_name));
                            results.push(StepResult::new(step, StepStatus::Success, None));
                            true
                        }
                        Err(e) if step.best_effort => {
                            log.warning(format!(
                                "Could not destroy {}: {e}, continuing",
                                step.stack_name
                            ));
                            results.push(StepResult::new(
                                step,
                                StepStatus::Warning,
                                Some(e.to_string()),
                            ));
                            false
                        }
                        Err(e) => {
                            log.error(format!("Failed to destroy {}: {e}", step.stack_name));
                            results.push(StepResult::new(
                                step,
                                StepStatus::Error,
                                Some(e.to_string()),
                            ));
                            false
                        }
                    }
                }
            };

            if step.settle.applies(succeeded) {
                log.info(format!(
                    "Waiting {}s for {} to settle",
                    self.settings.settle_delay.as_secs(),
                    step.stack_name
                ));
                tokio::time::sleep(self.settings.settle_delay).await;
            }
        }

        let failed = results
            .iter()
            .filter(|r| r.status != StepStatus::Success)
            .count();
        if failed == 0 {
            log.success("Teardown complete");
        } else {
            log.warning(format!("Teardown finished with {failed} failed step(s)"));
        }

        TeardownReport {
            mode: plan.mode,
            steps: plan.steps,
            destroy_results: results,
            save_result,
            status_updates: log.entries,
            world_saved: save_task_id.is_some(),
            save_task_id,
        }
    }
}
