use crate::classify::{classify, UnitClass, UnitRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of a Spacelift stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitState {
    None,
    Initializing,
    Preparing,
    PreparingApply,
    PreparingReplan,
    ReplanRequested,
    Planning,
    Unconfirmed,
    Confirmed,
    Applying,
    Finished,
    Failed,
    Discarded,
    Destroying,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl UnitState {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::None => "NONE",
            UnitState::Initializing => "INITIALIZING",
            UnitState::Preparing => "PREPARING",
            UnitState::PreparingApply => "PREPARING_APPLY",
            UnitState::PreparingReplan => "PREPARING_REPLAN",
            UnitState::ReplanRequested => "REPLAN_REQUESTED",
            UnitState::Planning => "PLANNING",
            UnitState::Unconfirmed => "UNCONFIRMED",
            UnitState::Confirmed => "CONFIRMED",
            UnitState::Applying => "APPLYING",
            UnitState::Finished => "FINISHED",
            UnitState::Failed => "FAILED",
            UnitState::Discarded => "DISCARDED",
            UnitState::Destroying => "DESTROYING",
            UnitState::Stopped => "STOPPED",
            UnitState::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Spacelift stack as craftdeck sees it.
///
/// `class` is derived from `name` when the unit is constructed and never
/// recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraUnit {
    pub id: String,
    pub name: String,
    pub state: UnitState,
    pub created_at: DateTime<Utc>,
    /// Stack outputs, only populated after a successful apply
    pub outputs: BTreeMap<String, String>,
    /// Declared template inputs (`TF_VAR_*` environment, prefix stripped)
    pub inputs: BTreeMap<String, String>,
    pub labels: Vec<String>,
    pub class: UnitClass,
}

impl InfraUnit {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        state: UnitState,
        created_at: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        let class = classify(&name);
        Self {
            id: id.into(),
            name,
            state,
            created_at,
            outputs: BTreeMap::new(),
            inputs: BTreeMap::new(),
            labels: Vec::new(),
            class,
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Whether the stack carries the management-domain label
    pub fn is_managed(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn role(&self) -> UnitRole {
        self.class.role
    }

    pub fn group_key(&self) -> &str {
        &self.class.group_key
    }

    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }

    pub fn input(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).map(String::as_str)
    }
}
