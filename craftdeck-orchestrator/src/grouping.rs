//! Environment grouping
//!
//! Spacelift returns stacks as a flat list. An environment is the pair of
//! stacks sharing a group key: one provisioning (OpenTofu) and one
//! configuration (Ansible). Groups are rebuilt on every read and never stored.

use chrono::{DateTime, Utc};
use craftdeck_client::{InfraUnit, Origin, UnitRole, UnitState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use utoipa::ToSchema;

/// Sentinel for pass-through fields no member exposes
pub const UNKNOWN: &str = "unknown";

const IP_OUTPUTS: &[&str] = &["ec2_ip", "public_ip"];
const INSTANCE_SIZE_KEY: &str = "instance_type";
const CAPACITY_KEY: &str = "max_players";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AggregateStatus {
    Ready,
    Failed,
    PendingConfirmation,
    Planning,
    Deploying,
    Incomplete,
    InProgress,
}

/// Derive a group's status from its members' states.
///
/// Rules are checked top-down and the first match wins; a role with no member
/// counts as missing.
pub fn aggregate_status(
    provisioning: Option<UnitState>,
    configuration: Option<UnitState>,
) -> AggregateStatus {
    let either = |state: UnitState| provisioning == Some(state) || configuration == Some(state);

    if provisioning == Some(UnitState::Finished) && configuration == Some(UnitState::Finished) {
        AggregateStatus::Ready
    } else if either(UnitState::Failed) {
        AggregateStatus::Failed
    } else if either(UnitState::Unconfirmed) {
        AggregateStatus::PendingConfirmation
    } else if either(UnitState::Planning) {
        AggregateStatus::Planning
    } else if either(UnitState::Applying) {
        AggregateStatus::Deploying
    } else if provisioning.is_none() || configuration.is_none() {
        AggregateStatus::Incomplete
    } else {
        AggregateStatus::InProgress
    }
}

/// Server facts surfaced from stack outputs, falling back to template inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PassThrough {
    pub ip: String,
    pub instance_size: String,
    pub capacity: String,
}

impl PassThrough {
    pub fn unknown() -> Self {
        Self {
            ip: UNKNOWN.to_string(),
            instance_size: UNKNOWN.to_string(),
            capacity: UNKNOWN.to_string(),
        }
    }

    pub fn from_unit(unit: &InfraUnit) -> Self {
        let lookup = |key: &str| {
            unit.output(key)
                .or_else(|| unit.input(key))
                .unwrap_or(UNKNOWN)
                .to_string()
        };

        Self {
            ip: IP_OUTPUTS
                .iter()
                .find_map(|key| unit.output(key))
                .unwrap_or(UNKNOWN)
                .to_string(),
            instance_size: lookup(INSTANCE_SIZE_KEY),
            capacity: lookup(CAPACITY_KEY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: String,
    pub name: String,
    #[schema(value_type = String)]
    pub state: UnitState,
}

impl From<&InfraUnit> for MemberSummary {
    fn from(unit: &InfraUnit) -> Self {
        Self {
            id: unit.id.clone(),
            name: unit.name.clone(),
            state: unit.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentGroup {
    pub group_key: String,
    pub display_name: String,
    pub aggregate_status: AggregateStatus,
    pub is_manual: bool,
    pub provisioning: Option<MemberSummary>,
    pub configuration: Option<MemberSummary>,
    #[serde(flatten)]
    pub details: PassThrough,
    pub created_at: DateTime<Utc>,
}

struct GroupBuilder<'a> {
    key: &'a str,
    provisioning: Option<&'a InfraUnit>,
    configuration: Option<&'a InfraUnit>,
    details: PassThrough,
    created_at: DateTime<Utc>,
}

impl<'a> GroupBuilder<'a> {
    fn new(first: &'a InfraUnit) -> Self {
        Self {
            key: first.group_key(),
            provisioning: None,
            configuration: None,
            details: PassThrough::unknown(),
            created_at: first.created_at,
        }
    }

    fn attach(&mut self, unit: &'a InfraUnit) {
        let role = unit.role().effective();
        let slot = match role {
            UnitRole::Configuration => &mut self.configuration,
            _ => &mut self.provisioning,
        };

        if let Some(existing) = slot {
            debug!(
                group = self.key,
                kept = %existing.id,
                ignored = %unit.id,
                "Group already has a {} member",
                role.as_str()
            );
            return;
        }
        *slot = Some(unit);

        if role == UnitRole::Provisioning {
            self.details = PassThrough::from_unit(unit);
        }
    }

    fn finish(self) -> EnvironmentGroup {
        // provisioning is preferred so naming does not depend on input order
        let lead = self
            .provisioning
            .or(self.configuration)
            .map(|unit| &unit.class);

        EnvironmentGroup {
            group_key: self.key.to_string(),
            display_name: lead
                .map(|class| class.display_name.clone())
                .unwrap_or_else(|| self.key.to_string()),
            aggregate_status: aggregate_status(
                self.provisioning.map(|u| u.state),
                self.configuration.map(|u| u.state),
            ),
            is_manual: lead.map_or(true, |class| class.origin == Origin::Manual),
            provisioning: self.provisioning.map(MemberSummary::from),
            configuration: self.configuration.map(MemberSummary::from),
            details: self.details,
            created_at: self.created_at,
        }
    }
}

/// Partition units into environment groups.
///
/// Blueprint groups come first, then manual ones; each partition is sorted by
/// display name with the group key as tiebreaker.
pub fn group_units(units: &[InfraUnit]) -> Vec<EnvironmentGroup> {
    let mut builders: Vec<GroupBuilder<'_>> = Vec::new();
    let mut by_key: HashMap<&str, usize> = HashMap::new();

    for unit in units {
        let slot = *by_key.entry(unit.group_key()).or_insert_with(|| {
            builders.push(GroupBuilder::new(unit));
            builders.len() - 1
        });
        builders[slot].attach(unit);
    }

    let mut groups: Vec<EnvironmentGroup> =
        builders.into_iter().map(GroupBuilder::finish).collect();
    groups.sort_by(|a, b| {
        a.is_manual
            .cmp(&b.is_manual)
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.group_key.cmp(&b.group_key))
    });
    groups
}
