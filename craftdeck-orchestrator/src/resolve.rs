//! Locating environment members among managed stacks

use craftdeck_client::{InfraUnit, UnitRole};
use std::collections::BTreeSet;
use tracing::debug;

/// Keep only stacks carrying the management-domain label
pub fn managed(units: Vec<InfraUnit>, label: &str) -> Vec<InfraUnit> {
    units.into_iter().filter(|u| u.is_managed(label)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct GroupMembers {
    pub provisioning: Option<InfraUnit>,
    pub configuration: Option<InfraUnit>,
}

impl GroupMembers {
    /// Members whose group key is exactly `key`, first stack per role
    pub fn exact(units: &[InfraUnit], key: &str) -> Self {
        let member = |role: UnitRole| {
            units
                .iter()
                .find(|u| u.group_key() == key && u.role().effective() == role)
                .cloned()
        };
        Self {
            provisioning: member(UnitRole::Provisioning),
            configuration: member(UnitRole::Configuration),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.provisioning.is_none() && self.configuration.is_none()
    }
}

/// Find the stack playing `role` next to `unit`.
///
/// A member of the same group wins. Otherwise a stack carrying the role's
/// marker is accepted when one of its dash-separated name segments equals the
/// unit's group key, and only if every such stack belongs to a single group.
pub fn partner<'a>(
    units: &'a [InfraUnit],
    unit: &InfraUnit,
    role: UnitRole,
) -> Option<&'a InfraUnit> {
    let key = unit.group_key();
    let same_group = units
        .iter()
        .find(|u| u.id != unit.id && u.group_key() == key && u.role().effective() == role);
    if same_group.is_some() {
        return same_group;
    }
    if !is_identifying(key) {
        return None;
    }

    let candidates: Vec<&InfraUnit> = units
        .iter()
        .filter(|u| u.id != unit.id && u.role() == role && has_segment(&u.name, key))
        .collect();
    let groups: BTreeSet<&str> = candidates.iter().map(|u| u.group_key()).collect();
    if groups.len() > 1 {
        debug!(key, ?groups, "Ambiguous {} stack, not picking one", role.as_str());
        return None;
    }
    candidates.into_iter().next()
}

/// Role markers and the blueprint word appear in every environment's names,
/// so they never identify one.
fn is_identifying(key: &str) -> bool {
    !key.is_empty()
        && !key.eq_ignore_ascii_case("blueprint")
        && !UnitRole::Provisioning.marked_in(key)
        && !UnitRole::Configuration.marked_in(key)
}

fn has_segment(name: &str, key: &str) -> bool {
    name.split('-').any(|segment| segment.eq_ignore_ascii_case(key))
}
