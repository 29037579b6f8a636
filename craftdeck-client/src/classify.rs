//! Stack name classification
//!
//! Stack names are the only grouping metadata Spacelift gives us. A blueprint
//! deployment produces `<base>-Opentofu-Blueprint-<token>` and
//! `<base>-Ansible-Blueprint-<token>`; hand-made stacks follow
//! `<base>-<role>[-<suffix>]`. Everything else is a singleton.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const PROVISIONING_MARKERS: &[&str] = &["opentofu", "provisioning"];
const CONFIGURATION_MARKERS: &[&str] = &["ansible", "configuration"];

static BLUEPRINT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)-?Blueprint-([A-Za-z0-9]+)$").expect("valid regex"));

static MANUAL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)-(?i:opentofu|provisioning|ansible|configuration)(?:-(.+))?$")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRole {
    /// Creates the cloud resources (OpenTofu)
    Provisioning,
    /// Configures software on top of them and runs world saves (Ansible)
    Configuration,
    /// Name carries no role marker
    Unassigned,
}

impl UnitRole {
    /// Role a unit is filed under inside a group. Unassigned units count as
    /// provisioning so they are never dropped.
    pub fn effective(self) -> UnitRole {
        match self {
            UnitRole::Unassigned => UnitRole::Provisioning,
            role => role,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitRole::Provisioning => "provisioning",
            UnitRole::Configuration => "configuration",
            UnitRole::Unassigned => "unassigned",
        }
    }

    /// Whether `name` carries this role's marker (case-insensitive)
    pub fn marked_in(self, name: &str) -> bool {
        let lower = name.to_lowercase();
        let markers = match self {
            UnitRole::Provisioning => PROVISIONING_MARKERS,
            UnitRole::Configuration => CONFIGURATION_MARKERS,
            UnitRole::Unassigned => return false,
        };
        markers.iter().any(|marker| lower.contains(marker))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Blueprint,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitClass {
    pub role: UnitRole,
    pub origin: Origin,
    pub group_key: String,
    pub display_name: String,
}

/// Strip every non-alphanumeric character
pub fn normalize(value: &str) -> String {
    value.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn role_of(name: &str) -> UnitRole {
    if UnitRole::Provisioning.marked_in(name) {
        UnitRole::Provisioning
    } else if UnitRole::Configuration.marked_in(name) {
        UnitRole::Configuration
    } else {
        UnitRole::Unassigned
    }
}

fn is_marker(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    PROVISIONING_MARKERS
        .iter()
        .chain(CONFIGURATION_MARKERS)
        .any(|marker| lower == *marker)
}

/// Drop role-marker segments from a dash-separated prefix
fn strip_markers(prefix: &str) -> String {
    prefix
        .split('-')
        .filter(|segment| !segment.is_empty() && !is_marker(segment))
        .collect::<Vec<_>>()
        .join("-")
}

pub fn classify(name: &str) -> UnitClass {
    let role = role_of(name);

    if let Some(caps) = BLUEPRINT_NAME.captures(name) {
        let token = caps[2].to_string();
        let base = strip_markers(&caps[1]);
        let display_name = if base.is_empty() {
            token.clone()
        } else {
            format!("{base} ({token})")
        };
        return UnitClass {
            role,
            origin: Origin::Blueprint,
            group_key: token,
            display_name,
        };
    }

    if let Some(caps) = MANUAL_NAME.captures(name) {
        let base = &caps[1];
        let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let display_name = if suffix.is_empty() {
            base.to_string()
        } else {
            format!("{base}-{suffix}")
        };
        return UnitClass {
            role,
            origin: Origin::Manual,
            group_key: normalize(&format!("{base}{suffix}")),
            display_name,
        };
    }

    UnitClass {
        role,
        origin: Origin::Manual,
        group_key: normalize(name),
        display_name: name.to_string(),
    }
}
