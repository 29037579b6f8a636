use craftdeck_client::ApiKey;
use craftdeck_orchestrator::teardown::{DEFAULT_MANAGED_LABEL, DEFAULT_SAVE_COMMAND};
use craftdeck_orchestrator::{ServiceSettings, TeardownSettings};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Account GraphQL endpoint, e.g. `https://acme.app.spacelift.io/graphql`
    pub spacelift_endpoint: String,
    pub spacelift_key_id: String,
    pub spacelift_key_secret: String,
    pub blueprint_id: String,

    #[serde(default = "default_managed_label")]
    pub managed_label: String,

    #[serde(default = "default_save_command")]
    pub save_task_command: String,

    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3121".to_string()
}

fn default_managed_label() -> String {
    DEFAULT_MANAGED_LABEL.to_string()
}

fn default_save_command() -> String {
    DEFAULT_SAVE_COMMAND.to_string()
}

fn default_settle_delay() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("spacelift_endpoint", &self.spacelift_endpoint)
            .field("spacelift_key_id", &self.spacelift_key_id)
            .field("spacelift_key_secret", &"<redacted>")
            .field("blueprint_id", &self.blueprint_id)
            .field("managed_label", &self.managed_label)
            .field("save_task_command", &self.save_task_command)
            .field("settle_delay_secs", &self.settle_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source, reporting every
    /// missing required variable at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            get(key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };
        let spacelift_endpoint = required("SPACELIFT_API_ENDPOINT");
        let spacelift_key_id = required("SPACELIFT_API_KEY_ID");
        let spacelift_key_secret = required("SPACELIFT_API_KEY_SECRET");
        let blueprint_id = required("SPACELIFT_BLUEPRINT_ID");
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let seconds = |var: &'static str, default: u64| match get(var) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { var, value }),
            None => Ok(default),
        };

        Ok(Self {
            bind_addr: get("CRAFTDECK_BIND").unwrap_or_else(default_bind_addr),
            spacelift_endpoint,
            spacelift_key_id,
            spacelift_key_secret,
            blueprint_id,
            managed_label: get("CRAFTDECK_MANAGED_LABEL").unwrap_or_else(default_managed_label),
            save_task_command: get("CRAFTDECK_SAVE_COMMAND").unwrap_or_else(default_save_command),
            settle_delay_secs: seconds("CRAFTDECK_SETTLE_DELAY_SECS", default_settle_delay())?,
            request_timeout_secs: seconds(
                "CRAFTDECK_REQUEST_TIMEOUT_SECS",
                default_request_timeout(),
            )?,
        })
    }

    pub fn api_key(&self) -> ApiKey {
        ApiKey::new(&self.spacelift_key_id, &self.spacelift_key_secret)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            blueprint_id: self.blueprint_id.clone(),
            teardown: TeardownSettings {
                managed_label: self.managed_label.clone(),
                save_task_command: self.save_task_command.clone(),
                settle_delay: Duration::from_secs(self.settle_delay_secs),
            },
        }
    }
}
