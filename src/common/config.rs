//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Target system endpoints
    #[serde(default)]
    pub target: TargetConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Provisioning settings
    #[serde(default)]
    pub provision: ProvisionConfig,
}

/// Endpoints of the system under verification
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    /// Base URL of the application under verification
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// URL of the browser-driver bridge
    #[serde(default = "default_driver_url")]
    pub driver_url: String,

    /// URL of the application's remote-procedure endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Directory holding fixture blobs referenced by suites
    pub fixtures_dir: Option<PathBuf>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            driver_url: default_driver_url(),
            rpc_url: default_rpc_url(),
            fixtures_dir: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_driver_url() -> String {
    "http://localhost:4444".to_string()
}
fn default_rpc_url() -> String {
    "http://localhost:3000/methods".to_string()
}

/// Timeout settings
///
/// The poll timeout is the single bounded-wait constant used by every
/// existence and absence check; assertions never carry their own.
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Upper bound for existence/absence polling, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Delay between existence probes, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for driver bridge requests
    #[serde(default = "default_driver_request")]
    pub driver_request_secs: u64,

    /// Timeout for remote-procedure calls
    #[serde(default = "default_rpc_request")]
    pub rpc_request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_timeout_secs: default_poll_timeout(),
            poll_interval_ms: default_poll_interval(),
            driver_request_secs: default_driver_request(),
            rpc_request_secs: default_rpc_request(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    250
}
fn default_driver_request() -> u64 {
    30
}
fn default_rpc_request() -> u64 {
    30
}

/// What to do when the actor to provision already exists
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the run before any scenario executes
    #[default]
    Abort,
    /// Log and continue with the existing actor
    Reuse,
}

/// Provisioning settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvisionConfig {
    /// Policy for an already-existing actor
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,

    /// Remote-procedure names the target exposes for setup and teardown
    #[serde(default)]
    pub methods: MethodTable,
}

/// Remote-procedure names used during provisioning and cleanup
///
/// These are properties of the target system, not of the verifier, so
/// they are configuration rather than code.
#[derive(Debug, Deserialize, Clone)]
pub struct MethodTable {
    #[serde(default = "default_create_actor")]
    pub create_actor: String,

    #[serde(default = "default_remove_actor")]
    pub remove_actor: String,

    #[serde(default = "default_create_model")]
    pub create_model: String,

    #[serde(default = "default_remove_model")]
    pub remove_model: String,

    #[serde(default = "default_import_data")]
    pub import_data: String,
}

impl Default for MethodTable {
    fn default() -> Self {
        Self {
            create_actor: default_create_actor(),
            remove_actor: default_remove_actor(),
            create_model: default_create_model(),
            remove_model: default_remove_model(),
            import_data: default_import_data(),
        }
    }
}

fn default_create_actor() -> String {
    "users.create".to_string()
}
fn default_remove_actor() -> String {
    "users.remove".to_string()
}
fn default_create_model() -> String {
    "nlu.insert".to_string()
}
fn default_remove_model() -> String {
    "nlu.remove".to_string()
}
fn default_import_data() -> String {
    "nlu.import".to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return toml::from_str(&content)
                    .map_err(|e| super::Error::ConfigParse(e.to_string()));
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.timeouts.poll_timeout_secs, 10);
        assert_eq!(config.timeouts.poll_interval_ms, 250);
        assert_eq!(config.provision.on_duplicate, DuplicatePolicy::Abort);
        assert_eq!(config.provision.methods.import_data, "nlu.import");
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = Config::from_toml(
            r#"
            [target]
            base_url = "https://staging.example.com"

            [timeouts]
            poll_timeout_secs = 3

            [provision]
            on_duplicate = "reuse"
            "#,
        )
        .unwrap();
        assert_eq!(config.target.base_url, "https://staging.example.com");
        assert_eq!(config.timeouts.poll_timeout_secs, 3);
        assert_eq!(config.provision.on_duplicate, DuplicatePolicy::Reuse);
        // untouched sections keep their defaults
        assert_eq!(config.target.driver_url, "http://localhost:4444");
        assert_eq!(config.provision.methods.create_actor, "users.create");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Config::from_toml("[timeouts]\npoll_timeout_secs = \"soon\"").is_err());
    }
}
