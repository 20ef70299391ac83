//! Configuration System
//!
//! Hierarchical configuration for the flow hub and logging: defaults, user
//! config file, workspace config file, then environment overrides.

use crate::error::SetupError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod merge;
mod sources;

pub use sources::environment::ENV_PREFIX;
pub use sources::user_file::user_config_path;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmbienceConfig {
    /// Flow hub settings
    #[serde(default)]
    pub hub: HubConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What restore does when it is handed no snapshot at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullSnapshotPolicy {
    /// Fail with `FlowError::NullSnapshot`
    #[default]
    Fail,
    /// Restore from an empty snapshot; every endpoint is invoked
    Empty,
    /// Skip the restore; no endpoint is invoked
    Skip,
}

/// Flow hub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Restore budget for endpoints bound without one (milliseconds)
    #[serde(default = "default_restore_budget_ms")]
    pub default_restore_budget_ms: u64,

    /// Initial null-snapshot handling; the hook stays replaceable at runtime
    #[serde(default)]
    pub null_snapshot: NullSnapshotPolicy,

    /// Install the default slow-restore hook (a warning log)
    #[serde(default = "default_true")]
    pub report_slow_restores: bool,
}

fn default_restore_budget_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_restore_budget_ms: default_restore_budget_ms(),
            null_snapshot: NullSnapshotPolicy::default(),
            report_slow_restores: default_true(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Hub(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Hub(msg) => write!(f, "Hub: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl HubConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_restore_budget_ms == 0 {
            return Err("default_restore_budget_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl AmbienceConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.hub.validate() {
            errors.push(ValidationError::Hub(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads `AmbienceConfig` from the configured sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, user config file,
    /// `<workspace_root>/ambience.toml`, `AMBIENCE__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<AmbienceConfig, SetupError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::user_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder)?;

        let config: AmbienceConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Load and validate configuration from one explicit file.
    pub fn load_from_file(path: &Path) -> Result<AmbienceConfig, SetupError> {
        let config: AmbienceConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    fn validated(config: AmbienceConfig) -> Result<AmbienceConfig, SetupError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SetupError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
