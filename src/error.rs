//! Error types for ambient state capture and restore.

use thiserror::Error;

/// Errors raised by the preference order resolver
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("Invalid preference: {0}")]
    InvalidArgument(String),
}

/// Flow contract lifecycle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Flow contracts are not configured, but contract '{0}' was requested. Define one with define_flow_contract first.")]
    ContractsNotConfigured(String),

    #[error("Flow contracts are configured: a contract name is required")]
    ContractRequired,

    #[error("Unknown flow contract: {0}")]
    UnknownContract(String),

    #[error("Flow contract already exists: {0}")]
    DuplicateContract(String),

    #[error("Invalid flow contract name '{0}' (must be non-empty and lowercase)")]
    InvalidContractName(String),

    #[error("Flow contract is immutable: it can only be modified during its definition")]
    ImmutableContractModification,
}

/// Ambient field errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Context adapter is not usable while accessing field '{0}'")]
    ContextUnavailable(String),

    #[error("Exposed field already registered: {0}")]
    DuplicateExposedField(String),

    #[error("Root value of '{name}' has already been set to '{current}' and cannot be changed to '{attempted}'")]
    WriteOnceViolation {
        name: String,
        current: String,
        attempted: String,
    },
}

/// Capture/restore orchestration errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Invalid endpoint name: '{0}'")]
    InvalidEndpointName(String),

    #[error("Cannot bind endpoint '{0}': an endpoint with this name already exists")]
    DuplicateEndpoint(String),

    #[error("Cannot bind endpoint '{endpoint}': restoring after '{dependency}' creates a cyclic dependency")]
    CyclicDependency { endpoint: String, dependency: String },

    #[error("Endpoint '{endpoint}' attempted to capture '{key}', which was already captured")]
    DuplicateKey { endpoint: String, key: String },

    #[error("Endpoint '{endpoint}' captured '{key}', but the prefix '{prefix}' is reserved for the accordingly named endpoint")]
    PrefixTransgression {
        endpoint: String,
        key: String,
        prefix: String,
    },

    #[error("Restore received no snapshot and no null-snapshot handler substituted one")]
    NullSnapshot,

    #[error("Endpoint '{endpoint}' failed: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Ordering error: {0}")]
    Ordering(#[from] OrderingError),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Field error: {0}")]
    Field(#[from] FieldError),
}

/// Configuration and logging set-up errors
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for SetupError {
    fn from(err: config::ConfigError) -> Self {
        SetupError::Config(err.to_string())
    }
}
