//! Error types for conduit.

use thiserror::Error;

/// Problems with a flow definition
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Flow has no steps")]
    NoSteps,

    #[error("Configuration instance defined twice: {0}")]
    DuplicateConfig(String),

    #[error("Step {step} references undefined configuration instance: {config}")]
    UndefinedConfig { step: usize, config: String },

    #[error("Extension {0} has no configuration to use as a default")]
    NoDefaultConfiguration(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid flow variable '{0}', expected NAME=VALUE")]
    InvalidVariable(String),

    #[error("Unknown data type: {0}")]
    UnknownType(String),
}
