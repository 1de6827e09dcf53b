//! Error Types
//!
//! Defines the error types raised while wiring and running extensions.

use thiserror::Error;

use crate::message::Message;
use crate::types::DataType;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter could not be computed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// An object could not be created
    #[error(transparent)]
    Build(#[from] BuildError),

    /// An operation's logic unit failed
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// An expression could not be evaluated
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// A converter rejected a value
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// No converter exists between two data types
    #[error("no converter available from {from} to {to}")]
    ConversionUnavailable { from: DataType, to: DataType },

    /// Registry layer management error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Lifecycle phase error
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A setter could not accept a resolved value
    #[error("{type_name}.{property} rejected value: {source}")]
    RejectedValue {
        type_name: &'static str,
        property: String,
        #[source]
        source: serde_json::Error,
    },

    /// Nothing is registered under a key
    #[error("nothing registered under '{0}'")]
    NotRegistered(String),

    /// A required parameter has no value
    #[error("{owner} requires parameter '{parameter}'")]
    MissingParameter { owner: String, parameter: String },

    /// A parameter was declared twice
    #[error("parameter '{parameter}' is already bound in {owner}")]
    DuplicateParameter { owner: String, parameter: String },

    /// A value was supplied for a parameter nobody declared
    #[error("{owner} has no parameter named '{parameter}'")]
    UnknownParameter { owner: String, parameter: String },

    /// Extension not registered
    #[error("extension not found: {0}")]
    UnknownExtension(String),

    /// Extension already registered
    #[error("extension already registered: {0}")]
    DuplicateExtension(String),

    /// A configuration instance name is already taken
    #[error("configuration instance already registered: {0}")]
    DuplicateConfiguration(String),

    /// Configuration not declared by the extension
    #[error("extension {extension} has no configuration named '{configuration}'")]
    UnknownConfiguration {
        extension: String,
        configuration: String,
    },

    /// Operation not declared by the extension
    #[error("extension {extension} has no operation named '{operation}'")]
    UnknownOperation { extension: String, operation: String },

    /// Invalid runtime configuration
    #[error("invalid value for {field}: {message}")]
    InvalidConfig { field: String, message: String },
}

impl Error {
    /// Create a missing parameter error
    pub fn missing_parameter(owner: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            owner: owner.into(),
            parameter: parameter.into(),
        }
    }

    /// Create a conversion unavailable error
    pub fn conversion_unavailable(from: &DataType, to: &DataType) -> Self {
        Self::ConversionUnavailable {
            from: from.clone(),
            to: to.clone(),
        }
    }

    /// Check if this error happened while resolving a parameter
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    /// Check if this error happened while instantiating an object
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Check if this error came out of an operation's logic unit
    pub fn is_invocation(&self) -> bool {
        matches!(self, Self::Invocation(_))
    }
}

/// A parameter could not be resolved for a message
#[derive(Debug, Error)]
#[error("could not resolve parameter '{parameter}': {cause}")]
pub struct ResolutionError {
    /// Name of the failing parameter
    pub parameter: String,
    /// What went wrong
    #[source]
    pub cause: Box<Error>,
}

impl ResolutionError {
    /// Wrap a failure with the name of the parameter being resolved
    pub fn new(parameter: impl Into<String>, cause: Error) -> Self {
        Self {
            parameter: parameter.into(),
            cause: Box::new(cause),
        }
    }
}

/// An object could not be created
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("could not instantiate {type_name}: {reason:#}")]
    Instantiation {
        type_name: &'static str,
        reason: anyhow::Error,
    },

    #[error("{type_name} has no setter for property '{property}'")]
    MissingSetter {
        type_name: &'static str,
        property: String,
    },

    #[error("configuration {0} references itself while being built")]
    Cyclic(String),

    #[error("configuration {0} has been disposed")]
    Disposed(String),
}

/// An operation could not be executed
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("could not instantiate logic unit of operation {operation}: {reason:#}")]
    Instantiation {
        operation: String,
        reason: anyhow::Error,
    },

    #[error("operation {operation} threw: {reason:#}")]
    Failed {
        operation: String,
        reason: anyhow::Error,
    },

    #[error("operation {operation} declares a {declared} result but returned {actual}")]
    ReturnMismatch {
        operation: String,
        declared: &'static str,
        actual: &'static str,
    },
}

/// Expression evaluation errors
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("invalid expression '{expression}': {reason}")]
    Syntax { expression: String, reason: String },

    #[error("unknown expression root '{root}' in '{expression}'")]
    UnknownRoot { expression: String, root: String },

    #[error("could not evaluate '{expression}': {reason}")]
    Evaluation { expression: String, reason: String },
}

impl ExpressionError {
    pub(crate) fn syntax(expression: &str, reason: impl Into<String>) -> Self {
        Self::Syntax {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn evaluation(expression: &str, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// A converter could not convert a value
#[derive(Debug, Error)]
#[error("converter {converter} failed: {reason}")]
pub struct ConversionError {
    pub converter: String,
    pub reason: String,
}

impl ConversionError {
    pub fn new(converter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            converter: converter.into(),
            reason: reason.into(),
        }
    }
}

/// Registry layer management errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry layer already present: {0}")]
    DuplicateLayer(String),

    #[error("registry layer not found: {0}")]
    LayerNotFound(String),

    #[error("the transient registry layer cannot be removed")]
    TransientLayerRemoval,
}

/// A lifecycle phase failed
#[derive(Debug, Error)]
#[error("{phase} of {component} failed: {reason}")]
pub struct LifecycleError {
    pub component: String,
    pub phase: &'static str,
    pub reason: String,
}

impl LifecycleError {
    pub fn new(component: impl Into<String>, phase: &'static str, reason: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            phase,
            reason: reason.into(),
        }
    }
}

/// A message could not be processed by an operation
///
/// Carries the operation name and the message as it was before the
/// operation ran, so callers can retry or log it.
#[derive(Debug, Error)]
#[error("could not execute operation {operation}: {source}")]
pub struct ProcessingError {
    /// Operation that failed
    pub operation: String,
    /// The message as received by the processor
    pub message: Box<Message>,
    /// Underlying failure
    #[source]
    pub source: Error,
}

impl ProcessingError {
    pub fn new(operation: impl Into<String>, message: Message, source: Error) -> Self {
        Self {
            operation: operation.into(),
            message: Box::new(message),
            source,
        }
    }

    /// Whether the failure happened while resolving the configuration
    /// or a parameter, before the operation ran
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self.source, Error::Resolution(_) | Error::Build(_))
    }
}
