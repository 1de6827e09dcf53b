//! Runtime Configuration
//!
//! Defines configuration options for the Conduit runtime.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Runtime configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Name used in logs and as the default flow name
    pub name: String,

    /// Converter configuration
    pub converters: ConverterConfig,

    /// Expression configuration
    pub expressions: ExpressionConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "conduit".to_string(),
            converters: ConverterConfig::default(),
            expressions: ExpressionConfig::default(),
        }
    }
}

/// Converter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Cache converter lookups between registry changes (default: true)
    pub cache: bool,

    /// Register the built-in JSON converters at startup (default: true)
    pub builtin: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            cache: true,
            builtin: true,
        }
    }
}

/// Which evaluator handles `#[...]` expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionLanguage {
    /// Payload, flow variables and properties of the message
    #[default]
    Message,
    /// Expressions disabled; every string is a literal
    Disabled,
}

/// Expression configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// Evaluator selection (default: message)
    pub language: ExpressionLanguage,
}

impl RuntimeConfig {
    /// Create a config with the given runtime name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Enable or disable the converter lookup cache
    pub fn with_converter_cache(mut self, enabled: bool) -> Self {
        self.converters.cache = enabled;
        self
    }

    /// Enable or disable the built-in converters
    pub fn with_builtin_converters(mut self, enabled: bool) -> Self {
        self.converters.builtin = enabled;
        self
    }

    /// Select the expression evaluator
    pub fn with_expression_language(mut self, language: ExpressionLanguage) -> Self {
        self.expressions.language = language;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }

        if self.converters.builtin && !cfg!(feature = "builtin-converters") {
            return Err(Error::InvalidConfig {
                field: "converters.builtin".into(),
                message: "built without the builtin-converters feature".into(),
            });
        }

        Ok(())
    }
}
