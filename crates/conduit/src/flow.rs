//! Flow definitions.
//!
//! A flow file declares named configuration instances and an ordered list of
//! operation steps:
//!
//! ```toml
//! name = "greeting"
//!
//! [[config]]
//! name = "shout"
//! extension = "text"
//! configuration = "formatter"
//! parameters = { prefix = "Hello, ", uppercase = true }
//!
//! [[step]]
//! extension = "text"
//! operation = "format"
//! config = "shout"
//! ```
//!
//! Parameter values are plain TOML. Strings holding `#[...]` are evaluated
//! per message. Inline tables with a single `expression`, `config` or `set`
//! key select the other value kinds.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use conduit_core::{Conduit, MessageProcessor, ParameterValue, ParameterValues, Pipeline};
use indexmap::IndexSet;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FlowError;

/// A parsed flow file
#[derive(Debug, Clone, Deserialize)]
pub struct FlowDefinition {
    /// Flow name; the runtime name is used when absent
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "config")]
    pub configs: Vec<ConfigEntry>,

    #[serde(default, rename = "step")]
    pub steps: Vec<StepEntry>,
}

/// A named configuration instance
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub extension: String,
    pub configuration: String,
    #[serde(default)]
    pub parameters: toml::Table,
}

/// One operation in the flow
#[derive(Debug, Clone, Deserialize)]
pub struct StepEntry {
    pub extension: String,
    pub operation: String,
    /// Configuration instance; the extension's first configuration with
    /// default parameters when absent
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub parameters: toml::Table,
}

impl FlowDefinition {
    /// Read and parse a flow file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read flow file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse flow file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let flow: FlowDefinition = toml::from_str(content)?;
        flow.check()?;
        Ok(flow)
    }

    fn check(&self) -> Result<(), FlowError> {
        if self.steps.is_empty() {
            return Err(FlowError::NoSteps);
        }

        let mut names = IndexSet::new();
        for config in &self.configs {
            if !names.insert(config.name.as_str()) {
                return Err(FlowError::DuplicateConfig(config.name.clone()));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(config) = &step.config {
                if !names.contains(config.as_str()) {
                    return Err(FlowError::UndefinedConfig {
                        step: index + 1,
                        config: config.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn defines(&self, config: &str) -> bool {
        self.configs.iter().any(|c| c.name == config)
    }

    /// Register the configuration instances and build the step pipeline
    ///
    /// A step without a config uses `<extension>:default`. A config declared
    /// under that name is used as is; otherwise one is created with the
    /// extension's first configuration and default parameters.
    pub async fn wire(&self, conduit: &Conduit) -> Result<Pipeline> {
        let extensions = conduit.extensions();

        for config in &self.configs {
            extensions
                .configure(
                    &config.extension,
                    &config.configuration,
                    &config.name,
                    parameter_values(&config.parameters)?,
                )
                .await
                .with_context(|| format!("Failed to configure {}", config.name))?;
        }

        let name = self.name.clone().unwrap_or_else(|| conduit.config().name.clone());
        let mut pipeline = Pipeline::new(name);
        let mut defaults = IndexSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            let config = match &step.config {
                Some(config) => config.clone(),
                None => {
                    let instance = default_instance(&step.extension);
                    if defaults.insert(instance.clone()) && !self.defines(&instance) {
                        configure_default(conduit, &step.extension, &instance).await?;
                    }
                    instance
                }
            };

            let processor = extensions
                .operation(
                    &step.extension,
                    &step.operation,
                    &config,
                    parameter_values(&step.parameters)?,
                )
                .await
                .with_context(|| format!("Failed to wire step {} ({})", index + 1, step.operation))?;
            pipeline.push(Arc::new(processor));
        }

        tracing::debug!(flow = %pipeline.name(), steps = pipeline.len(), "Wired flow");
        Ok(pipeline)
    }
}

fn default_instance(extension: &str) -> String {
    format!("{}:default", extension)
}

async fn configure_default(conduit: &Conduit, extension: &str, instance: &str) -> Result<()> {
    let descriptor = conduit
        .extensions()
        .extension(extension)
        .await
        .ok_or_else(|| conduit_core::Error::UnknownExtension(extension.to_string()))?;
    let configuration = descriptor
        .configurations
        .first()
        .ok_or_else(|| FlowError::NoDefaultConfiguration(extension.to_string()))?;

    conduit
        .extensions()
        .configure(extension, &configuration.name, instance, ParameterValues::new())
        .await
        .with_context(|| format!("Failed to configure default instance for {}", extension))?;
    Ok(())
}

/// Convert a TOML parameter table into parameter values
pub fn parameter_values(table: &toml::Table) -> Result<ParameterValues, FlowError> {
    table
        .iter()
        .map(|(name, value)| Ok((name.clone(), parameter_value(name, value)?)))
        .collect()
}

fn parameter_value(name: &str, value: &toml::Value) -> Result<ParameterValue, FlowError> {
    match value {
        toml::Value::Array(items) => Ok(ParameterValue::List(
            items
                .iter()
                .map(|item| parameter_value(name, item))
                .collect::<Result<_, _>>()?,
        )),
        toml::Value::Table(table) if table.len() == 1 => {
            let (kind, inner) = table.iter().next().map(|(k, v)| (k.as_str(), v)).ok_or_else(|| {
                FlowError::InvalidParameter {
                    name: name.to_string(),
                    reason: "empty table".into(),
                }
            })?;
            match (kind, inner) {
                ("expression", toml::Value::String(text)) => Ok(ParameterValue::Expression(text.clone())),
                ("config", toml::Value::String(instance)) => Ok(ParameterValue::ConfigRef(instance.clone())),
                ("set", toml::Value::Array(items)) => Ok(ParameterValue::Set(
                    items
                        .iter()
                        .map(|item| parameter_value(name, item))
                        .collect::<Result<_, _>>()?,
                )),
                _ => Ok(ParameterValue::Literal(json_value(value))),
            }
        }
        other => Ok(ParameterValue::Literal(json_value(other))),
    }
}

fn json_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(json_value).collect()),
        toml::Value::Table(table) => Value::Object(table.iter().map(|(k, v)| (k.clone(), json_value(v))).collect()),
    }
}
