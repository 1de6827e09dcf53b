//! Extension Descriptors
//!
//! Read-only description of what an extension offers: named configurations
//! (parameters plus a typed model that builds the configuration object) and
//! named operations (parameters, declared return type, logic unit factory).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::{ConfigurationFactory, ConfigurationModel};
use crate::operation::{ReturnType, UnitFactory};
use crate::types::Parameter;

/// A configuration an extension can be set up with
#[derive(Clone)]
pub struct ConfigurationDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub model: Arc<dyn ConfigurationFactory>,
}

impl ConfigurationDescriptor {
    pub fn new<T: Send + Sync + 'static>(name: impl Into<String>, model: ConfigurationModel<T>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            model: Arc::new(model),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl fmt::Debug for ConfigurationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("type", &self.model.type_name())
            .finish()
    }
}

/// An operation an extension exposes
#[derive(Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub return_type: ReturnType,
    pub factory: UnitFactory,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, return_type: ReturnType, factory: UnitFactory) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            return_type,
            factory,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// Everything an extension declares
#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub configurations: Vec<ConfigurationDescriptor>,
    pub operations: Vec<OperationDescriptor>,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            configurations: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn configuration(mut self, configuration: ConfigurationDescriptor) -> Self {
        self.configurations.push(configuration);
        self
    }

    pub fn operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn find_configuration(&self, name: &str) -> Option<&ConfigurationDescriptor> {
        self.configurations.iter().find(|c| c.name == name)
    }

    pub fn find_operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// Serializable overview for listings
    pub fn summary(&self) -> ExtensionSummary {
        ExtensionSummary {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            configurations: self
                .configurations
                .iter()
                .map(|c| ComponentSummary {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    returns: None,
                    parameters: c.parameters.iter().map(ParameterSummary::from).collect(),
                })
                .collect(),
            operations: self
                .operations
                .iter()
                .map(|o| ComponentSummary {
                    name: o.name.clone(),
                    description: o.description.clone(),
                    returns: Some(o.return_type),
                    parameters: o.parameters.iter().map(ParameterSummary::from).collect(),
                })
                .collect(),
        }
    }
}

/// Overview of an extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionSummary {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub configurations: Vec<ComponentSummary>,
    pub operations: Vec<ComponentSummary>,
}

/// Overview of a configuration or operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnType>,
    pub parameters: Vec<ParameterSummary>,
}

/// Overview of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Parameter> for ParameterSummary {
    fn from(parameter: &Parameter) -> Self {
        Self {
            name: parameter.name.clone(),
            data_type: parameter.data_type.name().to_string(),
            required: parameter.required,
            default: parameter.default.clone(),
            description: parameter.description.clone(),
        }
    }
}
