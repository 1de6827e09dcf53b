//! Extension Manager
//!
//! Holds the registered extensions and wires them: plain parameter values are
//! turned into resolvers, configurations are registered as named instances,
//! and operations become message processors bound to one of those instances.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;

use super::descriptor::ExtensionDescriptor;
use crate::error::{BuildError, Error, Result};
use crate::expression::ExpressionEvaluator;
use crate::operation::{OperationMessageProcessor, TypedOperationImplementation};
use crate::registry::{RegistryBroker, RegistryObject};
use crate::resolver::{
    CollectionValueResolver, ConfigurationPropertiesResolver, ConfigurationReference, ConfigurationValueResolver,
    ConvertingValueResolver, ExpressionValueResolver, ResolverSet, SharedResolver, StaticValueResolver,
};
use crate::transformer::TransformerResolver;
use crate::types::{DataType, Parameter, ParameterValue};

/// Plain values supplied for parameters, by parameter name
pub type ParameterValues = IndexMap<String, ParameterValue>;

/// Registers extensions and wires their configurations and operations
pub struct ExtensionManager {
    registry: Arc<RegistryBroker>,
    transformer: Arc<TransformerResolver>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    extensions: RwLock<IndexMap<String, Arc<ExtensionDescriptor>>>,
}

impl ExtensionManager {
    pub fn new(
        registry: Arc<RegistryBroker>,
        transformer: Arc<TransformerResolver>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        Self {
            registry,
            transformer,
            evaluator,
            extensions: RwLock::new(IndexMap::new()),
        }
    }

    /// Register an extension
    pub async fn register_extension(&self, descriptor: ExtensionDescriptor) -> Result<()> {
        let mut extensions = self.extensions.write().await;
        if extensions.contains_key(&descriptor.name) {
            return Err(Error::DuplicateExtension(descriptor.name));
        }

        tracing::info!(
            extension = %descriptor.name,
            version = %descriptor.version,
            configurations = descriptor.configurations.len(),
            operations = descriptor.operations.len(),
            "Registered extension"
        );
        extensions.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Unregister an extension
    ///
    /// Configuration instances and processors already wired from it keep
    /// working.
    pub async fn unregister_extension(&self, name: &str) -> Result<Arc<ExtensionDescriptor>> {
        let mut extensions = self.extensions.write().await;
        let removed = extensions
            .shift_remove(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        tracing::info!(extension = name, "Unregistered extension");
        Ok(removed)
    }

    /// Get extension by name
    pub async fn extension(&self, name: &str) -> Option<Arc<ExtensionDescriptor>> {
        let extensions = self.extensions.read().await;
        extensions.get(name).cloned()
    }

    /// List all extensions, in registration order
    pub async fn extensions(&self) -> Vec<Arc<ExtensionDescriptor>> {
        let extensions = self.extensions.read().await;
        extensions.values().cloned().collect()
    }

    /// Create a named configuration instance and register it
    ///
    /// The instance itself is built on first use. Instance names are unique,
    /// and an instance may not reference itself.
    pub async fn configure(
        &self,
        extension: &str,
        configuration: &str,
        instance_name: &str,
        values: ParameterValues,
    ) -> Result<Arc<ConfigurationValueResolver>> {
        let descriptor = self.require(extension).await?;
        let config = descriptor
            .find_configuration(configuration)
            .ok_or_else(|| Error::UnknownConfiguration {
                extension: extension.to_string(),
                configuration: configuration.to_string(),
            })?;

        if self.registry.lookup(instance_name).is_some() {
            return Err(Error::DuplicateConfiguration(instance_name.to_string()));
        }
        if values.values().any(|value| references(value, instance_name)) {
            return Err(BuildError::Cyclic(instance_name.to_string()).into());
        }

        let resolvers = self.resolver_set(format!("configuration {}", instance_name), &config.parameters, values)?;
        let builder = config.model.create_builder(Arc::new(resolvers))?;
        let resolver = Arc::new(ConfigurationValueResolver::new(instance_name, builder));

        self.registry
            .register(instance_name, RegistryObject::with_lifecycle(resolver.clone()))?;
        tracing::debug!(extension, configuration, instance = instance_name, "Registered configuration instance");
        Ok(resolver)
    }

    /// Create a processor invoking `operation` with the configuration
    /// instance registered as `config_instance`
    pub async fn operation(
        &self,
        extension: &str,
        operation: &str,
        config_instance: &str,
        values: ParameterValues,
    ) -> Result<OperationMessageProcessor> {
        let descriptor = self.require(extension).await?;
        let op = descriptor
            .find_operation(operation)
            .ok_or_else(|| Error::UnknownOperation {
                extension: extension.to_string(),
                operation: operation.to_string(),
            })?;

        let resolvers = self.resolver_set(format!("operation {}", operation), &op.parameters, values)?;
        let implementation = TypedOperationImplementation::new(
            op.name.clone(),
            op.parameters.clone(),
            op.return_type,
            op.factory.clone(),
        );
        let configuration = ConfigurationReference::new(config_instance, self.registry.clone());

        tracing::debug!(extension, operation, config = config_instance, "Wired operation");
        Ok(OperationMessageProcessor::new(
            op.name.clone(),
            Arc::new(configuration),
            Arc::new(resolvers),
            Arc::new(implementation),
        ))
    }

    async fn require(&self, name: &str) -> Result<Arc<ExtensionDescriptor>> {
        self.extension(name)
            .await
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }

    /// Build the resolver set for declared `parameters` from supplied `values`
    fn resolver_set(&self, owner: String, parameters: &[Parameter], mut values: ParameterValues) -> Result<ResolverSet> {
        if let Some(unknown) = values.keys().find(|k| !parameters.iter().any(|p| &p.name == *k)) {
            return Err(Error::UnknownParameter {
                owner,
                parameter: unknown.clone(),
            });
        }

        let mut set = ResolverSet::new(owner);
        for parameter in parameters {
            let supplied = match values.shift_remove(&parameter.name) {
                Some(value) => value,
                None => match &parameter.default {
                    Some(default) => ParameterValue::Literal(default.clone()),
                    None if parameter.required => {
                        return Err(Error::missing_parameter(set.owner(), &parameter.name));
                    }
                    None => continue,
                },
            };
            let resolver = self.typed(self.value_resolver(supplied), &parameter.data_type);
            set.add(parameter.clone(), resolver)?;
        }

        set.validate(parameters)?;
        Ok(set)
    }

    fn value_resolver(&self, value: ParameterValue) -> SharedResolver {
        match value {
            ParameterValue::Literal(Value::String(text)) if self.evaluator.is_expression(&text) => {
                Arc::new(ExpressionValueResolver::new(text, self.evaluator.clone()))
            }
            ParameterValue::Literal(value) => Arc::new(StaticValueResolver::new(value)),
            ParameterValue::Expression(text) => Arc::new(ExpressionValueResolver::new(text, self.evaluator.clone())),
            ParameterValue::List(items) => Arc::new(CollectionValueResolver::list(
                items.into_iter().map(|item| self.value_resolver(item)).collect(),
            )),
            ParameterValue::Set(items) => Arc::new(CollectionValueResolver::set(
                items.into_iter().map(|item| self.value_resolver(item)).collect(),
            )),
            ParameterValue::ConfigRef(name) => Arc::new(ConfigurationPropertiesResolver::new(
                ConfigurationReference::new(name, self.registry.clone()),
            )),
        }
    }

    fn typed(&self, resolver: SharedResolver, data_type: &DataType) -> SharedResolver {
        if *data_type == DataType::object() {
            return resolver;
        }
        Arc::new(ConvertingValueResolver::new(
            resolver,
            data_type.clone(),
            self.transformer.clone(),
        ))
    }
}

fn references(value: &ParameterValue, instance: &str) -> bool {
    match value {
        ParameterValue::ConfigRef(name) => name == instance,
        ParameterValue::List(items) | ParameterValue::Set(items) => items.iter().any(|item| references(item, instance)),
        _ => false,
    }
}
