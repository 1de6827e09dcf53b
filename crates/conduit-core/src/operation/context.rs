use std::any::Any;
use std::sync::Arc;

use crate::message::Message;
use crate::resolver::{ConfigInstance, ResolverSetResult};

/// Everything one invocation of an operation needs
pub struct OperationContext {
    operation: String,
    config: ConfigInstance,
    parameters: ResolverSetResult,
    message: Message,
}

impl OperationContext {
    pub fn new(
        operation: impl Into<String>,
        config: ConfigInstance,
        parameters: ResolverSetResult,
        message: Message,
    ) -> Self {
        Self {
            operation: operation.into(),
            config,
            parameters,
            message,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn config(&self) -> &ConfigInstance {
        &self.config
    }

    /// The configuration instance as `C`, if it is one
    pub fn config_as<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        self.config.clone().downcast::<C>().ok()
    }

    pub fn parameters(&self) -> &ResolverSetResult {
        &self.parameters
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_parts(self) -> (ConfigInstance, ResolverSetResult, Message) {
        (self.config, self.parameters, self.message)
    }
}
