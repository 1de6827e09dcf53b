use std::sync::Arc;

use async_trait::async_trait;

use super::{OperationContext, OperationImplementation};
use crate::error::{ProcessingError, Result};
use crate::lifecycle::Lifecycle;
use crate::message::Message;
use crate::resolver::{ConfigInstance, ResolverSet, ValueResolver};

/// A node of a pipeline
#[async_trait]
pub trait MessageProcessor: Lifecycle {
    fn name(&self) -> &str;

    async fn process(&self, message: Message) -> std::result::Result<Message, ProcessingError>;
}

/// Invokes one operation for every message
///
/// For each message the processor resolves the configuration instance and
/// the operation's parameters, executes the operation, and merges the result
/// into the message. Any failure comes back as a [`ProcessingError`] holding
/// the message as it was received.
pub struct OperationMessageProcessor {
    operation: String,
    configuration: Arc<dyn ValueResolver<ConfigInstance>>,
    resolvers: Arc<ResolverSet>,
    implementation: Arc<dyn OperationImplementation>,
}

impl OperationMessageProcessor {
    pub fn new(
        operation: impl Into<String>,
        configuration: Arc<dyn ValueResolver<ConfigInstance>>,
        resolvers: Arc<ResolverSet>,
        implementation: Arc<dyn OperationImplementation>,
    ) -> Self {
        Self {
            operation: operation.into(),
            configuration,
            resolvers,
            implementation,
        }
    }

    pub fn resolvers(&self) -> &Arc<ResolverSet> {
        &self.resolvers
    }

    async fn run(&self, message: &Message) -> Result<Message> {
        let config = self.configuration.resolve(message)?;
        let parameters = self.resolvers.resolve(message)?;

        let context = OperationContext::new(&self.operation, config, parameters, message.clone());
        let completion = self.implementation.execute(context).await?;
        Ok(completion.into_message())
    }
}

impl Lifecycle for OperationMessageProcessor {
    fn initialise(&self) -> Result<()> {
        self.resolvers.initialise()
    }

    fn start(&self) -> Result<()> {
        self.resolvers.start()
    }

    fn stop(&self) -> Result<()> {
        self.resolvers.stop()
    }

    fn dispose(&self) -> Result<()> {
        self.resolvers.dispose()
    }
}

#[async_trait]
impl MessageProcessor for OperationMessageProcessor {
    fn name(&self) -> &str {
        &self.operation
    }

    async fn process(&self, message: Message) -> std::result::Result<Message, ProcessingError> {
        tracing::debug!(operation = %self.operation, message_id = %message.id, "Processing message");

        let outcome = self.run(&message).await;
        match outcome {
            Ok(processed) => Ok(processed),
            Err(source) => {
                tracing::warn!(
                    operation = %self.operation,
                    message_id = %message.id,
                    error = %source,
                    "Operation failed"
                );
                Err(ProcessingError::new(&self.operation, message, source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ConfigurationModel;
    use crate::error::{Error, InvocationError};
    use crate::expression::MessageExpressionEvaluator;
    use crate::operation::{OperationCall, Output, ReturnType, TypedOperationImplementation, unit_factory};
    use crate::resolver::{ConfigurationValueResolver, ExpressionValueResolver, StaticValueResolver};
    use crate::types::{DataType, Parameter};
    use anyhow::anyhow;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Salutation {
        punctuation: String,
    }

    fn configuration() -> Arc<dyn ValueResolver<ConfigInstance>> {
        let model = ConfigurationModel::<Salutation>::with_default()
            .setter("punctuation", |s: &mut Salutation, v: String| s.punctuation = v);
        let mut set = ResolverSet::new("configuration salutation");
        set.add(
            Parameter::required("punctuation", DataType::string()),
            Arc::new(StaticValueResolver::new(json!("!"))),
        )
        .unwrap();
        let builder = model.builder(Arc::new(set)).unwrap();
        Arc::new(ConfigurationValueResolver::new("salutation", Box::new(builder)))
    }

    fn processor(
        parameters: Vec<Parameter>,
        resolvers: ResolverSet,
        return_type: ReturnType,
        unit: crate::operation::UnitFactory,
    ) -> OperationMessageProcessor {
        let implementation = TypedOperationImplementation::new("greet", parameters, return_type, unit);
        OperationMessageProcessor::new("greet", configuration(), Arc::new(resolvers), Arc::new(implementation))
    }

    fn greeting_resolvers() -> (Vec<Parameter>, ResolverSet) {
        let parameters = vec![
            Parameter::required("greeting", DataType::string()),
            Parameter::required("target", DataType::string()),
        ];
        let mut set = ResolverSet::new("operation greet");
        set.add(parameters[0].clone(), Arc::new(StaticValueResolver::new(json!("Hello"))))
            .unwrap();
        set.add(
            parameters[1].clone(),
            Arc::new(ExpressionValueResolver::new("#[payload]", Arc::new(MessageExpressionEvaluator::new()))),
        )
        .unwrap();
        (parameters, set)
    }

    #[tokio::test]
    async fn test_positional_arguments_and_value_result() {
        let (parameters, set) = greeting_resolvers();
        let greet = processor(
            parameters,
            set,
            ReturnType::Value,
            unit_factory(|call: OperationCall<'_>| {
                let config = call.config::<Salutation>()?;
                let greeting: String = call.arg(0)?;
                let target: String = call.arg(1)?;
                Ok(Output::Value(json!(format!("{}, {}{}", greeting, target, config.punctuation))))
            }),
        );

        let original = Message::new("World");
        let processed = greet.process(original.clone()).await.unwrap();
        assert_eq!(processed.payload(), &json!("Hello, World!"));
        assert_eq!(processed.id, original.id);

        let processed = greet.process(Message::new("Mars")).await.unwrap();
        assert_eq!(processed.payload(), &json!("Hello, Mars!"));
    }

    #[tokio::test]
    async fn test_void_operation_mutates_flow_variable() {
        let parameters = vec![Parameter::required("value", DataType::object())];
        let mut set = ResolverSet::new("operation remember");
        set.add(parameters[0].clone(), Arc::new(StaticValueResolver::new(json!(42))))
            .unwrap();

        let remember = processor(
            parameters,
            set,
            ReturnType::Void,
            unit_factory(|mut call: OperationCall<'_>| {
                let value = call.argument(0).clone();
                call.message_mut().set_flow_var("remembered", value);
                Ok(Output::None)
            }),
        );

        let processed = remember.process(Message::new("unchanged")).await.unwrap();
        assert_eq!(processed.payload(), &json!("unchanged"));
        assert_eq!(processed.flow_var("remembered"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_value_result_keeps_flow_variables_set_by_operation() {
        let (parameters, set) = greeting_resolvers();
        let mark = processor(
            parameters,
            set,
            ReturnType::Value,
            unit_factory(|mut call: OperationCall<'_>| {
                call.message_mut().set_flow_var("seen", true);
                Ok(Output::Value(json!("result")))
            }),
        );

        let processed = mark.process(Message::new("World")).await.unwrap();
        assert_eq!(processed.payload(), &json!("result"));
        assert_eq!(processed.flow_var("seen"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_failure_carries_operation_and_original_message() {
        let (parameters, set) = greeting_resolvers();
        let explode = processor(
            parameters,
            set,
            ReturnType::Value,
            unit_factory(|_: OperationCall<'_>| Err(anyhow!("boom"))),
        );

        let original = Message::new("World").with_flow_var("attempt", 1);
        let err = explode.process(original.clone()).await.unwrap_err();

        assert_eq!(err.operation, "greet");
        assert_eq!(*err.message, original);
        assert!(matches!(err.source, Error::Invocation(InvocationError::Failed { .. })));
        assert!(err.to_string().contains("greet"));
        assert!(format!("{:#}", anyhow::Error::new(err)).contains("boom"));
    }

    #[tokio::test]
    async fn test_parameter_failure_is_resolution_failure() {
        let parameters = vec![Parameter::required("target", DataType::string())];
        let mut set = ResolverSet::new("operation greet");
        set.add(
            parameters[0].clone(),
            Arc::new(ExpressionValueResolver::new("#[unknown]", Arc::new(MessageExpressionEvaluator::new()))),
        )
        .unwrap();

        let greet = processor(
            parameters,
            set,
            ReturnType::Value,
            unit_factory(|_: OperationCall<'_>| Ok(Output::Value(json!("never")))),
        );
        let err = greet.process(Message::new("x")).await.unwrap_err();
        assert!(err.is_resolution_failure());
    }
}
