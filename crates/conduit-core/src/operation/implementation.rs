//! Operation implementations
//!
//! [`TypedOperationImplementation`] creates a fresh logic unit per call,
//! passes it the resolved parameters positionally and classifies its output
//! by the operation's declared [`ReturnType`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OperationContext;
use crate::error::{InvocationError, Result};
use crate::message::{Message, MessageBody};
use crate::resolver::ConfigInstance;
use crate::types::Parameter;

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Declared result classification of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// No result; the message passes through
    Void,
    /// A value that becomes the payload
    Value,
    /// A body that replaces the message body
    Body,
    /// A message that replaces the current message
    Message,
}

impl ReturnType {
    pub fn name(self) -> &'static str {
        match self {
            ReturnType::Void => "void",
            ReturnType::Value => "value",
            ReturnType::Body => "body",
            ReturnType::Message => "message",
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a logic unit produced
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    None,
    Value(Value),
    Body(MessageBody),
    Message(Message),
}

impl Output {
    pub fn kind(&self) -> &'static str {
        match self {
            Output::None => "void",
            Output::Value(_) => "value",
            Output::Body(_) => "body",
            Output::Message(_) => "message",
        }
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

/// Result of executing an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// Leaves the current message as it is
    Void,
    /// Replaces the current message
    Message(Message),
    /// Replaces the body of the current message
    Body(MessageBody),
    /// Becomes the payload of the current message
    Value(Value),
}

impl OperationResult {
    /// Fold this result into `message`
    pub fn merge_into(self, mut message: Message) -> Message {
        match self {
            OperationResult::Void => message,
            OperationResult::Message(result) => result,
            OperationResult::Body(body) => {
                message.set_body(body);
                message
            }
            OperationResult::Value(value) => {
                message.set_payload(value);
                message
            }
        }
    }
}

/// An executed operation: its result and the message as the logic unit left it
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub result: OperationResult,
    pub message: Message,
}

impl Completion {
    /// Merge the result into the message the logic unit worked on
    pub fn into_message(self) -> Message {
        self.result.merge_into(self.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logic units
// ─────────────────────────────────────────────────────────────────────────────

static NULL: Value = Value::Null;

/// Arguments of one logic unit call
pub struct OperationCall<'a> {
    operation: &'a str,
    config: &'a ConfigInstance,
    arguments: Vec<Value>,
    message: &'a mut Message,
}

impl<'a> OperationCall<'a> {
    pub fn new(
        operation: &'a str,
        config: &'a ConfigInstance,
        arguments: Vec<Value>,
        message: &'a mut Message,
    ) -> Self {
        Self {
            operation,
            config,
            arguments,
            message,
        }
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// The configuration instance as `C`
    pub fn config<C: Any>(&self) -> anyhow::Result<&C> {
        self.config.downcast_ref::<C>().ok_or_else(|| {
            anyhow!(
                "operation {} expects a {} configuration",
                self.operation,
                std::any::type_name::<C>()
            )
        })
    }

    /// Positional arguments, in declared parameter order
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Raw argument at `index` (`null` when out of range)
    pub fn argument(&self, index: usize) -> &Value {
        self.arguments.get(index).unwrap_or(&NULL)
    }

    /// Argument at `index` deserialized as `T`
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        serde_json::from_value(self.argument(index).clone())
            .map_err(|e| anyhow!("argument {} of operation {}: {}", index, self.operation, e))
    }

    pub fn message(&self) -> &Message {
        &*self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut *self.message
    }
}

/// Per-call object carrying an operation's behaviour
#[async_trait]
pub trait OperationUnit: Send {
    async fn call(&mut self, call: OperationCall<'_>) -> anyhow::Result<Output>;
}

/// Creates a fresh logic unit for every call
pub type UnitFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn OperationUnit>> + Send + Sync>;

/// Logic unit backed by a synchronous closure
pub struct FnUnit<F>(pub F);

#[async_trait]
impl<F> OperationUnit for FnUnit<F>
where
    F: for<'a> Fn(OperationCall<'a>) -> anyhow::Result<Output> + Send + Sync,
{
    async fn call(&mut self, call: OperationCall<'_>) -> anyhow::Result<Output> {
        (self.0)(call)
    }
}

/// Factory producing a [`FnUnit`] around a clone of `func` per call
pub fn unit_factory<F>(func: F) -> UnitFactory
where
    F: for<'a> Fn(OperationCall<'a>) -> anyhow::Result<Output> + Clone + Send + Sync + 'static,
{
    Arc::new(move || Ok(Box::new(FnUnit(func.clone())) as Box<dyn OperationUnit>))
}

// ─────────────────────────────────────────────────────────────────────────────
// Implementations
// ─────────────────────────────────────────────────────────────────────────────

/// Executes an operation for a context
#[async_trait]
pub trait OperationImplementation: Send + Sync {
    async fn execute(&self, context: OperationContext) -> Result<Completion>;
}

/// Invokes a logic unit with positional arguments and a declared return type
pub struct TypedOperationImplementation {
    operation: String,
    parameters: Vec<Parameter>,
    return_type: ReturnType,
    factory: UnitFactory,
}

impl TypedOperationImplementation {
    pub fn new(
        operation: impl Into<String>,
        parameters: Vec<Parameter>,
        return_type: ReturnType,
        factory: UnitFactory,
    ) -> Self {
        Self {
            operation: operation.into(),
            parameters,
            return_type,
            factory,
        }
    }

    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }
}

#[async_trait]
impl OperationImplementation for TypedOperationImplementation {
    async fn execute(&self, context: OperationContext) -> Result<Completion> {
        let (config, values, mut message) = context.into_parts();
        let arguments: Vec<Value> = self
            .parameters
            .iter()
            .map(|p| {
                values
                    .get(&p.name)
                    .cloned()
                    .or_else(|| p.default.clone())
                    .unwrap_or(Value::Null)
            })
            .collect();

        let mut unit = (self.factory)().map_err(|reason| InvocationError::Instantiation {
            operation: self.operation.clone(),
            reason,
        })?;

        let output = unit
            .call(OperationCall::new(&self.operation, &config, arguments, &mut message))
            .await
            .map_err(|reason| InvocationError::Failed {
                operation: self.operation.clone(),
                reason,
            })?;

        let result = match (self.return_type, output) {
            (ReturnType::Void, Output::None) => OperationResult::Void,
            (ReturnType::Value, Output::Value(value)) => OperationResult::Value(value),
            (ReturnType::Body, Output::Body(body)) => OperationResult::Body(body),
            (ReturnType::Message, Output::Message(result)) => OperationResult::Message(result),
            (declared, other) => {
                return Err(InvocationError::ReturnMismatch {
                    operation: self.operation.clone(),
                    declared: declared.name(),
                    actual: other.kind(),
                }
                .into());
            }
        };
        Ok(Completion { result, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resolver::ResolverSetResult;
    use crate::types::DataType;
    use serde_json::json;

    fn context(message: Message) -> OperationContext {
        let config: ConfigInstance = Arc::new(());
        OperationContext::new("test", config, ResolverSetResult::default(), message)
    }

    fn implementation(return_type: ReturnType, factory: UnitFactory) -> TypedOperationImplementation {
        TypedOperationImplementation::new(
            "test",
            vec![
                Parameter::required("first", DataType::string()),
                Parameter::optional("second", DataType::string()).with_default("fallback"),
                Parameter::optional("third", DataType::string()),
            ],
            return_type,
            factory,
        )
    }

    #[tokio::test]
    async fn test_missing_arguments_use_defaults() {
        let op = implementation(
            ReturnType::Value,
            unit_factory(|call: OperationCall<'_>| Ok(Output::Value(json!(call.arguments())))),
        );
        let completion = op.execute(context(Message::new("x"))).await.unwrap();
        assert_eq!(completion.result, OperationResult::Value(json!([null, "fallback", null])));
    }

    #[tokio::test]
    async fn test_void_returns_context_message() {
        let op = implementation(
            ReturnType::Void,
            unit_factory(|mut call: OperationCall<'_>| {
                call.message_mut().set_flow_var("touched", true);
                Ok(Output::None)
            }),
        );
        let completion = op.execute(context(Message::new("x"))).await.unwrap();
        assert_eq!(completion.result, OperationResult::Void);
        assert_eq!(completion.into_message().flow_var("touched"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_value_result_keeps_unit_message_changes() {
        let op = implementation(
            ReturnType::Value,
            unit_factory(|mut call: OperationCall<'_>| {
                call.message_mut().set_flow_var("seen", true);
                Ok(Output::Value(json!("result")))
            }),
        );
        let merged = op.execute(context(Message::new("x"))).await.unwrap().into_message();
        assert_eq!(merged.payload(), &json!("result"));
        assert_eq!(merged.flow_var("seen"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_return_mismatch() {
        let op = implementation(ReturnType::Body, unit_factory(|_: OperationCall<'_>| Ok(Output::None)));
        let err = op.execute(context(Message::new("x"))).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Invocation(InvocationError::ReturnMismatch { declared: "body", actual: "void", .. })
        ));
    }

    #[tokio::test]
    async fn test_factory_and_unit_failures_are_distinct() {
        let broken_factory: UnitFactory = Arc::new(|| -> anyhow::Result<Box<dyn OperationUnit>> { Err(anyhow!("no unit today")) });
        let err = implementation(ReturnType::Value, broken_factory)
            .execute(context(Message::new("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invocation(InvocationError::Instantiation { .. })));

        let failing = unit_factory(|_: OperationCall<'_>| Err(anyhow!("boom")));
        let err = implementation(ReturnType::Value, failing)
            .execute(context(Message::new("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invocation(InvocationError::Failed { .. })));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_merge_into() {
        let message = Message::new("old").with_flow_var("keep", 1);

        assert_eq!(OperationResult::Void.merge_into(message.clone()), message);

        let merged = OperationResult::Value(json!("new")).merge_into(message.clone());
        assert_eq!(merged.payload(), &json!("new"));
        assert_eq!(merged.flow_var("keep"), Some(&json!(1)));

        let merged = OperationResult::Body(MessageBody::new("body")).merge_into(message.clone());
        assert_eq!(merged.id, message.id);
        assert_eq!(merged.payload(), &json!("body"));

        let replacement = Message::new("replacement");
        let merged = OperationResult::Message(replacement.clone()).merge_into(message);
        assert_eq!(merged, replacement);
    }
}
