use std::sync::Arc;

use serde_json::Value;

use super::{SharedResolver, ValueResolver};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::message::Message;
use crate::transformer::TransformerResolver;
use crate::types::DataType;

/// Coerces the value of another resolver to a declared data type
///
/// Values already assignable to the declared type, and nulls, pass through.
pub struct ConvertingValueResolver {
    inner: SharedResolver,
    target: DataType,
    transformer: Arc<TransformerResolver>,
}

impl ConvertingValueResolver {
    pub fn new(inner: SharedResolver, target: DataType, transformer: Arc<TransformerResolver>) -> Self {
        Self {
            inner,
            target,
            transformer,
        }
    }

    pub fn target(&self) -> &DataType {
        &self.target
    }
}

impl Lifecycle for ConvertingValueResolver {
    fn initialise(&self) -> Result<()> {
        self.inner.initialise()
    }

    fn start(&self) -> Result<()> {
        self.inner.start()
    }

    fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    fn dispose(&self) -> Result<()> {
        self.inner.dispose()
    }
}

impl ValueResolver<Value> for ConvertingValueResolver {
    fn resolve(&self, message: &Message) -> Result<Value> {
        let value = self.inner.resolve(message)?;
        if value.is_null() {
            return Ok(value);
        }
        self.transformer.convert(value, &self.target)
    }

    fn is_dynamic(&self) -> bool {
        self.inner.is_dynamic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConversionError, Error};
    use crate::expression::MessageExpressionEvaluator;
    use crate::registry::RegistryBroker;
    use crate::resolver::{ExpressionValueResolver, StaticValueResolver};
    use crate::transformer::{FnConverter, register_converter};
    use serde_json::json;

    fn transformer() -> Arc<TransformerResolver> {
        let registry = Arc::new(RegistryBroker::new());
        register_converter(
            &registry,
            Arc::new(FnConverter::new(
                "text-to-int",
                DataType::string(),
                DataType::integer(),
                |v| {
                    v.as_str()
                        .and_then(|s| s.parse::<i64>().ok())
                        .map(Value::from)
                        .ok_or_else(|| ConversionError::new("text-to-int", "not a number"))
                },
            )),
        )
        .unwrap();
        Arc::new(TransformerResolver::new(registry))
    }

    #[test]
    fn test_converts_dynamic_value() {
        let inner: SharedResolver = Arc::new(ExpressionValueResolver::new(
            "#[flowVars.count]",
            Arc::new(MessageExpressionEvaluator::new()),
        ));
        let resolver = ConvertingValueResolver::new(inner, DataType::integer(), transformer());
        assert!(resolver.is_dynamic());

        let message = Message::new("x").with_flow_var("count", "12");
        assert_eq!(resolver.resolve(&message).unwrap(), json!(12));
    }

    #[test]
    fn test_null_and_assignable_pass_through() {
        let transformer = transformer();
        let null = ConvertingValueResolver::new(
            Arc::new(StaticValueResolver::new(Value::Null)),
            DataType::integer(),
            transformer.clone(),
        );
        assert_eq!(null.resolve(&Message::new("x")).unwrap(), Value::Null);

        let number = ConvertingValueResolver::new(
            Arc::new(StaticValueResolver::new(json!(5))),
            DataType::number(),
            transformer,
        );
        assert_eq!(number.resolve(&Message::new("x")).unwrap(), json!(5));
        assert!(!number.is_dynamic());
    }

    #[test]
    fn test_missing_converter_is_reported() {
        let resolver = ConvertingValueResolver::new(
            Arc::new(StaticValueResolver::new(json!(true))),
            DataType::integer(),
            transformer(),
        );
        assert!(matches!(
            resolver.resolve(&Message::new("x")),
            Err(Error::ConversionUnavailable { .. })
        ));
    }
}
