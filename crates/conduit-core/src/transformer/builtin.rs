//! Built-in converters between the JSON-shaped data types
//!
//! All of them register at priority 0 so that user converters with a positive
//! priority take precedence.

use std::sync::Arc;

use serde_json::{Number, Value};

use super::{Converter, FnConverter, register_converter};
use crate::error::{ConversionError, Result};
use crate::registry::RegistryBroker;
use crate::types::DataType;

/// The built-in converters
pub fn converters() -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(FnConverter::new(
            "string-to-integer",
            DataType::string(),
            DataType::integer(),
            |value| {
                let text = expect_str("string-to-integer", &value)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|e| ConversionError::new("string-to-integer", format!("'{}': {}", text, e)))
            },
        )),
        Arc::new(FnConverter::new(
            "string-to-number",
            DataType::string(),
            DataType::number(),
            |value| {
                let text = expect_str("string-to-number", &value)?;
                let parsed = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| ConversionError::new("string-to-number", format!("'{}': {}", text, e)))?;
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| ConversionError::new("string-to-number", format!("'{}' is not finite", text)))
            },
        )),
        Arc::new(FnConverter::new(
            "string-to-boolean",
            DataType::string(),
            DataType::boolean(),
            |value| {
                let text = expect_str("string-to-boolean", &value)?;
                match text.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(ConversionError::new(
                        "string-to-boolean",
                        format!("'{}' is neither true nor false", text),
                    )),
                }
            },
        )),
        Arc::new(FnConverter::new(
            "string-to-map",
            DataType::string(),
            DataType::map(),
            |value| parse_json("string-to-map", &value, Value::is_object),
        )),
        Arc::new(FnConverter::new(
            "string-to-array",
            DataType::string(),
            DataType::array(),
            |value| parse_json("string-to-array", &value, Value::is_array),
        )),
        Arc::new(FnConverter::new(
            "number-to-string",
            DataType::number(),
            DataType::string(),
            |value| Ok(Value::String(value.to_string())),
        )),
        Arc::new(FnConverter::new(
            "boolean-to-string",
            DataType::boolean(),
            DataType::string(),
            |value| Ok(Value::String(value.to_string())),
        )),
        Arc::new(FnConverter::new(
            "map-to-string",
            DataType::map(),
            DataType::string(),
            |value| Ok(Value::String(value.to_string())),
        )),
        Arc::new(FnConverter::new(
            "array-to-string",
            DataType::array(),
            DataType::string(),
            |value| Ok(Value::String(value.to_string())),
        )),
    ]
}

/// Register every built-in converter in the broker's transient layer
pub fn register(registry: &RegistryBroker) -> Result<()> {
    for converter in converters() {
        register_converter(registry, converter)?;
    }
    Ok(())
}

fn expect_str<'a>(converter: &str, value: &'a Value) -> std::result::Result<&'a str, ConversionError> {
    value
        .as_str()
        .ok_or_else(|| ConversionError::new(converter, format!("expected a string, got {}", value)))
}

fn parse_json(
    converter: &str,
    value: &Value,
    shape: fn(&Value) -> bool,
) -> std::result::Result<Value, ConversionError> {
    let text = expect_str(converter, value)?;
    let parsed: Value = serde_json::from_str(text).map_err(|e| ConversionError::new(converter, e.to_string()))?;
    if !shape(&parsed) {
        return Err(ConversionError::new(converter, format!("'{}' has the wrong shape", text)));
    }
    Ok(parsed)
}
