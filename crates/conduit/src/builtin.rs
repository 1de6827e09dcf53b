//! Built-in extensions shipped with the CLI.
//!
//! `text` offers a `formatter` configuration and a handful of string
//! operations, enough to build small flows without writing an extension.

use anyhow::Result;
use conduit_core::{
    Conduit, ConfigurationDescriptor, ConfigurationModel, DataType, ExtensionDescriptor, OperationCall,
    OperationDescriptor, Output, Parameter, PropertyScope, ReturnType, unit_factory,
};
use serde_json::{Value, json};

/// Configuration object of the `text` extension
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Formatter {
    pub prefix: String,
    pub suffix: String,
    pub uppercase: bool,
}

impl Formatter {
    pub fn apply(&self, text: &str) -> String {
        let formatted = format!("{}{}{}", self.prefix, text, self.suffix);
        if self.uppercase {
            formatted.to_uppercase()
        } else {
            formatted
        }
    }
}

/// All built-in extensions
pub fn extensions() -> Vec<ExtensionDescriptor> {
    vec![text_extension()]
}

/// Register every built-in extension with the runtime
pub async fn register(conduit: &Conduit) -> Result<()> {
    for extension in extensions() {
        conduit.extensions().register_extension(extension).await?;
    }
    Ok(())
}

pub fn text_extension() -> ExtensionDescriptor {
    let formatter = ConfigurationModel::<Formatter>::with_default()
        .setter("prefix", |f: &mut Formatter, v: String| f.prefix = v)
        .setter("suffix", |f: &mut Formatter, v: String| f.suffix = v)
        .setter("uppercase", |f: &mut Formatter, v: bool| f.uppercase = v);

    ExtensionDescriptor::new("text", env!("CARGO_PKG_VERSION"))
        .describe("String formatting and message tagging")
        .configuration(
            ConfigurationDescriptor::new("formatter", formatter)
                .describe("Decorates text with a prefix and suffix")
                .parameter(Parameter::optional("prefix", DataType::string()).with_default(""))
                .parameter(Parameter::optional("suffix", DataType::string()).with_default(""))
                .parameter(Parameter::optional("uppercase", DataType::boolean()).with_default(false)),
        )
        .operation(
            OperationDescriptor::new("format", ReturnType::Value, unit_factory(format))
                .describe("Apply the formatter to a value")
                .parameter(Parameter::optional("value", DataType::string()).with_default("#[payload]")),
        )
        .operation(
            OperationDescriptor::new("concat", ReturnType::Value, unit_factory(concat))
                .describe("Join parts with a separator")
                .parameter(Parameter::required("parts", DataType::array()))
                .parameter(Parameter::optional("separator", DataType::string()).with_default("")),
        )
        .operation(
            OperationDescriptor::new("set-variable", ReturnType::Void, unit_factory(set_variable))
                .describe("Store a value in a flow variable")
                .parameter(Parameter::required("name", DataType::string()))
                .parameter(Parameter::required("value", DataType::object())),
        )
        .operation(
            OperationDescriptor::new("length", ReturnType::Value, unit_factory(length))
                .describe("Length of a string, array or map")
                .parameter(Parameter::optional("value", DataType::object()).with_default("#[payload]")),
        )
        .operation(
            OperationDescriptor::new("tag", ReturnType::Body, unit_factory(tag))
                .describe("Set an outbound property")
                .parameter(Parameter::required("name", DataType::string()))
                .parameter(Parameter::required("value", DataType::object())),
        )
}

fn format(call: OperationCall<'_>) -> Result<Output> {
    let formatter = call.config::<Formatter>()?;
    Ok(Output::Value(json!(formatter.apply(&text(call.argument(0))))))
}

fn concat(call: OperationCall<'_>) -> Result<Output> {
    let separator = text(call.argument(1));
    let parts: Vec<String> = match call.argument(0) {
        Value::Array(items) => items.iter().map(text).collect(),
        Value::Null => Vec::new(),
        other => vec![text(other)],
    };
    Ok(Output::Value(json!(parts.join(&separator))))
}

fn set_variable(mut call: OperationCall<'_>) -> Result<Output> {
    let name: String = call.arg(0)?;
    let value = call.argument(1).clone();
    call.message_mut().set_flow_var(name, value);
    Ok(Output::None)
}

fn length(call: OperationCall<'_>) -> Result<Output> {
    let len = match call.argument(0) {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => other.to_string().chars().count(),
    };
    Ok(Output::Value(json!(len)))
}

fn tag(mut call: OperationCall<'_>) -> Result<Output> {
    let name: String = call.arg(0)?;
    let value = call.argument(1).clone();
    let message = call.message_mut();
    message.set_property(PropertyScope::Outbound, name, value);
    Ok(Output::Body(message.body().clone()))
}

/// Text rendering of a value: strings verbatim, null empty, the rest as JSON
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
