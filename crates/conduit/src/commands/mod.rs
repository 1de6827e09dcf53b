//! Command implementations for conduit CLI.

pub mod convert;
pub mod extensions;
pub mod run;

use conduit_core::{Conduit, RuntimeConfig};
use serde_json::Value;

use crate::builtin;

/// Create a runtime with the built-in extensions registered
pub async fn runtime(config: &RuntimeConfig) -> anyhow::Result<Conduit> {
    let conduit = Conduit::new(config.clone())?;
    builtin::register(&conduit).await?;
    Ok(conduit)
}

/// Parse command-line input as JSON, falling back to a plain string
pub fn parse_value(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}
