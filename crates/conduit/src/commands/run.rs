//! Run command: process one message through a flow.

use anyhow::{Context, Result};
use colored::Colorize;
use conduit_core::{Conduit, Lifecycle, Message, MessageProcessor, Pipeline, ProcessingError, PropertyScope};
use serde_json::Value;

use super::{parse_value, runtime};
use crate::cli::RunCommand;
use crate::config::Config;
use crate::error::FlowError;
use crate::flow::FlowDefinition;

pub async fn execute(cmd: RunCommand, config: &Config) -> Result<()> {
    let path = cmd
        .flow
        .or_else(|| config.default_flow.clone())
        .context("No flow file given and no default_flow configured")?;

    let flow = FlowDefinition::load(&path)?;
    let conduit = runtime(&config.runtime).await?;
    let pipeline = flow.wire(&conduit).await?;

    let message = build_message(cmd.payload.as_deref(), &cmd.vars)?;

    let result = match process_once(&conduit, &pipeline, message).await? {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(operation = %e.operation, message_id = %e.message.id, "Flow failed");
            return Err(e).context(format!("Flow {} failed", pipeline.name()));
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_message(&result);
    Ok(())
}

/// Start the runtime and pipeline, process one message, and shut both down
///
/// Both are disposed even when starting or stopping fails; the first
/// lifecycle failure is returned after that.
async fn process_once(
    conduit: &Conduit,
    pipeline: &Pipeline,
    message: Message,
) -> Result<std::result::Result<Message, ProcessingError>> {
    let outcome = match start(conduit, pipeline) {
        Ok(()) => {
            let processed = pipeline.process(message).await;
            let pipeline_stopped = pipeline.stop();
            let conduit_stopped = conduit.stop();
            pipeline_stopped.and(conduit_stopped).map(|()| processed)
        }
        Err(e) => Err(e),
    };

    let pipeline_disposed = pipeline.dispose();
    let conduit_disposed = conduit.dispose();

    let processed = outcome.context("Failed to run flow")?;
    pipeline_disposed
        .and(conduit_disposed)
        .context("Failed to shut down runtime")?;
    Ok(processed)
}

fn start(conduit: &Conduit, pipeline: &Pipeline) -> conduit_core::Result<()> {
    conduit.initialise()?;
    pipeline.initialise()?;
    conduit.start()?;
    pipeline.start()
}

fn build_message(payload: Option<&str>, vars: &[String]) -> Result<Message> {
    let mut message = Message::new(payload.map(parse_value).unwrap_or(Value::Null));
    for var in vars {
        let (name, value) = var
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| FlowError::InvalidVariable(var.clone()))?;
        message.set_flow_var(name, parse_value(value));
    }
    Ok(message)
}

fn print_message(message: &Message) {
    println!("{} {}", "Message".bold(), message.id.to_string().dimmed());
    println!("{}", "─".repeat(50));
    println!("  {} {}", "payload:".cyan(), message.payload());

    if !message.flow_vars.is_empty() {
        println!("  {}", "flow variables:".cyan());
        for (name, value) in &message.flow_vars {
            println!("    {} = {}", name, value);
        }
    }

    let outbound = message.body().scope(PropertyScope::Outbound);
    if !outbound.is_empty() {
        println!("  {}", "outbound properties:".cyan());
        for (name, value) in outbound {
            println!("    {} = {}", name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::runtime;
    use conduit_core::{ParameterValues, Phase, RuntimeConfig};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_process_once_shuts_down_after_success() {
        let conduit = runtime(&RuntimeConfig::default()).await.unwrap();
        conduit
            .extensions()
            .configure("text", "formatter", "plain", ParameterValues::new())
            .await
            .unwrap();
        let processor = Arc::new(
            conduit
                .extensions()
                .operation("text", "length", "plain", ParameterValues::new())
                .await
                .unwrap(),
        );
        let mut pipeline = Pipeline::new("count");
        pipeline.push(processor.clone());

        let result = process_once(&conduit, &pipeline, Message::new("four")).await.unwrap();
        assert_eq!(result.unwrap().payload(), &json!(4));
        assert_eq!(conduit.phase(), Phase::Disposed);
        assert_eq!(processor.resolvers().phase(), Phase::Disposed);
    }

    #[tokio::test]
    async fn test_process_once_disposes_when_start_fails() {
        let conduit = runtime(&RuntimeConfig::default()).await.unwrap();
        let processor = Arc::new(
            conduit
                .extensions()
                .operation("text", "length", "plain", ParameterValues::new())
                .await
                .unwrap(),
        );
        let mut pipeline = Pipeline::new("count");
        pipeline.push(processor.clone());

        // a runtime that is already initialised refuses a second initialise
        conduit.initialise().unwrap();
        assert!(process_once(&conduit, &pipeline, Message::new("four")).await.is_err());
        assert_eq!(conduit.phase(), Phase::Disposed);
        assert_eq!(processor.resolvers().phase(), Phase::Disposed);
    }

    #[test]
    fn test_build_message() {
        let message = build_message(Some("{\"n\": 1}"), &["a=1".into(), "b=text".into()]).unwrap();
        assert_eq!(message.payload(), &json!({ "n": 1 }));
        assert_eq!(message.flow_var("a"), Some(&json!(1)));
        assert_eq!(message.flow_var("b"), Some(&json!("text")));
    }

    #[test]
    fn test_build_message_rejects_bad_variable() {
        assert!(build_message(None, &["novalue".into()]).is_err());
        assert!(build_message(None, &["=1".into()]).is_err());
        assert_eq!(build_message(None, &[]).unwrap().payload(), &Value::Null);
    }
}
