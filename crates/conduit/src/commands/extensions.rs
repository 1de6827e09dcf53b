//! Extensions command: list what the runtime can wire.

use anyhow::Result;
use colored::Colorize;
use conduit_core::extension::{ComponentSummary, ExtensionSummary};

use super::runtime;
use crate::config::Config;

pub async fn execute(json: bool, config: &Config) -> Result<()> {
    let conduit = runtime(&config.runtime).await?;
    let summaries: Vec<ExtensionSummary> = conduit
        .extensions()
        .extensions()
        .await
        .iter()
        .map(|e| e.summary())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("{}", "No extensions registered.".yellow());
        return Ok(());
    }

    println!("{}", "Extensions".bold());
    println!("{}", "═".repeat(60));

    for extension in &summaries {
        println!(
            "{} {} {}",
            "●".green(),
            extension.name.bold(),
            format!("v{}", extension.version).dimmed()
        );
        if let Some(desc) = &extension.description {
            println!("  {}", desc);
        }

        println!("  {}", "Configurations:".cyan());
        for configuration in &extension.configurations {
            print_component(configuration);
        }

        println!("  {}", "Operations:".cyan());
        for operation in &extension.operations {
            print_component(operation);
        }
        println!();
    }

    Ok(())
}

fn print_component(component: &ComponentSummary) {
    let returns = component
        .returns
        .map(|r| format!(" -> {}", r))
        .unwrap_or_default();
    println!("    {}{}", component.name.bold(), returns.dimmed());
    if let Some(desc) = &component.description {
        println!("      {}", desc.dimmed());
    }

    for parameter in &component.parameters {
        let requirement = match (&parameter.default, parameter.required) {
            (Some(default), _) => format!("default {}", default),
            (None, true) => "required".to_string(),
            (None, false) => "optional".to_string(),
        };
        println!(
            "      - {}: {} {}",
            parameter.name,
            parameter.data_type,
            format!("({})", requirement).dimmed()
        );
    }
}
