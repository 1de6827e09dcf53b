//! Convert command: run a value through transformer resolution.

use anyhow::Result;
use colored::Colorize;
use conduit_core::{Conduit, DataType};

use super::parse_value;
use crate::config::Config;
use crate::error::FlowError;

pub fn execute(value: &str, to: &str, from: Option<&str>, config: &Config) -> Result<()> {
    let conduit = Conduit::new(config.runtime.clone())?;
    let value = parse_value(value);

    let target = data_type(to)?;
    let source = match from {
        Some(name) => data_type(name)?,
        None => DataType::of_value(&value),
    };

    let converter = if target.is_assignable_from(&source) {
        None
    } else {
        conduit.transformer().find_converter(&source, &target)
    };
    let converted = conduit.transformer().convert_from(value, &source, &target)?;

    println!("{}", converted);
    match converter {
        Some(converter) => eprintln!(
            "{} {} ({} -> {})",
            "converter:".dimmed(),
            converter.name(),
            converter.source(),
            converter.target()
        ),
        None => eprintln!("{}", format!("{} is already a {}", source, target).dimmed()),
    }
    Ok(())
}

fn data_type(name: &str) -> Result<DataType, FlowError> {
    DataType::builtin(name).ok_or_else(|| FlowError::UnknownType(name.to_string()))
}
