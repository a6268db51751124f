//! `models` command.

use crate::config::load_catalog;
use anyhow::Result;
use colored::Colorize;
use detprep_training::PrepConfig;

pub fn execute(config: &PrepConfig, json_output: bool) -> Result<()> {
    let catalog = load_catalog(config)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Base Models ({})", catalog.len()).bold().cyan());
    println!();

    if catalog.is_empty() {
        println!("  {}", format!("No models in {}", config.base_models_file.display()).dimmed());
        return Ok(());
    }

    println!("{:<24} {:<44} {}", "Key", "Model", "Pipeline");
    println!("{}", "─".repeat(110));
    for (key, meta) in catalog.iter() {
        println!("{:<24} {:<44} {}", key.cyan(), meta.model_name, meta.base_pipeline_file.dimmed());
    }
    println!();
    Ok(())
}
