//! `train` and `paths` commands.

use super::{run_filepaths, RunArgs};
use crate::config::load_catalog;
use anyhow::Result;
use colored::Colorize;
use detprep_training::{train_detection_model, FilepathSet, PrepConfig, PrepError};

pub fn execute(config: &PrepConfig, run: &RunArgs, json_output: bool) -> Result<()> {
    let catalog = load_catalog(config)?;

    let filepaths = match train_detection_model(config, &catalog, &run.training_name, &run.model) {
        Ok(filepaths) => filepaths,
        Err(PrepError::DuplicateRun(msg)) => {
            tracing::error!("Training run already exists: {}", msg);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&filepaths)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Training run '{}' ready", run.training_name).bold().green());
    print_filepaths(&filepaths);
    println!();
    println!(
        "  {}",
        format!(
            "Next: detprep export {} {} --dataset <name> --label-field <field>",
            run.training_name, run.model
        )
        .dimmed()
    );
    println!();
    Ok(())
}

pub fn paths(config: &PrepConfig, run: &RunArgs, json_output: bool) -> Result<()> {
    let filepaths = run_filepaths(config, run)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&filepaths)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Paths for '{}'", run.training_name).bold().cyan());
    print_filepaths(&filepaths);
    println!();
    Ok(())
}

fn print_filepaths(paths: &FilepathSet) {
    let rows = [
        ("train_record_file", paths.train_record_file.display().to_string()),
        ("val_record_file", paths.val_record_file.display().to_string()),
        ("train_export_dir", paths.train_export_dir.display().to_string()),
        ("val_export_dir", paths.val_export_dir.display().to_string()),
        ("model_export_dir", paths.model_export_dir.display().to_string()),
        ("label_map_file", paths.label_map_file.display().to_string()),
        ("model_dir", paths.model_dir.display().to_string()),
        ("pretrained_checkpoint", paths.pretrained_checkpoint.display().to_string()),
        ("pipeline_file", paths.pipeline_file.display().to_string()),
        ("fine_tune_checkpoint", paths.fine_tune_checkpoint.display().to_string()),
        ("base_pipeline_file", paths.base_pipeline_file.clone()),
    ];
    println!("{}", "─".repeat(90));
    for (name, value) in rows {
        println!("  {:<24} {}", name.cyan(), value.dimmed());
    }
}
