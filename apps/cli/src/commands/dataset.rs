//! Dataset export and label map commands.

use super::{run_filepaths, RunArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use detprep_training::{
    count_classes as count_label_map_classes, create_mapping, load_label_map, save_mapping_to_file,
    split_and_export, JsonlDatasetStore, PrepConfig, TfObjectDetectionExporter,
};

pub fn export(
    config: &PrepConfig,
    run: &RunArgs,
    dataset: &str,
    label_field: &str,
    training_fraction: f64,
    use_label_map: bool,
) -> Result<()> {
    let filepaths = run_filepaths(config, run)?;
    let store = JsonlDatasetStore::new(config.datasets_root.clone());

    let exporter = if use_label_map {
        let label_map = load_label_map(&filepaths.label_map_file)
            .context("Failed to load label map. Run `detprep label-map --save` first.")?;
        TfObjectDetectionExporter::with_label_map(label_map)
    } else {
        TfObjectDetectionExporter::new()
    };

    let summary = split_and_export(&store, &exporter, dataset, &filepaths, label_field, training_fraction)
        .with_context(|| format!("Failed to export dataset '{dataset}'"))?;

    println!();
    println!("{}", format!("Exported '{}'", dataset).bold().green());
    println!(
        "  Validation: {} samples, {} objects -> {}",
        summary.val.samples.to_string().cyan(),
        summary.val.objects,
        summary.val.record_file.display().to_string().dimmed()
    );
    println!(
        "  Training:   {} samples, {} objects -> {}",
        summary.train.samples.to_string().cyan(),
        summary.train.objects,
        summary.train.record_file.display().to_string().dimmed()
    );
    if summary.plan.dropped() > 0 {
        println!("  {}", format!("Left out: {} sample(s)", summary.plan.dropped()).yellow());
    }
    println!();
    Ok(())
}

pub fn label_map(config: &PrepConfig, run: &RunArgs, dataset: &str, label_field: &str, save: bool) -> Result<()> {
    let store = JsonlDatasetStore::new(config.datasets_root.clone());
    let mapping = create_mapping(&store, dataset, label_field)
        .with_context(|| format!("Failed to build label map for '{dataset}'"))?;

    if save {
        let filepaths = run_filepaths(config, run)?;
        save_mapping_to_file(&mapping, &filepaths)
            .with_context(|| format!("Failed to save label map to {}", filepaths.label_map_file.display()))?;
        println!("{} {}", "Saved label map:".green(), filepaths.label_map_file.display());
        return Ok(());
    }

    print!("{mapping}");
    Ok(())
}

pub fn count_classes(config: &PrepConfig, run: &RunArgs) -> Result<()> {
    let filepaths = run_filepaths(config, run)?;
    let num_classes = count_label_map_classes(&filepaths)
        .with_context(|| format!("Failed to read label map {}", filepaths.label_map_file.display()))?;
    println!("{num_classes}");
    Ok(())
}
