//! CLI command implementations.

pub mod dataset;
pub mod download;
pub mod models;
pub mod train;

use crate::config::load_catalog;
use anyhow::{Context, Result};
use clap::Args;
use detprep_training::{FilepathSet, PrepConfig};

/// Identifies a training run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Unique name for this training run
    pub training_name: String,

    /// Base model key from the catalog
    pub model: String,
}

/// Paths for `run`, computed without the duplicate-run check.
pub fn run_filepaths(config: &PrepConfig, run: &RunArgs) -> Result<FilepathSet> {
    let catalog = load_catalog(config)?;
    config
        .layout()
        .build_filepaths(&catalog, &run.training_name, &run.model)
        .with_context(|| format!("Failed to compute paths for '{}'", run.training_name))
}
