//! `download-config` command.

use super::{run_filepaths, RunArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use detprep_training::download::base_config_url;
use detprep_training::{download_base_config, PrepConfig, ScriptFetcher};

pub fn execute(config: &PrepConfig, run: &RunArgs) -> Result<()> {
    let filepaths = run_filepaths(config, run)?;
    let fetcher = ScriptFetcher::new(config.download_script.clone());

    download_base_config(&fetcher, &config.config_url_base, &filepaths)
        .context("Failed to download base training configuration")?;

    println!(
        "{} {}",
        "Downloaded:".green(),
        base_config_url(&config.config_url_base, &filepaths).dimmed()
    );
    Ok(())
}
