//! CLI configuration loading.

use anyhow::{Context, Result};
use detprep_training::{BaseModelCatalog, PrepConfig};
use std::path::Path;

/// Load and merge preparation configuration.
///
/// Configuration precedence:
/// 1. Environment variables (`DETPREP_*`)
/// 2. Explicit config file (`--config`)
/// 3. Local config file (./detprep.toml)
/// 4. Global config file (~/.detprep/config.toml)
/// 5. Defaults
pub fn load_config(explicit: Option<&Path>) -> Result<PrepConfig> {
    PrepConfig::discover_and_load(explicit).context("Failed to load configuration")
}

/// Load the base model catalog named by the configuration.
pub fn load_catalog(config: &PrepConfig) -> Result<BaseModelCatalog> {
    BaseModelCatalog::load_from_file(&config.base_models_file)
        .with_context(|| format!("Failed to load base models from {}", config.base_models_file.display()))
}
