//! Preparation configuration.
//!
//! Every field has a default matching the container layout the training
//! images use (`/tf/...`). Values are layered as:
//! 1. Defaults
//! 2. Global config file (`~/.detprep/config.toml`)
//! 3. Local config file (`./detprep.toml`)
//! 4. Explicit config file (`--config <path>`)
//! 5. Environment variables (`DETPREP_*`)

use crate::base_models::DEFAULT_BASE_MODELS_FILE;
use crate::error::{PrepError, PrepResult};
use crate::layout::TrainingLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_URL_BASE: &str =
    "https://raw.githubusercontent.com/tensorflow/models/master/research/object_detection/configs/tf2/";
pub const DEFAULT_DOWNLOAD_SCRIPT: &str = "./install_base_training_config.sh";
pub const DEFAULT_TRAINING_FRACTION: f64 = 0.8;

/// Where the training pipeline config is expected to live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineFilePolicy {
    /// `<deploy_dir>/<base_pipeline_file>`: the upstream filename, unchanged.
    #[default]
    BasePipeline,
    /// `<deploy_dir>/pipeline_file.config`: the locally downloaded and renamed copy.
    DownloadedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepConfig {
    pub dataset_export_root: PathBuf,
    pub model_export_root: PathBuf,
    pub training_root: PathBuf,
    pub deploy_dir: PathBuf,
    pub base_models_file: PathBuf,
    pub datasets_root: PathBuf,
    pub pipeline_file_policy: PipelineFilePolicy,
    pub config_url_base: String,
    pub download_script: PathBuf,
    pub training_fraction: f64,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            dataset_export_root: PathBuf::from("/tf/dataset-export"),
            model_export_root: PathBuf::from("/tf/model-export"),
            training_root: PathBuf::from("/tf/training"),
            deploy_dir: PathBuf::from("/tf/models/research/deploy"),
            base_models_file: PathBuf::from(DEFAULT_BASE_MODELS_FILE),
            datasets_root: PathBuf::from("datasets"),
            pipeline_file_policy: PipelineFilePolicy::default(),
            config_url_base: DEFAULT_CONFIG_URL_BASE.to_string(),
            download_script: PathBuf::from(DEFAULT_DOWNLOAD_SCRIPT),
            training_fraction: DEFAULT_TRAINING_FRACTION,
        }
    }
}

/// A config file as written on disk: every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialPrepConfig {
    dataset_export_root: Option<PathBuf>,
    model_export_root: Option<PathBuf>,
    training_root: Option<PathBuf>,
    deploy_dir: Option<PathBuf>,
    base_models_file: Option<PathBuf>,
    datasets_root: Option<PathBuf>,
    pipeline_file_policy: Option<PipelineFilePolicy>,
    config_url_base: Option<String>,
    download_script: Option<PathBuf>,
    training_fraction: Option<f64>,
}

impl PrepConfig {
    /// Get default global configuration file path.
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".detprep").join("config.toml"))
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("detprep.toml")
    }

    /// Load a single config file layered over the defaults.
    pub fn load_from_file(path: &Path) -> PrepResult<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        Ok(config)
    }

    /// Discover and load configuration.
    ///
    /// Discovered global/local files that are missing or unparsable are skipped.
    /// An explicit path must exist and parse.
    pub fn discover_and_load(explicit: Option<&Path>) -> PrepResult<Self> {
        Self::discover_and_load_from(
            Self::default_global_path().as_deref(),
            &Self::default_local_path(),
            explicit,
            |key| std::env::var(key).ok(),
        )
    }

    /// Layer `global`, `local`, `explicit` and then `lookup`'s `DETPREP_*` values over the defaults.
    pub fn discover_and_load_from<F>(
        global: Option<&Path>,
        local: &Path,
        explicit: Option<&Path>,
        lookup: F,
    ) -> PrepResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for path in global.into_iter().chain(std::iter::once(local)) {
            if !path.exists() {
                continue;
            }
            if let Err(e) = config.merge_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable config file");
            }
        }

        if let Some(path) = explicit {
            config.merge_file(path)?;
        }

        config.apply_env_with(lookup);
        config.validate()?;
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> PrepResult<()> {
        if !path.exists() {
            return Err(PrepError::Config(format!("config file not found: {}", path.display())));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrepError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let partial: PartialPrepConfig = toml::from_str(&content)
            .map_err(|e| PrepError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        self.merge(partial);
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(())
    }

    fn merge(&mut self, other: PartialPrepConfig) {
        if let Some(v) = other.dataset_export_root {
            self.dataset_export_root = v;
        }
        if let Some(v) = other.model_export_root {
            self.model_export_root = v;
        }
        if let Some(v) = other.training_root {
            self.training_root = v;
        }
        if let Some(v) = other.deploy_dir {
            self.deploy_dir = v;
        }
        if let Some(v) = other.base_models_file {
            self.base_models_file = v;
        }
        if let Some(v) = other.datasets_root {
            self.datasets_root = v;
        }
        if let Some(v) = other.pipeline_file_policy {
            self.pipeline_file_policy = v;
        }
        if let Some(v) = other.config_url_base {
            self.config_url_base = v;
        }
        if let Some(v) = other.download_script {
            self.download_script = v;
        }
        if let Some(v) = other.training_fraction {
            self.training_fraction = v;
        }
    }

    /// Apply `DETPREP_*` path overrides using the given variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut PathBuf); 7] = [
            ("DETPREP_DATASET_EXPORT_ROOT", &mut self.dataset_export_root),
            ("DETPREP_MODEL_EXPORT_ROOT", &mut self.model_export_root),
            ("DETPREP_TRAINING_ROOT", &mut self.training_root),
            ("DETPREP_DEPLOY_DIR", &mut self.deploy_dir),
            ("DETPREP_BASE_MODELS", &mut self.base_models_file),
            ("DETPREP_DATASETS_ROOT", &mut self.datasets_root),
            ("DETPREP_DOWNLOAD_SCRIPT", &mut self.download_script),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *field = PathBuf::from(value);
            }
        }
    }

    pub fn validate(&self) -> PrepResult<()> {
        validate_training_fraction(self.training_fraction)?;
        if self.config_url_base.trim().is_empty() {
            return Err(PrepError::Config("config_url_base must not be empty".to_string()));
        }
        Ok(())
    }

    /// The per-run filesystem layout for the configured roots.
    #[must_use]
    pub fn layout(&self) -> TrainingLayout {
        TrainingLayout::new(
            self.dataset_export_root.clone(),
            self.model_export_root.clone(),
            self.training_root.clone(),
            self.deploy_dir.clone(),
        )
        .with_pipeline_policy(self.pipeline_file_policy)
    }
}

pub fn validate_training_fraction(fraction: f64) -> PrepResult<()> {
    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
        return Err(PrepError::Config(format!("training fraction must be within [0, 1], got {fraction}")));
    }
    Ok(())
}
