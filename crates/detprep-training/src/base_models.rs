use crate::error::{PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default catalog filename, resolved against the working directory.
pub const DEFAULT_BASE_MODELS_FILE: &str = "base_models.json";

/// A pre-trained model usable as the starting point for fine-tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModelMetadata {
    /// Pipeline config filename in the upstream `configs/tf2/` directory.
    pub base_pipeline_file: String,
    /// Directory name of the extracted model under the deploy directory.
    pub model_name: String,
    pub pretrained_checkpoint: String,
}

/// Model key -> metadata, as stored in `base_models.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseModelCatalog {
    models: BTreeMap<String, BaseModelMetadata>,
}

impl BaseModelCatalog {
    #[must_use]
    pub fn new(models: BTreeMap<String, BaseModelMetadata>) -> Self {
        Self { models }
    }

    pub fn load_from_file(path: &Path) -> PrepResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PrepError::Config(format!("failed to read base models file {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
            .map_err(|e| PrepError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(contents: &str) -> PrepResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Look up a model key. Unknown keys are a configuration error listing what is available.
    pub fn get(&self, key: &str) -> PrepResult<&BaseModelMetadata> {
        self.models.get(key).ok_or_else(|| {
            PrepError::Config(format!(
                "unknown base model '{}' (available: {})",
                key,
                self.keys().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BaseModelMetadata)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
