use crate::base_models::BaseModelCatalog;
use crate::config::PipelineFilePolicy;
use crate::error::{PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the renamed pipeline config under `PipelineFilePolicy::DownloadedConfig`.
pub const DOWNLOADED_PIPELINE_FILE: &str = "pipeline_file.config";
/// TFRecord filename written inside each export directory.
pub const RECORD_FILE_NAME: &str = "tf.records";
pub const LABEL_MAP_FILE_NAME: &str = "label_map.pbtxt";

/// Every path a training run reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilepathSet {
    pub train_record_file: PathBuf,
    pub val_record_file: PathBuf,
    pub train_export_dir: PathBuf,
    pub val_export_dir: PathBuf,
    pub model_export_dir: PathBuf,
    pub label_map_file: PathBuf,
    pub model_dir: PathBuf,
    pub pretrained_checkpoint: PathBuf,
    pub pipeline_file: PathBuf,
    pub fine_tune_checkpoint: PathBuf,
    pub base_pipeline_file: String,
}

impl FilepathSet {
    /// Paths owned by the run itself (all live under a `training_name` directory).
    #[must_use]
    pub fn run_scoped_paths(&self) -> [&Path; 7] {
        [
            &self.train_record_file,
            &self.val_record_file,
            &self.train_export_dir,
            &self.val_export_dir,
            &self.model_export_dir,
            &self.label_map_file,
            &self.model_dir,
        ]
    }
}

/// Filesystem layout for training runs.
///
/// Dataset exports, model exports and training working directories each live
/// under their own root, suffixed by the training name:
/// `<root>/<training_name>/...`
#[derive(Debug, Clone)]
pub struct TrainingLayout {
    dataset_export_root: PathBuf,
    model_export_root: PathBuf,
    training_root: PathBuf,
    deploy_dir: PathBuf,
    pipeline_policy: PipelineFilePolicy,
}

impl TrainingLayout {
    #[must_use]
    pub fn new(
        dataset_export_root: PathBuf,
        model_export_root: PathBuf,
        training_root: PathBuf,
        deploy_dir: PathBuf,
    ) -> Self {
        Self {
            dataset_export_root,
            model_export_root,
            training_root,
            deploy_dir,
            pipeline_policy: PipelineFilePolicy::default(),
        }
    }

    /// Create a layout with all roots under one base directory.
    #[must_use]
    pub fn for_base_dir(base: &Path) -> Self {
        Self::new(
            base.join("dataset-export"),
            base.join("model-export"),
            base.join("training"),
            base.join("models").join("research").join("deploy"),
        )
    }

    #[must_use]
    pub fn with_pipeline_policy(mut self, policy: PipelineFilePolicy) -> Self {
        self.pipeline_policy = policy;
        self
    }

    #[must_use]
    pub fn pipeline_policy(&self) -> PipelineFilePolicy {
        self.pipeline_policy
    }

    /// Root of the dataset export for a run. Its existence marks the name as taken.
    #[must_use]
    pub fn run_export_dir(&self, training_name: &str) -> PathBuf {
        self.dataset_export_root.join(training_name)
    }

    /// Compute every path for `training_name` fine-tuned from `chosen_model`.
    pub fn build_filepaths(
        &self,
        base_models: &BaseModelCatalog,
        training_name: &str,
        chosen_model: &str,
    ) -> PrepResult<FilepathSet> {
        validate_training_name(training_name)?;
        let model = base_models.get(chosen_model)?;

        let export_dir = self.run_export_dir(training_name);
        let train_export_dir = export_dir.join("train");
        let val_export_dir = export_dir.join("val");

        let pipeline_file = match self.pipeline_policy {
            PipelineFilePolicy::BasePipeline => self.deploy_dir.join(&model.base_pipeline_file),
            PipelineFilePolicy::DownloadedConfig => self.deploy_dir.join(DOWNLOADED_PIPELINE_FILE),
        };

        Ok(FilepathSet {
            train_record_file: train_export_dir.join(RECORD_FILE_NAME),
            val_record_file: val_export_dir.join(RECORD_FILE_NAME),
            train_export_dir,
            val_export_dir,
            model_export_dir: self.model_export_root.join(training_name),
            label_map_file: export_dir.join(LABEL_MAP_FILE_NAME),
            model_dir: self.training_root.join(training_name),
            pretrained_checkpoint: PathBuf::from(&model.pretrained_checkpoint),
            pipeline_file,
            fine_tune_checkpoint: self.deploy_dir.join(&model.model_name).join("checkpoint").join("ckpt-0"),
            base_pipeline_file: model.base_pipeline_file.clone(),
        })
    }
}

/// A training name must be a single, ordinary path component.
pub fn validate_training_name(training_name: &str) -> PrepResult<()> {
    let trimmed = training_name.trim();
    if trimmed.is_empty() {
        return Err(PrepError::Config("training name is required".to_string()));
    }
    if trimmed != training_name {
        return Err(PrepError::Config(format!(
            "training name must not have surrounding whitespace: '{training_name}'"
        )));
    }
    if training_name == "." || training_name == ".." || training_name.contains(['/', '\\']) {
        return Err(PrepError::Config(format!(
            "training name must be a single directory name: '{training_name}'"
        )));
    }
    Ok(())
}
