use crate::base_models::BaseModelCatalog;
use crate::config::PrepConfig;
use crate::error::{PrepError, PrepResult};
use crate::layout::{FilepathSet, validate_training_name};

/// Validate a new training run and compute its paths.
///
/// Fails before touching the filesystem if the name is invalid, the model is
/// unknown, or a dataset export for `training_name` already exists. The check
/// is not a lock: two concurrent runs with the same name can both pass it.
///
/// Exporting, label mapping and config download are separate steps; this does
/// not run them.
// TODO: decide how an interrupted run with an existing export directory should resume.
pub fn train_detection_model(
    config: &PrepConfig,
    base_models: &BaseModelCatalog,
    training_name: &str,
    chosen_model: &str,
) -> PrepResult<FilepathSet> {
    validate_training_name(training_name)?;
    base_models.get(chosen_model)?;

    let layout = config.layout();
    let run_dir = layout.run_export_dir(training_name);
    if run_dir.is_dir() {
        return Err(PrepError::DuplicateRun(format!(
            "'{}' already has an export directory at {}; use a unique training name",
            training_name,
            run_dir.display()
        )));
    }

    let filepaths = layout.build_filepaths(base_models, training_name, chosen_model)?;
    tracing::info!(training_name, chosen_model, "Prepared training run paths");
    Ok(filepaths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_models::BaseModelMetadata;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(base: &Path) -> PrepConfig {
        PrepConfig {
            dataset_export_root: base.join("dataset-export"),
            model_export_root: base.join("model-export"),
            training_root: base.join("training"),
            deploy_dir: base.join("deploy"),
            ..PrepConfig::default()
        }
    }

    fn catalog() -> BaseModelCatalog {
        BaseModelCatalog::new(BTreeMap::from([(
            "ssd".to_string(),
            BaseModelMetadata {
                base_pipeline_file: "ssd.config".to_string(),
                model_name: "ssd".to_string(),
                pretrained_checkpoint: "ssd.tar.gz".to_string(),
            },
        )]))
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_new_run_returns_paths_without_writing() {
        let temp = TempDir::new().unwrap();
        let cfg = config(temp.path());

        let paths = train_detection_model(&cfg, &catalog(), "birds", "ssd").unwrap();
        assert_eq!(paths.label_map_file, temp.path().join("dataset-export/birds/label_map.pbtxt"));
        assert_eq!(entries(temp.path()), 0);
    }

    #[test]
    fn test_duplicate_run_fails_before_any_write() {
        let temp = TempDir::new().unwrap();
        let cfg = config(temp.path());
        std::fs::create_dir_all(temp.path().join("dataset-export/birds")).unwrap();

        let err = train_detection_model(&cfg, &catalog(), "birds", "ssd").unwrap_err();
        assert!(matches!(err, PrepError::DuplicateRun(_)));
        assert_eq!(entries(&temp.path().join("dataset-export/birds")), 0);
        assert_eq!(entries(temp.path()), 1);

        assert!(train_detection_model(&cfg, &catalog(), "birds-2", "ssd").is_ok());
    }

    #[test]
    fn test_unknown_model_checked_before_duplicate() {
        let temp = TempDir::new().unwrap();
        let cfg = config(temp.path());
        std::fs::create_dir_all(temp.path().join("dataset-export/birds")).unwrap();

        let err = train_detection_model(&cfg, &catalog(), "birds", "yolo").unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
    }

    #[test]
    fn test_invalid_name_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = train_detection_model(&config(temp.path()), &catalog(), "../birds", "ssd").unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
    }
}
