//! Detprep Training
//!
//! Preparation primitives for fine-tuning a TensorFlow object-detection model:
//! - Selecting a base model from a catalog (`BaseModelCatalog`)
//! - Computing the per-run filesystem layout (`TrainingLayout`, `FilepathSet`)
//! - Splitting a tagged dataset and exporting it as TFRecords (`split_and_export`)
//! - Building, saving and reading label maps (`create_mapping`, `count_classes`)
//! - Downloading the base pipeline config (`download_base_config`)

pub mod base_models;
pub mod config;
pub mod dataset;
pub mod download;
pub mod driver;
pub mod error;
pub mod export;
pub mod label_map;
pub mod layout;
pub mod split;
pub mod tfrecord;

pub use base_models::{BaseModelCatalog, BaseModelMetadata};
pub use config::{PipelineFilePolicy, PrepConfig};
pub use dataset::{
    read_jsonl_dataset, write_jsonl_dataset, Dataset, DatasetStore, DatasetView, Detection, Detections, ImageMetadata,
    JsonlDatasetStore, Sample, TRAINING_TAG,
};
pub use download::{download_base_config, ConfigFetcher, ScriptFetcher};
pub use driver::train_detection_model;
pub use error::{PrepError, PrepResult};
pub use export::{DatasetExporter, ExportSummary, TfObjectDetectionExporter};
pub use label_map::{
    collect_class_names, count_classes, create_mapping, load_label_map, save_mapping_to_file, ClassNameList,
    LabelMap, LabelMapItem,
};
pub use layout::{FilepathSet, TrainingLayout};
pub use split::{split_and_export, SplitPlan, SplitSummary};
