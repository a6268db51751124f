use thiserror::Error;

pub type PrepResult<T> = std::result::Result<T, PrepError>;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("training run already exists: {0}")]
    DuplicateRun(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("label map error: {0}")]
    LabelMap(String),

    #[error("download error: {0}")]
    Download(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
