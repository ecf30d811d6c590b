use burn::record::RecorderError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("invalid arguments: {0}")]
    Args(#[from] pico_args::Error),
    #[error(transparent)]
    Unet(#[from] burn_unet::error::Error),
    #[error("failed to load the config {path:?}: {source}")]
    ConfigFile {
        path: PathBuf,
        source: burn::config::ConfigError,
    },
    #[error("recorder error: {0:?}")]
    Recorder(RecorderError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0:?} not found, run the training first")]
    MissingArtifact(PathBuf),
    #[error("dataset error: {0}")]
    Dataset(String),
}

impl From<RecorderError> for DemoError {
    fn from(err: RecorderError) -> Self {
        DemoError::Recorder(err)
    }
}

pub type Result<T, E = DemoError> = std::result::Result<T, E>;
