use std::path::PathBuf;

use sessionlab_core::ConfigError;
use thiserror::Error;

/// Errors from the runner's file and config layer.
///
/// Evaluation itself never fails; these cover loading and saving the
/// inputs and state around it.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid runner config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    TomlRender(#[from] toml::ser::Error),

    #[error("invalid state file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no assets configured")]
    NoAssets,

    #[error("no sessions configured")]
    NoSessions,

    #[error("state is locked by another run: {path} (remove it if no run is active)")]
    StateLocked { path: PathBuf },
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
