use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load table {table} from {}: {kind}", .path.display())]
    Load {
        table: String,
        path: PathBuf,
        kind: LoadFailureKind,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

/// Why a table could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadFailureKind {
    #[error("file not found")]
    NotFound,

    #[error("malformed structure: {0}")]
    Malformed(String),

    #[error("empty content")]
    Empty,

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    pub fn load(table: &str, path: &Path, kind: LoadFailureKind) -> Self {
        PipelineError::Load {
            table: table.to_string(),
            path: path.to_path_buf(),
            kind,
        }
    }

    /// The load failure kind, if this is a load failure.
    pub fn load_kind(&self) -> Option<&LoadFailureKind> {
        match self {
            PipelineError::Load { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
