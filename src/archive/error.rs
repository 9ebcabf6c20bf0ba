use crate::util::tool::ToolError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    ToolError(#[from] ToolError),

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Could not move finished output to {path}: {source}")]
    PersistError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
