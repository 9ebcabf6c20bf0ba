use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenameError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Cannot rename {from} to {target}: target already exists or is claimed by another file")]
    Collision { from: PathBuf, target: PathBuf },

    #[error("{0} references more than one file, consolidate it before tagging")]
    MultiFileCue(PathBuf),

    #[error("{0} has no usable file name")]
    NoFileName(PathBuf),

    #[error("Could not replace {path}: {source}")]
    PersistError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RenameResult<T> = Result<T, RenameError>;
