use crate::cd::error::CdError;
use crate::cue::error::CueError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsoError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CueError(#[from] CueError),

    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    #[error("No such file on disc: {path}")]
    NotFound { path: String },

    #[error("Unreadable sector {lba}: {reason}")]
    ReadError { lba: u64, reason: String },

    #[error("{0} has no data track")]
    NoDataTrack(PathBuf),
}

impl IsoError {
    pub fn read(lba: u64, reason: impl Into<String>) -> Self {
        IsoError::ReadError {
            lba,
            reason: reason.into(),
        }
    }

    pub(crate) fn from_cd(lba: u64, error: CdError) -> Self {
        IsoError::read(lba, error.to_string())
    }
}

pub type IsoResult<T> = Result<T, IsoError>;
