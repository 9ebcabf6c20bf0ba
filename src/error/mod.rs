use crate::archive::error::ArchiveError;
use crate::cd::error::CdError;
use crate::consolidate::error::{ConsolidationError, MergeError};
use crate::cue::error::CueError;
use crate::iso9660::error::IsoError;
use crate::product_code::error::ProductCodeError;
use crate::rename::error::RenameError;
use crate::util::tool::ToolError;
use std::path::PathBuf;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscShelfError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CdError(#[from] CdError),

    #[error(transparent)]
    CueError(#[from] CueError),

    #[error(transparent)]
    ConsolidationError(#[from] ConsolidationError),

    #[error(transparent)]
    MergeError(#[from] MergeError),

    #[error(transparent)]
    IsoError(#[from] IsoError),

    #[error(transparent)]
    ProductCodeError(#[from] ProductCodeError),

    #[error(transparent)]
    RenameError(#[from] RenameError),

    #[error(transparent)]
    ArchiveError(#[from] ArchiveError),

    #[error(transparent)]
    ToolError(#[from] ToolError),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub type DiscShelfResult<T> = result::Result<T, DiscShelfError>;
