use crate::cue::error::CueError;
use crate::iso9660::error::IsoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProductCodeError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    IsoError(#[from] IsoError),

    #[error(transparent)]
    CueError(#[from] CueError),

    #[error("Not a product code: {0:?}")]
    InvalidCode(String),

    #[error("SYSTEM.CNF has no BOOT or BOOT2 line")]
    MissingBootLine,

    #[error("No product code found in {0}")]
    CodeNotFound(String),
}

pub type ProductCodeResult<T> = Result<T, ProductCodeError>;
