use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdError {
    #[error("{bytes} bytes is not a multiple of the {sector_size} byte sector size")]
    Alignment { bytes: u64, sector_size: u64 },

    #[error("Invalid MSF timecode: {0}")]
    InvalidTimecode(String),

    #[error("Raw sector is missing the CD sync pattern")]
    MissingSync,

    #[error("Unsupported raw sector mode byte: {0:#04x}")]
    UnsupportedSectorMode(u8),

    #[error("Raw sector is too short: expected {expected} bytes, got {actual}")]
    ShortSector { expected: usize, actual: usize },

    #[error(transparent)]
    BinRWError(#[from] binrw::Error),
}

pub type CdResult<T> = Result<T, CdError>;
