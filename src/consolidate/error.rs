use crate::archive::error::ArchiveError;
use crate::cd::error::CdError;
use crate::cue::error::CueError;
use crate::cue::models::FileType;
use crate::rename::error::RenameError;
use crate::util::tool::ToolError;
use std::path::PathBuf;
use thiserror::Error;

/// Highest track number a CUE sheet can carry.
pub const MAX_TRACKS: usize = 99;

/// The sheet cannot be laid out as a single file.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("\"{file}\" is a {file_type} file, only BINARY sources can be merged")]
    UnsupportedFileType { file: String, file_type: FileType },

    #[error("Size of source file \"{file}\" is unknown")]
    MissingSourceSize { file: String },

    #[error("Tracks {first} and {second} overlap in \"{file}\"")]
    Overlap { file: String, first: u8, second: u8 },

    #[error("Track {track} lies outside of \"{file}\" ({size} bytes)")]
    SegmentOutOfBounds { file: String, track: u8, size: u64 },

    #[error("{0} tracks do not fit on one disc, a CUE sheet holds at most {MAX_TRACKS}")]
    TooManyTracks(usize),

    #[error("Track {track} has INDEX 00 after INDEX 01")]
    IndexOrder { track: u8 },

    #[error("Track {track}: {source}")]
    Alignment {
        track: u8,
        #[source]
        source: CdError,
    },
}

pub type ConsolidationResult<T> = Result<T, ConsolidationError>;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CueError(#[from] CueError),

    #[error(transparent)]
    ConsolidationError(#[from] ConsolidationError),

    #[error(transparent)]
    ToolError(#[from] ToolError),

    #[error(transparent)]
    ArchiveError(#[from] ArchiveError),

    #[error(transparent)]
    RenameError(#[from] RenameError),

    #[error("Could not promote temporary output to {path}: {source}")]
    PersistError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source file {0} does not exist")]
    MissingSource(PathBuf),

    #[error("Merged image is {actual} bytes, the plan expects {expected}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("{file} ended before the segment read starting at byte {offset} completed")]
    TruncatedSource { file: PathBuf, offset: u64 },

    #[error("No CUE or BIN files found in {0}")]
    NothingToMerge(PathBuf),
}

pub type MergeResult<T> = Result<T, MergeError>;
