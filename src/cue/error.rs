use thiserror::Error;

/// A malformed or unreadable CUE sheet. Every parse error carries the 1-based
/// line number it was found on.
#[derive(Debug, Error)]
pub enum CueError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("line {line}: unknown file type: {token}")]
    InvalidFileType { line: usize, token: String },

    #[error("line {line}: unknown track mode: {token}")]
    InvalidTrackType { line: usize, token: String },

    #[error("line {line}: invalid MSF timecode: {value}")]
    InvalidMSFFormat { line: usize, value: String },

    #[error("line {line}: invalid number: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("line {line}: missing closing quote")]
    MissingQuoteError { line: usize },

    #[error("line {line}: {directive} is missing an argument")]
    MissingArgument { line: usize, directive: String },

    #[error("line {line}: TRACK appears before any FILE")]
    TrackOutsideFile { line: usize },

    #[error("line {line}: {directive} appears outside of a TRACK block")]
    DirectiveOutsideTrack { line: usize, directive: String },

    #[error("line {line}: track {number} is defined twice")]
    DuplicateTrack { line: usize, number: u8 },

    #[error("line {line}: track {track} has no INDEX 01")]
    MissingIndex01 { line: usize, track: u8 },

    #[error("line {line}: FILE \"{filename}\" contains no tracks")]
    EmptyFile { line: usize, filename: String },

    #[error("CUE sheet does not reference any file")]
    NoFiles,
}

impl CueError {
    pub fn line(&self) -> Option<usize> {
        match self {
            CueError::IoError(_) | CueError::NoFiles => None,
            CueError::InvalidFileType { line, .. }
            | CueError::InvalidTrackType { line, .. }
            | CueError::InvalidMSFFormat { line, .. }
            | CueError::InvalidNumber { line, .. }
            | CueError::MissingQuoteError { line }
            | CueError::MissingArgument { line, .. }
            | CueError::TrackOutsideFile { line }
            | CueError::DirectiveOutsideTrack { line, .. }
            | CueError::DuplicateTrack { line, .. }
            | CueError::MissingIndex01 { line, .. }
            | CueError::EmptyFile { line, .. } => Some(*line),
        }
    }
}

pub type CueResult<T> = Result<T, CueError>;
