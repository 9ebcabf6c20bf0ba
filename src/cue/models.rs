use crate::cd::{Msf, TrackMode};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CueSheet {
    pub title: Option<String>,
    pub performer: Option<String>,
    pub catalog: Option<String>,
    /// `REM` lines without the keyword, in file order.
    pub comments: Vec<String>,
    /// Physical concatenation order.
    pub files: Vec<CueFile>,
}

impl CueSheet {
    /// The file a track is stored in, together with the track.
    pub fn tracks_with_files(&self) -> impl Iterator<Item = (&CueFile, &Track)> {
        self.files
            .iter()
            .flat_map(|file| file.tracks.iter().map(move |track| (file, track)))
    }

    pub fn track_count(&self) -> usize {
        self.files.iter().map(|f| f.tracks.len()).sum()
    }

    pub fn first_data_track(&self) -> Option<(&CueFile, &Track)> {
        self.tracks_with_files()
            .find(|(_, track)| track.mode.is_data())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueFile {
    pub filename: String,
    pub file_type: FileType,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub number: u8,
    pub mode: TrackMode,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub indices: Vec<Index>,
    /// Silence that is not stored in the file.
    pub pregap: Option<Msf>,
    pub postgap: Option<Msf>,
}

impl Track {
    pub fn new(number: u8, mode: TrackMode) -> Self {
        Self {
            number,
            mode,
            title: None,
            performer: None,
            indices: Vec::new(),
            pregap: None,
            postgap: None,
        }
    }

    pub fn index(&self, number: u8) -> Option<Msf> {
        self.indices
            .iter()
            .find(|i| i.number == number)
            .map(|i| i.position)
    }

    /// Where the track's bytes begin in its file: `INDEX 00` if the pregap is
    /// stored in the file, otherwise `INDEX 01`.
    pub fn start(&self) -> Option<Msf> {
        self.index(0).or_else(|| self.index(1))
    }

    pub fn pregap_sectors(&self) -> u64 {
        self.pregap.map(|p| p.to_sectors()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub number: u8,
    pub position: Msf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Binary,
    Motorola,
    Aiff,
    Wave,
    Mp3,
}

impl FileType {
    pub fn from_cue_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "BINARY" => Some(FileType::Binary),
            "MOTOROLA" => Some(FileType::Motorola),
            "AIFF" => Some(FileType::Aiff),
            "WAVE" => Some(FileType::Wave),
            "MP3" => Some(FileType::Mp3),
            _ => None,
        }
    }

    pub fn cue_token(&self) -> &'static str {
        match self {
            FileType::Binary => "BINARY",
            FileType::Motorola => "MOTOROLA",
            FileType::Aiff => "AIFF",
            FileType::Wave => "WAVE",
            FileType::Mp3 => "MP3",
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cue_token())
    }
}
