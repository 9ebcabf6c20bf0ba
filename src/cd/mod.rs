use crate::cd::error::{CdError, CdResult};
use crate::util::align_up;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub mod error;
pub mod sector;

pub const SECTOR_SIZE: u64 = 2352;
pub const COOKED_SECTOR_SIZE: u64 = 2048;
pub const SUBCODE_SIZE: u64 = 96;
pub const FRAMES_PER_SECOND: u64 = 75;
pub const SECONDS_PER_MINUTE: u64 = 60;
/// Largest minute value accepted from text, far beyond any real disc.
pub const MAX_MINUTES: u64 = 9_999;

/// Track modes as spelled in a CUE sheet `TRACK` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackMode {
    Audio,
    CdG,
    Mode1_2048,
    Mode1_2352,
    Mode2_2336,
    Mode2_2352,
    CdI2336,
    CdI2352,
}

impl TrackMode {
    pub fn from_cue_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "AUDIO" => Some(TrackMode::Audio),
            "CDG" => Some(TrackMode::CdG),
            "MODE1/2048" => Some(TrackMode::Mode1_2048),
            "MODE1/2352" => Some(TrackMode::Mode1_2352),
            "MODE2/2336" => Some(TrackMode::Mode2_2336),
            "MODE2/2352" => Some(TrackMode::Mode2_2352),
            "CDI/2336" => Some(TrackMode::CdI2336),
            "CDI/2352" => Some(TrackMode::CdI2352),
            _ => None,
        }
    }

    pub fn cue_token(&self) -> &'static str {
        match self {
            TrackMode::Audio => "AUDIO",
            TrackMode::CdG => "CDG",
            TrackMode::Mode1_2048 => "MODE1/2048",
            TrackMode::Mode1_2352 => "MODE1/2352",
            TrackMode::Mode2_2336 => "MODE2/2336",
            TrackMode::Mode2_2352 => "MODE2/2352",
            TrackMode::CdI2336 => "CDI/2336",
            TrackMode::CdI2352 => "CDI/2352",
        }
    }

    /// Bytes per sector as stored in an image file.
    pub fn sector_size(&self) -> u64 {
        match self {
            TrackMode::Mode1_2048 => COOKED_SECTOR_SIZE,
            TrackMode::Mode2_2336 | TrackMode::CdI2336 => 2336,
            TrackMode::CdG => SECTOR_SIZE + SUBCODE_SIZE,
            TrackMode::Audio
            | TrackMode::Mode1_2352
            | TrackMode::Mode2_2352
            | TrackMode::CdI2352 => SECTOR_SIZE,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, TrackMode::Audio | TrackMode::CdG)
    }

    pub fn is_data(&self) -> bool {
        !self.is_audio()
    }
}

impl Display for TrackMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cue_token())
    }
}

/// Disc time in minutes, seconds and frames (75 frames per second).
///
/// Minutes are not capped at 99, a position past the end of a real disc still
/// converts back to the same sector count. Parsed values stay below
/// [`MAX_MINUTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Msf {
    pub minutes: u64,
    pub seconds: u8,
    pub frames: u8,
}

impl Msf {
    pub const ZERO: Msf = Msf {
        minutes: 0,
        seconds: 0,
        frames: 0,
    };

    pub fn new(minutes: u64, seconds: u8, frames: u8) -> CdResult<Self> {
        if minutes > MAX_MINUTES
            || seconds as u64 >= SECONDS_PER_MINUTE
            || frames as u64 >= FRAMES_PER_SECOND
        {
            return Err(CdError::InvalidTimecode(format!(
                "{minutes:02}:{seconds:02}:{frames:02}"
            )));
        }

        Ok(Self {
            minutes,
            seconds,
            frames,
        })
    }

    pub fn from_sectors(sectors: u64) -> Self {
        let frames = sectors % FRAMES_PER_SECOND;
        let total_seconds = sectors / FRAMES_PER_SECOND;

        Self {
            minutes: total_seconds / SECONDS_PER_MINUTE,
            seconds: (total_seconds % SECONDS_PER_MINUTE) as u8,
            frames: frames as u8,
        }
    }

    /// Saturates instead of wrapping for hand-built values with huge minutes.
    pub fn to_sectors(&self) -> u64 {
        self.minutes
            .saturating_mul(SECONDS_PER_MINUTE)
            .saturating_add(self.seconds as u64)
            .saturating_mul(FRAMES_PER_SECOND)
            .saturating_add(self.frames as u64)
    }
}

impl Display for Msf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.minutes, self.seconds, self.frames
        )
    }
}

impl FromStr for Msf {
    type Err = CdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CdError::InvalidTimecode(s.to_string());

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        if parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(invalid());
        }

        let minutes = parts[0].parse::<u64>().map_err(|_| invalid())?;
        let seconds = parts[1].parse::<u8>().map_err(|_| invalid())?;
        let frames = parts[2].parse::<u8>().map_err(|_| invalid())?;

        Msf::new(minutes, seconds, frames).map_err(|_| invalid())
    }
}

/// Number of sectors `bytes` occupies in a track of the given mode.
///
/// Data tracks must be an exact multiple of the sector size. Audio tracks round
/// a partial trailing sector up, the missing bytes are treated as silence.
pub fn bytes_to_sectors(bytes: u64, mode: TrackMode) -> CdResult<u64> {
    let sector_size = mode.sector_size();

    if mode.is_audio() {
        return Ok(bytes.div_ceil(sector_size));
    }

    if bytes % sector_size != 0 {
        return Err(CdError::Alignment { bytes, sector_size });
    }

    Ok(bytes / sector_size)
}

/// Length of `bytes` rounded up to whole sectors, following [`bytes_to_sectors`].
pub fn aligned_len(bytes: u64, mode: TrackMode) -> CdResult<u64> {
    bytes_to_sectors(bytes, mode)?;
    Ok(align_up(bytes, mode.sector_size()))
}
