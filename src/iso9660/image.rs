use crate::cd::sector::{SYNC_PATTERN, raw_user_data};
use crate::cd::{COOKED_SECTOR_SIZE, SECTOR_SIZE, TrackMode};
use crate::cue::CueParser;
use crate::iso9660::error::{IsoError, IsoResult};
use crate::util::fs::has_extension;
use log::debug;
use std::io::{ErrorKind, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, BufReader};

const MODE2_2336_SECTOR_SIZE: u64 = 2336;
const MODE2_2336_USER_DATA_OFFSET: usize = 8;

/// How 2048 byte user sectors are stored in the backing file. `base` is the
/// byte offset of LBA 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorLayout {
    Cooked2048,
    Raw2352 { base: u64 },
    Mode2_2336 { base: u64 },
}

impl SectorLayout {
    pub fn for_track(mode: TrackMode, base: u64) -> Option<Self> {
        match mode {
            TrackMode::Mode1_2048 if base == 0 => Some(SectorLayout::Cooked2048),
            TrackMode::Mode1_2352 | TrackMode::Mode2_2352 | TrackMode::CdI2352 => {
                Some(SectorLayout::Raw2352 { base })
            }
            TrackMode::Mode2_2336 | TrackMode::CdI2336 => Some(SectorLayout::Mode2_2336 { base }),
            _ => None,
        }
    }

    pub fn stride(&self) -> u64 {
        match self {
            SectorLayout::Cooked2048 => COOKED_SECTOR_SIZE,
            SectorLayout::Raw2352 { .. } => SECTOR_SIZE,
            SectorLayout::Mode2_2336 { .. } => MODE2_2336_SECTOR_SIZE,
        }
    }

    fn base(&self) -> u64 {
        match self {
            SectorLayout::Cooked2048 => 0,
            SectorLayout::Raw2352 { base } | SectorLayout::Mode2_2336 { base } => *base,
        }
    }
}

/// A random access view of the user data sectors of one data track.
#[derive(Debug)]
pub struct DiscImage<R> {
    reader: R,
    layout: SectorLayout,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + AsyncSeek + Unpin> DiscImage<R> {
    pub fn new(reader: R, layout: SectorLayout) -> Self {
        Self {
            reader,
            layout,
            buffer: vec![0u8; layout.stride() as usize],
        }
    }

    pub fn layout(&self) -> SectorLayout {
        self.layout
    }

    /// Reads the 2048 bytes of user data stored at `lba`.
    pub async fn read_sector(&mut self, lba: u64) -> IsoResult<Vec<u8>> {
        let offset = self.layout.base() + lba * self.layout.stride();
        self.reader.seek(SeekFrom::Start(offset)).await?;
        self.reader
            .read_exact(&mut self.buffer)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => IsoError::read(lba, "past the end of the image"),
                _ => IsoError::IoError(e),
            })?;

        let user_data = match self.layout {
            SectorLayout::Cooked2048 => &self.buffer[..],
            SectorLayout::Raw2352 { .. } => {
                raw_user_data(&self.buffer).map_err(|e| IsoError::from_cd(lba, e))?
            }
            SectorLayout::Mode2_2336 { .. } => {
                let start = MODE2_2336_USER_DATA_OFFSET;
                &self.buffer[start..start + COOKED_SECTOR_SIZE as usize]
            }
        };

        Ok(user_data.to_vec())
    }

    /// Reads `count` consecutive user sectors starting at `lba`.
    pub async fn read_sectors(&mut self, lba: u64, count: u64) -> IsoResult<Vec<u8>> {
        let mut data = Vec::with_capacity((count * COOKED_SECTOR_SIZE) as usize);
        for i in 0..count {
            data.extend_from_slice(&self.read_sector(lba + i).await?);
        }
        Ok(data)
    }
}

pub type FileImage = DiscImage<BufReader<File>>;

/// Opens an ISO or a raw single track image, telling the two apart by the
/// sync pattern at the start of the file.
pub async fn open_iso(path: &Path) -> IsoResult<FileImage> {
    let mut file = File::open(path).await?;

    let mut head = [0u8; 12];
    let layout = match file.read_exact(&mut head).await {
        Ok(_) if head == SYNC_PATTERN => SectorLayout::Raw2352 { base: 0 },
        Ok(_) => SectorLayout::Cooked2048,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => SectorLayout::Cooked2048,
        Err(e) => return Err(e.into()),
    };

    debug!("Opened {} as {:?}", path.display(), layout);
    Ok(DiscImage::new(BufReader::new(file), layout))
}

/// Opens the first data track referenced by a CUE sheet.
pub async fn open_cue_data_track(cue_path: &Path) -> IsoResult<FileImage> {
    let sheet = CueParser::new(cue_path).parse().await?;

    let (file, track) = sheet
        .first_data_track()
        .ok_or_else(|| IsoError::NoDataTrack(cue_path.to_path_buf()))?;

    // Tracks before the data track in the same file share its sector size.
    let base = track
        .index(1)
        .map(|position| position.to_sectors() * track.mode.sector_size())
        .unwrap_or(0);
    let layout = SectorLayout::for_track(track.mode, base)
        .ok_or_else(|| IsoError::NoDataTrack(cue_path.to_path_buf()))?;

    let cue_dir = cue_path.parent().unwrap_or(Path::new("."));
    let bin_path = cue_dir.join(&file.filename);
    debug!(
        "Track {} of {} is {} at byte {}",
        track.number,
        bin_path.display(),
        track.mode,
        base
    );

    let file = File::open(&bin_path).await?;
    Ok(DiscImage::new(BufReader::new(file), layout))
}

/// Opens any supported image path: `.cue` sheets through their data track,
/// everything else as an ISO or raw track.
pub async fn open_image(path: &Path) -> IsoResult<FileImage> {
    if has_extension(path, "cue") {
        open_cue_data_track(path).await
    } else {
        open_iso(path).await
    }
}
