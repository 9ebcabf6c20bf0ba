use crate::iso9660::error::{IsoError, IsoResult};
use binrw::BinRead;
use std::io::Cursor;

pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";
pub const DESCRIPTOR_PRIMARY: u8 = 1;
pub const DESCRIPTOR_TERMINATOR: u8 = 255;

/// Length of a directory record without its name.
pub const DIRECTORY_RECORD_HEADER_SIZE: usize = 33;

const FLAG_DIRECTORY: u8 = 0x02;

/// Type 1 volume descriptor. Both-endian fields are read from their little
/// endian half.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct PrimaryVolumeDescriptor {
    pub descriptor_type: u8,
    pub identifier: [u8; 5],
    pub version: u8,
    #[br(pad_before = 1)]
    pub system_identifier: [u8; 32],
    pub volume_identifier: [u8; 32],
    #[br(pad_before = 8)]
    pub volume_space_size: u32,
    #[br(pad_before = 44)]
    pub logical_block_size: u16,
    #[br(pad_before = 26)]
    pub root_directory_record: DirectoryRecord,
}

impl PrimaryVolumeDescriptor {
    pub fn parse(sector: &[u8]) -> IsoResult<Self> {
        Ok(Self::read(&mut Cursor::new(sector))?)
    }

    pub fn volume_id(&self) -> String {
        String::from_utf8_lossy(&self.volume_identifier)
            .trim_end()
            .to_string()
    }
}

#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct DirectoryRecord {
    pub length: u8,
    pub extended_attribute_length: u8,
    #[br(pad_after = 4)]
    pub extent_lba: u32,
    #[br(pad_after = 4)]
    pub data_length: u32,
    pub recording_date: [u8; 7],
    pub flags: u8,
    #[br(pad_before = 6)]
    pub name_length: u8,
    #[br(count = name_length)]
    pub name: Vec<u8>,
}

impl DirectoryRecord {
    /// Parses one record occupying exactly `bytes`.
    pub fn parse(bytes: &[u8], lba: u64) -> IsoResult<Self> {
        if bytes.len() < DIRECTORY_RECORD_HEADER_SIZE
            || DIRECTORY_RECORD_HEADER_SIZE + bytes[32] as usize > bytes.len()
        {
            return Err(IsoError::read(lba, "truncated directory record"));
        }

        Ok(Self::read(&mut Cursor::new(bytes))?)
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// `.` and `..` are stored as the single bytes 0 and 1.
    pub fn is_self_or_parent(&self) -> bool {
        matches!(self.name.as_slice(), [0] | [1])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscFilesystemEntry {
    pub name: String,
    pub is_directory: bool,
    pub extent_lba: u32,
    pub data_length: u32,
}

impl DiscFilesystemEntry {
    /// Whether `name` refers to this entry, ignoring case and version suffix.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(&clean_name(name))
    }
}

impl From<&DirectoryRecord> for DiscFilesystemEntry {
    fn from(record: &DirectoryRecord) -> Self {
        Self {
            name: clean_name(&String::from_utf8_lossy(&record.name)),
            is_directory: record.is_directory(),
            extent_lba: record.extent_lba,
            data_length: record.data_length,
        }
    }
}

/// `SYSTEM.CNF;1` -> `SYSTEM.CNF`, `README.;1` -> `README`
fn clean_name(name: &str) -> String {
    let name = name.split(';').next().unwrap_or_default();
    name.trim_end_matches('.').to_string()
}
