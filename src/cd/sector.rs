use crate::cd::COOKED_SECTOR_SIZE;
use crate::cd::error::{CdError, CdResult};
use binrw::prelude::*;
use std::io::Cursor;

pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

pub const RAW_HEADER_SIZE: usize = 16;
pub const MODE2_SUBHEADER_SIZE: usize = 8;

/// The first 16 bytes of a raw 2352 byte data sector.
#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(big)]
pub struct RawSectorHeader {
    pub sync: [u8; 12],
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
    pub mode: u8,
}

impl RawSectorHeader {
    pub fn parse(raw: &[u8]) -> CdResult<Self> {
        if raw.len() < RAW_HEADER_SIZE {
            return Err(CdError::ShortSector {
                expected: RAW_HEADER_SIZE,
                actual: raw.len(),
            });
        }

        Ok(Self::read(&mut Cursor::new(&raw[..RAW_HEADER_SIZE]))?)
    }

    pub fn has_valid_sync(&self) -> bool {
        self.sync == SYNC_PATTERN
    }

    /// Offset of the 2048 byte user data area within the raw sector.
    pub fn user_data_offset(&self) -> CdResult<usize> {
        match self.mode {
            1 => Ok(RAW_HEADER_SIZE),
            // Mode 2 Form 1, the subheader sits between header and user data
            2 => Ok(RAW_HEADER_SIZE + MODE2_SUBHEADER_SIZE),
            other => Err(CdError::UnsupportedSectorMode(other)),
        }
    }
}

/// Returns the 2048 byte user data area of a raw 2352 byte data sector.
pub fn raw_user_data(raw: &[u8]) -> CdResult<&[u8]> {
    let header = RawSectorHeader::parse(raw)?;
    if !header.has_valid_sync() {
        return Err(CdError::MissingSync);
    }

    let offset = header.user_data_offset()?;
    let end = offset + COOKED_SECTOR_SIZE as usize;
    if raw.len() < end {
        return Err(CdError::ShortSector {
            expected: end,
            actual: raw.len(),
        });
    }

    Ok(&raw[offset..end])
}
