use crate::cd::COOKED_SECTOR_SIZE;
use crate::iso9660::error::{IsoError, IsoResult};
use crate::iso9660::image::DiscImage;
use crate::iso9660::models::{
    DESCRIPTOR_PRIMARY, DESCRIPTOR_TERMINATOR, DirectoryRecord, DiscFilesystemEntry,
    PrimaryVolumeDescriptor, STANDARD_IDENTIFIER,
};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncSeek};

pub mod error;
pub mod image;
pub mod models;

/// Volume descriptors start at sector 16, after the system area.
pub const FIRST_DESCRIPTOR_LBA: u64 = 16;

const MAX_DESCRIPTORS: u64 = 32;

/// Read-only view of the ISO 9660 filesystem on a data track.
#[derive(Debug)]
pub struct IsoFilesystem<R> {
    image: DiscImage<R>,
    volume_id: String,
    volume_space_size: u64,
    root: DiscFilesystemEntry,
}

impl<R: AsyncRead + AsyncSeek + Unpin> IsoFilesystem<R> {
    pub async fn mount(mut image: DiscImage<R>) -> IsoResult<Self> {
        for lba in FIRST_DESCRIPTOR_LBA..FIRST_DESCRIPTOR_LBA + MAX_DESCRIPTORS {
            let sector = image.read_sector(lba).await?;
            if &sector[1..6] != STANDARD_IDENTIFIER {
                return Err(IsoError::read(lba, "volume descriptor lacks CD001"));
            }

            match sector[0] {
                DESCRIPTOR_PRIMARY => {
                    let pvd = PrimaryVolumeDescriptor::parse(&sector)?;
                    if pvd.logical_block_size as u64 != COOKED_SECTOR_SIZE {
                        return Err(IsoError::read(
                            lba,
                            format!("unsupported logical block size {}", pvd.logical_block_size),
                        ));
                    }

                    let root = DiscFilesystemEntry::from(&pvd.root_directory_record);
                    debug!(
                        "Mounted volume {:?}: {} sectors, root at {}",
                        pvd.volume_id(),
                        pvd.volume_space_size,
                        root.extent_lba
                    );

                    return Ok(Self {
                        image,
                        volume_id: pvd.volume_id(),
                        volume_space_size: pvd.volume_space_size as u64,
                        root: DiscFilesystemEntry {
                            name: String::new(),
                            is_directory: true,
                            ..root
                        },
                    });
                }
                DESCRIPTOR_TERMINATOR => {
                    return Err(IsoError::read(lba, "no primary volume descriptor"));
                }
                other => trace!("Skipping volume descriptor type {other} at {lba}"),
            }
        }

        Err(IsoError::read(
            FIRST_DESCRIPTOR_LBA + MAX_DESCRIPTORS,
            "volume descriptor set is not terminated",
        ))
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    pub fn root(&self) -> &DiscFilesystemEntry {
        &self.root
    }

    /// Reads the extent of `entry`, refusing anything beyond the volume.
    async fn read_extent(&mut self, entry: &DiscFilesystemEntry) -> IsoResult<Vec<u8>> {
        let lba = entry.extent_lba as u64;
        let sectors = (entry.data_length as u64).div_ceil(COOKED_SECTOR_SIZE);

        if lba + sectors > self.volume_space_size {
            return Err(IsoError::read(
                lba,
                format!(
                    "extent of {} sectors exceeds the volume size of {}",
                    sectors, self.volume_space_size
                ),
            ));
        }

        let mut data = self.image.read_sectors(lba, sectors).await?;
        data.truncate(entry.data_length as usize);
        Ok(data)
    }

    /// Entries of a directory, without `.` and `..`.
    pub async fn list(&mut self, directory: &DiscFilesystemEntry) -> IsoResult<Vec<DiscFilesystemEntry>> {
        if !directory.is_directory {
            return Err(IsoError::NotFound {
                path: format!("{}/", directory.name),
            });
        }

        let data = self.read_extent(directory).await?;
        let mut entries = Vec::new();

        for (i, sector) in data.chunks(COOKED_SECTOR_SIZE as usize).enumerate() {
            let lba = directory.extent_lba as u64 + i as u64;
            let mut position = 0;

            // Records never straddle sectors, a zero length pads to the next one.
            while position < sector.len() {
                let length = sector[position] as usize;
                if length == 0 {
                    break;
                }
                if position + length > sector.len() {
                    return Err(IsoError::read(lba, "directory record crosses sector boundary"));
                }

                let record = DirectoryRecord::parse(&sector[position..position + length], lba)?;
                if !record.is_self_or_parent() {
                    entries.push(DiscFilesystemEntry::from(&record));
                }
                position += length;
            }
        }

        Ok(entries)
    }

    /// Walks `components` from the root directory.
    pub async fn resolve(&mut self, components: &[&str]) -> IsoResult<DiscFilesystemEntry> {
        let mut current = self.root.clone();

        for (depth, component) in components.iter().enumerate() {
            let not_found = || IsoError::NotFound {
                path: components[..=depth].join("/"),
            };
            if !current.is_directory {
                return Err(not_found());
            }

            current = self
                .list(&current)
                .await?
                .into_iter()
                .find(|e| e.matches(component))
                .ok_or_else(not_found)?;
        }

        Ok(current)
    }

    /// Contents of a file, exactly `data_length` bytes.
    pub async fn read_file(&mut self, entry: &DiscFilesystemEntry) -> IsoResult<Vec<u8>> {
        self.read_extent(entry).await
    }
}
