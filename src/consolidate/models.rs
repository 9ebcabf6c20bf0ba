use crate::cd::{Msf, TrackMode};
use crate::cue::models::{CueFile, CueSheet, FileType, Index, Track};

/// A byte range of a source file plus the zero padding that follows it in
/// the merged image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSegment {
    pub file: String,
    pub offset: u64,
    pub length: u64,
    pub padding: u64,
}

impl SourceSegment {
    pub fn aligned_len(&self) -> u64 {
        self.length + self.padding
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTrack {
    pub number: u8,
    pub mode: TrackMode,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub new_byte_offset: u64,
    /// Sector the segment starts at in the merged image.
    pub new_sector: u64,
    pub index00: Option<Msf>,
    pub index01: Msf,
    /// `INDEX 02` and up, already moved to the merged layout.
    pub extra_indices: Vec<Index>,
    /// `PREGAP` directive that could not be expressed as an `INDEX 00`.
    pub pregap: Option<Msf>,
    pub postgap: Option<Msf>,
    pub segment: SourceSegment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationPlan {
    pub output_file: String,
    pub tracks: Vec<PlannedTrack>,
    pub total_bytes: u64,
    pub total_sectors: u64,
    pub source_file_count: usize,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub catalog: Option<String>,
    pub comments: Vec<String>,
}

impl ConsolidationPlan {
    /// Ordered copy instructions for a track-merge executor.
    pub fn segments(&self) -> impl Iterator<Item = &SourceSegment> {
        self.tracks.iter().map(|t| &t.segment)
    }

    /// A single source file that needs no padding is already laid out as the
    /// merged image.
    pub fn is_noop(&self) -> bool {
        self.source_file_count == 1 && self.tracks.iter().all(|t| t.segment.padding == 0)
    }

    pub fn padding_bytes(&self) -> u64 {
        self.segments().map(|s| s.padding).sum()
    }

    /// The rewritten single-file sheet.
    pub fn to_cue_sheet(&self) -> CueSheet {
        let tracks = self
            .tracks
            .iter()
            .map(|planned| {
                let mut indices = Vec::with_capacity(2 + planned.extra_indices.len());
                if let Some(index00) = planned.index00 {
                    indices.push(Index {
                        number: 0,
                        position: index00,
                    });
                }
                indices.push(Index {
                    number: 1,
                    position: planned.index01,
                });
                indices.extend(planned.extra_indices.iter().copied());

                Track {
                    number: planned.number,
                    mode: planned.mode,
                    title: planned.title.clone(),
                    performer: planned.performer.clone(),
                    indices,
                    pregap: planned.pregap,
                    postgap: planned.postgap,
                }
            })
            .collect();

        CueSheet {
            title: self.title.clone(),
            performer: self.performer.clone(),
            catalog: self.catalog.clone(),
            comments: self.comments.clone(),
            files: vec![CueFile {
                filename: self.output_file.clone(),
                file_type: FileType::Binary,
                tracks,
            }],
        }
    }
}
