use crate::cd::{Msf, aligned_len};
use crate::consolidate::error::{ConsolidationError, ConsolidationResult};
use crate::consolidate::models::{ConsolidationPlan, PlannedTrack, SourceSegment};
use crate::cue::models::{CueFile, CueSheet, FileType, Index};
use std::collections::HashMap;

/// Where a track's bytes live inside its source file.
struct TrackSpan {
    start_sector: u64,
    byte_start: u64,
    byte_end: u64,
}

/// Lays a (possibly multi-file) sheet out as one file named `output_file`.
///
/// `source_sizes` maps every `FILE` name of the sheet to its length in bytes.
pub fn plan_consolidation(
    sheet: &CueSheet,
    source_sizes: &HashMap<String, u64>,
    output_file: &str,
) -> ConsolidationResult<ConsolidationPlan> {
    let mut tracks = Vec::with_capacity(sheet.track_count());
    let mut ranges: HashMap<&str, Vec<(u64, u64, u8)>> = HashMap::new();
    let mut byte_offset = 0u64;
    let mut sector = 0u64;
    let mut previous_index01: Option<u64> = None;

    for file in &sheet.files {
        if file.file_type != FileType::Binary {
            return Err(ConsolidationError::UnsupportedFileType {
                file: file.filename.clone(),
                file_type: file.file_type,
            });
        }

        let size = *source_sizes.get(&file.filename).ok_or_else(|| {
            ConsolidationError::MissingSourceSize {
                file: file.filename.clone(),
            }
        })?;

        for (track, span) in file.tracks.iter().zip(layout_file(file, size)?) {
            ranges
                .entry(file.filename.as_str())
                .or_default()
                .push((span.byte_start, span.byte_end, track.number));

            let length = span.byte_end - span.byte_start;
            let aligned = aligned_len(length, track.mode).map_err(|source| {
                ConsolidationError::Alignment {
                    track: track.number,
                    source,
                }
            })?;
            let sectors = aligned / track.mode.sector_size();

            let relative = |position: Msf| {
                position
                    .to_sectors()
                    .checked_sub(span.start_sector)
                    .ok_or(ConsolidationError::IndexOrder {
                        track: track.number,
                    })
            };

            let index01_rel = match track.index(1) {
                Some(position) => relative(position)?,
                None => 0,
            };
            if index01_rel > sectors {
                return Err(ConsolidationError::SegmentOutOfBounds {
                    file: file.filename.clone(),
                    track: track.number,
                    size,
                });
            }
            let index01 = sector + index01_rel;

            let mut index00 = match track.index(0) {
                Some(position) => Some(Msf::from_sectors(sector + relative(position)?)),
                None => None,
            };

            // Virtual silence becomes an INDEX 00 reaching back into the
            // previous track, as long as it stays behind that track's INDEX 01.
            let mut pregap = track.pregap.filter(|gap| gap.to_sectors() > 0);
            if let (None, Some(gap), Some(previous)) = (index00, pregap, previous_index01) {
                let gap = gap.to_sectors();
                if index01 >= previous + gap {
                    index00 = Some(Msf::from_sectors(index01 - gap));
                    pregap = None;
                }
            }

            let extra_indices = track
                .indices
                .iter()
                .filter(|i| i.number > 1)
                .map(|i| {
                    Ok(Index {
                        number: i.number,
                        position: Msf::from_sectors(sector + relative(i.position)?),
                    })
                })
                .collect::<ConsolidationResult<Vec<_>>>()?;

            tracks.push(PlannedTrack {
                number: track.number,
                mode: track.mode,
                title: track.title.clone(),
                performer: track.performer.clone(),
                new_byte_offset: byte_offset,
                new_sector: sector,
                index00,
                index01: Msf::from_sectors(index01),
                extra_indices,
                pregap,
                postgap: track.postgap,
                segment: SourceSegment {
                    file: file.filename.clone(),
                    offset: span.byte_start,
                    length,
                    padding: aligned - length,
                },
            });

            previous_index01 = Some(index01);
            byte_offset += aligned;
            sector += sectors;
        }
    }

    check_overlaps(&ranges)?;

    Ok(ConsolidationPlan {
        output_file: output_file.to_string(),
        tracks,
        total_bytes: byte_offset,
        total_sectors: sector,
        source_file_count: sheet.files.len(),
        title: sheet.title.clone(),
        performer: sheet.performer.clone(),
        catalog: sheet.catalog.clone(),
        comments: sheet.comments.clone(),
    })
}

/// Splits one source file into per-track byte ranges. A track runs from its
/// start (`INDEX 00`, else `INDEX 01`) to the start of the next track, the
/// first track always begins at byte 0.
fn layout_file(file: &CueFile, size: u64) -> ConsolidationResult<Vec<TrackSpan>> {
    let mut starts = Vec::with_capacity(file.tracks.len());
    for (i, track) in file.tracks.iter().enumerate() {
        if let (Some(index00), Some(index01)) = (track.index(0), track.index(1))
            && index00 > index01
        {
            return Err(ConsolidationError::IndexOrder {
                track: track.number,
            });
        }

        let start = if i == 0 {
            0
        } else {
            track.start().map(|m| m.to_sectors()).unwrap_or(0)
        };
        starts.push(start);
    }

    let mut spans = Vec::with_capacity(file.tracks.len());
    let mut byte_start = 0u64;

    for (i, track) in file.tracks.iter().enumerate() {
        let byte_end = match (starts.get(i + 1), file.tracks.get(i + 1)) {
            (Some(next_start), Some(next)) => {
                let sectors = next_start.checked_sub(starts[i]).ok_or_else(|| {
                    ConsolidationError::Overlap {
                        file: file.filename.clone(),
                        first: track.number,
                        second: next.number,
                    }
                })?;
                sectors
                    .checked_mul(track.mode.sector_size())
                    .and_then(|bytes| byte_start.checked_add(bytes))
                    .ok_or_else(|| ConsolidationError::SegmentOutOfBounds {
                        file: file.filename.clone(),
                        track: track.number,
                        size,
                    })?
            }
            _ => size,
        };

        if byte_end > size || byte_end < byte_start {
            return Err(ConsolidationError::SegmentOutOfBounds {
                file: file.filename.clone(),
                track: track.number,
                size,
            });
        }

        spans.push(TrackSpan {
            start_sector: starts[i],
            byte_start,
            byte_end,
        });
        byte_start = byte_end;
    }

    Ok(spans)
}

fn check_overlaps(ranges: &HashMap<&str, Vec<(u64, u64, u8)>>) -> ConsolidationResult<()> {
    for (file, spans) in ranges {
        let mut spans: Vec<_> = spans.iter().filter(|(start, end, _)| end > start).collect();
        spans.sort();

        for pair in spans.windows(2) {
            let (_, first_end, first) = *pair[0];
            let (second_start, _, second) = *pair[1];
            if second_start < first_end {
                return Err(ConsolidationError::Overlap {
                    file: file.to_string(),
                    first,
                    second,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cd::TrackMode;
    use crate::cd::error::CdError;
    use crate::cue::CueParser;
    use crate::cue::writer::write_cue;

    fn sizes(entries: &[(&str, u64)]) -> HashMap<String, u64> {
        entries
            .iter()
            .map(|(name, size)| (name.to_string(), *size))
            .collect()
    }

    const TWO_FILES: &str = "FILE \"A.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\nFILE \"B.bin\" BINARY\n  TRACK 02 AUDIO\n    INDEX 01 00:00:00\n";

    #[test]
    fn two_file_sheet_is_laid_out_back_to_back() {
        let sheet = CueParser::parse_str(TWO_FILES).unwrap();
        let plan = plan_consolidation(
            &sheet,
            &sizes(&[("A.bin", 10 * 2352), ("B.bin", 5 * 2352)]),
            "Game.bin",
        )
        .unwrap();

        assert_eq!(plan.tracks.len(), 2);
        assert_eq!(plan.tracks[0].new_byte_offset, 0);
        assert_eq!(plan.tracks[0].index01.to_string(), "00:00:00");
        assert_eq!(plan.tracks[1].new_byte_offset, 10 * 2352);
        assert_eq!(plan.tracks[1].index01, Msf::from_sectors(10));
        assert_eq!(plan.tracks[1].index01.to_string(), "00:00:10");
        assert_eq!(plan.total_bytes, 15 * 2352);
        assert_eq!(plan.total_sectors, 15);
        assert!(!plan.is_noop());

        assert_eq!(
            write_cue(&plan.to_cue_sheet()),
            "FILE \"Game.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n  TRACK 02 AUDIO\n    INDEX 01 00:00:10\n"
        );
    }

    #[test]
    fn offsets_are_non_decreasing_and_sum_aligned_lengths() {
        let sheet = CueParser::parse_str(
            "FILE \"1.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             FILE \"2.bin\" BINARY\n TRACK 02 AUDIO\n INDEX 01 00:00:00\n\
             FILE \"3.bin\" BINARY\n TRACK 03 AUDIO\n INDEX 01 00:00:00\n\
             FILE \"4.bin\" BINARY\n TRACK 04 AUDIO\n INDEX 01 00:00:00\n",
        )
        .unwrap();
        let plan = plan_consolidation(
            &sheet,
            &sizes(&[
                ("1.bin", 2352 * 300),
                ("2.bin", 2352 * 20 + 17),
                ("3.bin", 0),
                ("4.bin", 2352),
            ]),
            "out.bin",
        )
        .unwrap();

        let mut running = 0;
        for track in &plan.tracks {
            assert_eq!(track.new_byte_offset, running);
            assert_eq!(track.new_byte_offset, track.new_sector * 2352);
            assert_eq!(track.index01, Msf::from_sectors(track.new_sector));
            running += track.segment.aligned_len();
        }
        assert!(plan.tracks.windows(2).all(|w| w[0].new_byte_offset <= w[1].new_byte_offset));
        assert_eq!(plan.total_bytes, running);
    }

    #[test]
    fn audio_tails_are_padded_with_silence() {
        let sheet = CueParser::parse_str(TWO_FILES).unwrap();
        let plan = plan_consolidation(
            &sheet,
            &sizes(&[("A.bin", 10 * 2352), ("B.bin", 5 * 2352 + 100)]),
            "Game.bin",
        )
        .unwrap();

        let audio = &plan.tracks[1].segment;
        assert_eq!(audio.length, 5 * 2352 + 100);
        assert_eq!(audio.padding, 2352 - 100);
        assert_eq!(plan.total_bytes, 16 * 2352);
        assert_eq!(plan.padding_bytes(), 2252);
    }

    #[test]
    fn misaligned_data_track_fails() {
        let sheet = CueParser::parse_str(TWO_FILES).unwrap();
        let err = plan_consolidation(
            &sheet,
            &sizes(&[("A.bin", 10 * 2352 + 1), ("B.bin", 2352)]),
            "Game.bin",
        )
        .unwrap_err();

        match err {
            ConsolidationError::Alignment { track, source } => {
                assert_eq!(track, 1);
                assert!(matches!(source, CdError::Alignment { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn in_file_pregap_is_counted_once() {
        let sheet = CueParser::parse_str(
            "FILE \"1.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             FILE \"2.bin\" BINARY\n TRACK 02 AUDIO\n INDEX 00 00:00:00\n INDEX 01 00:02:00\n",
        )
        .unwrap();
        let plan = plan_consolidation(
            &sheet,
            &sizes(&[("1.bin", 2352 * 1000), ("2.bin", 2352 * 400)]),
            "out.bin",
        )
        .unwrap();

        let track2 = &plan.tracks[1];
        assert_eq!(track2.segment.offset, 0);
        assert_eq!(track2.segment.length, 2352 * 400);
        assert_eq!(track2.index00, Some(Msf::from_sectors(1000)));
        assert_eq!(track2.index01, Msf::from_sectors(1150));
        assert_eq!(plan.total_sectors, 1400);
    }

    #[test]
    fn pregap_directive_becomes_index_00_without_moving_data() {
        let sheet = CueParser::parse_str(
            "FILE \"1.bin\" BINARY\n TRACK 01 MODE2/2352\n PREGAP 00:02:00\n INDEX 01 00:00:00\n\
             FILE \"2.bin\" BINARY\n TRACK 02 AUDIO\n PREGAP 00:02:00\n INDEX 01 00:00:00\n",
        )
        .unwrap();
        let plan = plan_consolidation(
            &sheet,
            &sizes(&[("1.bin", 2352 * 1000), ("2.bin", 2352 * 10)]),
            "out.bin",
        )
        .unwrap();

        // Track 1 has nothing to reach back into and keeps its directive.
        assert_eq!(plan.tracks[0].pregap, Some(Msf::from_sectors(150)));
        assert_eq!(plan.tracks[0].index00, None);

        let track2 = &plan.tracks[1];
        assert_eq!(track2.pregap, None);
        assert_eq!(track2.index00, Some(Msf::from_sectors(850)));
        assert_eq!(track2.index01, Msf::from_sectors(1000));
        assert_eq!(track2.new_byte_offset, 2352 * 1000);
        assert_eq!(plan.total_sectors, 1010);
    }

    #[test]
    fn single_file_multi_track_layout_follows_indices() {
        let sheet = CueParser::parse_str(
            "FILE \"disc.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             TRACK 02 AUDIO\n INDEX 00 00:10:00\n INDEX 01 00:12:00\n",
        )
        .unwrap();
        let plan = plan_consolidation(&sheet, &sizes(&[("disc.bin", 2352 * 1200)]), "disc.bin")
            .unwrap();

        assert!(plan.is_noop());
        assert_eq!(plan.tracks[0].segment.length, 2352 * 750);
        assert_eq!(plan.tracks[1].segment.offset, 2352 * 750);
        assert_eq!(plan.tracks[1].index00, Some(Msf::from_sectors(750)));
        assert_eq!(plan.tracks[1].index01, Msf::from_sectors(900));
        assert_eq!(
            write_cue(&plan.to_cue_sheet()),
            write_cue(&sheet),
            "an already single-file sheet is rewritten unchanged"
        );
    }

    #[test]
    fn single_track_disc_is_noop() {
        let sheet = CueParser::parse_str(
            "FILE \"game.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n",
        )
        .unwrap();
        let plan =
            plan_consolidation(&sheet, &sizes(&[("game.bin", 2352 * 20)]), "game.bin").unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.tracks[0].segment.aligned_len(), 2352 * 20);
    }

    #[test]
    fn mixed_sector_sizes_advance_by_each_tracks_size() {
        let sheet = CueParser::parse_str(
            "FILE \"iso.bin\" BINARY\n TRACK 01 MODE1/2048\n INDEX 01 00:00:00\n\
             FILE \"cdda.bin\" BINARY\n TRACK 02 AUDIO\n INDEX 01 00:00:00\n",
        )
        .unwrap();
        let plan = plan_consolidation(
            &sheet,
            &sizes(&[("iso.bin", 2048 * 100), ("cdda.bin", 2352 * 3)]),
            "out.bin",
        )
        .unwrap();
        assert_eq!(plan.tracks[1].new_byte_offset, 2048 * 100);
        assert_eq!(plan.tracks[1].index01, Msf::from_sectors(100));
        assert_eq!(plan.tracks[1].mode, TrackMode::Audio);
    }

    #[test]
    fn repeated_source_file_overlaps() {
        let sheet = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             FILE \"a.bin\" BINARY\n TRACK 02 AUDIO\n INDEX 01 00:00:00\n",
        )
        .unwrap();
        let err = plan_consolidation(&sheet, &sizes(&[("a.bin", 2352 * 10)]), "out.bin")
            .unwrap_err();
        assert!(matches!(
            err,
            ConsolidationError::Overlap {
                first: 1,
                second: 2,
                ..
            }
        ));
    }

    #[test]
    fn descending_indices_overlap() {
        let sheet = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             TRACK 02 AUDIO\n INDEX 01 00:10:00\n TRACK 03 AUDIO\n INDEX 01 00:05:00\n",
        )
        .unwrap();
        let err = plan_consolidation(&sheet, &sizes(&[("a.bin", 2352 * 2000)]), "out.bin")
            .unwrap_err();
        assert!(matches!(
            err,
            ConsolidationError::Overlap {
                first: 2,
                second: 3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unusable_sources() {
        let sheet = CueParser::parse_str(TWO_FILES).unwrap();
        assert!(matches!(
            plan_consolidation(&sheet, &sizes(&[("A.bin", 2352)]), "out.bin"),
            Err(ConsolidationError::MissingSourceSize { .. })
        ));

        let wave = CueParser::parse_str(
            "FILE \"a.wav\" WAVE\n TRACK 01 AUDIO\n INDEX 01 00:00:00\n",
        )
        .unwrap();
        assert!(matches!(
            plan_consolidation(&wave, &sizes(&[("a.wav", 2352)]), "out.bin"),
            Err(ConsolidationError::UnsupportedFileType { .. })
        ));

        let beyond = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             TRACK 02 AUDIO\n INDEX 01 00:10:00\n",
        )
        .unwrap();
        assert!(matches!(
            plan_consolidation(&beyond, &sizes(&[("a.bin", 2352 * 10)]), "out.bin"),
            Err(ConsolidationError::SegmentOutOfBounds { track: 1, .. })
        ));
    }

    #[test]
    fn index_00_after_index_01_is_rejected() {
        let sheet = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n TRACK 01 MODE2/2352\n INDEX 01 00:00:00\n\
             TRACK 02 AUDIO\n INDEX 00 00:00:20\n INDEX 01 00:00:10\n",
        )
        .unwrap();
        assert!(matches!(
            plan_consolidation(&sheet, &sizes(&[("a.bin", 2352 * 40)]), "out.bin"),
            Err(ConsolidationError::IndexOrder { track: 2 })
        ));
    }

    #[test]
    fn huge_track_start_is_an_error_not_an_overflow() {
        let mut data = crate::cue::models::Track::new(1, crate::cd::TrackMode::Mode2_2352);
        data.indices.push(Index {
            number: 1,
            position: Msf::ZERO,
        });
        let mut audio = crate::cue::models::Track::new(2, crate::cd::TrackMode::Audio);
        audio.indices.push(Index {
            number: 1,
            position: Msf {
                minutes: u64::MAX / 100,
                seconds: 0,
                frames: 0,
            },
        });
        let sheet = CueSheet {
            files: vec![CueFile {
                filename: "a.bin".into(),
                file_type: FileType::Binary,
                tracks: vec![data, audio],
            }],
            ..Default::default()
        };

        assert!(matches!(
            plan_consolidation(&sheet, &sizes(&[("a.bin", 2352 * 10)]), "out.bin"),
            Err(ConsolidationError::SegmentOutOfBounds { track: 1, .. })
        ));
    }
}
