use crate::cd::{Msf, TrackMode};
use crate::cue::error::{CueError, CueResult};
use crate::cue::models::{CueFile, CueSheet, FileType, Index, Track};
use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub mod error;
pub mod models;
pub mod writer;

pub struct CueParser {
    cue_path: PathBuf,
}

impl CueParser {
    pub fn new(cue_path: impl AsRef<Path>) -> Self {
        Self {
            cue_path: cue_path.as_ref().to_path_buf(),
        }
    }

    pub async fn parse(&self) -> CueResult<CueSheet> {
        let data = tokio::fs::read(&self.cue_path).await?;
        Self::parse_str(&String::from_utf8_lossy(&data))
    }

    pub fn parse_str(text: &str) -> CueResult<CueSheet> {
        let mut state = ParseState::default();

        for (idx, raw_line) in text.trim_start_matches('\u{feff}').lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let keyword = line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_uppercase();

            if keyword == "REM" {
                state.sheet.comments.push(line[3..].trim().to_string());
                continue;
            }

            let parts = tokenize(line, line_no)?;
            let argument = |n: usize| {
                parts
                    .get(n)
                    .map(String::as_str)
                    .ok_or_else(|| CueError::MissingArgument {
                        line: line_no,
                        directive: keyword.clone(),
                    })
            };

            match keyword.as_str() {
                "FILE" => {
                    if parts.len() < 3 {
                        return Err(CueError::MissingArgument {
                            line: line_no,
                            directive: keyword.clone(),
                        });
                    }

                    let type_token = &parts[parts.len() - 1];
                    let file_type = FileType::from_cue_token(type_token).ok_or_else(|| {
                        CueError::InvalidFileType {
                            line: line_no,
                            token: type_token.clone(),
                        }
                    })?;

                    state.finish_file()?;
                    state.current_file = Some((
                        CueFile {
                            filename: parts[1..parts.len() - 1].join(" "),
                            file_type,
                            tracks: Vec::new(),
                        },
                        line_no,
                    ));
                }
                "TRACK" => {
                    let number = parse_number(argument(1)?, line_no)?;
                    let mode_token = argument(2)?;
                    let mode = TrackMode::from_cue_token(mode_token).ok_or_else(|| {
                        CueError::InvalidTrackType {
                            line: line_no,
                            token: mode_token.to_string(),
                        }
                    })?;

                    if number == 0 {
                        return Err(CueError::InvalidNumber {
                            line: line_no,
                            value: argument(1)?.to_string(),
                        });
                    }
                    if state.current_file.is_none() {
                        return Err(CueError::TrackOutsideFile { line: line_no });
                    }
                    if !state.seen_tracks.insert(number) {
                        return Err(CueError::DuplicateTrack {
                            line: line_no,
                            number,
                        });
                    }

                    state.finish_track()?;
                    state.current_track = Some((Track::new(number, mode), line_no));
                }
                "INDEX" => {
                    let number = parse_number(argument(1)?, line_no)?;
                    let position = parse_msf(argument(2)?, line_no)?;
                    let track = state.track_mut(line_no, &keyword)?;
                    track.indices.push(Index { number, position });
                }
                "PREGAP" => {
                    let position = parse_msf(argument(1)?, line_no)?;
                    state.track_mut(line_no, &keyword)?.pregap = Some(position);
                }
                "POSTGAP" => {
                    let position = parse_msf(argument(1)?, line_no)?;
                    state.track_mut(line_no, &keyword)?.postgap = Some(position);
                }
                "TITLE" => {
                    let title = argument(1)?.to_string();
                    match &mut state.current_track {
                        Some((track, _)) => track.title = Some(title),
                        None => state.sheet.title = Some(title),
                    }
                }
                "PERFORMER" => {
                    let performer = argument(1)?.to_string();
                    match &mut state.current_track {
                        Some((track, _)) => track.performer = Some(performer),
                        None => state.sheet.performer = Some(performer),
                    }
                }
                "CATALOG" => {
                    state.sheet.catalog = Some(argument(1)?.to_string());
                }
                "FLAGS" | "ISRC" | "SONGWRITER" | "CDTEXTFILE" => {
                    debug!("Ignoring CUE directive on line {line_no}: {line}");
                }
                _ => {
                    debug!("Unknown CUE directive on line {line_no}: {line}");
                }
            }
        }

        state.finish_file()?;

        if state.sheet.files.is_empty() {
            return Err(CueError::NoFiles);
        }

        Ok(state.sheet)
    }
}

#[derive(Default)]
struct ParseState {
    sheet: CueSheet,
    current_file: Option<(CueFile, usize)>,
    current_track: Option<(Track, usize)>,
    seen_tracks: HashSet<u8>,
}

impl ParseState {
    fn track_mut(&mut self, line: usize, directive: &str) -> CueResult<&mut Track> {
        self.current_track
            .as_mut()
            .map(|(track, _)| track)
            .ok_or_else(|| CueError::DirectiveOutsideTrack {
                line,
                directive: directive.to_string(),
            })
    }

    fn finish_track(&mut self) -> CueResult<()> {
        let Some((track, line)) = self.current_track.take() else {
            return Ok(());
        };

        if track.index(1).is_none() {
            return Err(CueError::MissingIndex01 {
                line,
                track: track.number,
            });
        }

        if let Some((file, _)) = &mut self.current_file {
            file.tracks.push(track);
        }

        Ok(())
    }

    fn finish_file(&mut self) -> CueResult<()> {
        self.finish_track()?;

        let Some((file, line)) = self.current_file.take() else {
            return Ok(());
        };

        if file.tracks.is_empty() {
            return Err(CueError::EmptyFile {
                line,
                filename: file.filename,
            });
        }

        self.sheet.files.push(file);
        Ok(())
    }
}

/// Splits a CUE line into whitespace separated tokens, keeping quoted strings whole.
fn tokenize(line: &str, line_no: usize) -> CueResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => token.push(c),
                    None => return Err(CueError::MissingQuoteError { line: line_no }),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }

        tokens.push(token);
    }

    Ok(tokens)
}

fn parse_number(value: &str, line: usize) -> CueResult<u8> {
    value
        .parse::<u8>()
        .ok()
        .filter(|n| *n <= 99)
        .ok_or_else(|| CueError::InvalidNumber {
            line,
            value: value.to_string(),
        })
}

fn parse_msf(value: &str, line: usize) -> CueResult<Msf> {
    value.parse().map_err(|_| CueError::InvalidMSFFormat {
        line,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::writer::write_cue;

    const MULTI_BIN: &str = r#"REM Created by a ripper
TITLE "Some Game"
FILE "Some Game (Track 1).bin" BINARY
  TRACK 01 MODE2/2352
    INDEX 01 00:00:00
FILE "Some Game (Track 2).bin" BINARY
  TRACK 02 AUDIO
    FLAGS DCP
    INDEX 00 00:00:00
    INDEX 01 00:02:00
FILE "Some Game (Track 3).bin" BINARY
  TRACK 03 AUDIO
    PREGAP 00:02:00
    INDEX 01 00:00:00
"#;

    #[test]
    fn parses_multi_file_sheet() {
        let sheet = CueParser::parse_str(MULTI_BIN).unwrap();

        assert_eq!(sheet.files.len(), 3);
        assert_eq!(sheet.track_count(), 3);
        assert_eq!(sheet.title.as_deref(), Some("Some Game"));
        assert_eq!(sheet.comments, vec!["Created by a ripper".to_string()]);
        assert_eq!(sheet.files[0].filename, "Some Game (Track 1).bin");

        let track2 = &sheet.files[1].tracks[0];
        assert_eq!(track2.mode, TrackMode::Audio);
        assert_eq!(track2.index(0), Some(Msf::ZERO));
        assert_eq!(track2.index(1), Some(Msf::from_sectors(150)));
        assert_eq!(track2.start(), Some(Msf::ZERO));

        let track3 = &sheet.files[2].tracks[0];
        assert_eq!(track3.pregap_sectors(), 150);
    }

    #[test]
    fn reparsing_serialized_sheet_yields_same_model() {
        let parsed = CueParser::parse_str(MULTI_BIN).unwrap();
        let reparsed = CueParser::parse_str(&write_cue(&parsed)).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn accepts_lowercase_keywords_and_unquoted_names() {
        let sheet = CueParser::parse_str(
            "file game.bin binary\n  track 1 mode1/2352\n    index 1 00:00:00\n",
        )
        .unwrap();
        assert_eq!(sheet.files[0].filename, "game.bin");
        assert_eq!(sheet.files[0].tracks[0].number, 1);
        assert_eq!(sheet.files[0].tracks[0].mode, TrackMode::Mode1_2352);
    }

    #[test]
    fn missing_index_01_names_the_track_line() {
        let err = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n  TRACK 01 MODE2/2352\n    INDEX 01 00:00:00\n  TRACK 02 AUDIO\n    INDEX 00 00:10:00\n",
        )
        .unwrap_err();

        match err {
            CueError::MissingIndex01 { line, track } => {
                assert_eq!(line, 4);
                assert_eq!(track, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_track_mode_is_rejected_with_line() {
        let err = CueParser::parse_str("FILE \"a.bin\" BINARY\n  TRACK 01 MODE9/1234\n")
            .unwrap_err();
        assert!(matches!(err, CueError::InvalidTrackType { line: 2, .. }));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n  TRACK 01 AUDIO\n    INDEX 01 00:61:00\n",
        )
        .unwrap_err();
        assert!(matches!(err, CueError::InvalidMSFFormat { line: 3, .. }));

        let err = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n  TRACK 01 AUDIO\n    INDEX 01 00:00:75\n",
        )
        .unwrap_err();
        assert!(matches!(err, CueError::InvalidMSFFormat { line: 3, .. }));
    }

    #[test]
    fn file_without_tracks_is_rejected() {
        let err = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\nFILE \"b.bin\" BINARY\n  TRACK 01 AUDIO\n    INDEX 01 00:00:00\n",
        )
        .unwrap_err();
        assert!(matches!(err, CueError::EmptyFile { line: 1, .. }));

        let err = CueParser::parse_str("FILE \"a.bin\" BINARY\n").unwrap_err();
        assert!(matches!(err, CueError::EmptyFile { line: 1, .. }));
    }

    #[test]
    fn structural_errors_are_reported() {
        assert!(matches!(
            CueParser::parse_str("TRACK 01 AUDIO\n"),
            Err(CueError::TrackOutsideFile { line: 1 })
        ));
        assert!(matches!(
            CueParser::parse_str("FILE \"a.bin BINARY\n"),
            Err(CueError::MissingQuoteError { line: 1 })
        ));
        assert!(matches!(
            CueParser::parse_str("FILE \"a.bin\" ZIP\n"),
            Err(CueError::InvalidFileType { line: 1, .. })
        ));
        assert!(matches!(
            CueParser::parse_str(
                "FILE \"a.bin\" BINARY\n TRACK 01 AUDIO\n INDEX 01 00:00:00\n TRACK 01 AUDIO\n INDEX 01 00:01:00\n"
            ),
            Err(CueError::DuplicateTrack { line: 4, number: 1 })
        ));
        assert!(matches!(CueParser::parse_str("REM nothing\n"), Err(CueError::NoFiles)));
        assert!(matches!(
            CueParser::parse_str("FILE \"a.bin\" BINARY\n  INDEX 01 00:00:00\n"),
            Err(CueError::DirectiveOutsideTrack { line: 2, ref directive }) if directive == "INDEX"
        ));
        assert!(matches!(
            CueParser::parse_str("PREGAP 00:02:00\n"),
            Err(CueError::DirectiveOutsideTrack { line: 1, .. })
        ));
    }

    #[test]
    fn absurd_minutes_are_rejected_while_parsing() {
        let err = CueParser::parse_str(
            "FILE \"a.bin\" BINARY\n  TRACK 01 AUDIO\n    INDEX 01 999999999999999:00:00\n",
        )
        .unwrap_err();
        assert!(matches!(err, CueError::InvalidMSFFormat { line: 3, .. }));
    }

    #[tokio::test]
    async fn parses_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.cue");
        tokio::fs::write(&path, "\u{feff}FILE \"game.bin\" BINARY\r\n  TRACK 01 MODE2/2352\r\n    INDEX 01 00:00:00\r\n")
            .await
            .unwrap();

        let sheet = CueParser::new(&path).parse().await.unwrap();
        assert_eq!(sheet.files[0].filename, "game.bin");
    }
}
