use crate::archive::{SEVENZIP_CANDIDATES, SevenZip};
use crate::batch::{BatchReport, ImageOutcome, run_batch};
use crate::cd::{Msf, TrackMode};
use crate::commands::consolidate::ConsolidateCommand;
use crate::consolidate::error::{ConsolidationError, ConsolidationResult, MAX_TRACKS};
use crate::consolidate::executor::{
    ChdmanMergeExecutor, ExecutorKind, MergeBackend, NativeMergeExecutor,
};
use crate::consolidate::pipeline::{
    ConsolidationOutcome, Consolidator, DiscInput, OUTPUT_DIR_NAME, find_disc_jobs,
};
use crate::cue::models::{CueFile, CueSheet, FileType, Index, Track};
use crate::error::DiscShelfResult;
use crate::util::tool::{
    CHDMAN_ENV, CHDMAN_HINT, ProcessRunner, SEVENZIP_ENV, SEVENZIP_HINT, resolve_tool,
};
use indicatif::MultiProgress;
use log::{info, warn};
use std::collections::HashSet;
use std::path::PathBuf;

pub mod error;
pub mod executor;
pub mod models;
pub mod pipeline;
pub mod planner;

/// Builds a sheet for a folder of loose BINs: one file per track in the given
/// order, the first one data and the rest audio. File names stay absolute.
pub fn synthesize_cue_sheet(bins: &[PathBuf]) -> ConsolidationResult<CueSheet> {
    if bins.len() > MAX_TRACKS {
        return Err(ConsolidationError::TooManyTracks(bins.len()));
    }

    let files = bins
        .iter()
        .zip(1u8..)
        .map(|(bin, number)| {
            let mode = if number == 1 {
                TrackMode::Mode2_2352
            } else {
                TrackMode::Audio
            };

            let mut track = Track::new(number, mode);
            track.indices.push(Index {
                number: 1,
                position: Msf::ZERO,
            });

            CueFile {
                filename: bin.to_string_lossy().into_owned(),
                file_type: FileType::Binary,
                tracks: vec![track],
            }
        })
        .collect();

    Ok(CueSheet {
        files,
        ..Default::default()
    })
}

/// Consolidates every disc found below the command's directory.
pub async fn consolidate_directory(
    progress: &MultiProgress,
    cmd: ConsolidateCommand,
) -> DiscShelfResult<BatchReport<ConsolidationOutcome>> {
    let out_dir = cmd
        .output
        .clone()
        .unwrap_or_else(|| cmd.directory.join(OUTPUT_DIR_NAME));

    let mut seen = HashSet::new();
    let jobs: Vec<_> = find_disc_jobs(&cmd.directory, &out_dir)
        .await?
        .into_iter()
        .filter(|job| {
            let fresh = seen.insert(job.name.clone());
            if !fresh {
                warn!(
                    "{} would overwrite another disc named {}, skipping",
                    job.image().display(),
                    job.name
                );
            }
            fresh
        })
        .collect();
    info!("Found {} discs in {}", jobs.len(), cmd.directory.display());

    let executor = match cmd.executor {
        ExecutorKind::Native => MergeBackend::Native(NativeMergeExecutor),
        ExecutorKind::Chdman => {
            let chdman = resolve_tool(&["chdman"], cmd.chdman.as_deref(), CHDMAN_ENV, CHDMAN_HINT)?;
            info!("Using chdman at {}", chdman.display());
            MergeBackend::Chdman(ChdmanMergeExecutor::new(ProcessRunner, chdman))
        }
    };

    // Only archives that still need extracting fail without 7z.
    let codec = if jobs.iter().any(|job| matches!(job.input, DiscInput::Archive(_))) {
        resolve_tool(
            &SEVENZIP_CANDIDATES,
            cmd.sevenzip.as_deref(),
            SEVENZIP_ENV,
            SEVENZIP_HINT,
        )
        .ok()
        .map(|program| SevenZip::new(ProcessRunner, program))
    } else {
        None
    };

    let consolidator = Consolidator::new(executor, codec, out_dir, cmd.batch.dry_run);
    let consolidator = &consolidator;

    Ok(run_batch(jobs, cmd.batch.jobs(), progress, |job| async move {
        let result = consolidator.process(&job).await;
        ImageOutcome::new(job.image(), result)
    })
    .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::BatchArgs;
    use crate::cue::writer::write_cue;
    use indicatif::ProgressDrawTarget;

    fn command(directory: &std::path::Path, dry_run: bool) -> ConsolidateCommand {
        ConsolidateCommand {
            directory: directory.to_path_buf(),
            output: None,
            executor: ExecutorKind::Native,
            chdman: None,
            sevenzip: None,
            batch: BatchArgs {
                dry_run,
                jobs: Some(2),
            },
        }
    }

    fn write_two_track_disc(dir: &std::path::Path) {
        std::fs::write(dir.join("Game (Track 1).bin"), vec![1u8; 2352 * 4]).unwrap();
        std::fs::write(dir.join("Game (Track 2).bin"), vec![2u8; 2352 * 2]).unwrap();
        std::fs::write(
            dir.join("Game.cue"),
            "FILE \"Game (Track 1).bin\" BINARY\n  TRACK 01 MODE2/2352\n    INDEX 01 00:00:00\n\
             FILE \"Game (Track 2).bin\" BINARY\n  TRACK 02 AUDIO\n    INDEX 01 00:00:00\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn consolidates_every_cue_of_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_two_track_disc(dir.path());
        let progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());

        let report = consolidate_directory(&progress, command(dir.path(), false))
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 1);

        let out = dir.path().join(OUTPUT_DIR_NAME);
        let bin = std::fs::read(out.join("Game.bin")).unwrap();
        assert_eq!(bin.len(), 2352 * 6);
        assert_eq!(bin[2352 * 4], 2);
        assert_eq!(
            std::fs::read_to_string(out.join("Game.cue")).unwrap(),
            "FILE \"Game.bin\" BINARY\n  TRACK 01 MODE2/2352\n    INDEX 01 00:00:00\n  TRACK 02 AUDIO\n    INDEX 01 00:00:04\n"
        );
    }

    #[tokio::test]
    async fn dry_run_creates_no_output_folder() {
        let dir = tempfile::tempdir().unwrap();
        write_two_track_disc(dir.path());
        let progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());

        let report = consolidate_directory(&progress, command(dir.path(), true))
            .await
            .unwrap();
        assert!(matches!(
            report.outcomes[0].result,
            Ok(ConsolidationOutcome::Planned { .. })
        ));
        assert!(!dir.path().join(OUTPUT_DIR_NAME).exists());
    }

    #[test]
    fn synthesized_sheet_has_data_then_audio() {
        let sheet = synthesize_cue_sheet(&[
            PathBuf::from("/d/Game (Track 1).bin"),
            PathBuf::from("/d/Game (Track 2).bin"),
        ])
        .unwrap();

        assert_eq!(
            write_cue(&sheet),
            "FILE \"/d/Game (Track 1).bin\" BINARY\n  TRACK 01 MODE2/2352\n    INDEX 01 00:00:00\nFILE \"/d/Game (Track 2).bin\" BINARY\n  TRACK 02 AUDIO\n    INDEX 01 00:00:00\n"
        );
    }

    #[test]
    fn more_bins_than_tracks_is_an_error() {
        let bins: Vec<PathBuf> = (1..=100)
            .map(|n| PathBuf::from(format!("/d/Game (Track {n}).bin")))
            .collect();

        assert!(matches!(
            synthesize_cue_sheet(&bins),
            Err(ConsolidationError::TooManyTracks(100))
        ));

        let sheet = synthesize_cue_sheet(&bins[..99]).unwrap();
        assert_eq!(sheet.files.last().unwrap().tracks[0].number, 99);
    }
}
