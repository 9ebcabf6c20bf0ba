use crate::archive::games::{GameGroup, group_games};
use crate::archive::{ArchiveCodec, CompressOptions, SEVENZIP_CANDIDATES, SevenZip};
use crate::batch::{BatchReport, ImageOutcome, run_batch};
use crate::commands::archive::ArchiveCommand;
use crate::error::DiscShelfResult;
use crate::rename::DirectorySnapshot;
use crate::util::tool::{ProcessRunner, SEVENZIP_ENV, SEVENZIP_HINT, resolve_tool};
use indicatif::MultiProgress;
use log::info;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub compress: CompressOptions,
    /// Replace archives that already exist.
    pub overwrite: bool,
    pub dry_run: bool,
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Exists(PathBuf),
    Planned { archive: PathBuf, files: usize },
    Created { archive: PathBuf, files: usize },
}

impl Display for ArchiveOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveOutcome::Exists(archive) => {
                write!(f, "{} exists, skipped", archive.display())
            }
            ArchiveOutcome::Planned { archive, files } => {
                write!(f, "would pack {files} files into {}", archive.display())
            }
            ArchiveOutcome::Created { archive, files } => {
                write!(f, "packed {files} files into {}", archive.display())
            }
        }
    }
}

/// Resolves 7z and archives the command's directory. Archives are packed one
/// at a time unless `--jobs` says otherwise, 7z already uses every thread.
pub async fn archive_games(
    progress: &MultiProgress,
    cmd: ArchiveCommand,
) -> DiscShelfResult<BatchReport<ArchiveOutcome>> {
    let program = resolve_tool(
        &SEVENZIP_CANDIDATES,
        cmd.sevenzip.as_deref(),
        SEVENZIP_ENV,
        SEVENZIP_HINT,
    )?;
    info!("Using 7z at {}", program.display());

    let options = ArchiveOptions {
        compress: CompressOptions {
            level: cmd.level,
            threads: cmd.threads(),
        },
        overwrite: cmd.overwrite,
        dry_run: cmd.batch.dry_run,
        jobs: cmd.batch.jobs.unwrap_or(1).max(1),
    };

    archive_directory(
        progress,
        &SevenZip::new(ProcessRunner, program),
        &cmd.directory,
        options,
    )
    .await
}

/// Packs every game of `root` into `<title>.7z` next to its discs.
pub async fn archive_directory<C: ArchiveCodec + Sync>(
    progress: &MultiProgress,
    codec: &C,
    root: &Path,
    options: ArchiveOptions,
) -> DiscShelfResult<BatchReport<ArchiveOutcome>> {
    let snapshot = DirectorySnapshot::capture(root).await?;
    let groups = group_games(&snapshot);
    info!("Found {} games in {}", groups.len(), root.display());

    let snapshot = &snapshot;
    Ok(run_batch(groups, options.jobs, progress, |group| async move {
        let archive = group.archive_path(snapshot);
        let result = archive_group(codec, snapshot, &group, &archive, options).await;
        ImageOutcome::new(archive, result)
    })
    .await)
}

async fn archive_group<C: ArchiveCodec>(
    codec: &C,
    snapshot: &DirectorySnapshot,
    group: &GameGroup,
    archive: &Path,
    options: ArchiveOptions,
) -> DiscShelfResult<ArchiveOutcome> {
    if !options.overwrite && fs::try_exists(archive).await? {
        return Ok(ArchiveOutcome::Exists(archive.to_path_buf()));
    }

    let files: Vec<String> = group.files.iter().cloned().collect();
    if options.dry_run {
        return Ok(ArchiveOutcome::Planned {
            archive: archive.to_path_buf(),
            files: files.len(),
        });
    }

    codec
        .compress(archive, snapshot.root(), &files, options.compress)
        .await?;

    Ok(ArchiveOutcome::Created {
        archive: archive.to_path_buf(),
        files: files.len(),
    })
}
