use crate::archive::ArchiveCodec;
use crate::consolidate::error::{MergeError, MergeResult};
use crate::consolidate::executor::{MergeReport, NativeMergeExecutor, TrackMergeExecutor};
use crate::consolidate::models::ConsolidationPlan;
use crate::consolidate::planner::plan_consolidation;
use crate::consolidate::synthesize_cue_sheet;
use crate::cue::CueParser;
use crate::cue::models::CueSheet;
use crate::cue::writer::write_cue;
use crate::rename::FsMover;
use crate::util::fs::{file_stem, find_with_extension, list_with_extension};
use crate::util::tool::{SEVENZIP_HINT, ToolError};
use log::{debug, info};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const OUTPUT_DIR_NAME: &str = "SingleTrackDiscImages";

/// How deep below a folder CUE and BIN files are looked for.
pub const SEARCH_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscInput {
    Archive(PathBuf),
    Cue(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscJob {
    /// Base name of the outputs.
    pub name: String,
    pub input: DiscInput,
}

impl DiscJob {
    pub fn image(&self) -> &Path {
        match &self.input {
            DiscInput::Archive(path) | DiscInput::Cue(path) => path,
        }
    }
}

/// `.7z` archives directly in `root` when there are any, otherwise every CUE
/// up to [`SEARCH_DEPTH`] levels deep outside of `out_dir`.
pub async fn find_disc_jobs(root: &Path, out_dir: &Path) -> MergeResult<Vec<DiscJob>> {
    let archives = list_with_extension(root, "7z").await?;
    if !archives.is_empty() {
        return Ok(archives
            .into_iter()
            .map(|archive| DiscJob {
                name: file_stem(&archive),
                input: DiscInput::Archive(archive),
            })
            .collect());
    }

    info!("No .7z archives found, processing existing CUE files instead");
    Ok(find_with_extension(root, "cue", SEARCH_DEPTH)
        .await?
        .into_iter()
        .filter(|cue| !cue.starts_with(out_dir))
        .map(|cue| DiscJob {
            name: file_stem(&cue),
            input: DiscInput::Cue(cue),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscSource {
    Cue(PathBuf),
    /// Loose BINs without a sheet, sorted by name.
    Bins(Vec<PathBuf>),
}

/// The first CUE below `game_dir`, or all of its BINs when there is none.
pub async fn locate_disc(game_dir: &Path) -> MergeResult<DiscSource> {
    if let Some(cue) = find_with_extension(game_dir, "cue", SEARCH_DEPTH)
        .await?
        .into_iter()
        .next()
    {
        return Ok(DiscSource::Cue(cue));
    }

    let bins = find_with_extension(game_dir, "bin", SEARCH_DEPTH).await?;
    if bins.is_empty() {
        return Err(MergeError::NothingToMerge(game_dir.to_path_buf()));
    }

    info!(
        "Synthesizing CUE for {} BINs in {} (track 1 data, rest audio, sorted by name)",
        bins.len(),
        game_dir.display()
    );
    Ok(DiscSource::Bins(bins))
}

#[derive(Debug)]
pub enum ConsolidationOutcome {
    /// Dry run on an archive that is not extracted yet.
    WouldExtract { archive: PathBuf, entries: usize },
    /// Dry run.
    Planned {
        plan: ConsolidationPlan,
        output_bin: PathBuf,
    },
    Written {
        output_bin: PathBuf,
        output_cue: PathBuf,
        tracks: usize,
        /// `None` when the source BIN already is the output.
        report: Option<MergeReport>,
    },
}

impl Display for ConsolidationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsolidationOutcome::WouldExtract { archive, entries } => {
                write!(f, "would extract {} ({entries} files)", archive.display())
            }
            ConsolidationOutcome::Planned { plan, output_bin } => write!(
                f,
                "would write {} tracks, {} bytes ({} padding) to {}",
                plan.tracks.len(),
                plan.total_bytes,
                plan.padding_bytes(),
                output_bin.display()
            ),
            ConsolidationOutcome::Written {
                output_bin,
                tracks,
                report: Some(report),
                ..
            } => write!(
                f,
                "wrote {} tracks, {} bytes to {} (sha1 {})",
                tracks,
                report.bytes_written,
                output_bin.display(),
                report.sha1
            ),
            ConsolidationOutcome::Written { output_cue, .. } => {
                write!(f, "rewrote {}", output_cue.display())
            }
        }
    }
}

/// Turns one disc at a time into `<out_dir>/<name>.{bin,cue}`.
#[derive(Debug)]
pub struct Consolidator<E, A> {
    executor: E,
    codec: Option<A>,
    out_dir: PathBuf,
    dry_run: bool,
}

impl<E: TrackMergeExecutor, A: ArchiveCodec> Consolidator<E, A> {
    pub fn new(executor: E, codec: Option<A>, out_dir: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            executor,
            codec,
            out_dir: out_dir.into(),
            dry_run,
        }
    }


    pub async fn process(&self, job: &DiscJob) -> MergeResult<ConsolidationOutcome> {
        let source = match &job.input {
            DiscInput::Cue(cue) => DiscSource::Cue(cue.clone()),
            DiscInput::Archive(archive) => {
                let game_dir = archive.with_file_name(&job.name);
                if fs::try_exists(&game_dir).await? {
                    info!("Using existing extracted folder {}", game_dir.display());
                } else {
                    let codec = self.codec.as_ref().ok_or_else(|| ToolError::NotFound {
                        name: "7z".to_string(),
                        hint: SEVENZIP_HINT,
                    })?;

                    if self.dry_run {
                        let entries = codec.list(archive).await?;
                        return Ok(ConsolidationOutcome::WouldExtract {
                            archive: archive.clone(),
                            entries: entries.len(),
                        });
                    }
                    codec.extract(archive, &game_dir).await?;
                }
                locate_disc(&game_dir).await?
            }
        };

        // Keeps a synthesized sheet on disk for as long as the merge runs.
        let mut synthesized_dir = None;
        let (sheet, cue_path) = match source {
            DiscSource::Cue(cue) => (CueParser::new(&cue).parse().await?, cue),
            DiscSource::Bins(bins) => {
                let sheet = synthesize_cue_sheet(&bins)?;
                let dir = tempfile::Builder::new().prefix("discshelf-").tempdir()?;
                let cue = dir.path().join(format!("{}.cue", job.name));
                fs::write(&cue, write_cue(&sheet)).await?;
                synthesized_dir = Some(dir);
                (sheet, cue)
            }
        };

        let result = self.consolidate(job, &sheet, &cue_path).await;
        drop(synthesized_dir);
        result
    }

    async fn consolidate(
        &self,
        job: &DiscJob,
        sheet: &CueSheet,
        cue_path: &Path,
    ) -> MergeResult<ConsolidationOutcome> {
        let cue_dir = cue_path.parent().unwrap_or(Path::new("."));

        let mut sizes = HashMap::new();
        for file in &sheet.files {
            let path = cue_dir.join(&file.filename);
            let metadata = fs::metadata(&path).await.map_err(|e| match e.kind() {
                ErrorKind::NotFound => MergeError::MissingSource(path.clone()),
                _ => MergeError::IoError(e),
            })?;
            sizes.insert(file.filename.clone(), metadata.len());
        }

        let bin_name = format!("{}.bin", job.name);
        let plan = plan_consolidation(sheet, &sizes, &bin_name)?;
        let output_bin = self.out_dir.join(&bin_name);
        let output_cue = self.out_dir.join(format!("{}.cue", job.name));

        debug!(
            "{}: {} tracks from {} files, {} bytes",
            job.name,
            plan.tracks.len(),
            plan.source_file_count,
            plan.total_bytes
        );

        if self.dry_run {
            return Ok(ConsolidationOutcome::Planned { plan, output_bin });
        }

        fs::create_dir_all(&self.out_dir).await?;

        let report = if plan.is_noop() {
            let file = sheet
                .files
                .first()
                .ok_or_else(|| MergeError::NothingToMerge(cue_path.to_path_buf()))?;
            let source = cue_dir.join(&file.filename);

            if same_file(&source, &output_bin).await {
                None
            } else {
                info!("{} is already a single track image, copying", source.display());
                Some(NativeMergeExecutor.merge(&plan, cue_path, &output_bin).await?)
            }
        } else {
            info!(
                "Merging {} files of {} into {}",
                plan.source_file_count,
                job.name,
                output_bin.display()
            );
            Some(self.executor.merge(&plan, cue_path, &output_bin).await?)
        };

        FsMover
            .rewrite(&output_cue, write_cue(&plan.to_cue_sheet()).as_bytes())
            .await?;

        Ok(ConsolidationOutcome::Written {
            output_bin,
            output_cue,
            tracks: plan.tracks.len(),
            report,
        })
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
