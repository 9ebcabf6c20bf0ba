use crate::consolidate::error::{MergeError, MergeResult};
use crate::consolidate::models::ConsolidationPlan;
use crate::util::tool::{ToolInvocation, ToolRunner};
use clap::ValueEnum;
use log::{debug, info};
use sha1::{Digest, Sha1};
use std::future::Future;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};

const WRITE_BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8 MB buffer
const COPY_CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub output: PathBuf,
    pub bytes_written: u64,
    pub sha1: String,
}

/// Produces the single merged BIN described by a plan.
///
/// Segment file names are resolved relative to the directory of `source_cue`.
/// Nothing is left at `output` unless the merge succeeds.
pub trait TrackMergeExecutor {
    fn merge(
        &self,
        plan: &ConsolidationPlan,
        source_cue: &Path,
        output: &Path,
    ) -> impl Future<Output = MergeResult<MergeReport>> + Send;
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Concatenates the planned segments itself, zero filling every padding run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMergeExecutor;

impl TrackMergeExecutor for NativeMergeExecutor {
    async fn merge(
        &self,
        plan: &ConsolidationPlan,
        source_cue: &Path,
        output: &Path,
    ) -> MergeResult<MergeReport> {
        let source_dir = parent_dir(source_cue);

        let temp = tempfile::Builder::new()
            .prefix(".discshelf-")
            .suffix(".bin.part")
            .tempfile_in(parent_dir(output))?;
        let (std_file, temp_path) = temp.into_parts();

        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, File::from_std(std_file));
        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut bytes_written = 0u64;

        for segment in plan.segments() {
            let path = source_dir.join(&segment.file);
            debug!(
                "Copying {} bytes at {} from {} (+{} padding)",
                segment.length,
                segment.offset,
                path.display(),
                segment.padding
            );

            let mut reader = File::open(&path).await.map_err(|e| match e.kind() {
                ErrorKind::NotFound => MergeError::MissingSource(path.clone()),
                _ => MergeError::IoError(e),
            })?;
            reader.seek(SeekFrom::Start(segment.offset)).await?;

            let mut remaining = segment.length;
            while remaining > 0 {
                let chunk = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
                reader
                    .read_exact(&mut buffer[..chunk])
                    .await
                    .map_err(|e| match e.kind() {
                        ErrorKind::UnexpectedEof => MergeError::TruncatedSource {
                            file: path.clone(),
                            offset: segment.offset + segment.length - remaining,
                        },
                        _ => MergeError::IoError(e),
                    })?;
                hasher.update(&buffer[..chunk]);
                writer.write_all(&buffer[..chunk]).await?;
                remaining -= chunk as u64;
            }

            let mut padding = segment.padding;
            while padding > 0 {
                let chunk = padding.min(COPY_CHUNK_SIZE as u64) as usize;
                buffer[..chunk].fill(0);
                hasher.update(&buffer[..chunk]);
                writer.write_all(&buffer[..chunk]).await?;
                padding -= chunk as u64;
            }

            bytes_written += segment.aligned_len();
        }

        writer.flush().await?;
        let file = writer.into_inner();
        file.sync_all().await?;
        drop(file);

        if bytes_written != plan.total_bytes {
            return Err(MergeError::LengthMismatch {
                expected: plan.total_bytes,
                actual: bytes_written,
            });
        }

        temp_path
            .persist(output)
            .map_err(|e| MergeError::PersistError {
                path: output.to_path_buf(),
                source: e.error,
            })?;

        Ok(MergeReport {
            output: output.to_path_buf(),
            bytes_written,
            sha1: hex::encode(hasher.finalize()),
        })
    }
}

/// Round trips the source CUE through a temporary CHD with `chdman`.
#[derive(Debug, Clone)]
pub struct ChdmanMergeExecutor<R: ToolRunner> {
    runner: R,
    chdman: PathBuf,
}

impl<R: ToolRunner> ChdmanMergeExecutor<R> {
    pub fn new(runner: R, chdman: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            chdman: chdman.into(),
        }
    }
}

impl<R: ToolRunner + Sync> TrackMergeExecutor for ChdmanMergeExecutor<R> {
    async fn merge(
        &self,
        plan: &ConsolidationPlan,
        source_cue: &Path,
        output: &Path,
    ) -> MergeResult<MergeReport> {
        let work = tempfile::Builder::new()
            .prefix(".discshelf-")
            .tempdir_in(parent_dir(output))?;
        let chd = work.path().join("disc.chd");
        let cue = work.path().join("disc.cue");
        let bin = work.path().join("disc.bin");

        info!("Creating temporary CHD from {}", source_cue.display());
        let create = ToolInvocation::new(&self.chdman)
            .arg("createcd")
            .arg("-i")
            .arg(source_cue)
            .arg("-o")
            .arg(&chd)
            .arg("-f");
        self.runner.run(&create).await?;

        info!("Extracting single-track image from CHD");
        let extract = ToolInvocation::new(&self.chdman)
            .arg("extractcd")
            .arg("-i")
            .arg(&chd)
            .arg("-o")
            .arg(&cue)
            .arg("-ob")
            .arg(&bin)
            .arg("-f");
        self.runner.run(&extract).await?;

        let actual = match fs::metadata(&bin).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if actual != plan.total_bytes {
            return Err(MergeError::LengthMismatch {
                expected: plan.total_bytes,
                actual,
            });
        }

        let sha1 = sha1_file(&bin).await?;
        fs::rename(&bin, output)
            .await
            .map_err(|source| MergeError::PersistError {
                path: output.to_path_buf(),
                source,
            })?;

        Ok(MergeReport {
            output: output.to_path_buf(),
            bytes_written: actual,
            sha1,
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Concatenate the tracks directly
    #[default]
    Native,
    /// Round trip through `chdman createcd` and `extractcd`
    Chdman,
}

/// Executor picked on the command line.
#[derive(Debug, Clone)]
pub enum MergeBackend<R: ToolRunner> {
    Native(NativeMergeExecutor),
    Chdman(ChdmanMergeExecutor<R>),
}

impl<R: ToolRunner + Sync> TrackMergeExecutor for MergeBackend<R> {
    async fn merge(
        &self,
        plan: &ConsolidationPlan,
        source_cue: &Path,
        output: &Path,
    ) -> MergeResult<MergeReport> {
        match self {
            MergeBackend::Native(executor) => executor.merge(plan, source_cue, output).await,
            MergeBackend::Chdman(executor) => executor.merge(plan, source_cue, output).await,
        }
    }
}

pub async fn sha1_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
