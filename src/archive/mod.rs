use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::util::tool::{ToolInvocation, ToolRunner};
use log::{debug, info};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;

pub mod error;
pub mod games;
pub mod pack;

pub const SEVENZIP_CANDIDATES: [&str; 3] = ["7z", "7zz", "7za"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Compression level, 0 to 9.
    pub level: u8,
    /// Compressor threads, 0 lets the compressor decide.
    pub threads: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            level: 9,
            threads: 0,
        }
    }
}

/// Packs and unpacks archives. Outputs only appear at their final path once
/// complete.
pub trait ArchiveCodec {
    fn list(&self, archive: &Path) -> impl Future<Output = ArchiveResult<Vec<ArchiveEntry>>> + Send;

    /// Extracts `archive` into the directory `destination`, which must not exist.
    fn extract(&self, archive: &Path, destination: &Path) -> impl Future<Output = ArchiveResult<()>> + Send;

    /// Creates `archive` from `files`, given relative to `root`.
    fn compress(
        &self,
        archive: &Path,
        root: &Path,
        files: &[String],
        options: CompressOptions,
    ) -> impl Future<Output = ArchiveResult<()>> + Send;
}

/// `7z` command line codec.
#[derive(Debug, Clone)]
pub struct SevenZip<R: ToolRunner> {
    runner: R,
    program: PathBuf,
}

impl<R: ToolRunner> SevenZip<R> {
    pub fn new(runner: R, program: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn work_dir(next_to: &Path) -> ArchiveResult<tempfile::TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(".discshelf-")
        .tempdir_in(parent_dir(next_to))?)
}

impl<R: ToolRunner + Sync> ArchiveCodec for SevenZip<R> {
    async fn list(&self, archive: &Path) -> ArchiveResult<Vec<ArchiveEntry>> {
        let invocation = ToolInvocation::new(&self.program)
            .arg("l")
            .arg("-slt")
            .arg(archive);
        let output = self.runner.run(&invocation).await?;
        Ok(parse_technical_listing(&output.stdout))
    }

    async fn extract(&self, archive: &Path, destination: &Path) -> ArchiveResult<()> {
        if fs::try_exists(destination).await? {
            return Err(ArchiveError::AlreadyExists(destination.to_path_buf()));
        }

        let work = work_dir(destination)?;
        let mut output_flag = std::ffi::OsString::from("-o");
        output_flag.push(work.path());

        info!("Extracting {} to {}", archive.display(), destination.display());
        let invocation = ToolInvocation::new(&self.program)
            .arg("x")
            .arg("-y")
            .arg(output_flag)
            .arg(archive);
        self.runner.run(&invocation).await?;

        fs::rename(work.path(), destination)
            .await
            .map_err(|source| ArchiveError::PersistError {
                path: destination.to_path_buf(),
                source,
            })
    }

    async fn compress(
        &self,
        archive: &Path,
        root: &Path,
        files: &[String],
        options: CompressOptions,
    ) -> ArchiveResult<()> {
        let work = work_dir(archive)?;
        let partial = work.path().join("archive.7z");

        let threads = match options.threads {
            0 => "-mmt=on".to_string(),
            n => format!("-mmt={n}"),
        };

        let mut invocation = ToolInvocation::new(&self.program)
            .arg("a")
            .arg("-t7z")
            .arg(format!("-mx={}", options.level.min(9)))
            .arg(threads)
            .arg(&partial)
            .current_dir(root);
        for file in files {
            invocation = invocation.arg(file);
        }

        info!("Compressing {} files into {}", files.len(), archive.display());
        self.runner.run(&invocation).await?;

        debug!("Moving {} -> {}", partial.display(), archive.display());
        fs::rename(&partial, archive)
            .await
            .map_err(|source| ArchiveError::PersistError {
                path: archive.to_path_buf(),
                source,
            })
    }
}

/// Parses `7z l -slt` output, skipping directories.
pub fn parse_technical_listing(stdout: &str) -> Vec<ArchiveEntry> {
    let Some((_, body)) = stdout.split_once("----------") else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut path = None;
    let mut size = 0;
    let mut folder = false;

    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim();
        if line.is_empty() {
            if let Some(path) = path.take()
                && !folder
            {
                entries.push(ArchiveEntry { path, size });
            }
            size = 0;
            folder = false;
            continue;
        }

        let Some((key, value)) = line.split_once(" = ").or_else(|| line.split_once(" =")) else {
            continue;
        };
        match key {
            "Path" => path = Some(value.trim().to_string()),
            "Size" => size = value.trim().parse().unwrap_or(0),
            "Folder" => folder = value.trim() == "+",
            "Attributes" => folder |= value.trim().starts_with('D'),
            _ => {}
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::tool::ToolOutput;
    use crate::util::tool::fake::FakeRunner;

    const LISTING: &str = "\n7-Zip 23.01 (x64)\n\nScanning the drive for archives:\n1 file, 1234 bytes\n\nListing archive: game.7z\n\n--\nPath = game.7z\nType = 7z\nPhysical Size = 1234\n\n----------\nPath = Game\nSize = 0\nFolder = +\nAttributes = D\n\nPath = Game/Game.cue\nSize = 90\nFolder = -\nAttributes = A\n\nPath = Game/Game.bin\nSize = 235200\nFolder = -\nAttributes = A\n";

    #[test]
    fn parses_listing_without_folders() {
        let entries = parse_technical_listing(LISTING);
        assert_eq!(
            entries,
            vec![
                ArchiveEntry {
                    path: "Game/Game.cue".into(),
                    size: 90
                },
                ArchiveEntry {
                    path: "Game/Game.bin".into(),
                    size: 235200
                },
            ]
        );
    }

    #[tokio::test]
    async fn extract_moves_finished_directory_into_place() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|invocation| {
            let flag = invocation.args[2].to_string_lossy().into_owned();
            let dir = PathBuf::from(flag.trim_start_matches("-o"));
            std::fs::write(dir.join("Game.bin"), b"bin").unwrap();
            Ok(ToolOutput::default())
        });
        let codec = SevenZip::new(runner.clone(), "7z");
        let destination = root.path().join("Game");

        codec
            .extract(&root.path().join("Game.7z"), &destination)
            .await
            .unwrap();

        assert_eq!(std::fs::read(destination.join("Game.bin")).unwrap(), b"bin");
        assert_eq!(runner.calls()[0].args[0], "x");
        assert_eq!(runner.calls()[0].args[1], "-y");
    }

    #[tokio::test]
    async fn extract_refuses_existing_destination() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();
        let codec = SevenZip::new(runner.clone(), "7z");

        let err = codec
            .extract(&root.path().join("Game.7z"), root.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::AlreadyExists(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn compress_passes_level_threads_and_files() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|invocation| {
            std::fs::write(&invocation.args[4], b"7z").unwrap();
            Ok(ToolOutput::default())
        });
        let codec = SevenZip::new(runner.clone(), "7z");
        let archive = root.path().join("Game.7z");
        let files = vec!["Game.bin".to_string(), "Game.cue".to_string()];

        codec
            .compress(&archive, root.path(), &files, CompressOptions { level: 5, threads: 8 })
            .await
            .unwrap();

        let call = &runner.calls()[0];
        let args: Vec<_> = call.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..4], ["a", "-t7z", "-mx=5", "-mmt=8"]);
        assert_eq!(&args[5..], ["Game.bin", "Game.cue"]);
        assert_eq!(call.cwd.as_deref(), Some(root.path()));
        assert_eq!(std::fs::read(&archive).unwrap(), b"7z");
    }

    #[tokio::test]
    async fn failed_compression_leaves_no_archive() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|invocation| {
            Err(crate::util::tool::ToolError::NotFound {
                name: invocation.program_name(),
                hint: "",
            })
        });
        let codec = SevenZip::new(runner, "7z");
        let archive = root.path().join("Game.7z");

        assert!(codec
            .compress(&archive, root.path(), &["a.bin".to_string()], CompressOptions::default())
            .await
            .is_err());
        assert!(!archive.exists());
    }
}
