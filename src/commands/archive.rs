use crate::commands::BatchArgs;
use clap::Parser;
use std::path::PathBuf;

/// Packs the discs of every game into one 7z archive.
#[derive(Parser, Debug, Clone, Eq, PartialEq)]
#[command(
    long_about = "Packs the discs of every game into one 7z archive\n\nDiscs are grouped by title, ignoring product codes and disc numbers, so all discs of a game end up in the same archive. Existing archives are skipped unless --overwrite is given."
)]
pub struct ArchiveCommand {
    /// Folder with BIN/CUE pairs
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: PathBuf,

    /// Compression level
    #[arg(long, short = 'l', default_value_t = 9, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub level: u8,

    /// Compressor threads per archive, defaults to twice the number of CPUs
    #[arg(long, short = 't', value_name = "THREADS")]
    pub threads: Option<usize>,

    /// Replace archives that already exist
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Path to 7z
    #[arg(long, value_name = "SEVENZIP")]
    pub sevenzip: Option<PathBuf>,

    #[command(flatten)]
    pub batch: BatchArgs,
}

impl ArchiveCommand {
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(2)
        })
    }
}
