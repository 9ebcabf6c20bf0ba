use crate::commands::BatchArgs;
use crate::consolidate::executor::ExecutorKind;
use clap::Parser;
use std::path::PathBuf;

/// Merges every multi-track disc into one BIN with a rewritten CUE.
#[derive(Parser, Debug, Clone, Eq, PartialEq)]
#[command(
    long_about = "Merges every multi-track disc into one BIN with a rewritten CUE\n\nIf DIRECTORY holds .7z archives each one is extracted next to it first, otherwise every CUE up to two folders deep is consolidated. Results land in DIRECTORY/SingleTrackDiscImages unless --output is given."
)]
pub struct ConsolidateCommand {
    /// Folder with .7z archives or CUE/BIN sets
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: PathBuf,

    /// Folder for the merged images
    #[arg(long, short = 'o', value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// How the tracks are merged
    #[arg(long, value_enum, default_value_t = ExecutorKind::Native)]
    pub executor: ExecutorKind,

    /// Path to chdman, only used by the chdman executor
    #[arg(long, value_name = "CHDMAN")]
    pub chdman: Option<PathBuf>,

    /// Path to 7z, needed to extract archives
    #[arg(long, value_name = "SEVENZIP")]
    pub sevenzip: Option<PathBuf>,

    #[command(flatten)]
    pub batch: BatchArgs,
}
