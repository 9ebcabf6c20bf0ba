use crate::commands::BatchArgs;
use clap::Parser;
use std::path::PathBuf;

/// Appends the product code, e.g. [SLUS-01234], to every image file name.
#[derive(Parser, Debug, Clone, Eq, PartialEq)]
pub struct TagCommand {
    /// Folder with ISO images or BIN/CUE pairs
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub directory: PathBuf,

    #[command(flatten)]
    pub batch: BatchArgs,
}
