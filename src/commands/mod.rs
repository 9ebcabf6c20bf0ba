use crate::batch::default_jobs;
use crate::commands::archive::ArchiveCommand;
use crate::commands::consolidate::ConsolidateCommand;
use crate::commands::tag::TagCommand;
use clap::{Args, Parser, Subcommand};

pub mod archive;
pub mod consolidate;
pub mod tag;

/// CLI for consolidating, tagging and archiving PlayStation disc images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Consolidate(ConsolidateCommand),
    Tag(TagCommand),
    Archive(ArchiveCommand),
}

/// Options shared by every command that walks a folder of images.
#[derive(Args, Debug, Clone, Copy, Eq, PartialEq)]
pub struct BatchArgs {
    /// Only report what would be done
    #[arg(long, short = 'n', default_value_t = false)]
    pub dry_run: bool,

    /// Images processed at the same time, defaults to the number of CPUs
    #[arg(long, short = 'j', value_name = "JOBS")]
    pub jobs: Option<usize>,
}

impl BatchArgs {
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(default_jobs).max(1)
    }
}
