use crate::archive::pack::archive_games;
use crate::commands::{Cli, Commands};
use crate::consolidate::consolidate_directory;
use crate::error::{DiscShelfError, DiscShelfResult};
use crate::rename::tag::tag_directory;
use anyhow::{Result, bail};
use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::{debug, warn};
use std::path::Path;

mod archive;
mod batch;
mod cd;
mod commands;
mod consolidate;
mod cue;
mod error;
mod iso9660;
mod product_code;
mod rename;
mod util;

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let logger = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .build();

    let level = logger.filter();
    let pb = MultiProgress::new();

    LogWrapper::new(pb.clone(), logger).try_init()?;
    log::set_max_level(level);

    debug!(
        "{} {} ({}, built for {})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::PROFILE,
        built_info::TARGET
    );

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli.command, &pb) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, unfinished outputs are discarded");
            bail!("interrupted");
        }
    }
}

async fn run(command: Commands, pb: &MultiProgress) -> Result<()> {
    let failed = match command {
        Commands::Consolidate(cmd) => {
            require_directory(&cmd.directory).await?;
            let report = consolidate_directory(pb, cmd).await?;
            report.log("Consolidated");
            report.failed()
        }
        Commands::Tag(cmd) => {
            require_directory(&cmd.directory).await?;
            let report = tag_directory(pb, &cmd.directory, cmd.batch.dry_run, cmd.batch.jobs()).await?;
            report.log("Tagged");
            report.failed()
        }
        Commands::Archive(cmd) => {
            require_directory(&cmd.directory).await?;
            let report = archive_games(pb, cmd).await?;
            report.log("Archived");
            report.failed()
        }
    };

    if failed > 0 {
        bail!("{failed} images failed");
    }

    Ok(())
}

async fn require_directory(path: &Path) -> DiscShelfResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        _ => Err(DiscShelfError::NotADirectory(path.to_path_buf())),
    }
}
