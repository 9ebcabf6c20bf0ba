use crate::error::DiscShelfError;
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;

/// Result of processing one image of a batch.
#[derive(Debug)]
pub struct ImageOutcome<T> {
    pub image: PathBuf,
    pub result: Result<T, DiscShelfError>,
}

impl<T> ImageOutcome<T> {
    pub fn new<E: Into<DiscShelfError>>(image: impl Into<PathBuf>, result: Result<T, E>) -> Self {
        Self {
            image: image.into(),
            result: result.map_err(Into::into),
        }
    }
}

#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<ImageOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

impl<T: Display> BatchReport<T> {
    /// One line per image, then a summary.
    pub fn log(&self, verb: &str) {
        for outcome in &self.outcomes {
            let name = outcome
                .image
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| outcome.image.to_string_lossy());
            match &outcome.result {
                Ok(value) => info!("{name}: {value}"),
                Err(e) => warn!("{name}: {e}"),
            }
        }

        info!(
            "{verb} {} of {} images ({} failed)",
            self.succeeded(),
            self.outcomes.len(),
            self.failed()
        );
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs `process` for every item with at most `jobs` in flight and returns
/// the outcomes sorted by image path.
pub async fn run_batch<I, T, F, Fut>(
    items: Vec<I>,
    jobs: usize,
    progress: &MultiProgress,
    process: F,
) -> BatchReport<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = ImageOutcome<T>>,
{
    let bar = progress.add(ProgressBar::new(items.len() as u64));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut outcomes: Vec<ImageOutcome<T>> = stream::iter(items)
        .map(|item| {
            let task = process(item);
            let bar = bar.clone();
            async move {
                let outcome = task.await;
                if let Some(name) = outcome.image.file_name() {
                    bar.set_message(name.to_string_lossy().into_owned());
                }
                bar.inc(1);
                outcome
            }
        })
        .buffer_unordered(jobs.max(1))
        .collect()
        .await;

    bar.finish_and_clear();
    progress.remove(&bar);

    outcomes.sort_by(|a, b| a.image.cmp(&b.image));
    BatchReport { outcomes }
}
