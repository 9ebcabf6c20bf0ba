use crate::batch::{BatchReport, ImageOutcome, run_batch};
use crate::cue::CueParser;
use crate::error::{DiscShelfError, DiscShelfResult};
use crate::product_code::identify;
use crate::product_code::models::ExtractedCode;
use crate::rename::error::{RenameError, RenameResult};
use crate::rename::{
    DirectorySnapshot, FsMover, RenamePlan, RenameRequest, plan_renames, rewrite_cue_file_lines,
};
use crate::util::fs::has_extension;
use indicatif::MultiProgress;
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tokio::fs;

/// An image to tag, with the sheet that has to follow its renamed BIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTarget {
    pub image: PathBuf,
    pub cue: Option<PathBuf>,
}

impl TagTarget {
    /// The file the product code is read from.
    fn code_source(&self) -> &Path {
        self.cue.as_deref().unwrap_or(&self.image)
    }
}

#[derive(Debug)]
pub enum TagOutcome {
    Unchanged(ExtractedCode),
    Planned { code: ExtractedCode, to: PathBuf },
    Renamed { code: ExtractedCode, to: PathBuf },
}

impl Display for TagOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = |path: &PathBuf| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        match self {
            TagOutcome::Unchanged(code) => write!(f, "already tagged, {code}"),
            TagOutcome::Planned { code, to } => write!(f, "would rename to {}, {code}", name(to)),
            TagOutcome::Renamed { code, to } => write!(f, "renamed to {}, {code}", name(to)),
        }
    }
}

/// ISOs and every BIN with a CUE of the same stem. BINs without one are
/// skipped since a multi-file sheet would lose track of them.
pub fn find_tag_targets(snapshot: &DirectorySnapshot) -> Vec<TagTarget> {
    let mut targets = Vec::new();

    for name in snapshot.names() {
        let image = snapshot.root().join(name);

        if has_extension(&image, "iso") {
            targets.push(TagTarget { image, cue: None });
        } else if has_extension(&image, "bin") {
            let stem = &name[..name.len() - ".bin".len()];
            match ["cue", "CUE", "Cue"]
                .iter()
                .map(|ext| format!("{stem}.{ext}"))
                .find(|candidate| snapshot.contains(candidate))
            {
                Some(cue) => targets.push(TagTarget {
                    image,
                    cue: Some(snapshot.root().join(cue)),
                }),
                None => warn!("No CUE named after {name}, skipping"),
            }
        }
    }

    targets
}

/// Identifies every image of `root` concurrently, then plans all renames
/// against one snapshot and applies them one by one.
pub async fn tag_directory(
    progress: &MultiProgress,
    root: &Path,
    dry_run: bool,
    jobs: usize,
) -> DiscShelfResult<BatchReport<TagOutcome>> {
    let snapshot = DirectorySnapshot::capture(root).await?;
    let targets = find_tag_targets(&snapshot);
    info!("Identifying {} images in {}", targets.len(), root.display());

    let identified = run_batch(targets, jobs, progress, |target| async move {
        let result = identify(target.code_source()).await;
        ImageOutcome::new(target.image.clone(), result.map(|code| (target, code)))
    })
    .await;

    let mut outcomes = Vec::new();
    let mut found = Vec::new();
    for outcome in identified.outcomes {
        match outcome.result {
            Ok(pair) => found.push(pair),
            Err(e) => outcomes.push(ImageOutcome {
                image: outcome.image,
                result: Err(e),
            }),
        }
    }

    let mut requests = Vec::new();
    let mut owners = Vec::new();
    for (i, (target, code)) in found.iter().enumerate() {
        requests.push(RenameRequest::new(&target.image, code.code.clone()));
        owners.push(i);
        if let Some(cue) = &target.cue {
            requests.push(RenameRequest::new(cue, code.code.clone()));
            owners.push(i);
        }
    }

    let mut grouped: Vec<Vec<RenameResult<RenamePlan>>> = found.iter().map(|_| Vec::new()).collect();
    for (owner, plan) in owners.into_iter().zip(plan_renames(&snapshot, &requests)) {
        grouped[owner].push(plan);
    }

    for ((target, code), plans) in found.into_iter().zip(grouped) {
        let result = apply_tag(&target, code, plans, dry_run).await;
        outcomes.push(ImageOutcome::new(target.image, result));
    }

    outcomes.sort_by(|a, b| a.image.cmp(&b.image));
    Ok(BatchReport { outcomes })
}

/// A BIN and its CUE are renamed together or not at all.
async fn apply_tag(
    target: &TagTarget,
    code: ExtractedCode,
    plans: Vec<RenameResult<RenamePlan>>,
    dry_run: bool,
) -> DiscShelfResult<TagOutcome> {
    let plans = plans.into_iter().collect::<RenameResult<Vec<_>>>()?;

    if plans.iter().all(|p| matches!(p, RenamePlan::Unchanged(_))) {
        return Ok(TagOutcome::Unchanged(code));
    }

    let to = plans
        .iter()
        .find(|p| p.source() == target.image)
        .map(|p| p.target().to_path_buf())
        .unwrap_or_else(|| target.image.clone());

    if dry_run {
        return Ok(TagOutcome::Planned { code, to });
    }

    // Everything that can fail without touching the disk goes first.
    let mut cue_rewrite = None;
    if let Some(cue) = &target.cue
        && to != target.image
    {
        let bytes = fs::read(cue).await?;
        let text = String::from_utf8_lossy(&bytes);
        if CueParser::parse_str(&text)?.files.len() > 1 {
            return Err(RenameError::MultiFileCue(cue.clone()).into());
        }

        let new_bin = to
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RenameError::NoFileName(to.clone()))?;
        let (rewritten, replaced) = rewrite_cue_file_lines(&text, &new_bin);
        if replaced == 0 {
            warn!("{} has no FILE line to update", cue.display());
        }

        let cue_target = plans
            .iter()
            .find(|p| p.source() == cue.as_path())
            .map(|p| p.target().to_path_buf())
            .unwrap_or_else(|| cue.clone());
        cue_rewrite = Some((cue_target, rewritten));
    }

    let mut done = Vec::new();
    if let Err(e) = move_files(&plans, cue_rewrite, &mut done).await {
        roll_back(&done).await;
        return Err(e.into());
    }

    Ok(TagOutcome::Renamed { code, to })
}

/// Renames every planned file, then rewrites the CUE at its new path.
/// Completed renames are recorded in `done`.
async fn move_files(
    plans: &[RenamePlan],
    cue_rewrite: Option<(PathBuf, String)>,
    done: &mut Vec<(PathBuf, PathBuf)>,
) -> RenameResult<()> {
    for plan in plans {
        if let RenamePlan::Rename { from, to } = plan {
            FsMover.rename(from, to).await?;
            done.push((from.clone(), to.clone()));
        }
    }

    if let Some((cue, text)) = cue_rewrite {
        FsMover.rewrite(&cue, text.as_bytes()).await?;
    }

    Ok(())
}

async fn roll_back(done: &[(PathBuf, PathBuf)]) {
    for (from, to) in done.iter().rev() {
        if let Err(e) = fs::rename(to, from).await {
            warn!(
                "Could not move {} back to {}: {e}",
                to.display(),
                from.display()
            );
        }
    }
}
