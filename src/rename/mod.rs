use crate::product_code::locate_in_file_name;
use crate::product_code::models::ProductCode;
use crate::rename::error::{RenameError, RenameResult};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

pub mod error;
pub mod tag;

lazy_static! {
    static ref BRACKETED_CODE_RE: Regex =
        Regex::new(r"(?i)\s*\[\s*[a-z]{4}[-_ ]?\d{3}\.?\d{2}\s*\]").unwrap();
    static ref CUE_FILE_LINE_RE: Regex =
        Regex::new(r#"(?i)^(\s*)FILE\s+(?:"[^"]*"|\S+)\s*(.*)$"#).unwrap();
}

/// File names of one directory, captured once and shared by every rename
/// planned against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    root: PathBuf,
    names: BTreeSet<String>,
}

impl DirectorySnapshot {
    pub async fn capture(root: &Path) -> RenameResult<Self> {
        let mut names = BTreeSet::new();
        let mut dir = fs::read_dir(root).await?;

        while let Some(entry) = dir.next_entry().await? {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }

        debug!("Captured {} entries of {}", names.len(), root.display());
        Ok(Self::from_names(root, names))
    }

    pub fn from_names<I, S>(root: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// `<base without code tokens> [FAMILY-NUMBER].<extension>`
///
/// A bare code already in the name, as in `Game (SCUS_941.63)`, is normalized
/// where it stands instead of getting a second copy appended.
pub fn canonical_name(base: &str, code: &ProductCode, extension: &str) -> String {
    let stripped = BRACKETED_CODE_RE.replace_all(base, "");
    let stripped = stripped.trim();
    let extension = extension.trim_start_matches('.');

    let mut name = match locate_in_file_name(stripped) {
        Some((span, _)) => format!("{}{code}{}", &stripped[..span.start], &stripped[span.end..]),
        None if stripped.is_empty() => format!("[{code}]"),
        None => format!("{stripped} [{code}]"),
    };
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension);
    }
    name
}

/// Canonical name for an existing path, keeping its extension.
pub fn canonical_name_for(path: &Path, code: &ProductCode) -> RenameResult<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .ok_or_else(|| RenameError::NoFileName(path.to_path_buf()))?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy())
        .unwrap_or_default();

    Ok(canonical_name(&stem, code, &extension))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub source: PathBuf,
    pub code: ProductCode,
}

impl RenameRequest {
    pub fn new(source: impl Into<PathBuf>, code: ProductCode) -> Self {
        Self {
            source: source.into(),
            code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenamePlan {
    Unchanged(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
}

impl RenamePlan {
    pub fn source(&self) -> &Path {
        match self {
            RenamePlan::Unchanged(path) => path,
            RenamePlan::Rename { from, .. } => from,
        }
    }

    pub fn target(&self) -> &Path {
        match self {
            RenamePlan::Unchanged(path) => path,
            RenamePlan::Rename { to, .. } => to,
        }
    }
}

/// Plans one rename per request against `snapshot`. A target that already
/// exists, or that two requests of this batch would both produce, is a
/// collision for every request involved.
pub fn plan_renames(
    snapshot: &DirectorySnapshot,
    requests: &[RenameRequest],
) -> Vec<RenameResult<RenamePlan>> {
    let mut plans: Vec<RenameResult<RenamePlan>> = requests
        .iter()
        .map(|request| plan_rename(snapshot, request))
        .collect();

    let mut claimed: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (i, plan) in plans.iter().enumerate() {
        if let Ok(plan) = plan {
            claimed.entry(plan.target().to_path_buf()).or_default().push(i);
        }
    }

    for (target, indices) in claimed {
        if indices.len() < 2 {
            continue;
        }
        for i in indices {
            plans[i] = Err(RenameError::Collision {
                from: requests[i].source.clone(),
                target: target.clone(),
            });
        }
    }

    plans
}

fn plan_rename(snapshot: &DirectorySnapshot, request: &RenameRequest) -> RenameResult<RenamePlan> {
    let current = request
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RenameError::NoFileName(request.source.clone()))?;
    let target_name = canonical_name_for(&request.source, &request.code)?;

    if target_name == current {
        return Ok(RenamePlan::Unchanged(request.source.clone()));
    }

    let target = request.source.with_file_name(&target_name);
    if snapshot.contains(&target_name) {
        return Err(RenameError::Collision {
            from: request.source.clone(),
            target,
        });
    }

    Ok(RenamePlan::Rename {
        from: request.source.clone(),
        to: target,
    })
}

/// Points every `FILE` line of a CUE sheet at `new_bin`, keeping the file
/// type, indentation and line endings. Returns the new text and the number of
/// lines replaced.
pub fn rewrite_cue_file_lines(text: &str, new_bin: &str) -> (String, usize) {
    let mut output = String::with_capacity(text.len() + new_bin.len());
    let mut replaced = 0;

    for line in text.split_inclusive('\n') {
        let (core, ending) = match line.strip_suffix("\r\n") {
            Some(core) => (core, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(core) => (core, "\n"),
                None => (line, ""),
            },
        };

        match CUE_FILE_LINE_RE.captures(core) {
            Some(caps) => {
                let indent = &caps[1];
                let rest = caps[2].trim();
                output.push_str(indent);
                output.push_str("FILE \"");
                output.push_str(new_bin);
                output.push('"');
                if !rest.is_empty() {
                    output.push(' ');
                    output.push_str(rest);
                }
                output.push_str(ending);
                replaced += 1;
            }
            None => output.push_str(line),
        }
    }

    (output, replaced)
}

/// Filesystem side effects of tagging and consolidation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl FsMover {
    /// Renames `from` to `to`, refusing to replace a different existing file.
    pub async fn rename(&self, from: &Path, to: &Path) -> RenameResult<()> {
        if from == to {
            return Ok(());
        }

        if fs::try_exists(to).await? && !same_file(from, to).await {
            return Err(RenameError::Collision {
                from: from.to_path_buf(),
                target: to.to_path_buf(),
            });
        }

        debug!("Renaming {} -> {}", from.display(), to.display());
        fs::rename(from, to).await?;
        Ok(())
    }

    /// Replaces the contents of `path` through a temporary file in the same
    /// directory.
    pub async fn rewrite(&self, path: &Path, contents: &[u8]) -> RenameResult<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let temp = tempfile::Builder::new()
            .prefix(".discshelf-")
            .suffix(".part")
            .tempfile_in(dir)?;
        let (std_file, temp_path) = temp.into_parts();

        let mut file = File::from_std(std_file);
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        temp_path
            .persist(path)
            .map_err(|e| RenameError::PersistError {
                path: path.to_path_buf(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Case-only renames on case-insensitive filesystems resolve to the same file.
async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(text: &str) -> ProductCode {
        ProductCode::parse(text).unwrap()
    }

    #[test]
    fn canonical_name_normalizes_existing_code() {
        assert_eq!(
            canonical_name("My Game [SLUS_01234]", &code("SLUS-01234"), "iso"),
            "My Game [SLUS-01234].iso"
        );
        assert_eq!(
            canonical_name("My Game [slus-012.34] ", &code("SLUS-01234"), ".bin"),
            "My Game [SLUS-01234].bin"
        );
        assert_eq!(
            canonical_name("Crash Bandicoot", &code("SCUS_949.00"), "cue"),
            "Crash Bandicoot [SCUS-94900].cue"
        );
    }

    #[test]
    fn canonical_name_is_idempotent() {
        let c = code("SLES_018.16");
        let once = canonical_name("Game (Disc 1)", &c, "bin");
        let stem = once.trim_end_matches(".bin");
        assert_eq!(canonical_name(stem, &c, "bin"), once);
    }

    #[test]
    fn bare_code_is_normalized_in_place() {
        let c = code("SCUS-94163");
        let once = canonical_name("Final Fantasy VII (SCUS_941.63)", &c, "bin");
        assert_eq!(once, "Final Fantasy VII (SCUS-94163).bin");
        assert_eq!(canonical_name("Final Fantasy VII (SCUS-94163)", &c, "bin"), once);
        assert_eq!(canonical_name("SCUS_941.63", &c, "cue"), "SCUS-94163.cue");
    }

    #[test]
    fn canonical_name_keeps_unrelated_brackets() {
        assert_eq!(
            canonical_name("Game [Rev 1] [SLPS_000.01]", &code("SLPS-00001"), "bin"),
            "Game [Rev 1] [SLPS-00001].bin"
        );
    }

    #[test]
    fn plans_rename_unchanged_and_collision() {
        let snapshot = DirectorySnapshot::from_names(
            "/games",
            [
                "A.iso",
                "B [SLUS-00002].iso",
                "C [SLUS-00002].iso",
                "D.iso",
                "D [SLUS-00004].iso",
            ],
        );
        let requests = vec![
            RenameRequest::new("/games/A.iso", code("SLUS-00001")),
            RenameRequest::new("/games/B [SLUS-00002].iso", code("SLUS-00002")),
            RenameRequest::new("/games/D.iso", code("SLUS-00004")),
        ];

        let plans = plan_renames(&snapshot, &requests);
        assert_eq!(
            plans[0].as_ref().unwrap(),
            &RenamePlan::Rename {
                from: PathBuf::from("/games/A.iso"),
                to: PathBuf::from("/games/A [SLUS-00001].iso"),
            }
        );
        assert_eq!(
            plans[1].as_ref().unwrap(),
            &RenamePlan::Unchanged(PathBuf::from("/games/B [SLUS-00002].iso"))
        );
        assert!(matches!(plans[2], Err(RenameError::Collision { .. })));
    }

    #[test]
    fn two_requests_for_one_target_both_collide() {
        let snapshot = DirectorySnapshot::from_names("/g", ["x.iso", "x [SLUS_00001].iso"]);
        let requests = vec![
            RenameRequest::new("/g/x.iso", code("SLUS-00001")),
            RenameRequest::new("/g/x [SLUS_00001].iso", code("SLUS-00001")),
        ];

        let plans = plan_renames(&snapshot, &requests);
        assert!(plans.iter().all(|p| matches!(p, Err(RenameError::Collision { .. }))));
    }

    #[test]
    fn rewrites_file_lines_preserving_endings() {
        let text = "REM COMMENT\r\nFILE \"Old Name.bin\" BINARY\r\n  TRACK 01 MODE2/2352\r\n    INDEX 01 00:00:00\r\n";
        let (rewritten, replaced) = rewrite_cue_file_lines(text, "New [SLUS-01234].bin");

        assert_eq!(replaced, 1);
        assert_eq!(
            rewritten,
            "REM COMMENT\r\nFILE \"New [SLUS-01234].bin\" BINARY\r\n  TRACK 01 MODE2/2352\r\n    INDEX 01 00:00:00\r\n"
        );
    }

    #[test]
    fn rewrites_unquoted_file_lines() {
        let (rewritten, replaced) =
            rewrite_cue_file_lines("file old.bin binary\n  TRACK 01 AUDIO", "new.bin");
        assert_eq!(replaced, 1);
        assert_eq!(rewritten, "FILE \"new.bin\" binary\n  TRACK 01 AUDIO");
    }

    #[tokio::test]
    async fn snapshot_captures_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.iso"), b"").unwrap();
        std::fs::write(dir.path().join("a.cue"), b"").unwrap();

        let snapshot = DirectorySnapshot::capture(dir.path()).await.unwrap();
        assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["a.cue", "b.iso"]);
        assert!(snapshot.contains("b.iso"));
        assert!(!snapshot.contains("c.iso"));
    }

    #[tokio::test]
    async fn mover_renames_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.cue");
        let to = dir.path().join("b.cue");
        std::fs::write(&from, b"old").unwrap();

        FsMover.rewrite(&from, b"new contents").await.unwrap();
        FsMover.rename(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new contents");
    }

    #[tokio::test]
    async fn mover_refuses_to_replace_other_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.iso");
        let to = dir.path().join("b.iso");
        std::fs::write(&from, b"a").unwrap();
        std::fs::write(&to, b"b").unwrap();

        let err = FsMover.rename(&from, &to).await.unwrap_err();
        assert!(matches!(err, RenameError::Collision { .. }));
        assert_eq!(std::fs::read(&to).unwrap(), b"b");
    }
}
