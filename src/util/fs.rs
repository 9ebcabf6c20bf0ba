use async_recursion::async_recursion;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Collects every file below `dir_path`, descending at most `max_depth` levels.
///
/// Files directly inside `dir_path` are at depth 1.
#[async_recursion]
pub async fn get_all_files(dir_path: &Path, max_depth: usize) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if max_depth == 0 {
        return Ok(files);
    }

    let mut dir = fs::read_dir(dir_path).await?;

    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();

        if entry.file_type().await?.is_dir() {
            files.append(&mut get_all_files(&path, max_depth - 1).await?);
        } else {
            files.push(path);
        }
    }

    Ok(files)
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Sorted files with the given extension, at most `max_depth` levels deep.
pub async fn find_with_extension(
    root: &Path,
    extension: &str,
    max_depth: usize,
) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<_> = get_all_files(root, max_depth)
        .await?
        .into_iter()
        .filter(|file| has_extension(file, extension))
        .collect();

    files.sort();
    Ok(files)
}

/// Immediate children of `root` with the given extension, sorted.
pub async fn list_with_extension(root: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    find_with_extension(root, extension, 1).await
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_with_extension_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).await.unwrap();
        fs::write(root.join("top.cue"), "").await.unwrap();
        fs::write(root.join("a/mid.CUE"), "").await.unwrap();
        fs::write(root.join("a/b/deep.cue"), "").await.unwrap();
        fs::write(root.join("a/track.bin"), "").await.unwrap();

        let found = find_with_extension(root, "cue", 2).await.unwrap();
        assert_eq!(found, vec![root.join("a/mid.CUE"), root.join("top.cue")]);

        let top = list_with_extension(root, "cue").await.unwrap();
        assert_eq!(top, vec![root.join("top.cue")]);
    }

    #[test]
    fn has_extension_ignores_case() {
        assert!(has_extension(Path::new("Game.ISO"), "iso"));
        assert!(!has_extension(Path::new("Game.iso.7z"), "iso"));
        assert!(!has_extension(Path::new("README"), "iso"));
    }
}
