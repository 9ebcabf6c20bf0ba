use crate::rename::DirectorySnapshot;
use crate::util::fs::has_extension;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

lazy_static! {
    static ref CODE_SUFFIX_RE: Regex =
        Regex::new(r"(?i)\s*\[S[LC][A-Z]{2}[A-Z]?[-_]?[0-9.]+\]\s*$").unwrap();
    static ref DISC_PAREN_RE: Regex = Regex::new(r"(?i)\s*\(disc\s*\d+\)").unwrap();
    static ref DISC_MARKER_RE: Regex = Regex::new(r"(?i)[ _-]*disc[_-]?\s*\d+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref ILLEGAL_CHARS_RE: Regex = Regex::new(r#"[\\/:*?"<>|]"#).unwrap();
}

/// Grouping key and display title of a disc file stem.
///
/// `Final_Fantasy_VII (Disc 2) [SCUS-94164]` -> (`final fantasy vii`, `Final Fantasy VII`)
pub fn game_key(stem: &str) -> (String, String) {
    let title = CODE_SUFFIX_RE.replace(stem, "");
    let title = DISC_PAREN_RE.replace_all(&title, "");
    let title = DISC_MARKER_RE.replace_all(&title, "");
    let title = title.replace('_', " ");
    let title = WHITESPACE_RE.replace_all(&title, " ").trim().to_string();

    (title.to_lowercase(), title)
}

/// Replaces characters most filesystems reject.
pub fn sanitize_archive_name(name: &str) -> String {
    let sanitized = ILLEGAL_CHARS_RE.replace_all(name, "_");
    let sanitized = sanitized.trim_end_matches('.').trim();

    if sanitized.is_empty() {
        "archive".to_string()
    } else {
        sanitized.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameGroup {
    pub key: String,
    pub title: String,
    /// File names relative to the snapshot root, sorted.
    pub files: BTreeSet<String>,
}

impl GameGroup {
    pub fn archive_name(&self) -> String {
        format!("{}.7z", sanitize_archive_name(&self.title))
    }

    pub fn archive_path(&self, snapshot: &DirectorySnapshot) -> PathBuf {
        snapshot.root().join(self.archive_name())
    }
}

/// Groups every CUE of `snapshot` that has a BIN of the same stem by game.
pub fn group_games(snapshot: &DirectorySnapshot) -> Vec<GameGroup> {
    let mut groups: BTreeMap<String, GameGroup> = BTreeMap::new();

    for name in snapshot.names() {
        let path = snapshot.root().join(name);
        if !has_extension(&path, "cue") {
            continue;
        }

        let stem = &name[..name.len() - ".cue".len()];
        let Some(bin) = ["bin", "BIN", "Bin"]
            .iter()
            .map(|ext| format!("{stem}.{ext}"))
            .find(|candidate| snapshot.contains(candidate))
        else {
            warn!("Missing BIN for {name}, skipping this disc");
            continue;
        };

        let (key, title) = game_key(stem);
        if key.is_empty() {
            warn!("Could not derive a game title from {name}, skipping");
            continue;
        }

        let group = groups.entry(key.clone()).or_insert_with(|| GameGroup {
            key,
            title,
            files: BTreeSet::new(),
        });
        group.files.insert(name.to_string());
        group.files.insert(bin);
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_codes_and_disc_markers() {
        let cases = [
            ("Final Fantasy VII (Disc 1) [SCUS-94163]", "Final Fantasy VII"),
            ("Final_Fantasy_VII_Disc2 [SCUS-94164]", "Final Fantasy VII"),
            ("Metal Gear Solid -Disc 2", "Metal Gear Solid"),
            ("Crash  Bandicoot [SCUS_949.00]", "Crash Bandicoot"),
            ("Tekken 3", "Tekken 3"),
        ];
        for (stem, title) in cases {
            let (key, display) = game_key(stem);
            assert_eq!(display, title, "{stem}");
            assert_eq!(key, title.to_lowercase());
        }
    }

    #[test]
    fn sanitizes_archive_names() {
        assert_eq!(sanitize_archive_name("What? Why: <Now>"), "What_ Why_ _Now_");
        assert_eq!(sanitize_archive_name("Ends with dots..."), "Ends with dots");
        assert_eq!(sanitize_archive_name("..."), "archive");
    }

    #[test]
    fn groups_discs_of_one_game() {
        let snapshot = DirectorySnapshot::from_names(
            "/ps1",
            [
                "FF7 (Disc 1) [SCUS-94163].bin",
                "FF7 (Disc 1) [SCUS-94163].cue",
                "FF7 (Disc 2) [SCUS-94164].bin",
                "FF7 (Disc 2) [SCUS-94164].cue",
                "Orphan.cue",
                "Tekken 3.bin",
                "Tekken 3.cue",
            ],
        );

        let groups = group_games(&snapshot);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "FF7");
        assert_eq!(groups[0].files.len(), 4);
        assert_eq!(groups[0].archive_path(&snapshot), PathBuf::from("/ps1/FF7.7z"));
        assert_eq!(groups[1].archive_name(), "Tekken 3.7z");
    }
}
