use crate::cue::models::CueSheet;

/// Serializes a sheet in canonical form: quoted names, two-digit track and
/// index numbers, two space indentation per level and `\n` line endings.
///
/// CUE strings have no escape for `"`. A value containing one is written bare
/// when it is a single token, otherwise its quotes become `'`.
pub fn write_cue(sheet: &CueSheet) -> String {
    let mut out = String::new();

    for comment in &sheet.comments {
        out.push_str(&format!("REM {comment}\n"));
    }
    if let Some(catalog) = &sheet.catalog {
        out.push_str(&format!("CATALOG {catalog}\n"));
    }
    if let Some(performer) = &sheet.performer {
        out.push_str(&format!("PERFORMER {}\n", cue_string(performer)));
    }
    if let Some(title) = &sheet.title {
        out.push_str(&format!("TITLE {}\n", cue_string(title)));
    }

    for file in &sheet.files {
        out.push_str(&format!("FILE {} {}\n", cue_string(&file.filename), file.file_type));

        for track in &file.tracks {
            out.push_str(&format!("  TRACK {:02} {}\n", track.number, track.mode));

            if let Some(title) = &track.title {
                out.push_str(&format!("    TITLE {}\n", cue_string(title)));
            }
            if let Some(performer) = &track.performer {
                out.push_str(&format!("    PERFORMER {}\n", cue_string(performer)));
            }
            if let Some(pregap) = track.pregap {
                out.push_str(&format!("    PREGAP {pregap}\n"));
            }
            for index in &track.indices {
                out.push_str(&format!(
                    "    INDEX {:02} {}\n",
                    index.number, index.position
                ));
            }
            if let Some(postgap) = track.postgap {
                out.push_str(&format!("    POSTGAP {postgap}\n"));
            }
        }
    }

    out
}

fn cue_string(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }

    if value.starts_with('"') || value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', "'"))
    } else {
        value.to_string()
    }
}
