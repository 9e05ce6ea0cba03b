//! Rendering of deltas as colored edit listings

use anchor_core::{Delta, EditKind};
use anchor_core::delta::split_lines;
use owo_colors::OwoColorize;

/// Render the edits of a delta
///
/// With both snapshot texts given, each edit is followed by the removed
/// lines (red) and the added lines (green).
pub fn render_delta(delta: &Delta, old_text: Option<&str>, new_text: Option<&str>) -> String {
    let old_lines = old_text.map(split_lines).unwrap_or_default();
    let new_lines = new_text.map(split_lines).unwrap_or_default();
    let show_lines = old_text.is_some() && new_text.is_some();

    let mut output = String::new();

    for (idx, edit) in delta.edits().iter().enumerate() {
        if idx > 0 && show_lines {
            output.push('\n');
        }

        // Edit header (e.g., @@ -12,7 +12,8 @@ replace)
        let header = format!(
            "@@ -{},{} +{},{} @@",
            edit.old_start, edit.old_len, edit.new_start, edit.new_len
        );
        let kind = match edit.kind {
            EditKind::Insert => "insert".green().to_string(),
            EditKind::Delete => "delete".red().to_string(),
            EditKind::Replace => "replace".yellow().to_string(),
        };
        output.push_str(&format!("    {} {}\n", header.cyan(), kind));

        if !show_lines {
            continue;
        }

        for line in span(&old_lines, edit.old_start, edit.old_len) {
            output.push_str(&format!("    {}\n", format!("-{}", line).red()));
        }
        for line in span(&new_lines, edit.new_start, edit.new_len) {
            output.push_str(&format!("    {}\n", format!("+{}", line).green()));
        }
    }

    output
}

/// Lines `start..start + len` (1-based), clamped to what exists
fn span<'a>(lines: &'a [&'a str], start: u32, len: u32) -> &'a [&'a str] {
    let from = (start.saturating_sub(1) as usize).min(lines.len());
    let to = (from + len as usize).min(lines.len());
    &lines[from..to]
}

/// One-line summary, e.g. "2 edits, -3 +5"
pub fn summarize(delta: &Delta) -> String {
    let (removed, added) = delta.stats();
    let edits = delta.edits().len();
    format!(
        "{} edit{}, {} {}",
        edits,
        if edits == 1 { "" } else { "s" },
        format!("-{}", removed).red(),
        format!("+{}", added).green()
    )
}
