//! Medical report loading.
//!
//! Reports arrive as already-decoded plain text; PDF extraction is out of
//! scope and a `.pdf` path is rejected with a pointed message.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::debug;

/// Load a report file as trimmed UTF-8 text.
pub fn load_report(path: &Path) -> Result<String> {
    if path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
    {
        bail!(
            "PDF reports are not supported; extract the text to a .txt file first: {}",
            path.display()
        );
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file: {}", path.display()))?;

    let text = text.trim().to_string();
    if text.is_empty() {
        bail!("Report file is empty: {}", path.display());
    }

    debug!(
        "Loaded report: {} chars, {} lines",
        text.len(),
        text.lines().count()
    );

    Ok(text)
}

/// First `max_lines` lines of the report, for --dry-run previews.
pub fn preview(text: &str, max_lines: usize) -> String {
    let mut lines: Vec<&str> = text.lines().take(max_lines).collect();
    if text.lines().count() > max_lines {
        lines.push("...");
    }
    lines.join("\n")
}
