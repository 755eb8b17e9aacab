//! Utility functions for text cleanup, logging, and file system checks.
//!
//! - String truncation for log previews
//! - Markup stripping and HTML escaping for third-party article text
//! - Output directory validation before any network call is made

use crate::error::ReportError;
use scraper::Html;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the last character boundary at or before `max`
/// bytes, with an ellipsis and a count of the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Reduce a possibly-marked-up snippet to plain text with collapsed
/// whitespace.
///
/// Search APIs often return summaries containing `<b>` highlights, entities
/// or stray tags; the report wants the text only.
pub fn plain_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text = parsed.root_element().text().collect::<String>();
    collapse_whitespace(&text)
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text for safe inclusion in HTML element content and quoted
/// attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), ReportError> {
    let to_err = |source| ReportError::OutputDir {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(path).await.map_err(to_err)?;

    // A small sync write keeps the error surface simple.
    let scratch_path = path.join(".psr_write_check");
    stdfs::File::create(&scratch_path).map_err(to_err)?;
    let _ = stdfs::remove_file(&scratch_path);

    info!("Output directory is writable");
    Ok(())
}
