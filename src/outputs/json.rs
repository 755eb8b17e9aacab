//! JSON copy of the report data.
//!
//! Written next to the HTML report with the same stem, so
//! `S_OIL_PSR_10_18_2026_2.html` is paired with `S_OIL_PSR_10_18_2026_2.json`.
//! The rendered HTML body is not repeated in the JSON.

use crate::error::ReportError;
use crate::models::Report;
use crate::outputs::files::write_new;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Serialize `report` to the `.json` sibling of `html_path`.
#[instrument(level = "info", skip_all, fields(html = %html_path.display()))]
pub async fn write_report_json(report: &Report, html_path: &Path) -> Result<PathBuf, ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    let path = html_path.with_extension("json");

    write_new(&path, json.as_bytes()).await?;
    info!(path = %path.display(), articles = report.articles.len(), "Wrote JSON report");
    Ok(path)
}
