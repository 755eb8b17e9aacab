//! Dated report files that never overwrite each other.
//!
//! The first report of a day is `{prefix}_{MM}_{DD}_{YYYY}.html`. Later runs
//! on the same day get `_2`, `_3`, ... appended to the stem. A suffix is only
//! used when none of the report's files exist under it, and files are opened
//! with create-new semantics, so an existing report is never replaced.

use crate::error::ReportError;
use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Give up after this many same-day reports.
const MAX_SAME_DAY: usize = 999;

/// `S_OIL_PSR` + 2026-10-18 -> `S_OIL_PSR_10_18_2026`.
pub fn dated_stem(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}", prefix, date.format("%m_%d_%Y"))
}

/// Stem of the `n`th report of the day (1-based).
fn candidate(stem: &str, n: usize) -> String {
    if n == 1 {
        stem.to_string()
    } else {
        format!("{stem}_{n}")
    }
}

/// First `{stem}[_n]` for which no `{stem}[_n].{ext}` exists in `dir`, for
/// every extension in `extensions`.
///
/// A report and its companions share one stem, so a stale companion file
/// also makes a suffix unavailable.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), %stem))]
pub async fn free_stem(dir: &Path, stem: &str, extensions: &[&str]) -> Result<String, ReportError> {
    'candidates: for n in 1..=MAX_SAME_DAY {
        let candidate = candidate(stem, n);
        for ext in extensions {
            let path = dir.join(format!("{candidate}.{ext}"));
            let taken = fs::try_exists(&path)
                .await
                .map_err(|source| ReportError::Write {
                    path: path.clone(),
                    source,
                })?;
            if taken {
                debug!(path = %path.display(), "Report file exists; trying next suffix");
                continue 'candidates;
            }
        }
        return Ok(candidate);
    }

    Err(ReportError::Write {
        path: dir.join(candidate(stem, MAX_SAME_DAY)),
        source: std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{MAX_SAME_DAY} reports already exist for {stem}"),
        ),
    })
}

/// Write `contents` to exactly `path`, failing if it already exists.
pub async fn write_new(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    write_all(file, path, contents).await
}

async fn write_all(
    mut file: tokio::fs::File,
    path: &Path,
    contents: &[u8],
) -> Result<(), ReportError> {
    let to_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    file.write_all(contents).await.map_err(to_err)?;
    file.flush().await.map_err(to_err)?;
    Ok(())
}
