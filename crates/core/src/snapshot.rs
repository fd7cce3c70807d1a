//! JSON snapshots of detected problem pages, so a document can be
//! detected once and annotated many times.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::error::Result;
use crate::model::ProblemPdfPage;

pub fn to_json(pages: &[ProblemPdfPage]) -> Result<String> {
    Ok(serde_json::to_string_pretty(pages)?)
}

pub fn from_json(json: &str) -> Result<Vec<ProblemPdfPage>> {
    Ok(serde_json::from_str(json)?)
}

/// `<stem>_problems_<YYYYmmdd_HHMMSS>.json`
pub fn snapshot_file_name<Tz>(source: &Path, timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{}_problems_{}.json", stem, timestamp.format("%Y%m%d_%H%M%S"))
}

/// Write a snapshot for `source` into `dir` and return its path.
pub fn save<Tz>(
    dir: &Path,
    source: &Path,
    pages: &[ProblemPdfPage],
    now: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let path = dir.join(snapshot_file_name(source, now));
    std::fs::write(&path, to_json(pages)?)?;
    log::info!("snapshot written to {}", path.display());
    Ok(path)
}

pub fn load(path: &Path) -> Result<Vec<ProblemPdfPage>> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}
