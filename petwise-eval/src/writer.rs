//! Publishes logs atomically into dated directories.
//!
//! Layout under the root:
//!
//! ```text
//! <root>/2026-03-14/091502123_1a2b3c4d.json
//! <root>/report_2026-03-14.json
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{EvalError, Result};
use crate::log::EvaluationLog;
use crate::report::QuantitativeReport;

/// First eight hex digits of the query's SHA-256.
pub fn query_hash(query: &str) -> String {
    Sha256::digest(query.as_bytes()).iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// `<HHMMSSmmm>_<hash8>.json`
pub fn log_file_name(log: &EvaluationLog) -> String {
    format!("{}_{}.json", log.timestamp.format("%H%M%S%3f"), query_hash(&log.query))
}

#[derive(Debug, Clone)]
pub struct EvalLogWriter {
    root: PathBuf,
}

impl EvalLogWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    /// Write one log and return its path. Never overwrites an earlier log.
    pub async fn write(&self, log: &EvaluationLog) -> Result<PathBuf> {
        let dir = self.day_dir(log.timestamp.date_naive());
        tokio::fs::create_dir_all(&dir).await?;

        let name = log_file_name(log);
        let mut path = dir.join(&name);
        let mut n = 1;
        while tokio::fs::try_exists(&path).await? {
            let stem = name.trim_end_matches(".json");
            path = dir.join(format!("{stem}-{n}.json"));
            n += 1;
        }

        write_atomic(&path, &serde_json::to_vec_pretty(log)?).await?;
        debug!(path = %path.display(), turn_id = %log.turn_id, "evaluation log written");
        Ok(path)
    }

    /// Every parseable log for one day. Unreadable files are skipped.
    pub async fn read_day(&self, date: NaiveDate) -> Result<Vec<EvaluationLog>> {
        let dir = self.day_dir(date);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut logs = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<EvaluationLog>(&bytes) {
                Ok(log) => logs.push(log),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable log"),
            }
        }
        Ok(logs)
    }

    /// Aggregate one day into `report_<date>.json` at the root.
    pub async fn write_report(&self, date: NaiveDate) -> Result<(PathBuf, QuantitativeReport)> {
        let logs = self.read_day(date).await?;
        let report = QuantitativeReport::from_logs(date, &logs);
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("report_{}.json", date.format("%Y-%m-%d")));
        write_atomic(&path, &serde_json::to_vec_pretty(&report)?).await?;
        Ok((path, report))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EvalError::Path(path.display().to_string()))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::EvaluationLogBuilder;
    use chrono::{TimeZone, Utc};

    #[test]
    fn file_name_has_time_and_query_hash() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 15, 2).unwrap();
        let log = EvaluationLogBuilder::new("u1", "puppy food").with_timestamp(ts).finish(
            String::new(),
            Vec::new(),
            false,
        );
        let name = log_file_name(&log);
        assert!(name.starts_with("091502000_"));
        assert_eq!(name.len(), "091502000_".len() + 8 + ".json".len());
        assert_eq!(query_hash("puppy food"), query_hash("puppy food"));
        assert_ne!(query_hash("puppy food"), query_hash("kitten food"));
    }
}
