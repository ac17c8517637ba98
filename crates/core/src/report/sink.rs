//! Persistence of run results.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use super::{OperationKind, Outcome, Report};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

async fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ReportError::io(parent, e))?;
    }
    Ok(())
}

/// Write the final report as pretty JSON, creating parent directories.
pub async fn write_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    ensure_parent(path).await?;
    let body = serde_json::to_vec_pretty(report)?;
    fs::write(path, body)
        .await
        .map_err(|e| ReportError::io(path, e))?;

    info!(
        path = %path.display(),
        outcomes = report.total(),
        "Report written"
    );
    Ok(())
}

/// Read back a report written by [`write_report`].
pub async fn read_report(path: &Path) -> Result<Report, ReportError> {
    let body = fs::read(path).await.map_err(|e| ReportError::io(path, e))?;
    Ok(serde_json::from_slice(&body)?)
}

struct CategoryFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CategoryFile {
    async fn create(path: PathBuf) -> Result<Self, ReportError> {
        let file = File::create(&path)
            .await
            .map_err(|e| ReportError::io(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }
}

/// Per-category JSON-lines files appended while the run is in progress.
pub struct StreamingSink {
    fetch: CategoryFile,
    update: CategoryFile,
    other: CategoryFile,
}

impl StreamingSink {
    pub const FETCH_FILE: &'static str = "fetch_results.jsonl";
    pub const UPDATE_FILE: &'static str = "update_results.jsonl";
    pub const OTHER_FILE: &'static str = "others_result.jsonl";

    /// Create (truncating) the three category files inside `dir`.
    pub async fn create(dir: &Path) -> Result<Self, ReportError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ReportError::io(dir, e))?;

        Ok(Self {
            fetch: CategoryFile::create(dir.join(Self::FETCH_FILE)).await?,
            update: CategoryFile::create(dir.join(Self::UPDATE_FILE)).await?,
            other: CategoryFile::create(dir.join(Self::OTHER_FILE)).await?,
        })
    }

    pub async fn append(&mut self, outcome: &Outcome) -> Result<(), ReportError> {
        let target = match outcome.kind {
            OperationKind::FetchManifest => &mut self.fetch,
            OperationKind::UpdateStatus => &mut self.update,
            OperationKind::Other => &mut self.other,
        };

        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');
        target
            .writer
            .write_all(&line)
            .await
            .map_err(|e| ReportError::io(&target.path, e))
    }

    pub async fn flush(&mut self) -> Result<(), ReportError> {
        for target in [&mut self.fetch, &mut self.update, &mut self.other] {
            target
                .writer
                .flush()
                .await
                .map_err(|e| ReportError::io(&target.path, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_write_and_read_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/report.json");

        let mut report = Report::new(Utc::now());
        report.elapsed_time = 1.5;
        report.record(fixtures::outcome(OperationKind::FetchManifest, "d1", 200));
        report.record(fixtures::outcome(OperationKind::UpdateStatus, "d1", 200));

        write_report(&report, &path).await.unwrap();
        let loaded = read_report(&path).await.unwrap();
        assert_eq!(loaded, report);
    }

    #[tokio::test]
    async fn test_written_report_uses_file_format_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_report(&Report::new(Utc::now()), &path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in ["when", "elapsed_time", "get_results", "update_results", "others_result"] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
    }

    #[tokio::test]
    async fn test_streaming_sink_splits_categories() {
        let dir = TempDir::new().unwrap();
        let mut sink = StreamingSink::create(dir.path()).await.unwrap();

        sink.append(&fixtures::outcome(OperationKind::UpdateStatus, "d1", 200))
            .await
            .unwrap();
        sink.append(&fixtures::outcome(OperationKind::Other, "d2", 0))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let update = std::fs::read_to_string(dir.path().join(StreamingSink::UPDATE_FILE)).unwrap();
        let line: Outcome = serde_json::from_str(update.lines().next().unwrap()).unwrap();
        assert_eq!(line.device_id, "d1");

        let other = std::fs::read_to_string(dir.path().join(StreamingSink::OTHER_FILE)).unwrap();
        assert_eq!(other.lines().count(), 1);
        let fetch = std::fs::read_to_string(dir.path().join(StreamingSink::FETCH_FILE)).unwrap();
        assert!(fetch.is_empty());
    }
}
