//! Observation persistence
//!
//! Observations are appended to one CSV log per entity at
//! `<output_dir>/<entity_id>/polls.csv`. Directories are created lazily and
//! the header row is written exactly once per file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{EntityId, Observation};
use crate::utils::is_safe_path_component;

/// Column order of every polls.csv file
pub const CSV_HEADER: [&str; 7] = [
    "video_id",
    "ts_utc",
    "view_count",
    "like_count",
    "comment_count",
    "title",
    "publishedAt",
];

/// File name used inside each entity directory
pub const POLLS_FILE_NAME: &str = "polls.csv";

/// Timestamp format for `ts_utc` (UTC, second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Append-only destination for observations
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Append one observation. Duplicate calls add duplicate rows.
    async fn append(&self, observation: &Observation) -> Result<()>;
}

// ============================================================================
// CSV Sink
// ============================================================================

/// Per-entity CSV append log
#[derive(Debug, Clone)]
pub struct CsvSink {
    root: PathBuf,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the log for one entity
    pub fn path_for(&self, entity_id: &str) -> Result<PathBuf> {
        if !is_safe_path_component(entity_id) {
            return Err(Error::config(format!(
                "entity id {:?} cannot be used as a directory name",
                entity_id
            )));
        }
        Ok(self.root.join(entity_id).join(POLLS_FILE_NAME))
    }

    /// Create the output directories for every entity up front
    pub fn ensure_dirs(&self, entity_ids: &[EntityId]) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        for id in entity_ids {
            let path = self.path_for(id)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn append_row(&self, observation: &Observation) -> Result<()> {
        let path = self.path_for(&observation.entity_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let header_needed = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if header_needed {
            log::debug!("[sink:csv] Creating {}", path.display());
            writer.write_record(CSV_HEADER)?;
        }
        writer.write_record(to_row(observation))?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl ObservationSink for CsvSink {
    async fn append(&self, observation: &Observation) -> Result<()> {
        self.append_row(observation)
    }
}

/// Render one observation in [`CSV_HEADER`] order; nulls become empty cells
pub fn to_row(observation: &Observation) -> [String; 7] {
    let stats = &observation.stats;
    [
        observation.entity_id.clone(),
        observation.observed_at.format(TIMESTAMP_FORMAT).to_string(),
        opt_to_cell(stats.view_count),
        opt_to_cell(stats.like_count),
        opt_to_cell(stats.comment_count),
        stats.title.clone().unwrap_or_default(),
        stats.published_at.clone().unwrap_or_default(),
    ]
}

fn opt_to_cell(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ============================================================================
// In-memory Sink
// ============================================================================

/// Collects observations in memory; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    observations: Mutex<Vec<Observation>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.observations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObservationSink for MemorySink {
    async fn append(&self, observation: &Observation) -> Result<()> {
        self.observations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(observation.clone());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatsRecord;
    use chrono::{TimeZone, Utc};

    fn observation(id: &str, secs: u32) -> Observation {
        Observation::new(
            id,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, secs).unwrap(),
            StatsRecord {
                view_count: Some(100),
                like_count: None,
                comment_count: Some(3),
                published_at: Some("2024-04-30T08:00:00Z".to_string()),
                title: Some("Hello, \"world\"".to_string()),
                duration: Some("PT1M".to_string()),
            },
        )
    }

    #[test]
    fn test_to_row_order_and_nulls() {
        let row = to_row(&observation("abc12345678", 5));
        assert_eq!(
            row,
            [
                "abc12345678".to_string(),
                "2024-05-01T12:00:05Z".to_string(),
                "100".to_string(),
                String::new(),
                "3".to_string(),
                "Hello, \"world\"".to_string(),
                "2024-04-30T08:00:00Z".to_string(),
            ]
        );
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let sink = CsvSink::new("data");
        assert!(sink.path_for("../etc").is_err());
        assert_eq!(
            sink.path_for("abc12345678").unwrap(),
            PathBuf::from("data/abc12345678/polls.csv")
        );
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("out"));

        for i in 0..3 {
            sink.append(&observation("abc12345678", i)).await.unwrap();
        }

        let content =
            std::fs::read_to_string(dir.path().join("out/abc12345678/polls.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "video_id,ts_utc,view_count,like_count,comment_count,title,publishedAt"
        );
        assert_eq!(
            content.matches("video_id,ts_utc").count(),
            1,
            "header must appear exactly once"
        );
    }

    #[tokio::test]
    async fn test_title_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.append(&observation("abc12345678", 0)).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("abc12345678/polls.csv")).unwrap();
        assert!(content.contains("\"Hello, \"\"world\"\"\""));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("data"));
        sink.ensure_dirs(&["a1234567".to_string(), "b1234567".to_string()])
            .unwrap();
        assert!(dir.path().join("data/a1234567").is_dir());
        assert!(dir.path().join("data/b1234567").is_dir());
        // No file until the first append
        assert!(!dir.path().join("data/a1234567/polls.csv").exists());
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.append(&observation("x1234567", 1)).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.observations()[0].entity_id, "x1234567");
    }
}
