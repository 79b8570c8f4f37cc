//! End-to-end polling runs against the CSV sink on virtual time

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use vidpoll_core::services::clock::ManualClock;
use vidpoll_core::{
    CsvSink, EntityId, Error, FetchError, PollConfig, PollingScheduler, StatsFetcher, StatsRecord,
};

/// Returns a growing view count for every requested id
#[derive(Default)]
struct CountingFetcher {
    calls: AtomicU64,
}

#[async_trait]
impl StatsFetcher for CountingFetcher {
    fn fetcher_id(&self) -> &'static str {
        "counting"
    }

    async fn fetch_stats(
        &self,
        batch: &[EntityId],
    ) -> Result<HashMap<EntityId, StatsRecord>, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(batch
            .iter()
            .map(|id| {
                let stats = StatsRecord {
                    view_count: Some(1000 + n),
                    like_count: Some(10),
                    comment_count: None,
                    published_at: Some("2024-04-01T00:00:00Z".to_string()),
                    title: Some(format!("Video {}", id)),
                    duration: None,
                };
                (id.clone(), stats)
            })
            .collect())
    }
}

fn setup() -> (TempDir, Arc<ManualClock>, Arc<CountingFetcher>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    (temp_dir, clock, Arc::new(CountingFetcher::default()))
}

#[tokio::test]
async fn test_five_rounds_append_five_rows() {
    let (temp_dir, clock, fetcher) = setup();
    let out = temp_dir.path().join("data");
    let config = PollConfig {
        interval_seconds: 1,
        duration_hours: 5.0 / 3600.0,
        output_dir: out.clone(),
        ..Default::default()
    };
    let plan = config.plan(vec!["abc12345678".to_string()]).unwrap();

    let summary = PollingScheduler::new(config, fetcher, Arc::new(CsvSink::new(&out)))
        .with_clock(clock)
        .run(&plan)
        .await
        .unwrap();
    assert_eq!(summary.observations_written, 5);

    let content = std::fs::read_to_string(out.join("abc12345678").join("polls.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(
        lines[0],
        "video_id,ts_utc,view_count,like_count,comment_count,title,publishedAt"
    );
    assert_eq!(
        lines[1],
        "abc12345678,2024-05-01T12:00:00Z,1001,10,,Video abc12345678,2024-04-01T00:00:00Z"
    );
    assert!(lines[5].starts_with("abc12345678,2024-05-01T12:00:04Z,1005,"));
}

#[tokio::test]
async fn test_second_run_appends_without_new_header() {
    let (temp_dir, clock, fetcher) = setup();
    let out = temp_dir.path().to_path_buf();
    let config = PollConfig {
        interval_seconds: 1,
        duration_hours: 2.0 / 3600.0,
        output_dir: out.clone(),
        ..Default::default()
    };
    let plan = config.plan(vec!["abc12345678".to_string()]).unwrap();

    for _ in 0..2 {
        PollingScheduler::new(config.clone(), fetcher.clone(), Arc::new(CsvSink::new(&out)))
            .with_clock(clock.clone())
            .run(&plan)
            .await
            .unwrap();
    }

    let content = std::fs::read_to_string(out.join("abc12345678/polls.csv")).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert_eq!(content.matches("video_id").count(), 1);
}

#[tokio::test]
async fn test_one_file_per_entity() {
    let (temp_dir, clock, fetcher) = setup();
    let out = temp_dir.path().join("polls");
    let config = PollConfig {
        interval_seconds: 60,
        duration_hours: 1.0 / 60.0,
        max_batch_size: 2,
        ..Default::default()
    };
    let ids: Vec<EntityId> = vec!["aaaaaaaa".into(), "bbbbbbbb".into(), "cccccccc".into()];
    let plan = config.plan(ids.clone()).unwrap();

    let summary = PollingScheduler::new(config, fetcher, Arc::new(CsvSink::new(&out)))
        .with_clock(clock)
        .run(&plan)
        .await
        .unwrap();
    assert_eq!(summary.calls_made, 2);

    for id in &ids {
        let content = std::fs::read_to_string(out.join(id).join("polls.csv")).unwrap();
        assert_eq!(content.lines().count(), 2, "{}", id);
    }
}

#[tokio::test]
async fn test_quota_abort_creates_nothing() {
    let (temp_dir, clock, fetcher) = setup();
    let out = temp_dir.path().join("data");
    let config = PollConfig {
        interval_seconds: 60,
        duration_hours: 1.0,
        max_calls: Some(10),
        ..Default::default()
    };
    let plan = config.plan(vec!["abc12345678".to_string()]).unwrap();

    let err = PollingScheduler::new(config, fetcher.clone(), Arc::new(CsvSink::new(&out)))
        .with_clock(clock)
        .run(&plan)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::QuotaExceeded { planned: 60, max: 10 }));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(!out.exists());
}
