//! YouTube Data API v3 stats fetcher
//!
//! Implements [`StatsFetcher`] on top of `videos.list`, asking for the
//! `statistics`, `snippet` and `contentDetails` parts of up to 50 videos per
//! call. One call costs one quota unit.
//!
//! # Example
//!
//! ```ignore
//! use vidpoll_core::auth::discover_credentials;
//! use vidpoll_core::services::fetch::{StatsFetcher, YouTubeStatsFetcher};
//!
//! let creds = discover_credentials(None)?;
//! let fetcher = YouTubeStatsFetcher::new(creds.access_token);
//! let stats = fetcher.fetch_stats(&["dQw4w9WgXcQ".to_string()]).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{FetchError, StatsFetcher};
use crate::models::{EntityId, StatsRecord};

// ============================================================================
// Constants
// ============================================================================

/// `videos.list` endpoint
const VIDEOS_API_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Parts requested on every call
const VIDEO_PARTS: &str = "statistics,snippet,contentDetails";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    statistics: Option<VideoStatistics>,
    snippet: Option<VideoSnippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

/// Counters arrive as decimal strings
#[derive(Debug, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Google API error envelope, used only to build a readable message
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

// ============================================================================
// YouTubeStatsFetcher
// ============================================================================

/// Fetches video statistics with a bearer token
pub struct YouTubeStatsFetcher {
    client: Client,
    access_token: String,
    base_url: String,
}

impl YouTubeStatsFetcher {
    pub fn new(access_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            access_token: access_token.into(),
            base_url: VIDEOS_API_URL.to_string(),
        }
    }

    /// Point the fetcher at a different endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_videos_api(&self, batch: &[EntityId]) -> Result<String, FetchError> {
        log::debug!("[fetch:youtube] videos.list for {} id(s)", batch.len());

        let ids = batch.join(",");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("part", VIDEO_PARTS), ("id", ids.as_str())])
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body).unwrap_or_else(|| {
                format!("API returned HTTP {}", status)
            });
            log::warn!("[fetch:youtube] API error: HTTP {} - {}", status, message);
            return Err(FetchError::from_status(status.as_u16(), message));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl StatsFetcher for YouTubeStatsFetcher {
    fn fetcher_id(&self) -> &'static str {
        "youtube"
    }

    async fn fetch_stats(
        &self,
        batch: &[EntityId],
    ) -> Result<HashMap<EntityId, StatsRecord>, FetchError> {
        if batch.is_empty() {
            return Ok(HashMap::new());
        }
        let body = self.call_videos_api(batch).await?;
        let records = parse_videos_response(&body)?;
        log::debug!(
            "[fetch:youtube] Received {} of {} requested record(s)",
            records.len(),
            batch.len()
        );
        Ok(records)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Convert a `videos.list` body into per-video records
fn parse_videos_response(body: &str) -> Result<HashMap<EntityId, StatsRecord>, FetchError> {
    let response: VideoListResponse = serde_json::from_str(body)?;

    Ok(response
        .items
        .into_iter()
        .map(|item| {
            let stats = item.statistics;
            let snippet = item.snippet;
            let record = StatsRecord {
                view_count: stats.as_ref().and_then(|s| parse_count(&s.view_count)),
                like_count: stats.as_ref().and_then(|s| parse_count(&s.like_count)),
                comment_count: stats.as_ref().and_then(|s| parse_count(&s.comment_count)),
                published_at: snippet.as_ref().and_then(|s| s.published_at.clone()),
                title: snippet.and_then(|s| s.title),
                duration: item.content_details.and_then(|c| c.duration),
            };
            (item.id, record)
        })
        .collect())
}

fn parse_count(raw: &Option<String>) -> Option<u64> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}

fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()?
        .error?
        .message
}

// ============================================================================
// Tests
// ============================================================================
