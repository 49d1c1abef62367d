/// Remote catalog service access
///
/// The pipeline only talks to the [`CatalogService`] trait; the YouTube Data
/// API client in [`youtube`] is the production implementation and tests plug
/// in scripted services.
pub mod youtube;

pub use youtube::YouTubeClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RemoteServiceConfig;
use crate::criteria::VideoDuration;

/// Failure talking to the remote catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request not authorized: {0}")]
    Unauthorized(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Errors that end the whole run no matter which call produced them
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::QuotaExceeded(_) | CatalogError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Decode(err.to_string())
        } else {
            CatalogError::Transport(err.to_string())
        }
    }
}

/// Problem with a single search item; the item is skipped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("malformed item: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("{0} unavailable")]
    Unavailable(&'static str),

    #[error("lookup failed: {0}")]
    Lookup(CatalogError),
}

/// One search call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub video_duration: VideoDuration,
    pub published_after: Option<DateTime<Utc>>,
    pub region_code: Option<String>,
    pub relevance_language: Option<String>,
    pub page_size: u32,
    pub page_token: Option<String>,
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Items in ranking order; an item the client could not decode is kept
    /// as an error so the rest of the page survives
    pub items: Vec<std::result::Result<SearchItem, ItemError>>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchItem {
    pub id: SearchItemId,
    pub snippet: Option<SearchSnippet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchItemId {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchSnippet {
    pub title: Option<String>,
    pub published_at: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub thumbnails: Thumbnails,
    pub default_audio_language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: Option<String>,
}

impl SearchItem {
    pub fn video_id(&self) -> Option<&str> {
        self.id.video_id.as_deref()
    }

    pub fn default_audio_language(&self) -> Option<&str> {
        self.snippet
            .as_ref()
            .and_then(|s| s.default_audio_language.as_deref())
    }
}

/// Statistics and content details for one video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoDetails {
    pub statistics: VideoStatistics,
    pub content_details: ContentDetails,
}

/// Counts arrive as decimal strings and may be absent when hidden
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentDetails {
    /// ISO-8601 duration such as `PT4M13S`
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelStatistics {
    pub statistics: ChannelCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelCounts {
    /// Absent when the channel hides its count
    pub subscriber_count: Option<String>,
    pub hidden_subscriber_count: bool,
}

/// The remote catalog: a paginated search plus two statistics lookups
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch one page of search results
    async fn search(&self, request: &SearchRequest) -> std::result::Result<SearchPage, CatalogError>;

    /// Look up statistics for a video; `None` when the service has no item
    async fn video_details(
        &self,
        video_id: &str,
    ) -> std::result::Result<Option<VideoDetails>, CatalogError>;

    /// Look up statistics for a channel; `None` when the service has no item
    async fn channel_statistics(
        &self,
        channel_id: &str,
    ) -> std::result::Result<Option<ChannelStatistics>, CatalogError>;
}

/// Create the production catalog client from configuration
pub fn create_catalog(config: &RemoteServiceConfig) -> Result<Box<dyn CatalogService>> {
    Ok(Box::new(YouTubeClient::new(config.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_item_tolerates_missing_fields() {
        let item: SearchItem = serde_json::from_value(json!({
            "id": { "kind": "youtube#video", "videoId": "abc123" },
            "snippet": { "title": "Hello" }
        }))
        .unwrap();

        assert_eq!(item.video_id(), Some("abc123"));
        assert_eq!(item.snippet.as_ref().unwrap().title.as_deref(), Some("Hello"));
        assert_eq!(item.default_audio_language(), None);
    }

    #[test]
    fn test_video_details_decoding() {
        let details: VideoDetails = serde_json::from_value(json!({
            "id": "abc123",
            "statistics": { "viewCount": "1500", "likeCount": "20" },
            "contentDetails": { "duration": "PT3M" }
        }))
        .unwrap();

        assert_eq!(details.statistics.view_count.as_deref(), Some("1500"));
        assert_eq!(details.statistics.comment_count, None);
        assert_eq!(details.content_details.duration.as_deref(), Some("PT3M"));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(CatalogError::QuotaExceeded("daily".into()).is_fatal());
        assert!(CatalogError::Unauthorized("bad key".into()).is_fatal());
        assert!(!CatalogError::Transport("reset".into()).is_fatal());
        assert!(!CatalogError::Api { status: 500, message: "boom".into() }.is_fatal());
    }
}
