/// YouTube Data API v3 implementation of the catalog service
use super::{
    CatalogError, CatalogService, ChannelStatistics, ItemError, SearchItem, SearchPage,
    SearchRequest, VideoDetails,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::RemoteServiceConfig;

/// Error reasons the API uses for quota and rate exhaustion
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

/// HTTP client for the search, videos and channels endpoints
pub struct YouTubeClient {
    config: RemoteServiceConfig,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

impl YouTubeClient {
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("YouTube API key required"))?;

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, CatalogError> {
        let response = self
            .client
            .get(endpoint)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Decode(e.to_string()))
    }

    async fn check_status(response: Response) -> std::result::Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text))
    }
}

/// Map an error response to the matching catalog error
fn classify_error(status: u16, body: &str) -> CatalogError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    let reasons: Vec<String> = parsed
        .map(|e| e.error.errors.into_iter().map(|d| d.reason).collect())
        .unwrap_or_default();

    if status == 429 || reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
        return CatalogError::QuotaExceeded(message);
    }
    if status == 401
        || status == 403
        || reasons.iter().any(|r| r == "keyInvalid" || r == "forbidden")
    {
        return CatalogError::Unauthorized(message);
    }
    CatalogError::Api { status, message }
}

#[async_trait]
impl CatalogService for YouTubeClient {
    async fn search(&self, request: &SearchRequest) -> std::result::Result<SearchPage, CatalogError> {
        let mut params: Vec<(&str, String)> = vec![
            ("part", "snippet".to_string()),
            ("q", request.query.clone()),
            ("type", "video".to_string()),
            ("order", "viewCount".to_string()),
            ("videoDuration", request.video_duration.as_api_value().to_string()),
            ("maxResults", request.page_size.min(self.config.effective_page_size()).to_string()),
        ];
        if let Some(after) = request.published_after {
            params.push(("publishedAfter", after.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(region) = &request.region_code {
            params.push(("regionCode", region.clone()));
        }
        if let Some(language) = &request.relevance_language {
            params.push(("relevanceLanguage", language.clone()));
        }
        if let Some(token) = &request.page_token {
            params.push(("pageToken", token.clone()));
        }

        debug!("Searching catalog: q={} page_token={:?}", request.query, request.page_token);
        let response: SearchListResponse =
            self.get_json(&self.config.search_endpoint, &params).await?;

        let items = response
            .items
            .into_iter()
            .map(|value| {
                serde_json::from_value::<SearchItem>(value)
                    .map_err(|e| ItemError::Malformed(e.to_string()))
            })
            .collect();

        Ok(SearchPage {
            items,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn video_details(
        &self,
        video_id: &str,
    ) -> std::result::Result<Option<VideoDetails>, CatalogError> {
        let params = [
            ("part", "statistics,contentDetails".to_string()),
            ("id", video_id.to_string()),
        ];
        let response: ListResponse<VideoDetails> =
            self.get_json(&self.config.videos_endpoint, &params).await?;
        Ok(response.items.into_iter().next())
    }

    async fn channel_statistics(
        &self,
        channel_id: &str,
    ) -> std::result::Result<Option<ChannelStatistics>, CatalogError> {
        let params = [
            ("part", "statistics".to_string()),
            ("id", channel_id.to_string()),
        ];
        let response: ListResponse<ChannelStatistics> =
            self.get_json(&self.config.channels_endpoint, &params).await?;
        Ok(response.items.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::VideoDuration;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> YouTubeClient {
        let config = RemoteServiceConfig {
            api_key: Some("test-key".to_string()),
            ..RemoteServiceConfig::default()
        }
        .with_base_url(&server.uri());
        YouTubeClient::new(config).unwrap()
    }

    fn request(page_token: Option<&str>) -> SearchRequest {
        SearchRequest {
            query: "\"sunset\"".to_string(),
            video_duration: VideoDuration::Medium,
            published_after: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            region_code: Some("BR".to_string()),
            relevance_language: Some("pt".to_string()),
            page_size: 50,
            page_token: page_token.map(str::to_string),
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(YouTubeClient::new(RemoteServiceConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_search_sends_filters_and_decodes_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("key", "test-key"))
            .and(query_param("q", "\"sunset\""))
            .and(query_param("type", "video"))
            .and(query_param("order", "viewCount"))
            .and(query_param("videoDuration", "medium"))
            .and(query_param("maxResults", "50"))
            .and(query_param("publishedAfter", "2024-01-02T03:04:05Z"))
            .and(query_param("regionCode", "BR"))
            .and(query_param("relevanceLanguage", "pt"))
            .and(query_param("pageToken", "PAGE2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "PAGE3",
                "items": [
                    {
                        "id": { "videoId": "vid1" },
                        "snippet": {
                            "title": "Sunset timelapse",
                            "publishedAt": "2024-01-05T10:00:00Z",
                            "channelId": "chan1",
                            "channelTitle": "Skies",
                            "thumbnails": { "default": { "url": "https://i.ytimg.com/vi/vid1/default.jpg" } }
                        }
                    },
                    { "id": "not-an-object" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server).search(&request(Some("PAGE2"))).await.unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("PAGE3"));
        assert_eq!(page.items.len(), 2);
        let first = page.items[0].as_ref().unwrap();
        assert_eq!(first.video_id(), Some("vid1"));
        assert!(matches!(page.items[1], Err(ItemError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_video_and_channel_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "vid1"))
            .and(query_param("part", "statistics,contentDetails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "statistics": { "viewCount": "1200", "likeCount": "30", "commentCount": "4" },
                    "contentDetails": { "duration": "PT12M" }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "chan1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "statistics": { "subscriberCount": "5000" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let details = client.video_details("vid1").await.unwrap().unwrap();
        assert_eq!(details.statistics.view_count.as_deref(), Some("1200"));
        assert_eq!(details.content_details.duration.as_deref(), Some("PT12M"));

        let channel = client.channel_statistics("chan1").await.unwrap().unwrap();
        assert_eq!(channel.statistics.subscriber_count.as_deref(), Some("5000"));

        assert_eq!(client.channel_statistics("gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quota_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "The request cannot be completed because you have exceeded your quota.",
                    "errors": [{ "reason": "quotaExceeded", "domain": "youtube.quota" }]
                }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).search(&request(None)).await.unwrap_err();
        assert!(matches!(err, CatalogError::QuotaExceeded(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_classify_error_variants() {
        let invalid_key = r#"{"error":{"code":400,"message":"API key not valid.","errors":[{"reason":"keyInvalid"}]}}"#;
        assert!(matches!(classify_error(400, invalid_key), CatalogError::Unauthorized(_)));
        assert!(matches!(classify_error(401, ""), CatalogError::Unauthorized(_)));
        assert!(matches!(classify_error(429, "slow down"), CatalogError::QuotaExceeded(_)));
        assert!(classify_error(429, "").is_fatal());
        assert_eq!(
            classify_error(503, "backend down"),
            CatalogError::Api { status: 503, message: "backend down".to_string() }
        );
    }
}
