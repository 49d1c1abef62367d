use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{
    create_catalog, CatalogError, CatalogService, ItemError, SearchItem, SearchRequest,
};
use crate::config::{RemoteServiceConfig, MAX_PAGE_SIZE};
use crate::criteria::{CriteriaError, QueryMode, SearchCriteria};
use crate::filter::{dedup_by_video_id, ExclusionList, FilterPolicy, RejectReason};
use crate::video::{parse_count, parse_iso8601_duration, parse_published_at, watch_url, VideoRecord};

/// Run-level failure; no partial results accompany it
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),

    #[error("search request failed: {0}")]
    Search(#[source] CatalogError),

    #[error("lookup for video {video_id} failed: {source}")]
    Enrichment {
        video_id: String,
        #[source]
        source: CatalogError,
    },
}

/// What happened to a single search item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Accepted(VideoRecord),
    Rejected {
        video_id: String,
        reason: RejectReason,
    },
    FetchError {
        video_id: Option<String>,
        error: ItemError,
    },
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub pages_fetched: usize,
    pub items_seen: usize,
    /// Items that passed the per-item checks, before dedup, exclusions and
    /// truncation; the returned records may be fewer
    pub accepted: usize,
    /// Rejections keyed by [`RejectReason::kind`]
    pub rejected: BTreeMap<&'static str, usize>,
    pub fetch_errors: usize,
    pub duplicates_removed: usize,
    /// Dropped by the keyword / channel pass
    pub excluded: usize,
}

impl RunStats {
    fn record_rejection(&mut self, reason: &RejectReason) {
        *self.rejected.entry(reason.kind()).or_insert(0) += 1;
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub records: Vec<VideoRecord>,
    /// Token to resume the combined query where this run stopped
    pub continuation: Option<String>,
    pub stats: RunStats,
}

impl SearchOutcome {
    /// Successful run where nothing survived the filters
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reasons an item leaves the pipeline before becoming a record
enum Skip {
    Rejected(RejectReason),
    Failed(ItemError),
    Fatal(CatalogError),
}

impl From<RejectReason> for Skip {
    fn from(reason: RejectReason) -> Self {
        Skip::Rejected(reason)
    }
}

impl From<ItemError> for Skip {
    fn from(error: ItemError) -> Self {
        Skip::Failed(error)
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ItemError> {
    value.ok_or(ItemError::MissingField(field))
}

fn lookup<T>(result: Result<Option<T>, CatalogError>, what: &'static str) -> Result<T, Skip> {
    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(Skip::Failed(ItemError::Unavailable(what))),
        Err(e) if e.is_fatal() => Err(Skip::Fatal(e)),
        Err(e) => Err(Skip::Failed(ItemError::Lookup(e))),
    }
}

/// Paginated search, per-item enrichment and filtering against a catalog
pub struct VideoSearchPipeline {
    catalog: Box<dyn CatalogService>,
    page_size: u32,
    request_delay: Duration,
}

impl VideoSearchPipeline {
    pub fn new(catalog: Box<dyn CatalogService>) -> Self {
        Self {
            catalog,
            page_size: MAX_PAGE_SIZE,
            request_delay: Duration::from_millis(50),
        }
    }

    /// Build a pipeline backed by the production client
    pub fn from_config(config: &RemoteServiceConfig) -> anyhow::Result<Self> {
        Ok(Self::new(create_catalog(config)?)
            .with_page_size(config.effective_page_size())
            .with_request_delay(config.request_delay()))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Pause inserted after every remote call; zero disables it
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub async fn run(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, PipelineError> {
        self.run_at(criteria, Utc::now()).await
    }

    /// Run with an explicit clock for age filtering and derived metrics
    pub async fn run_at(
        &self,
        criteria: &SearchCriteria,
        now: DateTime<Utc>,
    ) -> Result<SearchOutcome, PipelineError> {
        criteria.validate()?;

        let policy = FilterPolicy::from_criteria(criteria);
        let exclusions = ExclusionList::from_criteria(criteria);
        let max_results = criteria.max_results as usize;
        let mut stats = RunStats::default();

        info!(
            "🔍 Starting search: {} term(s), mode {:?}, up to {} results",
            criteria.terms.len(),
            criteria.query_mode,
            max_results
        );

        let mut assembled = Vec::new();
        let mut continuation = None;
        for query in criteria.queries() {
            let (records, next) = self
                .run_query(&query, criteria, &policy, now, &mut stats)
                .await?;
            assembled.extend(records);
            if criteria.query_mode == QueryMode::Combined {
                continuation = next;
            }
        }

        stats.duplicates_removed = dedup_by_video_id(&mut assembled);

        let (mut records, excluded) = exclusions.apply(assembled);
        for (record, reason) in &excluded {
            debug!("Excluded {}: {}", record.video_id, reason);
            stats.record_rejection(reason);
        }
        stats.excluded = excluded.len();

        records.truncate(max_results);
        let records: Vec<VideoRecord> = records
            .into_iter()
            .map(|r| r.with_derived_metrics(now))
            .collect();

        info!(
            "✅ Search finished: {} result(s) from {} page(s), {} item(s) seen, {} rejected, {} fetch error(s), {} duplicate(s), {} excluded",
            records.len(),
            stats.pages_fetched,
            stats.items_seen,
            stats.total_rejected(),
            stats.fetch_errors,
            stats.duplicates_removed,
            stats.excluded
        );

        Ok(SearchOutcome {
            records,
            continuation,
            stats,
        })
    }

    /// Page through one query until enough items are accepted or pages run out.
    /// Returns the accepted records and the token of the next unread page.
    async fn run_query(
        &self,
        query: &str,
        criteria: &SearchCriteria,
        policy: &FilterPolicy,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> Result<(Vec<VideoRecord>, Option<String>), PipelineError> {
        let max_results = criteria.max_results as usize;
        let mut accepted: Vec<VideoRecord> = Vec::new();
        let mut page_token = criteria.page_token.clone();

        while accepted.len() < max_results {
            let request = SearchRequest {
                query: query.to_string(),
                video_duration: criteria.video_duration,
                published_after: criteria.published_after(now),
                region_code: criteria.region_code.clone(),
                relevance_language: criteria.relevance_language.clone(),
                page_size: self.page_size,
                page_token: page_token.clone(),
            };

            let page = self
                .catalog
                .search(&request)
                .await
                .map_err(PipelineError::Search)?;
            self.pause().await;
            stats.pages_fetched += 1;

            if page.items.is_empty() {
                debug!("Empty page for query {}, stopping", query);
                page_token = None;
                break;
            }
            page_token = page.next_page_token;

            let page_items = page.items.len();
            for item in page.items {
                if accepted.len() >= max_results {
                    break;
                }
                stats.items_seen += 1;

                match self.process_item(item, query, policy, now).await? {
                    ItemOutcome::Accepted(record) => {
                        debug!("Accepted {} ({} views)", record.video_id, record.views);
                        stats.accepted += 1;
                        accepted.push(record);
                    }
                    ItemOutcome::Rejected { video_id, reason } => {
                        debug!("Rejected {}: {}", video_id, reason);
                        stats.record_rejection(&reason);
                    }
                    ItemOutcome::FetchError { video_id, error } => {
                        warn!(
                            "Skipping item {}: {}",
                            video_id.as_deref().unwrap_or("<unknown>"),
                            error
                        );
                        stats.fetch_errors += 1;
                    }
                }
            }

            info!(
                "📄 Page {}: {} item(s), {}/{} accepted",
                stats.pages_fetched,
                page_items,
                accepted.len(),
                max_results
            );

            if page_token.is_none() {
                break;
            }
        }

        Ok((accepted, page_token))
    }

    /// Enrich and filter one search item.
    ///
    /// Only a fatal catalog error (quota, credentials) escapes as `Err`;
    /// everything else becomes an [`ItemOutcome`].
    pub async fn process_item(
        &self,
        item: Result<SearchItem, ItemError>,
        search_term: &str,
        policy: &FilterPolicy,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, PipelineError> {
        let item = match item {
            Ok(item) => item,
            Err(error) => return Ok(ItemOutcome::FetchError { video_id: None, error }),
        };
        let video_id = match item.video_id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Ok(ItemOutcome::FetchError {
                    video_id: None,
                    error: ItemError::MissingField("id.videoId"),
                })
            }
        };

        match self.evaluate(&video_id, item, search_term, policy, now).await {
            Ok(record) => Ok(ItemOutcome::Accepted(record)),
            Err(Skip::Rejected(reason)) => Ok(ItemOutcome::Rejected { video_id, reason }),
            Err(Skip::Failed(error)) => Ok(ItemOutcome::FetchError {
                video_id: Some(video_id),
                error,
            }),
            Err(Skip::Fatal(source)) => Err(PipelineError::Enrichment { video_id, source }),
        }
    }

    async fn evaluate(
        &self,
        video_id: &str,
        item: SearchItem,
        search_term: &str,
        policy: &FilterPolicy,
        now: DateTime<Utc>,
    ) -> Result<VideoRecord, Skip> {
        // Language is known from the search item alone, so check it before
        // spending quota on lookups.
        policy.check_language(item.default_audio_language())?;

        let snippet = require(item.snippet, "snippet")?;
        let title = require(snippet.title, "snippet.title")?;
        let published_at = parse_published_at(&require(snippet.published_at, "snippet.publishedAt")?)?;
        let channel_id = require(snippet.channel_id, "snippet.channelId")?;
        let channel = require(snippet.channel_title, "snippet.channelTitle")?;
        let thumbnail = snippet.thumbnails.default.and_then(|t| t.url);

        let details = lookup(self.catalog.video_details(video_id).await, "video statistics")?;
        self.pause().await;

        let duration = require(details.content_details.duration, "contentDetails.duration")?;
        let duration_seconds = parse_iso8601_duration(&duration)?;
        let stats = &details.statistics;
        let views = parse_count("viewCount", stats.view_count.as_deref())?;
        policy.check_video(duration_seconds, views, published_at, now)?;

        let channel_stats = lookup(
            self.catalog.channel_statistics(&channel_id).await,
            "channel statistics",
        )?;
        self.pause().await;

        if channel_stats.statistics.hidden_subscriber_count {
            debug!("Channel {} hides its subscriber count, treating it as 0", channel_id);
        }
        let subscribers = parse_count(
            "subscriberCount",
            channel_stats.statistics.subscriber_count.as_deref(),
        )?;
        policy.check_channel(subscribers)?;

        Ok(VideoRecord {
            video_id: video_id.to_string(),
            video_url: watch_url(video_id),
            title,
            published_at,
            channel,
            channel_id,
            views,
            likes: parse_count("likeCount", stats.like_count.as_deref())?,
            comments: parse_count("commentCount", stats.comment_count.as_deref())?,
            duration,
            duration_seconds,
            search_term: search_term.to_string(),
            subscribers,
            thumbnail,
            default_audio_language: snippet.default_audio_language,
            age_days: None,
            views_per_day: None,
        })
    }

    async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}
