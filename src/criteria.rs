//! Search criteria supplied by the caller for a single pipeline run

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::SearchDefaults;

/// Upper bound accepted for `max_results`
pub const MAX_RESULTS_LIMIT: u32 = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("at least one search term is required")]
    NoTerms,

    #[error("max_results must be between 1 and 200, got {0}")]
    MaxResultsOutOfRange(u32),

    #[error("min_subscribers ({min}) is greater than max_subscribers ({max})")]
    SubscriberBoundsInverted { min: u64, max: u64 },

    #[error("a continuation token can only resume a combined query")]
    PageTokenInPerTermMode,

    #[error("unknown video duration class: {0}")]
    UnknownDuration(String),

    #[error("unknown query mode: {0}")]
    UnknownQueryMode(String),
}

/// Duration class understood by the remote search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoDuration {
    #[default]
    Any,
    /// Under 4 minutes
    Short,
    /// 4 to 20 minutes
    Medium,
    /// Over 20 minutes
    Long,
}

impl VideoDuration {
    pub fn as_api_value(&self) -> &'static str {
        match self {
            VideoDuration::Any => "any",
            VideoDuration::Short => "short",
            VideoDuration::Medium => "medium",
            VideoDuration::Long => "long",
        }
    }
}

impl FromStr for VideoDuration {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" | "" => Ok(VideoDuration::Any),
            "short" => Ok(VideoDuration::Short),
            "medium" => Ok(VideoDuration::Medium),
            "long" => Ok(VideoDuration::Long),
            other => Err(CriteriaError::UnknownDuration(other.to_string())),
        }
    }
}

impl fmt::Display for VideoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_value())
    }
}

/// How the positive terms are turned into remote queries.
///
/// `Combined` issues one query with every term quoted and OR-joined, so
/// `max_results` caps the combined query. `PerTerm` issues one paginated
/// query per term, each capped at `max_results`, and the concatenation is
/// deduplicated and capped again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    #[default]
    Combined,
    PerTerm,
}

impl FromStr for QueryMode {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "combined" => Ok(QueryMode::Combined),
            "per-term" | "per_term" => Ok(QueryMode::PerTerm),
            other => Err(CriteriaError::UnknownQueryMode(other.to_string())),
        }
    }
}

/// Treat the form convention "0 means no limit" as an absent bound
pub fn bound_from_sentinel<T: PartialEq + Default>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

/// Map a language name or code to the code the remote service reports
///
/// Only known names are mapped; other codes keep their case (`pt-BR`).
pub fn normalize_language(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let code = match trimmed.to_lowercase().as_str() {
        "" | "all" | "todos" | "any" => return None,
        "portuguese" | "português" | "portugues" => "pt",
        "english" | "inglês" | "ingles" => "en",
        "spanish" | "espanhol" | "español" => "es",
        _ => trimmed,
    };
    Some(code.to_string())
}

/// Immutable input for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Positive search terms, in the order given
    pub terms: Vec<String>,
    pub query_mode: QueryMode,
    pub max_results: u32,
    pub min_views: Option<u64>,
    pub min_subscribers: Option<u64>,
    pub max_subscribers: Option<u64>,
    pub max_age_days: Option<u32>,
    /// ISO country code sent as `regionCode`
    pub region_code: Option<String>,
    /// Language code; also enforced locally against the default audio language
    pub relevance_language: Option<String>,
    pub video_duration: VideoDuration,
    /// Lowercase title substrings that reject a video
    pub negative_terms: HashSet<String>,
    /// Lowercase channel names that reject a video
    pub excluded_channels: HashSet<String>,
    /// Continuation token from a previous run
    pub page_token: Option<String>,
}

impl SearchCriteria {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(Into::into)
                .map(|t: String| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            query_mode: QueryMode::Combined,
            max_results: 50,
            min_views: None,
            min_subscribers: None,
            max_subscribers: None,
            max_age_days: None,
            region_code: None,
            relevance_language: None,
            video_duration: VideoDuration::Any,
            negative_terms: HashSet::new(),
            excluded_channels: HashSet::new(),
            page_token: None,
        }
    }

    /// Criteria seeded from configured defaults, where 0 disables a bound
    pub fn from_defaults<I, S>(terms: I, defaults: &SearchDefaults) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(terms)
            .with_max_results(defaults.max_results)
            .with_min_views(bound_from_sentinel(defaults.min_views))
            .with_subscriber_range(
                bound_from_sentinel(defaults.min_subscribers),
                bound_from_sentinel(defaults.max_subscribers),
            )
            .with_max_age_days(bound_from_sentinel(defaults.max_age_days))
    }

    pub fn with_query_mode(mut self, mode: QueryMode) -> Self {
        self.query_mode = mode;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_views(mut self, min_views: Option<u64>) -> Self {
        self.min_views = min_views;
        self
    }

    pub fn with_subscriber_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_subscribers = min;
        self.max_subscribers = max;
        self
    }

    pub fn with_max_age_days(mut self, days: Option<u32>) -> Self {
        self.max_age_days = days;
        self
    }

    pub fn with_region_code(mut self, region: Option<String>) -> Self {
        self.region_code = region
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty());
        self
    }

    pub fn with_relevance_language(mut self, language: Option<String>) -> Self {
        self.relevance_language = language.and_then(|l| normalize_language(&l));
        self
    }

    pub fn with_video_duration(mut self, duration: VideoDuration) -> Self {
        self.video_duration = duration;
        self
    }

    pub fn with_negative_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.negative_terms = lowercase_set(terms);
        self
    }

    pub fn with_excluded_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_channels = lowercase_set(channels);
        self
    }

    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.terms.is_empty() {
            return Err(CriteriaError::NoTerms);
        }
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(CriteriaError::MaxResultsOutOfRange(self.max_results));
        }
        if let (Some(min), Some(max)) = (self.min_subscribers, self.max_subscribers) {
            if min > max {
                return Err(CriteriaError::SubscriberBoundsInverted { min, max });
            }
        }
        if self.query_mode == QueryMode::PerTerm && self.page_token.is_some() {
            return Err(CriteriaError::PageTokenInPerTermMode);
        }
        Ok(())
    }

    /// Quote every term as an exact phrase and join them with OR
    pub fn combined_query(&self) -> String {
        self.terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Remote query strings for this run, in issue order
    pub fn queries(&self) -> Vec<String> {
        match self.query_mode {
            QueryMode::Combined => vec![self.combined_query()],
            QueryMode::PerTerm => self.terms.clone(),
        }
    }

    /// Lower publish bound for the remote query; absent when age is unbounded
    /// or reaches past the earliest representable date
    pub fn published_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = ChronoDuration::try_days(i64::from(self.max_age_days?))?;
        now.checked_sub_signed(days)
    }
}

fn lowercase_set<I, S>(items: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a one-entry-per-line list, dropping blank lines
pub fn parse_term_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a term list file; a missing file yields an empty list
pub async fn load_term_list(path: &Path) -> anyhow::Result<Vec<String>> {
    if !path.exists() {
        tracing::debug!("Term list not found, using empty list: {}", path.display());
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(path).await?;
    let terms = parse_term_list(&content);
    tracing::info!("📄 Loaded {} entries from {}", terms.len(), path.display());
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_combined_query_quotes_and_joins() {
        let criteria = SearchCriteria::new(["sunset", "  golden hour ", ""]);
        assert_eq!(criteria.terms.len(), 2);
        assert_eq!(criteria.combined_query(), "\"sunset\" OR \"golden hour\"");
        assert_eq!(criteria.queries(), vec!["\"sunset\" OR \"golden hour\"".to_string()]);
    }

    #[test]
    fn test_per_term_queries() {
        let criteria = SearchCriteria::new(["a", "b"]).with_query_mode(QueryMode::PerTerm);
        assert_eq!(criteria.queries(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_published_after_only_when_bounded() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let unbounded = SearchCriteria::new(["x"]);
        assert_eq!(unbounded.published_after(now), None);

        let bounded = SearchCriteria::new(["x"]).with_max_age_days(Some(10));
        assert_eq!(
            bounded.published_after(now),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
        );

        let huge = SearchCriteria::new(["x"]).with_max_age_days(Some(u32::MAX));
        assert_eq!(huge.published_after(now), None);
    }

    #[test]
    fn test_sentinel_bounds_from_defaults() {
        let defaults = SearchDefaults {
            min_views: 0,
            max_subscribers: 0,
            max_age_days: 0,
            ..SearchDefaults::default()
        };
        let criteria = SearchCriteria::from_defaults(["x"], &defaults);
        assert_eq!(criteria.min_views, None);
        assert_eq!(criteria.min_subscribers, None);
        assert_eq!(criteria.max_subscribers, None);
        assert_eq!(criteria.max_age_days, None);
        assert_eq!(criteria.max_results, 50);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            SearchCriteria::new(Vec::<String>::new()).validate(),
            Err(CriteriaError::NoTerms)
        );
        assert_eq!(
            SearchCriteria::new(["x"]).with_max_results(0).validate(),
            Err(CriteriaError::MaxResultsOutOfRange(0))
        );
        assert_eq!(
            SearchCriteria::new(["x"]).with_max_results(201).validate(),
            Err(CriteriaError::MaxResultsOutOfRange(201))
        );
        assert!(SearchCriteria::new(["x"]).with_max_results(200).validate().is_ok());
        assert!(SearchCriteria::new(["x"])
            .with_subscriber_range(Some(10), Some(5))
            .validate()
            .is_err());
        assert_eq!(
            SearchCriteria::new(["x"])
                .with_query_mode(QueryMode::PerTerm)
                .with_page_token(Some("CAUQAA".to_string()))
                .validate(),
            Err(CriteriaError::PageTokenInPerTermMode)
        );
    }

    #[test]
    fn test_exclusion_lists_are_lowercased() {
        let criteria = SearchCriteria::new(["x"])
            .with_negative_terms(["PRANK", " ", "Reaction "])
            .with_excluded_channels(["Some Channel"]);
        assert!(criteria.negative_terms.contains("prank"));
        assert!(criteria.negative_terms.contains("reaction"));
        assert_eq!(criteria.negative_terms.len(), 2);
        assert!(criteria.excluded_channels.contains("some channel"));
    }

    #[test]
    fn test_language_and_region_normalization() {
        let criteria = SearchCriteria::new(["x"])
            .with_relevance_language(Some("Português".to_string()))
            .with_region_code(Some("br".to_string()));
        assert_eq!(criteria.relevance_language.as_deref(), Some("pt"));
        assert_eq!(criteria.region_code.as_deref(), Some("BR"));

        assert_eq!(normalize_language("Todos"), None);
        assert_eq!(normalize_language("en"), Some("en".to_string()));
        assert_eq!(normalize_language(" pt-BR "), Some("pt-BR".to_string()));
        assert_eq!(normalize_language("ENGLISH"), Some("en".to_string()));
    }

    #[test]
    fn test_duration_and_mode_parsing() {
        assert_eq!("LONG".parse::<VideoDuration>(), Ok(VideoDuration::Long));
        assert_eq!(VideoDuration::Medium.to_string(), "medium");
        assert!("huge".parse::<VideoDuration>().is_err());
        assert_eq!("per-term".parse::<QueryMode>(), Ok(QueryMode::PerTerm));
    }

    #[test]
    fn test_parse_term_list() {
        let terms = parse_term_list("sunset\n\n  beach  \r\n\t\nmountain");
        assert_eq!(terms, vec!["sunset", "beach", "mountain"]);
    }

    #[tokio::test]
    async fn test_load_term_list_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let terms = load_term_list(&dir.path().join("absent.txt")).await.unwrap();
        assert!(terms.is_empty());

        let path = dir.path().join("terms.txt");
        tokio::fs::write(&path, "one\ntwo\n").await.unwrap();
        assert_eq!(load_term_list(&path).await.unwrap(), vec!["one", "two"]);
    }
}
