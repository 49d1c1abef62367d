//! Filter policy applied to search matches
//!
//! Per-item checks run inside the pipeline as soon as the data they need is
//! available. Keyword and channel exclusions run afterwards as a pass over the
//! assembled collection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::criteria::SearchCriteria;
use crate::video::{age_in_days, VideoRecord};

/// Shortest video kept, in seconds
pub const MIN_DURATION_SECONDS: u64 = 180;

/// Why a match was dropped
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum RejectReason {
    LanguageMismatch { expected: String, found: Option<String> },
    TooShort { seconds: u64 },
    TooFewViews { views: u64, min: u64 },
    TooOld { age_days: i64, max: u32 },
    TooFewSubscribers { subscribers: u64, min: u64 },
    TooManySubscribers { subscribers: u64, max: u64 },
    NegativeKeyword(String),
    ExcludedChannel(String),
}

impl RejectReason {
    /// Stable label used for counting rejections
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::LanguageMismatch { .. } => "language",
            RejectReason::TooShort { .. } => "duration",
            RejectReason::TooFewViews { .. } => "views",
            RejectReason::TooOld { .. } => "age",
            RejectReason::TooFewSubscribers { .. } => "min_subscribers",
            RejectReason::TooManySubscribers { .. } => "max_subscribers",
            RejectReason::NegativeKeyword(_) => "negative_keyword",
            RejectReason::ExcludedChannel(_) => "excluded_channel",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::LanguageMismatch { expected, found } => {
                write!(f, "audio language {:?} is not {}", found, expected)
            }
            RejectReason::TooShort { seconds } => {
                write!(f, "duration {}s below {}s", seconds, MIN_DURATION_SECONDS)
            }
            RejectReason::TooFewViews { views, min } => write!(f, "{} views below {}", views, min),
            RejectReason::TooOld { age_days, max } => {
                write!(f, "{} days old, limit {}", age_days, max)
            }
            RejectReason::TooFewSubscribers { subscribers, min } => {
                write!(f, "{} subscribers below {}", subscribers, min)
            }
            RejectReason::TooManySubscribers { subscribers, max } => {
                write!(f, "{} subscribers above {}", subscribers, max)
            }
            RejectReason::NegativeKeyword(term) => write!(f, "title contains {:?}", term),
            RejectReason::ExcludedChannel(channel) => write!(f, "channel {:?} is excluded", channel),
        }
    }
}

/// Numeric and language filters evaluated per item
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPolicy {
    pub relevance_language: Option<String>,
    pub min_views: Option<u64>,
    pub max_age_days: Option<u32>,
    pub min_subscribers: Option<u64>,
    pub max_subscribers: Option<u64>,
}

impl FilterPolicy {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self {
            relevance_language: criteria.relevance_language.clone(),
            min_views: criteria.min_views.filter(|v| *v > 0),
            max_age_days: criteria.max_age_days.filter(|d| *d > 0),
            min_subscribers: criteria.min_subscribers.filter(|s| *s > 0),
            max_subscribers: criteria.max_subscribers.filter(|s| *s > 0),
        }
    }

    /// Checked on the raw search item, before any lookup is spent on it
    pub fn check_language(&self, audio_language: Option<&str>) -> Result<(), RejectReason> {
        match &self.relevance_language {
            Some(expected) if audio_language != Some(expected.as_str()) => {
                Err(RejectReason::LanguageMismatch {
                    expected: expected.clone(),
                    found: audio_language.map(str::to_string),
                })
            }
            _ => Ok(()),
        }
    }

    /// Checks that only need the video lookup
    pub fn check_video(
        &self,
        duration_seconds: u64,
        views: u64,
        published_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        if duration_seconds < MIN_DURATION_SECONDS {
            return Err(RejectReason::TooShort { seconds: duration_seconds });
        }
        if let Some(min) = self.min_views {
            if views < min {
                return Err(RejectReason::TooFewViews { views, min });
            }
        }
        if let Some(max) = self.max_age_days {
            let age_days = age_in_days(published_at, now);
            if age_days > i64::from(max) {
                return Err(RejectReason::TooOld { age_days, max });
            }
        }
        Ok(())
    }

    /// Checks that need the channel lookup
    pub fn check_channel(&self, subscribers: u64) -> Result<(), RejectReason> {
        if let Some(min) = self.min_subscribers {
            if subscribers < min {
                return Err(RejectReason::TooFewSubscribers { subscribers, min });
            }
        }
        if let Some(max) = self.max_subscribers {
            if subscribers > max {
                return Err(RejectReason::TooManySubscribers { subscribers, max });
            }
        }
        Ok(())
    }

    /// Every per-item check against a complete record, in policy order
    pub fn check(&self, record: &VideoRecord, now: DateTime<Utc>) -> Result<(), RejectReason> {
        self.check_language(record.default_audio_language.as_deref())?;
        self.check_video(record.duration_seconds, record.views, record.published_at, now)?;
        self.check_channel(record.subscribers)
    }
}

/// Title keywords and channel names removed after assembly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionList {
    negative_terms: Vec<String>,
    channels: HashSet<String>,
}

impl ExclusionList {
    pub fn new(negative_terms: &HashSet<String>, channels: &HashSet<String>) -> Self {
        let mut negative_terms: Vec<String> = negative_terms
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        negative_terms.sort();
        Self {
            negative_terms,
            channels: channels.iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self::new(&criteria.negative_terms, &criteria.excluded_channels)
    }

    pub fn check(&self, record: &VideoRecord) -> Result<(), RejectReason> {
        let title = record.title.to_lowercase();
        if let Some(term) = self.negative_terms.iter().find(|t| title.contains(t.as_str())) {
            return Err(RejectReason::NegativeKeyword(term.clone()));
        }
        let channel = record.channel.trim().to_lowercase();
        if self.channels.contains(&channel) {
            return Err(RejectReason::ExcludedChannel(channel));
        }
        Ok(())
    }

    /// Split records into kept and rejected, preserving order
    pub fn apply(&self, records: Vec<VideoRecord>) -> (Vec<VideoRecord>, Vec<(VideoRecord, RejectReason)>) {
        let mut kept = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in records {
            match self.check(&record) {
                Ok(()) => kept.push(record),
                Err(reason) => rejected.push((record, reason)),
            }
        }
        (kept, rejected)
    }
}

/// Drop later records whose `video_id` was already seen; returns the number removed
pub fn dedup_by_video_id(records: &mut Vec<VideoRecord>) -> usize {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    records.retain(|r| seen.insert(r.video_id.clone()));
    before - records.len()
}
