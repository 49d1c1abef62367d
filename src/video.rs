use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::catalog::ItemError;

/// Fallback thumbnail served for every public video
pub fn default_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// A search match that survived filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub video_url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub channel: String,
    pub channel_id: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    /// ISO-8601 duration as reported by the service
    pub duration: String,
    pub duration_seconds: u64,
    /// Query that produced this match
    pub search_term: String,
    pub subscribers: u64,
    pub thumbnail: Option<String>,
    pub default_audio_language: Option<String>,
    /// Whole days since publication, filled in after filtering
    pub age_days: Option<i64>,
    /// Views divided by max(age_days, 1), filled in after filtering
    pub views_per_day: Option<f64>,
}

impl VideoRecord {
    /// Whole days between publication and `now`, never negative
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        age_in_days(self.published_at, now)
    }

    /// Fill in the derived popularity metrics
    pub fn with_derived_metrics(mut self, now: DateTime<Utc>) -> Self {
        let age = self.age_in_days(now);
        self.age_days = Some(age);
        self.views_per_day = Some(views_per_day(self.views, age));
        self
    }

    /// Thumbnail to download, falling back to the default image
    pub fn thumbnail_or_default(&self) -> String {
        self.thumbnail
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| default_thumbnail_url(&self.video_id))
    }
}

pub fn age_in_days(published_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - published_at).num_days().max(0)
}

/// Views per day rounded to two decimals; a same-day video counts as one day
pub fn views_per_day(views: u64, age_days: i64) -> f64 {
    let days = age_days.max(1) as f64;
    ((views as f64 / days) * 100.0).round() / 100.0
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$",
        )
        .expect("duration pattern is valid")
    })
}

/// Parse an ISO-8601 duration (`PT1H2M3S`, `P1DT5M`, `PT45.5S`) into whole seconds
pub fn parse_iso8601_duration(value: &str) -> Result<u64, ItemError> {
    let invalid = || ItemError::InvalidValue {
        field: "duration",
        value: value.to_string(),
    };

    let trimmed = value.trim();
    if trimmed == "P" || trimmed.ends_with('T') {
        return Err(invalid());
    }
    let caps = duration_regex().captures(trimmed).ok_or_else(invalid)?;

    let multipliers = [604_800u64, 86_400, 3_600, 60, 1];
    let mut total = 0u64;
    for (index, multiplier) in multipliers.iter().enumerate() {
        if let Some(m) = caps.get(index + 1) {
            let n: u64 = m.as_str().parse().map_err(|_| invalid())?;
            total = n
                .checked_mul(*multiplier)
                .and_then(|s| total.checked_add(s))
                .ok_or_else(invalid)?;
        }
    }
    Ok(total)
}

/// Parse a decimal count as sent by the service; absent counts are zero
pub fn parse_count(field: &'static str, value: Option<&str>) -> Result<u64, ItemError> {
    match value {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| ItemError::InvalidValue {
            field,
            value: raw.to_string(),
        }),
    }
}

pub fn parse_published_at(value: &str) -> Result<DateTime<Utc>, ItemError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ItemError::InvalidValue {
            field: "publishedAt",
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_iso8601_duration("PT3M").unwrap(), 180);
        assert_eq!(parse_iso8601_duration("PT2M59S").unwrap(), 179);
        assert_eq!(parse_iso8601_duration("PT1H2M3S").unwrap(), 3723);
        assert_eq!(parse_iso8601_duration("P1DT1S").unwrap(), 86_401);
        assert_eq!(parse_iso8601_duration("P1W").unwrap(), 604_800);
        assert_eq!(parse_iso8601_duration("PT45.9S").unwrap(), 45);
        assert_eq!(parse_iso8601_duration("P0D").unwrap(), 0);
    }

    #[test]
    fn test_reject_malformed_durations() {
        for bad in ["", "P", "PT", "3M", "PT3X", "1H", "PTM"] {
            assert!(parse_iso8601_duration(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_counts_and_timestamps() {
        assert_eq!(parse_count("viewCount", Some("1234")).unwrap(), 1234);
        assert_eq!(parse_count("likeCount", None).unwrap(), 0);
        assert!(parse_count("viewCount", Some("12k")).is_err());

        let published = parse_published_at("2024-05-01T08:30:00Z").unwrap();
        assert_eq!(published, Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap());
        assert!(parse_published_at("yesterday").is_err());
    }

    #[test]
    fn test_derived_metrics() {
        let now = Utc.with_ymd_and_hms(2024, 5, 11, 9, 0, 0).unwrap();
        assert_eq!(age_in_days(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(), now), 9);
        assert_eq!(age_in_days(now + chrono::Duration::hours(2), now), 0);

        assert_eq!(views_per_day(1000, 0), 1000.0);
        assert_eq!(views_per_day(1000, 3), 333.33);
        assert_eq!(views_per_day(0, 10), 0.0);
    }

    #[test]
    fn test_thumbnail_fallback() {
        let now = Utc::now();
        let mut record = VideoRecord {
            video_id: "abc".to_string(),
            video_url: watch_url("abc"),
            title: "t".to_string(),
            published_at: now,
            channel: "c".to_string(),
            channel_id: "cid".to_string(),
            views: 10,
            likes: 0,
            comments: 0,
            duration: "PT5M".to_string(),
            duration_seconds: 300,
            search_term: "x".to_string(),
            subscribers: 0,
            thumbnail: None,
            default_audio_language: None,
            age_days: None,
            views_per_day: None,
        };
        assert_eq!(
            record.thumbnail_or_default(),
            "https://img.youtube.com/vi/abc/maxresdefault.jpg"
        );
        record.thumbnail = Some("https://i.ytimg.com/vi/abc/default.jpg".to_string());
        assert_eq!(record.thumbnail_or_default(), "https://i.ytimg.com/vi/abc/default.jpg");

        let derived = record.with_derived_metrics(now);
        assert_eq!(derived.age_days, Some(0));
        assert_eq!(derived.views_per_day, Some(10.0));
        assert_eq!(derived.video_url, "https://www.youtube.com/watch?v=abc");
    }
}
