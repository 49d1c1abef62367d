/// Result export: spreadsheet-friendly CSV, JSON, and a terminal table
use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::info;

use crate::video::VideoRecord;

/// UTF-8 byte-order mark so spreadsheet tools detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_HEADER: &[&str] = &[
    "video_id",
    "video_url",
    "title",
    "published_at",
    "channel",
    "channel_id",
    "views",
    "likes",
    "comments",
    "duration",
    "duration_seconds",
    "search_term",
    "subscribers",
    "thumbnail",
    "default_audio_language",
    "dias_desde_pub",
    "views_por_dia",
];

/// Two decimals with a decimal comma (`1234.5` -> `1234,50`)
pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}

fn format_timestamp(record: &VideoRecord) -> String {
    record.published_at.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

/// Serialize records as `;`-separated CSV with a BOM and decimal commas
pub fn export_csv(records: &[VideoRecord]) -> Result<Vec<u8>> {
    let mut buffer = UTF8_BOM.to_vec();
    {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(&mut buffer);

        wtr.write_record(CSV_HEADER)?;

        for record in records {
            let age_days = record.age_days.map(|d| d.to_string()).unwrap_or_default();
            let views_per_day = record.views_per_day.map(format_decimal).unwrap_or_default();
            wtr.write_record(&[
                record.video_id.clone(),
                record.video_url.clone(),
                record.title.clone(),
                format_timestamp(record),
                record.channel.clone(),
                record.channel_id.clone(),
                record.views.to_string(),
                record.likes.to_string(),
                record.comments.to_string(),
                record.duration.clone(),
                record.duration_seconds.to_string(),
                record.search_term.clone(),
                record.subscribers.to_string(),
                record.thumbnail.clone().unwrap_or_default(),
                record.default_audio_language.clone().unwrap_or_default(),
                age_days,
                views_per_day,
            ])?;
        }

        wtr.flush()?;
    }
    Ok(buffer)
}

pub async fn write_csv(records: &[VideoRecord], path: &Path) -> Result<()> {
    let bytes = export_csv(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    info!("💾 Wrote {} row(s) to {}", records.len(), path.display());
    Ok(())
}

/// Export records to pretty JSON
pub fn export_json(records: &[VideoRecord]) -> Result<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| anyhow!("Failed to serialize to JSON: {}", e))
}

pub async fn write_json(records: &[VideoRecord], path: &Path) -> Result<()> {
    let json = export_json(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    info!("💾 Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

/// Plain-text table for the terminal
pub fn render_table(records: &[VideoRecord]) -> String {
    let mut output = format!(
        "{:<48} {:<24} {:>12} {:>12} {:>10} {:<10} {}\n",
        "TITLE", "CHANNEL", "VIEWS", "VIEWS/DAY", "DURATION", "PUBLISHED", "LINK"
    );
    for record in records {
        output.push_str(&format!(
            "{:<48} {:<24} {:>12} {:>12} {:>10} {:<10} {}\n",
            truncate_chars(&record.title, 48),
            truncate_chars(&record.channel, 24),
            record.views,
            record
                .views_per_day
                .map(|v| format!("{:.2}", v))
                .unwrap_or_default(),
            record.duration,
            record.published_at.format("%Y-%m-%d"),
            record.video_url,
        ));
    }
    output
}
