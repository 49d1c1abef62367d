/// Thumbnail download and zip archival
use anyhow::{anyhow, Result};
use reqwest::Client;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::video::VideoRecord;

/// Longest file stem kept from a title
const MAX_FILENAME_CHARS: usize = 100;

/// Strip characters that are invalid in file names and cap the length
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// File name used for a record's thumbnail
pub fn thumbnail_filename(record: &VideoRecord) -> String {
    format!("{}_{}.jpg", sanitize_filename(&record.title), record.video_id)
}

/// Outcome of an archival run
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSummary {
    pub archive_path: PathBuf,
    pub downloaded: usize,
    pub failed: usize,
}

/// Downloads thumbnails into a working directory and zips them
pub struct ThumbnailArchiver {
    client: Client,
    work_dir: PathBuf,
}

impl ThumbnailArchiver {
    pub fn new(work_dir: PathBuf, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self { client, work_dir })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("thumbnail request returned {}", response.status()));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    /// Fetch every thumbnail one after another; failures are logged and skipped
    pub async fn download_all(&self, records: &[VideoRecord]) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut files = Vec::with_capacity(records.len());
        for record in records {
            let url = record.thumbnail_or_default();
            let dest = self.work_dir.join(thumbnail_filename(record));
            debug!("Downloading thumbnail {} -> {}", url, dest.display());

            match self.download(&url, &dest).await {
                Ok(()) => files.push(dest),
                Err(e) => warn!("Thumbnail for {} failed: {}", record.video_id, e),
            }
        }
        Ok(files)
    }

    /// Download all thumbnails and pack them into one zip archive
    pub async fn archive(&self, records: &[VideoRecord], archive_path: &Path) -> Result<ArchiveSummary> {
        info!("📸 Downloading {} thumbnail(s)...", records.len());
        let files = self.download_all(records).await?;

        let (entries, dest) = (files.clone(), archive_path.to_path_buf());
        tokio::task::spawn_blocking(move || write_archive(&entries, &dest)).await??;
        info!("📦 Archived {} thumbnail(s) into {}", files.len(), archive_path.display());

        Ok(ArchiveSummary {
            archive_path: archive_path.to_path_buf(),
            downloaded: files.len(),
            failed: records.len() - files.len(),
        })
    }
}

/// Write files into a deflated zip, stored under their bare file names.
/// Blocking; async callers go through `spawn_blocking`.
pub fn write_archive(files: &[PathBuf], archive_path: &Path) -> Result<()> {
    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Invalid thumbnail path: {}", file.display()))?;
        zip.start_file(name, options)?;
        zip.write_all(&std::fs::read(file)?)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(video_id: &str, title: &str, thumbnail: Option<String>) -> VideoRecord {
        VideoRecord {
            video_id: video_id.to_string(),
            video_url: crate::video::watch_url(video_id),
            title: title.to_string(),
            published_at: Utc::now(),
            channel: "Channel".to_string(),
            channel_id: "cid".to_string(),
            views: 1,
            likes: 0,
            comments: 0,
            duration: "PT5M".to_string(),
            duration_seconds: 300,
            search_term: "x".to_string(),
            subscribers: 0,
            thumbnail,
            default_audio_language: None,
            age_days: None,
            views_per_day: None,
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(r#"What? A/B: "test" <1|2> \ *"#), "What AB test 12  ");
        assert_eq!(sanitize_filename(&"é".repeat(150)).chars().count(), 100);
    }

    #[test]
    fn test_thumbnail_filename() {
        let r = record("abc", "Sunset: part 1", None);
        assert_eq!(thumbnail_filename(&r), "Sunset part 1_abc.jpg");
    }

    #[tokio::test]
    async fn test_archive_skips_failed_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vi/ok/default.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vi/missing/default.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let archiver = ThumbnailArchiver::new(dir.path().join("thumbs"), 5).unwrap();
        let records = vec![
            record("ok", "Good one", Some(format!("{}/vi/ok/default.jpg", server.uri()))),
            record("missing", "Gone", Some(format!("{}/vi/missing/default.jpg", server.uri()))),
        ];

        let archive_path = dir.path().join("thumbnails.zip");
        let summary = archiver.archive(&records, &archive_path).await.unwrap();
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.failed, 1);

        let mut zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "Good one_ok.jpg");
        let mut content = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut content).unwrap();
        assert_eq!(content, b"jpeg-bytes");
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("empty.zip");
        write_archive(&[], &archive_path).unwrap();
        let zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 0);
    }
}
