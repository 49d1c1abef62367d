use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Remote service caps search pages at this many items.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Configuration for the video finder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote catalog service settings
    pub catalog: RemoteServiceConfig,

    /// Default search parameters
    pub search: SearchDefaults,

    /// Output and export settings
    pub output: OutputConfig,
}

/// Credentials and endpoints for the remote catalog service.
///
/// Owned by whoever assembles the pipeline and handed to the client
/// explicitly; nothing reads the key from global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    /// API key sent with every request
    pub api_key: Option<String>,

    /// Paginated search endpoint
    pub search_endpoint: String,

    /// Video statistics lookup endpoint
    pub videos_endpoint: String,

    /// Channel statistics lookup endpoint
    pub channels_endpoint: String,

    /// Timeout for a single request (seconds)
    pub request_timeout_seconds: u64,

    /// Pause between consecutive remote calls (milliseconds)
    pub request_delay_ms: u64,

    /// Items requested per search page
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    /// Maximum number of videos to return (1-200)
    pub max_results: u32,

    /// Minimum view count (0 = no limit)
    pub min_views: u64,

    /// Minimum channel subscribers (0 = no limit)
    pub min_subscribers: u64,

    /// Maximum channel subscribers (0 = no limit)
    pub max_subscribers: u64,

    /// Maximum video age in days (0 = no limit)
    pub max_age_days: u32,

    /// File with search terms, one per line
    pub terms_file: PathBuf,

    /// File with title keywords to exclude, one per line
    pub negative_terms_file: PathBuf,

    /// File with channel names to exclude, one per line
    pub excluded_channels_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// CSV export path
    pub csv_path: PathBuf,

    /// Optional JSON export path
    pub json_path: Option<PathBuf>,

    /// Working directory for downloaded thumbnails
    pub thumbnails_dir: PathBuf,

    /// Zip archive with all downloaded thumbnails
    pub archive_path: PathBuf,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            search_endpoint: "https://www.googleapis.com/youtube/v3/search".to_string(),
            videos_endpoint: "https://www.googleapis.com/youtube/v3/videos".to_string(),
            channels_endpoint: "https://www.googleapis.com/youtube/v3/channels".to_string(),
            request_timeout_seconds: 30,
            request_delay_ms: 50,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl RemoteServiceConfig {
    /// Point all three endpoints at a different base URL (test servers, proxies)
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.search_endpoint = format!("{}/search", base);
        self.videos_endpoint = format!("{}/videos", base);
        self.channels_endpoint = format!("{}/channels", base);
        self
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Page size actually sent, never above the service maximum
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            max_results: 50,
            min_views: 10_000,
            min_subscribers: 0,
            max_subscribers: 10_000_000,
            max_age_days: 180,
            terms_file: PathBuf::from("termos_busca.txt"),
            negative_terms_file: PathBuf::from("termos_excluir.txt"),
            excluded_channels_file: PathBuf::from("canais_excluir.txt"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("videos.csv"),
            json_path: None,
            thumbnails_dir: PathBuf::from("thumbs"),
            archive_path: PathBuf::from("thumbnails.zip"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: RemoteServiceConfig::default(),
            search: SearchDefaults::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first readable config file, then apply
    /// environment overrides on top.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "viral-video-finder.toml",
            "config/viral-video-finder.toml",
            "/etc/viral-video-finder/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config.with_env_overrides())
    }

    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        let api_key = std::env::var("VIDEO_FINDER_API_KEY")
            .or_else(|_| std::env::var("YOUTUBE_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Some(key) = api_key {
            self.catalog.api_key = Some(key);
        }

        if let Ok(delay) = std::env::var("VIDEO_FINDER_REQUEST_DELAY_MS") {
            match delay.parse() {
                Ok(ms) => self.catalog.request_delay_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid VIDEO_FINDER_REQUEST_DELAY_MS: {}", delay),
            }
        }

        if let Ok(output_dir) = std::env::var("VIDEO_FINDER_OUTPUT_DIR") {
            let dir = PathBuf::from(output_dir);
            self.output.csv_path = dir.join("videos.csv");
            self.output.thumbnails_dir = dir.join("thumbs");
            self.output.archive_path = dir.join("thumbnails.zip");
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.catalog.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(anyhow!(
                    "API key required: set catalog.api_key or VIDEO_FINDER_API_KEY"
                ))
            }
        }

        for endpoint in [
            &self.catalog.search_endpoint,
            &self.catalog.videos_endpoint,
            &self.catalog.channels_endpoint,
        ] {
            Url::parse(endpoint).map_err(|e| anyhow!("Invalid endpoint {}: {}", endpoint, e))?;
        }

        if self.catalog.page_size == 0 {
            return Err(anyhow!("page_size must be greater than 0"));
        }

        if !(1..=200).contains(&self.search.max_results) {
            return Err(anyhow!("max_results must be between 1 and 200"));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Finder Configuration:\n\
            - Search Endpoint: {}\n\
            - API Key: {}\n\
            - Page Size: {}\n\
            - Request Delay: {}ms\n\
            - Max Results: {}\n\
            - CSV Output: {}",
            self.catalog.search_endpoint,
            if self.catalog.api_key.is_some() { "set" } else { "missing" },
            self.catalog.effective_page_size(),
            self.catalog.request_delay_ms,
            self.search.max_results,
            self.output.csv_path.display(),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.catalog.api_key = Some(api_key);
        self
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.config.catalog = self.config.catalog.with_base_url(base);
        self
    }

    pub fn with_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.catalog.request_delay_ms = delay_ms;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.config.search.max_results = max_results;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.csv_path = dir.join("videos.csv");
        self.config.output.thumbnails_dir = dir.join("thumbs");
        self.config.output.archive_path = dir.join("thumbnails.zip");
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
