/// Viral Video Finder
///
/// Searches the YouTube catalog for popular videos matching keyword criteria,
/// filters them by views, channel size, age and duration, and exports the
/// matches together with their thumbnails.

pub mod config;
pub mod criteria;
pub mod catalog;
pub mod video;
pub mod filter;
pub mod pipeline;
pub mod export;
pub mod thumbnails;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder, RemoteServiceConfig};
pub use crate::criteria::{QueryMode, SearchCriteria, VideoDuration};
pub use crate::catalog::{CatalogError, CatalogService, ItemError, YouTubeClient};
pub use crate::video::VideoRecord;
pub use crate::filter::{ExclusionList, FilterPolicy, RejectReason};
pub use crate::pipeline::{ItemOutcome, PipelineError, RunStats, SearchOutcome, VideoSearchPipeline};
pub use crate::thumbnails::ThumbnailArchiver;
