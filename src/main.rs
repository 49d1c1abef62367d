use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

use viral_video_finder::criteria::{bound_from_sentinel, load_term_list};
use viral_video_finder::export::{render_table, write_csv, write_json};
use viral_video_finder::{
    Config, QueryMode, SearchCriteria, ThumbnailArchiver, VideoDuration, VideoSearchPipeline,
};

fn cli() -> Command {
    Command::new("Viral Video Finder")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Search YouTube for popular videos and export the matches")
        .arg(
            Arg::new("term")
                .short('t')
                .long("term")
                .value_name("TERM")
                .help("Search term (repeatable); replaces the terms file")
                .action(ArgAction::Append)
        )
        .arg(
            Arg::new("terms-file")
                .long("terms-file")
                .value_name("FILE")
                .help("File with search terms, one per line")
        )
        .arg(
            Arg::new("negative-file")
                .long("negative-file")
                .value_name("FILE")
                .help("File with title keywords to exclude, one per line")
        )
        .arg(
            Arg::new("channels-file")
                .long("channels-file")
                .value_name("FILE")
                .help("File with channel names to exclude, one per line")
        )
        .arg(
            Arg::new("max-results")
                .short('n')
                .long("max-results")
                .value_name("NUM")
                .help("Number of videos to return (1-200)")
                .value_parser(clap::value_parser!(u32).range(1..=200))
        )
        .arg(
            Arg::new("min-views")
                .long("min-views")
                .value_name("NUM")
                .help("Minimum views (0 = no limit)")
                .value_parser(clap::value_parser!(u64))
        )
        .arg(
            Arg::new("min-subs")
                .long("min-subs")
                .value_name("NUM")
                .help("Minimum channel subscribers (0 = no limit)")
                .value_parser(clap::value_parser!(u64))
        )
        .arg(
            Arg::new("max-subs")
                .long("max-subs")
                .value_name("NUM")
                .help("Maximum channel subscribers (0 = no limit)")
                .value_parser(clap::value_parser!(u64))
        )
        .arg(
            Arg::new("max-age-days")
                .long("max-age-days")
                .value_name("DAYS")
                .help("Maximum video age in days (0 = no limit)")
                .value_parser(clap::value_parser!(u32))
        )
        .arg(
            Arg::new("region")
                .long("region")
                .value_name("CODE")
                .help("Region code such as BR, US, PT")
        )
        .arg(
            Arg::new("language")
                .long("language")
                .value_name("LANG")
                .help("Audio language code or name (pt, en, es, portuguese...)")
        )
        .arg(
            Arg::new("duration")
                .long("duration")
                .value_name("CLASS")
                .help("Duration class")
                .default_value("any")
                .value_parser(["any", "short", "medium", "long"])
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("MODE")
                .help("Query mode: one OR-combined query, or one query per term")
                .default_value("combined")
                .value_parser(["combined", "per-term"])
        )
        .arg(
            Arg::new("page-token")
                .long("page-token")
                .value_name("TOKEN")
                .help("Continuation token from a previous run")
        )
        .arg(
            Arg::new("csv")
                .short('o')
                .long("csv")
                .value_name("FILE")
                .help("CSV output path")
        )
        .arg(
            Arg::new("json")
                .long("json")
                .value_name("FILE")
                .help("Also write results as JSON")
        )
        .arg(
            Arg::new("thumbnails")
                .long("thumbnails")
                .help("Download thumbnails and zip them")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    // Initialize logging
    let filter = if matches.get_flag("verbose") {
        "viral_video_finder=debug,info"
    } else {
        "viral_video_finder=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::load()?,
    };
    config.validate()?;
    info!("{}", config.summary());

    let defaults = &config.search;
    let terms = match matches.get_many::<String>("term") {
        Some(values) => values.cloned().collect(),
        None => {
            let path = matches
                .get_one::<String>("terms-file")
                .map(PathBuf::from)
                .unwrap_or_else(|| defaults.terms_file.clone());
            load_term_list(&path).await?
        }
    };
    let negative_path = matches
        .get_one::<String>("negative-file")
        .map(PathBuf::from)
        .unwrap_or_else(|| defaults.negative_terms_file.clone());
    let channels_path = matches
        .get_one::<String>("channels-file")
        .map(PathBuf::from)
        .unwrap_or_else(|| defaults.excluded_channels_file.clone());

    let mut criteria = SearchCriteria::from_defaults(terms, defaults)
        .with_negative_terms(load_term_list(&negative_path).await?)
        .with_excluded_channels(load_term_list(&channels_path).await?)
        .with_region_code(matches.get_one::<String>("region").cloned())
        .with_relevance_language(matches.get_one::<String>("language").cloned())
        .with_page_token(matches.get_one::<String>("page-token").cloned());

    if let Some(max_results) = matches.get_one::<u32>("max-results") {
        criteria = criteria.with_max_results(*max_results);
    }
    if let Some(min_views) = matches.get_one::<u64>("min-views") {
        criteria = criteria.with_min_views(bound_from_sentinel(*min_views));
    }
    if let Some(min_subs) = matches.get_one::<u64>("min-subs") {
        criteria.min_subscribers = bound_from_sentinel(*min_subs);
    }
    if let Some(max_subs) = matches.get_one::<u64>("max-subs") {
        criteria.max_subscribers = bound_from_sentinel(*max_subs);
    }
    if let Some(days) = matches.get_one::<u32>("max-age-days") {
        criteria = criteria.with_max_age_days(bound_from_sentinel(*days));
    }
    if let Some(duration) = matches.get_one::<String>("duration") {
        criteria = criteria.with_video_duration(duration.parse::<VideoDuration>()?);
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        criteria = criteria.with_query_mode(mode.parse::<QueryMode>()?);
    }

    if criteria.terms.is_empty() {
        anyhow::bail!(
            "No search terms: pass --term or fill {}",
            defaults.terms_file.display()
        );
    }

    let pipeline = VideoSearchPipeline::from_config(&config.catalog)?;

    let start_time = std::time::Instant::now();
    let outcome = match pipeline.run(&criteria).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("❌ Search failed: {}", e);
            return Err(e.into());
        }
    };
    info!("⏱️ Search completed in {:.2}s", start_time.elapsed().as_secs_f64());

    if outcome.is_empty() {
        warn!("No matches under the current filters. Try relaxing views, subscriber or age bounds.");
        return Ok(());
    }

    println!("{}", render_table(&outcome.records));
    info!("🎉 {} video(s) found", outcome.records.len());
    if let Some(token) = &outcome.continuation {
        info!("➡️ Resume with --page-token {}", token);
    }

    let csv_path = matches
        .get_one::<String>("csv")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output.csv_path.clone());
    write_csv(&outcome.records, &csv_path).await?;

    let json_path = matches
        .get_one::<String>("json")
        .map(PathBuf::from)
        .or_else(|| config.output.json_path.clone());
    if let Some(path) = json_path {
        write_json(&outcome.records, &path).await?;
    }

    if matches.get_flag("thumbnails") {
        let archiver = ThumbnailArchiver::new(
            config.output.thumbnails_dir.clone(),
            config.catalog.request_timeout_seconds,
        )?;
        let summary = archiver
            .archive(&outcome.records, &config.output.archive_path)
            .await?;
        if summary.failed > 0 {
            warn!("{} thumbnail(s) could not be downloaded", summary.failed);
        }
    }

    Ok(())
}
