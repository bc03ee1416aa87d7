use crate::types::{FetchConfig, KEEP, MIN_BODY_TOKENS};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "news-collector",
    version,
    about = "Polls news feeds, archives new articles and fans them out to listener logs"
)]
pub struct Args {
    /// Feed urls, one per line
    #[arg(long, env = "COLLECTOR_FEEDS", default_value = "feeds.txt")]
    pub feeds: PathBuf,

    /// Listener log paths, one per line
    #[arg(long, env = "COLLECTOR_LISTENERS", default_value = "listeners.txt")]
    pub listeners: PathBuf,

    #[arg(long, env = "COLLECTOR_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Where listener lock files live; every writer sharing a listener must agree on it
    #[arg(long, env = "COLLECTOR_LOCK_DIR")]
    pub lock_dir: Option<PathBuf>,

    #[arg(long, env = "COLLECTOR_INTERVAL_SECS", default_value_t = 3600)]
    pub interval_secs: u64,

    /// Articles remembered per source for dedup
    #[arg(long, env = "COLLECTOR_KEEP", default_value_t = KEEP)]
    pub keep: usize,

    #[arg(long, env = "COLLECTOR_MIN_TOKENS", default_value_t = MIN_BODY_TOKENS)]
    pub min_tokens: usize,

    #[arg(long, env = "COLLECTOR_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Endpoint that receives errors as JSON
    #[arg(long, env = "COLLECTOR_REPORT_URL")]
    pub report_url: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl Args {
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            data_dir: self.data_dir.clone(),
            lock_dir: self.lock_dir.clone().unwrap_or_else(std::env::temp_dir),
            listeners_path: self.listeners.clone(),
            keep: self.keep,
            min_tokens: self.min_tokens,
            interval: Duration::from_secs(self.interval_secs),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout_seconds: self.timeout_secs,
            ..FetchConfig::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub data_dir: PathBuf,
    pub lock_dir: PathBuf,
    pub listeners_path: PathBuf,
    pub keep: usize,
    pub min_tokens: usize,
    pub interval: Duration,
}

impl CollectorConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_dir: std::env::temp_dir(),
            listeners_path: PathBuf::from("listeners.txt"),
            keep: KEEP,
            min_tokens: MIN_BODY_TOKENS,
            interval: Duration::from_secs(60 * 60),
        }
    }
}
