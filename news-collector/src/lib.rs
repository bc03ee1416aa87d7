pub mod analyzer;
pub mod archive;
pub mod broadcast;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod extractor;
pub mod fetcher;
pub mod images;
pub mod parser;
mod storage;
pub mod telemetry;
pub mod types;

pub use types::*;
pub use analyzer::RuleTextAnalyzer;
pub use archive::ArchiveWriter;
pub use broadcast::{load_listeners, Broadcaster, Listener};
pub use collector::{load_feeds, Collector, CycleReport, Services, SourceReport};
pub use config::{Args, CollectorConfig};
pub use dedup::{DedupStore, SeenSet};
pub use extractor::HtmlArticleExtractor;
pub use fetcher::{FeedFetch, FetchedFeed, Fetcher};
pub use images::ImageCache;
pub use parser::FeedRsParser;
pub use telemetry::WebhookReporter;
