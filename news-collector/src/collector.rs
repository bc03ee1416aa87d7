use crate::archive::ArchiveWriter;
use crate::broadcast::{load_listeners, Broadcaster};
use crate::config::CollectorConfig;
use crate::dedup::DedupStore;
use crate::fetcher::FeedFetch;
use crate::images::ImageCache;
use crate::types::{
    Article, ArticleExtract, CollectorError, Entry, ErrorReport, FeedParse, ParseSeverity, Result,
    Source, TextAnalyze,
};
use chrono::{Local, NaiveDate};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The collaborators a collector works with, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub fetcher: Arc<dyn FeedFetch>,
    pub parser: Arc<dyn FeedParse>,
    pub extractor: Arc<dyn ArticleExtract>,
    pub analyzer: Arc<dyn TextAnalyze>,
    pub reporter: Option<Arc<dyn ErrorReport>>,
}

/// What happened to one source during one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub feed: String,
    pub entries: usize,
    pub already_seen: usize,
    pub extraction_misses: usize,
    pub too_short: usize,
    pub accepted: usize,
    pub deliveries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    pub failed: Vec<String>,
}

impl CycleReport {
    pub fn accepted(&self) -> usize {
        self.sources.iter().map(|s| s.accepted).sum()
    }
}

/// Reads the feed list: one url per line, blank lines and `#` comments skipped.
pub fn load_feeds(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| CollectorError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

pub struct Collector {
    services: Services,
    dedup: DedupStore,
    archive: ArchiveWriter,
    broadcaster: Broadcaster,
    images: ImageCache,
    config: CollectorConfig,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(config: CollectorConfig, services: Services, cancel: CancellationToken) -> Self {
        Self {
            dedup: DedupStore::with_keep(&config.data_dir, config.keep),
            archive: ArchiveWriter::new(&config.data_dir),
            broadcaster: Broadcaster::new(&config.lock_dir).with_cancellation(cancel.clone()),
            images: ImageCache::new(&config.data_dir),
            services,
            config,
            cancel,
        }
    }

    pub fn archive(&self) -> &ArchiveWriter {
        &self.archive
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Poll `feeds_path` every interval until cancelled.
    ///
    /// Errors that escape a cycle go to the reporter when there is one and
    /// the loop carries on; without a reporter they end the run.
    pub async fn run(&self, feeds_path: &Path) -> Result<()> {
        loop {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => break,
                outcome = self.cycle_from(feeds_path) => outcome,
            };

            if let Err(e) = outcome {
                error!("Collection cycle failed: {}", e);
                match &self.services.reporter {
                    Some(reporter) => reporter.report(&e).await,
                    None => return Err(e),
                }
            }

            info!("Next collection in {:?}", self.config.interval);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!("Collector stopped");
        Ok(())
    }

    /// One cycle over the current contents of `feeds_path`, abandoned if
    /// cancelled. A listener write in progress always completes first.
    pub async fn run_once(&self, feeds_path: &Path) -> Result<Option<CycleReport>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(None),
            outcome = self.cycle_from(feeds_path) => outcome.map(Some),
        }
    }

    async fn cycle_from(&self, feeds_path: &Path) -> Result<CycleReport> {
        let feeds = load_feeds(feeds_path)?;
        self.run_cycle(&feeds).await
    }

    /// Collect every feed in order. Network and parse failures only cost
    /// their own source; storage failures abort the cycle.
    pub async fn run_cycle(&self, feeds: &[String]) -> Result<CycleReport> {
        info!("Collecting: {}", Local::now().to_rfc3339());
        let mut report = CycleReport::default();

        for feed in feeds {
            let outcome = match Source::parse(feed) {
                Ok(source) => self.collect_source(&source).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(source_report) => {
                    info!(
                        feed = %feed,
                        entries = source_report.entries,
                        accepted = source_report.accepted,
                        "Updated {}",
                        feed
                    );
                    report.sources.push(source_report);
                }
                Err(e) if e.is_source_local() => {
                    error!(feed = %feed, "Skipping {} this cycle: {}", feed, e);
                    if let Some(reporter) = &self.services.reporter {
                        reporter.report(&e).await;
                    }
                    report.failed.push(feed.clone());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            sources = report.sources.len(),
            failed = report.failed.len(),
            accepted = report.accepted(),
            "Collection cycle finished"
        );
        Ok(report)
    }

    pub async fn collect_source(&self, source: &Source) -> Result<SourceReport> {
        self.collect_source_on(source, Local::now().date_naive()).await
    }

    /// Collect one source, archiving under `day`.
    pub async fn collect_source_on(&self, source: &Source, day: NaiveDate) -> Result<SourceReport> {
        info!(feed = %source.url, domain = %source.domain, "Updating: {}", source.url);
        let mut report = SourceReport {
            feed: source.url.clone(),
            ..SourceReport::default()
        };

        let mut seen = self.dedup.load(source)?;
        let entries = self.fetch_entries(source).await?;
        report.entries = entries.len();

        let mut accepted: Vec<(Entry, Article)> = Vec::new();
        for entry in entries {
            if seen.contains(&entry.link, &entry.title) {
                report.already_seen += 1;
                continue;
            }

            // Misses and short bodies stay unseen, so they are retried next cycle.
            match self.enrich(source, &entry).await {
                Enriched::Accepted(article) => accepted.push((entry, article)),
                Enriched::Missing => report.extraction_misses += 1,
                Enriched::TooShort => report.too_short += 1,
            }
        }
        report.accepted = accepted.len();

        // The entry pair is kept too, so a canonicalised url or edited
        // title does not let the same entry through next cycle.
        for (entry, article) in &accepted {
            seen.record(&article.url, &article.title);
            seen.record(&entry.link, &entry.title);
        }
        let articles: Vec<Article> = accepted.into_iter().map(|(_, article)| article).collect();

        self.archive.append(source, day, &articles)?;
        self.dedup.save(source, &mut seen)?;

        if !articles.is_empty() {
            let listeners = load_listeners(&self.config.listeners_path);
            for article in &articles {
                if let Some(image) = &article.image {
                    self.images.store(self.services.fetcher.as_ref(), image).await;
                }
                report.deliveries += self.broadcaster.broadcast(article, &listeners)?;
            }
        }

        Ok(report)
    }

    /// Fetch and parse a feed. A fetch that fails at the network level
    /// yields no entries; an unparseable document is an error.
    async fn fetch_entries(&self, source: &Source) -> Result<Vec<Entry>> {
        let fetched = match self.services.fetcher.fetch_feed(&source.url).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_source_local() => {
                error!(feed = %source.url, "Failed to fetch {}: {}", source.url, e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        match self
            .services
            .parser
            .parse(&fetched.body, fetched.content_type.as_deref())
        {
            Ok(entries) => Ok(entries),
            Err(failure) if failure.severity == ParseSeverity::Benign => {
                warn!(feed = %source.url, "Tolerating feed anomaly: {}", failure.reason);
                Ok(failure.recovered)
            }
            Err(failure) => {
                error!(
                    feed = %source.url,
                    body = %String::from_utf8_lossy(&fetched.body[..fetched.body.len().min(512)]),
                    "Parsing error"
                );
                Err(CollectorError::FeedParse(format!("{}: {}", source.url, failure.reason)))
            }
        }
    }

    async fn enrich(&self, source: &Source, entry: &Entry) -> Enriched {
        let Some(mut extracted) = self.services.extractor.extract(&entry.link).await else {
            return Enriched::Missing;
        };

        // 404 pages and the like come back as a handful of tokens
        if self.services.analyzer.token_count(&extracted.text) <= self.config.min_tokens {
            return Enriched::TooShort;
        }

        // feed timestamps take precedence over page metadata
        if entry.published.is_some() {
            extracted.published = entry.published;
        }

        let entities = self.services.analyzer.entities(&extracted.text);
        Enriched::Accepted(extracted.into_article(&source.url, entities))
    }
}

enum Enriched {
    Accepted(Article),
    Missing,
    TooShort,
}
