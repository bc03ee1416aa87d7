// Shared stubs for collector integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use news_collector::{
    ArticleExtract, CollectorConfig, CollectorError, ErrorReport, ExtractedArticle, FeedFetch,
    FeedRsParser, FetchedFeed, Result, RuleTextAnalyzer, Services,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const FEED_URL: &str = "https://example.com/feed";

pub fn rss(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(link, title)| {
            if title.is_empty() {
                format!("<item><link>{}</link></item>", link)
            } else {
                format!("<item><title>{}</title><link>{}</link></item>", title, link)
            }
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><rss version="2.0"><channel><title>Example</title><link>https://example.com/</link><description>d</description>{}</channel></rss>"#,
        items
    )
}

/// A body comfortably above the short-article threshold.
pub fn long_body() -> String {
    let sentence = "Officials in Springfield said the new bridge opened to traffic on Monday after years of delays. ";
    sentence.repeat(20)
}

pub enum StubResponse {
    Feed(String),
    Served { body: String, content_type: String },
    Timeout,
}

#[derive(Default)]
pub struct StubFetcher {
    feeds: Mutex<HashMap<String, StubResponse>>,
    pub image_fetches: AtomicUsize,
}

impl StubFetcher {
    pub fn serve(&self, url: &str, response: StubResponse) {
        self.feeds.lock().unwrap().insert(url.to_string(), response);
    }
}

#[async_trait]
impl FeedFetch for StubFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<FetchedFeed> {
        match self.feeds.lock().unwrap().get(url) {
            Some(StubResponse::Feed(body)) => Ok(FetchedFeed {
                body: body.clone().into_bytes(),
                content_type: Some("application/rss+xml; charset=utf-8".to_string()),
            }),
            Some(StubResponse::Served { body, content_type }) => Ok(FetchedFeed {
                body: body.clone().into_bytes(),
                content_type: Some(content_type.clone()),
            }),
            Some(StubResponse::Timeout) => Err(CollectorError::Timeout {
                url: url.to_string(),
            }),
            None => Err(CollectorError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>> {
        self.image_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xff, 0xd8, 0xff])
    }
}

#[derive(Default)]
pub struct StubExtractor {
    pages: Mutex<HashMap<String, ExtractedArticle>>,
    pub calls: AtomicUsize,
}

impl StubExtractor {
    pub fn page(&self, url: &str, title: &str, text: &str) {
        self.insert(ExtractedArticle {
            url: url.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            html: format!("<article><p>{}</p></article>", text),
            ..ExtractedArticle::default()
        });
    }

    pub fn insert(&self, article: ExtractedArticle) {
        let url = article.url.clone();
        self.insert_for(&url, article);
    }

    /// Serve `article` when `requested` is extracted, whatever url it reports.
    pub fn insert_for(&self, requested: &str, article: ExtractedArticle) {
        self.pages.lock().unwrap().insert(requested.to_string(), article);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleExtract for StubExtractor {
    async fn extract(&self, url: &str) -> Option<ExtractedArticle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.lock().unwrap().get(url).cloned()
    }
}

/// Records reported errors and optionally cancels the collector.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<String>>,
    pub cancel_on_report: Option<CancellationToken>,
}

#[async_trait]
impl ErrorReport for RecordingReporter {
    async fn report(&self, error: &(dyn std::error::Error + Send + Sync)) {
        self.reports.lock().unwrap().push(error.to_string());
        if let Some(token) = &self.cancel_on_report {
            token.cancel();
        }
    }
}

pub struct Harness {
    pub fetcher: Arc<StubFetcher>,
    pub extractor: Arc<StubExtractor>,
    pub config: CollectorConfig,
}

impl Harness {
    pub fn new(root: &Path) -> Self {
        let mut config = CollectorConfig::new(root.join("data"));
        config.lock_dir = root.join("locks");
        config.listeners_path = root.join("listeners.txt");
        std::fs::create_dir_all(&config.lock_dir).unwrap();

        Self {
            fetcher: Arc::new(StubFetcher::default()),
            extractor: Arc::new(StubExtractor::default()),
            config,
        }
    }

    pub fn services(&self, reporter: Option<Arc<dyn ErrorReport>>) -> Services {
        Services {
            fetcher: self.fetcher.clone(),
            parser: Arc::new(FeedRsParser::new()),
            extractor: self.extractor.clone(),
            analyzer: Arc::new(RuleTextAnalyzer::new()),
            reporter,
        }
    }
}
