use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item of a parsed feed, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub link: String,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: String,
}

/// A fully enriched article, as archived and broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub text: String,
    pub html: String,
    pub image: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub published: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntitySpan>,
    #[serde(default)]
    pub feed: String,
}

/// What an extractor pulls out of a page. The pipeline turns it into an
/// [`Article`] once the feed url and entities are known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedArticle {
    pub url: String,
    pub title: String,
    pub text: String,
    pub html: String,
    pub image: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
}

impl ExtractedArticle {
    pub fn into_article(self, feed: &str, entities: Vec<EntitySpan>) -> Article {
        Article {
            url: self.url,
            title: self.title,
            text: self.text,
            html: self.html,
            image: self.image,
            published: self.published,
            authors: self.authors,
            keywords: self.keywords,
            entities,
            feed: feed.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSeverity {
    /// Tolerated anomaly; whatever entries were recovered are still usable.
    Benign,
    Fatal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedParseFailure {
    pub severity: ParseSeverity,
    pub reason: String,
    pub recovered: Vec<Entry>,
}

impl FeedParseFailure {
    pub fn benign(reason: impl Into<String>, recovered: Vec<Entry>) -> Self {
        Self { severity: ParseSeverity::Benign, reason: reason.into(), recovered }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self { severity: ParseSeverity::Fatal, reason: reason.into(), recovered: Vec::new() }
    }
}

// Object style note:
// Implementations of these traits are built once at process start and
// handed to the collector, so tests can swap any of them for a stub.
// None of them should touch the collector's own storage.

pub trait FeedParse: Send + Sync {
    /// Parse raw feed bytes. `content_type` is the transport header, if any.
    fn parse(&self, body: &[u8], content_type: Option<&str>) -> Result<Vec<Entry>, FeedParseFailure>;
}

#[async_trait]
pub trait ArticleExtract: Send + Sync {
    /// `None` means the page could not be fetched or made sense of.
    async fn extract(&self, url: &str) -> Option<ExtractedArticle>;
}

/// The text-analysis service used while enriching articles.
pub trait TextAnalyze: Send + Sync {
    fn token_count(&self, text: &str) -> usize;
    fn entities(&self, text: &str) -> Vec<EntitySpan>;
}

#[async_trait]
pub trait ErrorReport: Send + Sync {
    async fn report(&self, error: &(dyn std::error::Error + Send + Sync));
}
