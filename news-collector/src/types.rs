use std::path::PathBuf;
use std::time::Duration;

use url::{Host, Url};

pub use interfaces::defs::{
    Article, ArticleExtract, EntitySpan, Entry, ErrorReport, ExtractedArticle, FeedParse,
    FeedParseFailure, ParseSeverity, TextAnalyze,
};

/// Number of articles whose url/title hashes are remembered per source.
pub const KEEP: usize = 500;

/// Bodies with this many tokens or fewer are treated as failed extractions.
pub const MIN_BODY_TOKENS: usize = 150;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Ubuntu Chromium/53.0.2785.143 Chrome/53.0.2785.143 Safari/537.36";

/// Hex MD5 of `text`. Used for dedup, archive names, image names and
/// listener lock names, so every cooperating process must derive it the
/// same way.
pub fn identity_hash(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// A configured feed and the storage partition it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub domain: String,
}

impl Source {
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let domain = match parsed.host() {
            Some(Host::Domain(host)) => {
                let host = host.to_ascii_lowercase();
                psl::domain_str(&host)
                    .map(str::to_owned)
                    .unwrap_or(host)
            }
            Some(host) => host.to_string(),
            None => return Err(CollectorError::MissingHost(url.to_owned())),
        };

        Ok(Self {
            url: url.to_owned(),
            domain,
        })
    }

    pub fn url_hash(&self) -> String {
        identity_hash(&self.url)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub retry_statuses: Vec<u16>,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_seconds: 30,
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            retry_statuses: vec![500, 502, 503, 504],
            max_redirects: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed url has no host: {0}")]
    MissingHost(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CollectorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Failures that only cost the current source its cycle. Everything
    /// else (storage, serialization) has to reach the cycle boundary.
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Http(_)
                | Self::HttpStatus { .. }
                | Self::FeedParse(_)
                | Self::InvalidUrl(_)
                | Self::MissingHost(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
