use crate::types::{CollectorError, FetchConfig, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw feed payload plus the transport content type.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait FeedFetch: Send + Sync {
    /// Fetch a feed document, retrying transient server failures.
    async fn fetch_feed(&self, url: &str) -> Result<FetchedFeed>;

    /// Single best-effort download.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.config.initial_backoff,
            initial_interval: self.config.initial_backoff,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.config.initial_backoff * 64,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    fn classify(url: &str, err: reqwest::Error) -> CollectorError {
        if err.is_timeout() {
            CollectorError::Timeout {
                url: url.to_string(),
            }
        } else {
            CollectorError::Http(err)
        }
    }
}

#[async_trait]
impl FeedFetch for Fetcher {
    async fn fetch_feed(&self, url: &str) -> Result<FetchedFeed> {
        debug!("Fetching feed: {}", url);

        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            let retry_reason = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let content_type = response
                            .headers()
                            .get(CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string());
                        let body = response
                            .bytes()
                            .await
                            .map_err(|e| Self::classify(url, e))?;
                        info!("Fetched feed: {} ({} bytes)", url, body.len());
                        return Ok(FetchedFeed {
                            body: body.to_vec(),
                            content_type,
                        });
                    }

                    let error = CollectorError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    if !self.config.retry_statuses.contains(&status.as_u16()) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_connect() => Self::classify(url, e),
                Err(e) => return Err(Self::classify(url, e)),
            };

            if attempt >= self.config.max_retries {
                warn!(
                    "Giving up on {} after {} attempts: {}",
                    url,
                    attempt + 1,
                    retry_reason
                );
                return Err(retry_reason);
            }
            attempt += 1;

            match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        "Attempt {} failed for {} ({}), retrying in {:?}",
                        attempt, url, retry_reason, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(retry_reason),
            }
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| Self::classify(url, e))?;
        Ok(bytes.to_vec())
    }
}
