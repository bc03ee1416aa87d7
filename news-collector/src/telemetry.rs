use crate::types::ErrorReport;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Forwards collector errors to an HTTP endpoint as JSON.
#[derive(Clone)]
pub struct WebhookReporter {
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl WebhookReporter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Serialize)]
struct ErrorPayload {
    error: String,
    chain: Vec<String>,
    host: String,
    at: String,
}

impl ErrorPayload {
    fn from_error(error: &(dyn std::error::Error + Send + Sync)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            error: error.to_string(),
            chain,
            host: std::env::var("HOSTNAME").unwrap_or_default(),
            at: Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl ErrorReport for WebhookReporter {
    async fn report(&self, error: &(dyn std::error::Error + Send + Sync)) {
        let payload = ErrorPayload::from_error(error);
        let sent = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        // delivery failures are logged only
        match sent.and_then(|rsp| rsp.error_for_status()) {
            Ok(_) => debug!("Reported error to {}", self.endpoint),
            Err(e) => warn!("Failed to report error to {}: {}", self.endpoint, e),
        }
    }
}
