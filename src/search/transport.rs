// src/search/transport.rs
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::backoff::{Backoff, ExponentialBackoff};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const API_KEY_HEADER: &str = "x-rapidapi-key";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bad search request")]
    BadRequest,
    #[error("bad api key")]
    Unauthorized,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(StatusCode),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid api key header value")]
    InvalidApiKey,
}

impl TransportError {
    /// Fatal errors are never retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::BadRequest | TransportError::Unauthorized)
    }
}

/// Settings for building a [`Transport`]
#[derive(Clone)]
pub struct TransportConfig {
    pub api_key: String,
    pub max_retries: u32,
    pub timeout: Duration,
    pub backoff: Arc<dyn Backoff>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            backoff: Arc::new(ExponentialBackoff::default()),
            user_agent: format!("certsio-client-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP transport for the certs.io API with bounded retries
pub struct Transport {
    http_client: reqwest::Client,
    max_retries: u32,
    backoff: Arc<dyn Backoff>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&config.api_key).map_err(|_| TransportError::InvalidApiKey)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .default_headers(headers)
            .gzip(true)
            .build()?;

        Ok(Self {
            http_client,
            max_retries: config.max_retries.max(1),
            backoff: config.backoff,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// POST `body` to `url`, retrying transient failures.
    ///
    /// 400 and 401 stop immediately. 429, any other non-success status and
    /// network errors are retried up to `max_retries` attempts in total, with
    /// the backoff consulted between attempts. A redirect is returned as-is.
    /// When attempts run out the last error is returned.
    pub async fn post(&self, url: &str, body: Vec<u8>) -> Result<reqwest::Response, TransportError> {
        let mut attempt = 1;

        loop {
            let err = match self.post_once(url, body.clone()).await {
                Ok(response) => match classify_status(response.status()) {
                    None => return Ok(response),
                    Some(err) => err,
                },
                Err(e) => TransportError::Request(e),
            };

            if err.is_fatal() {
                debug!("POST {} failed fatally: {}", url, err);
                return Err(err);
            }

            if attempt >= self.max_retries {
                warn!("POST {} failed after {} attempts: {}", url, attempt, err);
                return Err(err);
            }

            let delay = self.backoff.next_delay(attempt);
            warn!(
                "POST {} failed (attempt {}/{}): {}. Retrying in {:?}",
                url, attempt, self.max_retries, err, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn post_once(&self, url: &str, body: Vec<u8>) -> Result<reqwest::Response, reqwest::Error> {
        self.http_client.post(url).body(body).send().await
    }
}

/// `None` means the response is terminal and handed back to the caller
fn classify_status(status: StatusCode) -> Option<TransportError> {
    match status {
        StatusCode::OK => None,
        s if s.is_redirection() => None,
        StatusCode::BAD_REQUEST => Some(TransportError::BadRequest),
        StatusCode::UNAUTHORIZED => Some(TransportError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Some(TransportError::RateLimited),
        other => Some(TransportError::UnexpectedStatus(other)),
    }
}
