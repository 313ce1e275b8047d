//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with a descriptive user agent string
//! - GET requests with a per-attempt timeout
//! - Bounded retry with a fixed delay between attempts
//! - Error classification

use crate::config::{FetchConfig, UserAgentConfig};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Retry parameters for a single page
///
/// The policy holds no counters; every `fetch` call starts from attempt one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first request
    pub max_attempts: u32,

    /// Pause between two consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects; relative links resolve against it
    pub url: Url,

    /// Decoded page body
    pub body: String,
}

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("{0}")]
    Request(String),
}

/// A page that could not be fetched within the retry budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch {url} after {attempts} attempts: {kind}")]
pub struct FetchFailure {
    pub url: String,
    pub attempts: u32,
    /// Error of the last attempt
    pub kind: FetchErrorKind,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Timeout applied to every request attempt
///
/// # Example
///
/// ```no_run
/// use division_crawler::config::UserAgentConfig;
/// use division_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "DivisionCrawler".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with bounded retry
///
/// Cloning is cheap; the underlying client shares its connection pool.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl PageFetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher from the user agent and fetch sections of the config
    pub fn from_config(
        user_agent: &UserAgentConfig,
        fetch: &FetchConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, Duration::from_secs(fetch.timeout_secs))?;
        Ok(Self::new(client, RetryPolicy::from_config(fetch)))
    }

    /// Fetches a page, retrying every kind of failure
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout | Retry after `delay` |
    /// | Connection error | Retry after `delay` |
    /// | Non-2xx status | Retry after `delay` |
    /// | Body decode error | Retry after `delay` |
    ///
    /// After `max_attempts` failed attempts the last error is returned as a
    /// `FetchFailure`; the caller decides what a missing page means.
    pub async fn fetch(&self, url: &Url) -> Result<Page, FetchFailure> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.fetch_once(url).await {
                Ok(page) => {
                    tracing::debug!(url = %url, attempt, "fetched page");
                    return Ok(page);
                }
                Err(kind) => {
                    if attempt >= self.policy.max_attempts {
                        tracing::warn!(
                            url = %url,
                            attempt,
                            error = %kind,
                            "giving up on page"
                        );
                        return Err(FetchFailure {
                            url: url.to_string(),
                            attempts: attempt,
                            kind,
                        });
                    }

                    tracing::info!(
                        url = %url,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %kind,
                        "fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Page, FetchErrorKind> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchErrorKind::Status(status.as_u16()));
        }

        let final_url = response.url().clone();

        // Decodes with the charset from Content-Type, UTF-8 otherwise
        let body = response
            .text()
            .await
            .map_err(|e| FetchErrorKind::Body(e.to_string()))?;

        Ok(Page {
            url: final_url,
            body,
        })
    }
}

fn classify_error(e: reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        FetchErrorKind::Timeout
    } else if e.is_connect() {
        FetchErrorKind::Connect(e.to_string())
    } else {
        FetchErrorKind::Request(e.to_string())
    }
}
