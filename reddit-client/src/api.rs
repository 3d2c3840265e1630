use crate::metrics::{FetchMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{HostRateLimiter, RateLimitConfig};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use trendradar_core::config::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use trendradar_core::{AppConfig, CoreError, ErrorExt, FetchError, ParseError, SortMode};
use url::Url;

/// Largest page the listing endpoints will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    #[serde(default)]
    pub kind: Option<String>,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    #[serde(default)]
    pub kind: Option<String>,
    pub data: T,
}

/// The typed view of one listing item. Every field is optional here; the
/// normalizer decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPost {
    pub id: Option<String>,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub author: Option<String>,
    pub subreddit: Option<String>,
    pub permalink: Option<String>,
    pub url: Option<String>,
    pub created_utc: Option<f64>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub upvote_ratio: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_limit: RateLimitConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl From<&AppConfig> for ClientConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            rate_limit: RateLimitConfig::polite(config.request_interval()),
        }
    }
}

/// Client for the public, unauthenticated `/r/<name>/<sort>.json` listings.
#[derive(Debug)]
pub struct RedditJsonClient {
    http_client: Client,
    base_url: Url,
    rate_limiter: Arc<HostRateLimiter>,
    metrics: Arc<MetricsCollector>,
    user_agent: String,
}

impl RedditJsonClient {
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid base url {:?}: {}", config.base_url, e),
        })?;
        if base_url.host_str().is_none() {
            return Err(CoreError::InvalidInput {
                message: format!("base url {:?} has no host", config.base_url),
            });
        }

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http_client,
            base_url,
            rate_limiter: Arc::new(HostRateLimiter::new(config.rate_limit)),
            metrics: Arc::new(MetricsCollector::new()),
            user_agent: config.user_agent,
        })
    }

    pub fn listing_url(&self, source_name: &str, sort: SortMode) -> String {
        format!(
            "{}/r/{}/{}.json",
            self.base_url.as_str().trim_end_matches('/'),
            source_name,
            sort
        )
    }

    /// Fetch one page of `sort` listings for `source_name`.
    ///
    /// Items come back undecoded so one malformed item can be dropped on its
    /// own during normalization.
    pub async fn fetch(
        &self,
        source_name: &str,
        sort: SortMode,
        limit: u32,
    ) -> Result<Vec<Value>, CoreError> {
        validate_source_name(source_name)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let url = self.listing_url(source_name, sort);
        let host = self.base_url.host_str().unwrap_or_default();

        let permit = self.rate_limiter.acquire_permit(host).await;
        debug!(
            "Acquired rate limit permit for r/{} after {:?}",
            source_name, permit.queue_wait_time
        );

        info!("Fetching r/{} ({}, limit {})", source_name, sort, limit);
        let start_time = Instant::now();
        let result = self.request_listing(source_name, &url, limit).await;
        drop(permit);

        let (status_code, rate_limited, error_code, items) = match &result {
            Ok(posts) => (Some(200), false, None, posts.len()),
            Err(e) => (
                match e {
                    CoreError::Fetch(FetchError::Status { status_code, .. }) => Some(*status_code),
                    CoreError::Fetch(FetchError::RateLimited { .. }) => Some(429),
                    _ => None,
                },
                matches!(e, CoreError::Fetch(FetchError::RateLimited { .. })),
                Some(e.error_code()),
                0,
            ),
        };

        self.metrics
            .record_request(RequestMetrics {
                source_name: source_name.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                items,
                success: result.is_ok(),
                rate_limited,
                error_code,
            })
            .await;

        if let Ok(posts) = &result {
            info!("Got {} posts from r/{}", posts.len(), source_name);
        }
        result
    }

    async fn request_listing(
        &self,
        source_name: &str,
        url: &str,
        limit: u32,
    ) -> Result<Vec<Value>, CoreError> {
        let response = self
            .http_client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| {
                error!("Network error for r/{}: {}", source_name, e);
                request_error(source_name, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Request failed with status: {} for r/{}", status, source_name);

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                return Err(FetchError::RateLimited {
                    source_name: source_name.to_string(),
                    retry_after,
                }
                .into());
            }

            return Err(FetchError::Status {
                source_name: source_name.to_string(),
                status_code: status.as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| request_error(source_name, e))?;

        let listing = parse_listing(source_name, &body)?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .collect())
    }

    /// Metrics recorded since the previous call.
    pub async fn take_metrics(&self) -> FetchMetrics {
        self.metrics.take().await
    }
}

fn request_error(source_name: &str, e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        FetchError::Timeout {
            source_name: source_name.to_string(),
        }
        .into()
    } else {
        FetchError::Request {
            source_name: source_name.to_string(),
            cause: e,
        }
        .into()
    }
}

/// Decode a listing envelope, mapping any shape mismatch to a [`ParseError`].
/// Item payloads are left as raw JSON.
pub fn parse_listing(source_name: &str, body: &[u8]) -> Result<RedditListing<Value>, CoreError> {
    serde_json::from_slice(body).map_err(|e| {
        error!("Failed to parse listing for r/{}: {}", source_name, e);
        ParseError {
            source_name: source_name.to_string(),
            details: e.to_string(),
        }
        .into()
    })
}

/// Subreddit names are ASCII letters, digits and underscores.
pub fn validate_source_name(source_name: &str) -> Result<(), FetchError> {
    let valid = !source_name.is_empty()
        && source_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidSource {
            source_name: source_name.to_string(),
        })
    }
}
