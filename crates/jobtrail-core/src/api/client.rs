//! HTTP client for the applications REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{ApplicationRecord, ApplicationUpdate, NewApplication};

use super::{ApiError, ApplicationsApi};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Collection path under the base URL.
const APPLICATIONS_PATH: &str = "applications";

/// API client for the applications backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, APPLICATIONS_PATH)
    }

    fn item_url(&self, id: i64) -> String {
        format!("{}/{}/{}", self.base_url, APPLICATIONS_PATH, id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    /// `build` is called once per attempt.
    async fn send<F>(&self, method: Method, url: &str, build: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build(self.request(method.clone(), url))
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)).into()
        })
    }
}

#[async_trait]
impl ApplicationsApi for ApiClient {
    async fn get_all(&self) -> Result<Vec<ApplicationRecord>> {
        let url = self.collection_url();
        let response = self.send(Method::GET, &url, |b| b).await?;
        let records: Vec<ApplicationRecord> = Self::parse_json(response, &url).await?;
        debug!(count = records.len(), "Fetched applications");
        Ok(records)
    }

    async fn create(&self, application: &NewApplication) -> Result<ApplicationRecord> {
        let url = self.collection_url();
        let response = self
            .send(Method::POST, &url, |b| b.json(application))
            .await?;
        let record: ApplicationRecord = Self::parse_json(response, &url).await?;
        debug!(id = ?record.id, "Created application");
        Ok(record)
    }

    async fn update(&self, id: i64, update: &ApplicationUpdate) -> Result<ApplicationRecord> {
        let url = self.item_url(id);
        let response = self.send(Method::PATCH, &url, |b| b.json(update)).await?;
        let record: ApplicationRecord = Self::parse_json(response, &url).await?;
        debug!(id, "Updated application");
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let url = self.item_url(id);
        self.send(Method::DELETE, &url, |b| b).await?;
        debug!(id, "Deleted application");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
