//! Comparison REST client implementation.
//!
//! The [`ComparisonApiClient`] runs the one-shot lookups behind a fresh
//! search and the drill-down queries that populate search forms.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricepulse::api::ComparisonApiClient;
//! use pricepulse::websocket::Subscription;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ComparisonApiClient::new("http://localhost:5000/api")?;
//!
//!     let sub = Subscription::taxi("India", "Delhi", "India", "Punjab");
//!     let offers = client.compare(&sub).await?;
//!     println!("Found {} offers", offers.len());
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::types::{compare_params, OptionList, OptionsBody, OptionsQuery};
use crate::network::DEFAULT_API_URL;
use crate::shared::Offer;
use crate::websocket::subscriptions::Subscription;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retry configuration for the API client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = disabled)
    pub max_retries: u32,
    /// Base delay before first retry (ms)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Exponential backoff, jittered to 75-100% of the capped delay.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay_ms.saturating_mul(1 << attempt.min(10));
        let capped_delay = exp_delay.min(self.max_delay_ms);
        let jitter_range = capped_delay / 4;
        let jitter = rand::random::<u64>() % (jitter_range + 1);
        Duration::from_millis(capped_delay - jitter_range + jitter)
    }
}

/// Builder for configuring [`ComparisonApiClient`].
#[derive(Debug, Clone)]
pub struct ComparisonApiClientBuilder {
    base_url: String,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
    retry_config: RetryConfig,
}

impl ComparisonApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_headers: Vec::new(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Add a default header to all requests.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Enable retries on 5xx, 429 and network errors.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn build(self) -> ApiResult<ComparisonApiClient> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        for (name, value) in self.default_headers {
            let header_name =
                reqwest::header::HeaderName::try_from(name.as_str()).map_err(|e| {
                    ApiError::InvalidParameter(format!("Invalid header name '{}': {}", name, e))
                })?;
            let header_value = reqwest::header::HeaderValue::from_str(&value).map_err(|e| {
                ApiError::InvalidParameter(format!("Invalid header value for '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let http_client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .build()?;

        Ok(ComparisonApiClient {
            http_client,
            base_url: self.base_url,
            retry_config: self.retry_config,
        })
    }
}

/// Comparison REST client.
#[derive(Debug, Clone)]
pub struct ComparisonApiClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl ComparisonApiClient {
    /// Create a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        ComparisonApiClientBuilder::new(base_url).build()
    }

    /// Client for the default local comparison server.
    pub fn new_default() -> ApiResult<Self> {
        Self::new(DEFAULT_API_URL)
    }

    pub fn builder(base_url: impl Into<String>) -> ComparisonApiClientBuilder {
        ComparisonApiClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up current offers for the place described by `subscription`.
    ///
    /// An empty list is a valid answer: nothing matched.
    pub async fn compare(&self, subscription: &Subscription) -> ApiResult<Vec<Offer>> {
        let url = self.compare_url(subscription);
        let params = compare_params(subscription);
        for (name, value) in &params {
            if value.trim().is_empty() {
                return Err(ApiError::InvalidParameter(format!("{} cannot be empty", name)));
            }
        }
        let offers: Option<Vec<Offer>> = self.get(&url, &params).await?;
        let offers = offers.unwrap_or_default();
        tracing::debug!(
            category = %subscription.category(),
            count = offers.len(),
            "Comparison lookup complete"
        );
        Ok(offers)
    }

    /// Fetch one level of search form options.
    pub async fn get_options(&self, query: &OptionsQuery) -> ApiResult<OptionList> {
        let url = format!("{}/options", self.base_url);
        let body: OptionsBody = self.get(&url, &query.to_params()).await?;
        OptionList::from_body(body)
            .ok_or_else(|| ApiError::Deserialize("Empty options response".to_string()))
    }

    fn compare_url(&self, subscription: &Subscription) -> String {
        format!("{}/compare/{}", self.base_url, subscription.category())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Execute a GET request with optional retry logic.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        self.execute_with_retry(|| self.http_client.get(url).query(query).send())
            .await
    }

    /// Execute a request with retry logic.
    async fn execute_with_retry<T, F, Fut>(&self, request_fn: F) -> ApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: serde::de::DeserializeOwned,
    {
        let mut attempt = 0;

        loop {
            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            ApiError::Deserialize(format!("Failed to deserialize response: {}", e))
                        });
                    }

                    let error = Self::parse_error_response(response).await;

                    if attempt < self.retry_config.max_retries
                        && Self::is_retryable_status(status)
                    {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max_retries = self.retry_config.max_retries,
                            delay_ms = delay.as_millis(),
                            status = %status,
                            "Retrying request after error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    let is_retryable = e.is_connect() || e.is_timeout() || e.is_request();

                    if attempt < self.retry_config.max_retries && is_retryable {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max_retries = self.retry_config.max_retries,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "Retrying request after network error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(ApiError::Http(e));
                }
            }
        }
    }

    async fn parse_error_response(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let error_text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to read error response body: {}", e);
                return Self::map_status_error(
                    status,
                    ErrorResponse::from_text(format!("HTTP {} (body unreadable: {})", status, e)),
                );
            }
        };

        let error_response = serde_json::from_str::<ErrorResponse>(&error_text)
            .unwrap_or_else(|_| ErrorResponse::from_text(error_text));

        Self::map_status_error(status, error_response)
    }

    fn map_status_error(status: StatusCode, response: ErrorResponse) -> ApiError {
        let message = response.get_message();
        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(message),
            _ if status.is_server_error() => ApiError::ServerError(message),
            _ => ApiError::UnexpectedStatus(status.as_u16(), message),
        }
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ComparisonApiClient::new("http://localhost:5000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }

    #[test]
    fn test_client_builder() {
        let client = ComparisonApiClient::builder("http://localhost:5000/api")
            .timeout_secs(5)
            .header("X-Client", "pricepulse")
            .with_retry(RetryConfig::new(3))
            .build()
            .unwrap();
        assert_eq!(client.retry_config.max_retries, 3);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let result = ComparisonApiClient::builder("http://localhost:5000/api")
            .header("bad header", "x")
            .build();
        assert!(matches!(result, Err(ApiError::InvalidParameter(_))));
    }

    #[test]
    fn test_compare_url_per_category() {
        let client = ComparisonApiClient::new_default().unwrap();
        assert_eq!(
            client.compare_url(&Subscription::taxi("India", "Delhi", "India", "Punjab")),
            "http://localhost:5000/api/compare/taxi"
        );
        assert_eq!(
            client.compare_url(&Subscription::quick_commerce(
                "India",
                "Maharashtra",
                "Mumbai",
                "Bandra West",
                None
            )),
            "http://localhost:5000/api/compare/quickcommerce"
        );
    }

    #[tokio::test]
    async fn test_empty_parameter_rejected() {
        let client = ComparisonApiClient::new_default().unwrap();
        let result = client
            .compare(&Subscription::restaurant("India", "Karnataka", " ", "Meghana Foods"))
            .await;
        assert!(matches!(
            result,
            Err(ApiError::InvalidParameter(msg)) if msg == "city cannot be empty"
        ));
    }

    #[test]
    fn test_map_status_error() {
        let body = ErrorResponse::from_text("no such route");
        assert!(matches!(
            ComparisonApiClient::map_status_error(StatusCode::NOT_FOUND, body.clone()),
            ApiError::NotFound(m) if m == "no such route"
        ));
        assert!(matches!(
            ComparisonApiClient::map_status_error(StatusCode::TOO_MANY_REQUESTS, body.clone()),
            ApiError::RateLimited(_)
        ));
        assert!(matches!(
            ComparisonApiClient::map_status_error(StatusCode::BAD_GATEWAY, body.clone()),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ComparisonApiClient::map_status_error(StatusCode::IM_A_TEAPOT, body),
            ApiError::UnexpectedStatus(418, _)
        ));
    }

    #[test]
    fn test_retry_status_classification() {
        assert!(ComparisonApiClient::is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(ComparisonApiClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!ComparisonApiClient::is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_retry_delay_calculation() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };

        let delay0 = config.delay_for_attempt(0);
        assert!(delay0.as_millis() >= 75 && delay0.as_millis() <= 100);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1.as_millis() >= 150 && delay1.as_millis() <= 200);

        // Capped at max_delay
        let delay10 = config.delay_for_attempt(10);
        assert!(delay10.as_millis() >= 750 && delay10.as_millis() <= 1000);
    }
}
