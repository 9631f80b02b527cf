//! REST client for the comparison service.
//!
//! A fresh search starts with a one-shot lookup here; the live channel then
//! keeps the result set current.
//!
//! # Client Configuration
//!
//! ```rust,ignore
//! use pricepulse::api::{ComparisonApiClient, RetryConfig};
//! use std::time::Duration;
//!
//! let client = ComparisonApiClient::builder("http://localhost:5000/api")
//!     .timeout(Duration::from_secs(10))
//!     .with_retry(RetryConfig::new(3))
//!     .build()?;
//! ```
//!
//! # Error Handling
//!
//! ```rust,ignore
//! match client.compare(&subscription).await {
//!     Ok(offers) if offers.is_empty() => println!("No offers for this search"),
//!     Ok(offers) => println!("{} offers", offers.len()),
//!     Err(ApiError::BadRequest(msg)) => println!("Invalid request: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{ComparisonApiClient, ComparisonApiClientBuilder, RetryConfig};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use types::{OptionList, OptionsQuery};
