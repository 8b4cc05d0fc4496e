//! Resilient HTTP client core
//!
//! Shared foundation for remote-API integrations that face a hard,
//! provider-enforced request quota:
//! - Token-bucket rate limiting with continuous refill and FIFO-fair
//!   admission, shared across all concurrent callers of one quota
//! - Classified, bounded retries with deterministic exponential backoff
//!   and server-supplied wait hints
//! - Injected transport and credential provider, so every piece is
//!   testable without a network
//! - Structured observability events for every call state transition
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use integrations_core::{QuotaConfig, ResilientClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ResilientClient::builder()
//!         .base_url("https://api.example.com/v2")
//!         .bearer_token(std::env::var("API_TOKEN")?)
//!         .quota(QuotaConfig::new(10, Duration::from_secs(1)))
//!         .build()?;
//!
//!     // Any number of tasks may call concurrently; admission to the
//!     // upstream quota is coordinated by the shared rate limiter.
//!     let page: serde_json::Value = client.get("/pages/123").await?;
//!     println!("{page}");
//!     Ok(())
//! }
//! ```
//!
//! # Quota sharing
//!
//! One [`resilience::RateLimiter`] instance is the unit of sharing. A
//! client builds a private instance by default; clients that must share
//! one upstream quota are built with
//! [`client::ResilientClientBuilder::shared_limiter`]. Distinct upstream
//! identities (separate credentials, separate tenants) get independent
//! client/limiter pairs; there is no process-wide state.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod transport;

// Resilience
pub mod resilience;

// Observability
pub mod observability;

// Testing utilities
pub mod mocks;

// Tests
#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use auth::{CredentialProvider, EnvCredentialProvider, StaticCredentialProvider};
pub use client::{ApiRequest, ApiResponse, ResilientClient, ResilientClientBuilder};
pub use config::{ClassifierConfig, ClientConfig, ClientConfigBuilder, QuotaConfig, RetryConfig};
pub use errors::{ClientError, ClientResult};
pub use resilience::{BackoffScheduler, ErrorClassifier, RateLimiter};
pub use transport::{Transport, TransportRequest, TransportResponse};
