//! Resilience patterns shared by messaging components.
//!
//! This library provides production-ready resilience patterns:
//! - **Retry**: Exponential backoff with optional jitter for transient failures
//! - **Timeout**: Enforces time limits on external calls
//!
//! # Example: Retrying a broker publish
//!
//! ```rust,no_run
//! use resilience::{retry::{RetryConfig, with_retry}};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RetryConfig {
//!         max_retries: 2,
//!         initial_backoff: Duration::from_secs(2),
//!         max_backoff: Duration::from_secs(8),
//!         backoff_multiplier: 2.0,
//!         jitter: false,
//!     };
//!
//!     let _ = with_retry(config, || async {
//!         // Your publish call here
//!         Ok::<_, String>(())
//!     }).await;
//! }
//! ```

pub mod retry;
pub mod timeout;

pub use retry::{RetryConfig, RetryError, with_retry};
pub use timeout::{TimeoutConfig, TimeoutError, with_timeout, with_timeout_result};
