//! Policy-based retry execution
//!
//! Bounded retries for operations that fail transiently, such as replacing
//! an executable that the previous process instance still holds open.
//!
//! - Strategies: none, fixed, exponential and linear backoff
//! - Optional jitter, enabled per policy
//! - Predicates that stop retrying on permanent errors
//! - Attempts are observable through [`RetryObserver`]
//!
//! # Example
//!
//! ```rust,no_run
//! use hopper_core::retry::{ClosurePredicate, RetryError, RetryExecutor};
//! use hopper_core::types::RetryPolicy;
//!
//! async fn example() -> Result<(), RetryError<std::io::Error>> {
//!     RetryExecutor::new(RetryPolicy::fixed(5, 50))
//!         .with_predicate(ClosurePredicate::new(|e: &std::io::Error| {
//!             e.kind() != std::io::ErrorKind::NotFound
//!         }))
//!         .execute(|| async { std::fs::remove_file("stale.tmp") })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ClosurePredicate, RetryPredicate};
