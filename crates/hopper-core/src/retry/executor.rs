//! Retry execution engine

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Executes a fallible async operation up to `policy.max_attempts` times
///
/// ```rust
/// use hopper_core::retry::{RetryExecutor, TracingObserver};
/// use hopper_core::types::RetryPolicy;
///
/// let executor = RetryExecutor::<std::io::Error, _, _>::new(RetryPolicy::fixed(5, 50))
///     .with_observer(TracingObserver::new("replace"));
/// ```
pub struct RetryExecutor<E, P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    _phantom: PhantomData<fn() -> E>,
}

impl<E> RetryExecutor<E, AlwaysRetry, NoOpObserver> {
    /// Create an executor that retries every error
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            _phantom: PhantomData,
        }
    }
}

impl<E, P, O> RetryExecutor<E, P, O> {
    /// Set the retry predicate
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutor<E, P2, O> {
        RetryExecutor {
            policy: self.policy,
            predicate,
            observer: self.observer,
            _phantom: PhantomData,
        }
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutor<E, P, O2> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            _phantom: PhantomData,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<E, P, O> RetryExecutor<E, P, O>
where
    E: fmt::Display + Send + 'static,
    P: RetryPredicate<E>,
    O: RetryObserver,
{
    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts;
        let mut last_error: Option<E> = None;

        for attempt in 1..=max_attempts {
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => err,
            };

            let display_err = DisplayError(err.to_string());

            if !self.predicate.should_retry(&err) {
                self.observer.on_cancelled(attempt, Some(&display_err));
                return Err(RetryError::non_retryable(err));
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &display_err);
                return Err(RetryError::exhausted(attempt, err, start.elapsed()));
            }

            let delay = calculate_delay(&self.policy, attempt);
            self.observer.on_attempt_failed(attempt, &display_err, delay);
            last_error = Some(err);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        // Only reachable with a zero-attempt policy
        Err(RetryError::cancelled(max_attempts, last_error))
    }
}

/// Adapts a `Display` error to `std::error::Error` for observer callbacks
#[derive(Debug)]
struct DisplayError(String);

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DisplayError {}
