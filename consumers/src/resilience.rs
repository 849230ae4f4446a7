//! Wraps a store call with the shared retry policy and circuit breaker
//! (SPEC_FULL.md's ambient resilience item, grounded on
//! `booking_runtime::{RetryPolicy, CircuitBreaker}`).
//!
//! This is local, bounded resilience on top of the broker's own redelivery:
//! most transient blips resolve within a handful of retries without forcing
//! a redelivery round-trip. Once retries are exhausted the caller still
//! gets back the underlying store error, which propagates to
//! [`crate::outcome::ProcessingOutcome::LeaveUncommitted`] exactly as if no
//! local retry had happened.

use std::future::Future;

use booking_runtime::{CircuitBreaker, Either, RetryPolicy};

/// Retry `f` under `breaker`'s protection, honoring `retry`'s backoff
/// schedule. `circuit_open_error` builds the error value returned if
/// retries are exhausted while the circuit is open (so callers don't need
/// an error variant specifically for "circuit open", they just supply a
/// constructor for their existing transport-error variant).
pub async fn call_with_resilience<F, Fut, T, E>(
    breaker: &CircuitBreaker,
    retry: &RetryPolicy,
    op_name: &'static str,
    circuit_open_error: impl Fn() -> E,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        match breaker.call(&mut f).await {
            Ok(value) => {
                if attempt > 0 {
                    metrics::counter!("retry_successes_total", "op" => op_name).increment(1);
                }
                return Ok(value);
            }
            Err(Either::Left(_circuit_open)) => {
                if !retry.should_retry(attempt) {
                    metrics::counter!("retry_exhausted_total", "op" => op_name).increment(1);
                    return Err(circuit_open_error());
                }
            }
            Err(Either::Right(error)) => {
                if !retry.should_retry(attempt) {
                    metrics::counter!("retry_exhausted_total", "op" => op_name).increment(1);
                    return Err(error);
                }
            }
        }

        metrics::counter!("retry_attempts_total", "op" => op_name).increment(1);
        tracing::warn!(op = op_name, attempt, "retrying after transient failure");
        tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
        attempt += 1;
    }
}
