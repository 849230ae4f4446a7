//! Resilience and observability primitives shared by the booking consumers
//! and gateway: exponential-backoff retries, a circuit breaker for guarding
//! calls to the stores and bus, and a Prometheus metrics server.
//!
//! These are the ambient pieces the teacher's runtime crate carried
//! alongside its Store/Effect system. The Store/Effect/Reducer runtime
//! itself has no counterpart in this pipeline and has been dropped; the
//! resilience and metrics primitives generalize unchanged.

use std::sync::Arc;
use std::time::Duration;

/// Retry policy for handling transient failures
///
/// Implements exponential backoff with jitter to handle transient failures
/// gracefully without overwhelming downstream services.
///
/// # Example
///
/// ```ignore
/// use booking_runtime::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// // Or customize:
/// let policy = RetryPolicy::new()
///     .with_max_attempts(10)
///     .with_initial_delay(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (including initial attempt)
    max_attempts: u32,

    /// Initial delay before first retry
    initial_delay: Duration,

    /// Maximum delay between retries (caps exponential backoff)
    max_delay: Duration,

    /// Multiplier for exponential backoff (2.0 = double each time)
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a new retry policy with default settings
    ///
    /// Defaults:
    /// - max_attempts: 5
    /// - initial_delay: 1 second
    /// - max_delay: 32 seconds
    /// - backoff_multiplier: 2.0 (exponential)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            backoff_multiplier: 2.0,
        }
    }

    /// Set maximum retry attempts
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay before first retry
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay between retries
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier for exponential backoff
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate delay for a given attempt number (0-indexed)
    ///
    /// Uses exponential backoff with jitter:
    /// delay = min(initial_delay * multiplier^attempt, max_delay) * (0.5 + random(0.5))
    ///
    /// Jitter prevents thundering herd problem.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);

        let capped_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        // Jitter spreads retries out to avoid thundering herd
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        let final_secs = capped_secs * jitter;

        Duration::from_secs_f64(final_secs)
    }

    /// Get maximum number of attempts
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check if we should retry based on attempt number
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Circuit breaker state
///
/// A circuit breaker prevents cascading failures by "opening" after
/// a threshold of failures, rejecting requests immediately rather than
/// attempting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed - normal operation, requests pass through
    Closed,

    /// Circuit is open - failing fast, rejecting requests immediately
    Open,

    /// Circuit is half-open - testing if service recovered
    HalfOpen,
}

/// Circuit breaker error
#[derive(Debug, Clone, thiserror::Error)]
pub enum CircuitBreakerError {
    /// Circuit is open, rejecting requests
    #[error("Circuit breaker is open")]
    Open,
}

/// Circuit breaker for preventing cascading failures
///
/// The circuit breaker pattern prevents cascading failures by tracking
/// failure rates and "opening" the circuit after a threshold is reached.
/// When open, requests fail fast rather than attempting the operation.
///
/// # States
///
/// - **Closed**: Normal operation, all requests go through
/// - **Open**: Failing fast, rejecting all requests immediately
/// - **HalfOpen**: Testing recovery with limited requests
///
/// # State Transitions
///
/// - `Closed` → `Open`: After `failure_threshold` consecutive failures
/// - `Open` → `HalfOpen`: After `timeout` duration
/// - `HalfOpen` → `Closed`: After `success_threshold` consecutive successes
/// - `HalfOpen` → `Open`: On any failure
///
/// # Example
///
/// ```ignore
/// use booking_runtime::CircuitBreaker;
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new()
///     .with_failure_threshold(5)
///     .with_timeout(Duration::from_secs(30));
///
/// // Check before operation
/// breaker.check_and_call(|| async {
///     database.query(...).await
/// }).await?;
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Current state
    state: Arc<AtomicU8>,

    /// Consecutive failure count
    failure_count: Arc<AtomicUsize>,

    /// Success count in HalfOpen state
    success_count: Arc<AtomicUsize>,

    /// Timestamp when circuit was opened (nanoseconds since epoch)
    opened_at: Arc<AtomicU64>,

    /// Number of consecutive failures before opening circuit
    failure_threshold: usize,

    /// Duration to wait before attempting HalfOpen
    timeout: Duration,

    /// Number of consecutive successes in HalfOpen to close circuit
    success_threshold: usize,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings
    ///
    /// Defaults:
    /// - failure_threshold: 5
    /// - timeout: 60 seconds
    /// - success_threshold: 2
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            failure_count: Arc::new(AtomicUsize::new(0)),
            success_count: Arc::new(AtomicUsize::new(0)),
            opened_at: Arc::new(AtomicU64::new(0)),
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }

    /// Set the failure threshold
    ///
    /// Number of consecutive failures before opening the circuit.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the timeout duration
    ///
    /// Duration to wait before attempting HalfOpen state.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the success threshold
    ///
    /// Number of consecutive successes in HalfOpen to close circuit.
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Get current circuit state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Acquire) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed, // Fallback
        }
    }

    /// Check if we should allow a request through
    ///
    /// Returns `Ok(())` if request should proceed, `Err` if circuit is open.
    fn check(&self) -> Result<(), CircuitBreakerError> {
        let current_state = self.state();

        match current_state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at_nanos = self.opened_at.load(Ordering::Acquire);
                let now_nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_nanos() as u64;

                let elapsed = Duration::from_nanos(now_nanos.saturating_sub(opened_at_nanos));

                if elapsed >= self.timeout {
                    self.state
                        .store(CircuitState::HalfOpen as u8, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);

                    metrics::counter!("circuit_breaker.state_change", "from" => "open", "to" => "half_open")
                        .increment(1);
                    tracing::info!("Circuit breaker transitioning from Open to HalfOpen");

                    Ok(())
                } else {
                    Err(CircuitBreakerError::Open)
                }
            },
            CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let current_state = self.state();

        match current_state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            },
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;

                if successes >= self.success_threshold {
                    self.state
                        .store(CircuitState::Closed as u8, Ordering::Release);
                    self.failure_count.store(0, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);

                    metrics::counter!("circuit_breaker.state_change", "from" => "half_open", "to" => "closed")
                        .increment(1);
                    tracing::info!("Circuit breaker transitioning from HalfOpen to Closed");
                }
            },
            CircuitState::Open => {},
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let current_state = self.state();

        match current_state {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;

                if failures >= self.failure_threshold {
                    self.state.store(CircuitState::Open as u8, Ordering::Release);

                    let now_nanos = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or(Duration::ZERO)
                        .as_nanos() as u64;
                    self.opened_at.store(now_nanos, Ordering::Release);

                    metrics::counter!("circuit_breaker.state_change", "from" => "closed", "to" => "open")
                        .increment(1);
                    tracing::warn!(
                        failures = failures,
                        threshold = self.failure_threshold,
                        "Circuit breaker opening due to failures"
                    );
                }
            },
            CircuitState::HalfOpen => {
                self.state.store(CircuitState::Open as u8, Ordering::Release);
                self.success_count.store(0, Ordering::Release);

                let now_nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_nanos() as u64;
                self.opened_at.store(now_nanos, Ordering::Release);

                metrics::counter!("circuit_breaker.state_change", "from" => "half_open", "to" => "open")
                    .increment(1);
                tracing::warn!("Circuit breaker opening from HalfOpen due to failure");
            },
            CircuitState::Open => {},
        }
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` if circuit is open.
    /// Returns any error from the operation itself.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, Either<CircuitBreakerError, E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.check().map_err(Either::Left)?;

        match f().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            },
            Err(error) => {
                self.record_failure();
                Err(Either::Right(error))
            },
        }
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            failure_count: Arc::clone(&self.failure_count),
            success_count: Arc::clone(&self.success_count),
            opened_at: Arc::clone(&self.opened_at),
            failure_threshold: self.failure_threshold,
            timeout: self.timeout,
            success_threshold: self.success_threshold,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Either type for circuit breaker results
#[derive(Debug)]
pub enum Either<L, R> {
    /// Left variant (circuit breaker error)
    Left(L),
    /// Right variant (operation error)
    Right(R),
}

impl<L: std::fmt::Display, R: std::fmt::Display> std::fmt::Display for Either<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Either::Left(l) => write!(f, "{}", l),
            Either::Right(r) => write!(f, "{}", r),
        }
    }
}

impl<L: std::error::Error, R: std::error::Error> std::error::Error for Either<L, R> {}

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Prometheus metrics server for the booking pipeline's consumers and gateway.
pub mod metrics {
    use metrics::{describe_counter, describe_gauge};
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
    use std::net::SocketAddr;
    use thiserror::Error;

    pub use metrics::{counter, gauge, histogram};

    /// Errors from metrics operations.
    #[derive(Error, Debug)]
    pub enum MetricsError {
        /// Failed to build metrics exporter
        #[error("Failed to build metrics exporter: {0}")]
        Build(String),
        /// Failed to install metrics exporter
        #[error("Failed to install metrics exporter: {0}")]
        Install(String),
    }

    /// Prometheus metrics server.
    ///
    /// Exposes metrics on an HTTP endpoint for Prometheus scraping.
    pub struct MetricsServer {
        addr: SocketAddr,
        handle: Option<PrometheusHandle>,
    }

    impl MetricsServer {
        /// Create a new metrics server.
        #[must_use]
        pub const fn new(addr: SocketAddr) -> Self {
            Self { addr, handle: None }
        }

        /// Register metric descriptions and install the Prometheus recorder.
        ///
        /// # Errors
        ///
        /// Returns an error if the exporter cannot be built, unless a
        /// recorder is already installed globally (tests may call this more
        /// than once), in which case installation is treated as a no-op.
        pub fn start(&mut self) -> Result<(), MetricsError> {
            register_metrics();

            let builder = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Suffix("duration_seconds".to_string()),
                    &[
                        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                    ],
                )
                .map_err(|e| MetricsError::Build(e.to_string()))?;

            match builder.install_recorder() {
                Ok(handle) => {
                    self.handle = Some(handle);
                    tracing::info!(addr = %self.addr, "metrics server started");
                    Ok(())
                }
                Err(e) => {
                    let msg = e.to_string();
                    if msg.contains("already initialized") {
                        tracing::warn!("metrics recorder already initialized, skipping");
                        Ok(())
                    } else {
                        Err(MetricsError::Install(msg))
                    }
                }
            }
        }

        /// Render current metrics in Prometheus text format.
        ///
        /// Returns `None` if the server hasn't been started.
        #[must_use]
        pub fn render(&self) -> Option<String> {
            self.handle.as_ref().map(PrometheusHandle::render)
        }
    }

    fn register_metrics() {
        describe_gauge!(
            "circuit_breaker_state",
            "Current circuit breaker state (0=closed, 1=open, 2=half_open)"
        );
        describe_counter!(
            "circuit_breaker.state_change",
            "Circuit breaker state transitions"
        );
        describe_counter!("retry_attempts_total", "Total number of retry attempts");
        describe_counter!(
            "retry_successes_total",
            "Total number of successful retries"
        );
        describe_counter!(
            "retry_exhausted_total",
            "Total number of retry attempts that exhausted max retries"
        );
    }

    #[cfg(test)]
    mod tests {
        use super::MetricsServer;

        #[tokio::test]
        async fn metrics_server_start_is_idempotent() {
            let addr = "127.0.0.1:0".parse().unwrap();
            let mut server = MetricsServer::new(addr);
            assert!(server.start().is_ok());

            let mut second = MetricsServer::new(addr);
            assert!(second.start().is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod retry_policy_tests {
        use super::*;

        #[test]
        fn test_retry_policy_default() {
            let policy = RetryPolicy::default();
            assert_eq!(policy.max_attempts(), 5);
            assert!(policy.should_retry(0));
            assert!(policy.should_retry(4));
            assert!(!policy.should_retry(5));
        }

        #[test]
        fn test_retry_policy_builder() {
            let policy = RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(10))
                .with_backoff_multiplier(3.0);

            assert_eq!(policy.max_attempts(), 3);
            assert!(policy.should_retry(2));
            assert!(!policy.should_retry(3));
        }

        #[test]
        fn test_delay_increases_exponentially() {
            let policy = RetryPolicy::new()
                .with_initial_delay(Duration::from_secs(1))
                .with_backoff_multiplier(2.0)
                .with_max_delay(Duration::from_secs(100));

            let delay0 = policy.delay_for_attempt(0);
            let delay1 = policy.delay_for_attempt(1);
            let delay2 = policy.delay_for_attempt(2);

            assert!(delay0.as_millis() >= 500 && delay0.as_millis() <= 1000);
            assert!(delay1.as_millis() >= 1000 && delay1.as_millis() <= 2000);
            assert!(delay2.as_millis() >= 2000 && delay2.as_millis() <= 4000);
        }

        #[test]
        fn test_delay_caps_at_max() {
            let policy = RetryPolicy::new()
                .with_initial_delay(Duration::from_secs(1))
                .with_backoff_multiplier(2.0)
                .with_max_delay(Duration::from_secs(5));

            let delay = policy.delay_for_attempt(10);
            assert!(delay.as_millis() >= 2500 && delay.as_millis() <= 5000);
        }

        #[test]
        fn test_jitter_variation() {
            let policy = RetryPolicy::new()
                .with_initial_delay(Duration::from_secs(1))
                .with_backoff_multiplier(2.0);

            let mut delays = Vec::new();
            for _ in 0..10 {
                delays.push(policy.delay_for_attempt(1));
            }

            let first = delays[0];
            let has_variation = delays.iter().any(|d| d != &first);
            assert!(has_variation, "Jitter should produce variation in delays");
        }
    }

    mod circuit_breaker_tests {
        use super::*;

        #[test]
        fn test_circuit_breaker_initial_state() {
            let breaker = CircuitBreaker::new();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }

        #[test]
        fn test_circuit_breaker_opens_after_threshold() {
            let breaker = CircuitBreaker::new().with_failure_threshold(3);

            assert_eq!(breaker.state(), CircuitState::Closed);

            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);

            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);

            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);
        }

        #[test]
        fn test_circuit_breaker_resets_on_success() {
            let breaker = CircuitBreaker::new().with_failure_threshold(3);

            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);

            breaker.record_success();

            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);

            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);
        }

        #[tokio::test]
        async fn test_circuit_breaker_half_open_after_timeout() {
            let breaker = CircuitBreaker::new()
                .with_failure_threshold(2)
                .with_timeout(Duration::from_millis(100));

            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);

            assert!(breaker.check().is_err());

            tokio::time::sleep(Duration::from_millis(150)).await;

            assert!(breaker.check().is_ok());
            assert_eq!(breaker.state(), CircuitState::HalfOpen);
        }

        #[test]
        fn test_circuit_breaker_closes_after_success_threshold() {
            let breaker = CircuitBreaker::new()
                .with_failure_threshold(2)
                .with_success_threshold(2);

            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);

            breaker
                .state
                .store(CircuitState::HalfOpen as u8, Ordering::Release);

            breaker.record_success();
            assert_eq!(breaker.state(), CircuitState::HalfOpen);

            breaker.record_success();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }

        #[test]
        fn test_circuit_breaker_reopens_on_half_open_failure() {
            let breaker = CircuitBreaker::new().with_failure_threshold(2);

            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);

            breaker
                .state
                .store(CircuitState::HalfOpen as u8, Ordering::Release);

            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Open);
        }

        #[tokio::test]
        async fn test_circuit_breaker_call_success() {
            let breaker = CircuitBreaker::new();

            let result = breaker.call(|| async { Ok::<i32, String>(42) }).await;

            assert!(result.is_ok());
            assert_eq!(result.unwrap(), 42);
            assert_eq!(breaker.state(), CircuitState::Closed);
        }

        #[tokio::test]
        async fn test_circuit_breaker_call_opens_on_failures() {
            let breaker = CircuitBreaker::new().with_failure_threshold(3);

            for _ in 0..3 {
                let result = breaker
                    .call(|| async { Err::<i32, String>("error".to_string()) })
                    .await;
                assert!(result.is_err());
            }

            assert_eq!(breaker.state(), CircuitState::Open);

            let result = breaker.call(|| async { Ok::<i32, String>(42) }).await;

            assert!(result.is_err());
            assert!(matches!(result, Err(Either::Left(_))));
        }

        #[tokio::test]
        async fn test_circuit_breaker_concurrent_access() {
            use std::sync::Arc;

            let breaker = Arc::new(CircuitBreaker::new().with_failure_threshold(5));

            let mut handles = vec![];
            for _ in 0..10 {
                let breaker_clone = Arc::clone(&breaker);
                handles.push(tokio::spawn(async move {
                    breaker_clone.record_failure();
                }));
            }

            for handle in handles {
                handle.await.unwrap();
            }

            assert_eq!(breaker.state(), CircuitState::Open);
        }

        #[test]
        fn test_circuit_breaker_builder() {
            let breaker = CircuitBreaker::new()
                .with_failure_threshold(10)
                .with_timeout(Duration::from_secs(30))
                .with_success_threshold(3);

            for _ in 0..10 {
                breaker.record_failure();
            }
            assert_eq!(breaker.state(), CircuitState::Open);
        }
    }
}
