use std::fmt::Display;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

/// Attempts used when a policy is built with `max_attempts == 0`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
/// Largest fraction of the current delay added as jitter.
pub const DEFAULT_JITTER_RATIO: f64 = 0.5;
/// Ceiling for exponential growth.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How the delay evolves between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    /// Add up to `jitter_ratio * delay` at random, then double.
    ExponentialJitter { jitter_ratio: f64 },
}

/// Bounded retry schedule for one fallible operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff: Backoff) -> Self {
        let backoff = match backoff {
            Backoff::ExponentialJitter { jitter_ratio } => Backoff::ExponentialJitter {
                jitter_ratio: clamp_ratio(jitter_ratio),
            },
            Backoff::Fixed => Backoff::Fixed,
        };
        Self {
            max_attempts: if max_attempts == 0 {
                DEFAULT_MAX_ATTEMPTS
            } else {
                max_attempts
            },
            initial_delay,
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, Backoff::Fixed)
    }

    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::new(
            max_attempts,
            initial_delay,
            Backoff::ExponentialJitter {
                jitter_ratio: DEFAULT_JITTER_RATIO,
            },
        )
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.initial_delay, self.backoff)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns `(sleep, carried)`: how long to wait now, and the delay the
    /// following round starts from. `sample` is a uniform value in `[0, 1)`.
    pub fn next_delay(&self, current: Duration, sample: f64) -> (Duration, Duration) {
        match self.backoff {
            Backoff::Fixed => (current, current),
            Backoff::ExponentialJitter { jitter_ratio } => {
                let current = current.min(MAX_BACKOFF);
                let sample = if sample.is_finite() {
                    sample.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let jitter = current.mul_f64(sample * jitter_ratio);
                let sleep = current.saturating_add(jitter).min(MAX_BACKOFF);
                (sleep, sleep.saturating_mul(2).min(MAX_BACKOFF))
            }
        }
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        DEFAULT_JITTER_RATIO
    }
}

/// Run `operation` until it succeeds or the policy's attempts are spent.
///
/// The last error is returned as-is. Attempts never overlap.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    execute_when(policy, operation, |_| true).await
}

/// Like [`execute`], but stops early on errors `should_retry` rejects.
pub async fn execute_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut remaining = policy.max_attempts();
    let mut delay = policy.initial_delay();

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        remaining = remaining.saturating_sub(1);
        if remaining == 0 || !should_retry(&error) {
            return Err(error);
        }

        let sample = rand::thread_rng().gen::<f64>();
        let (sleep, next) = policy.next_delay(delay, sample);
        tracing::warn!(
            %error,
            remaining,
            delay_ms = u64::try_from(sleep.as_millis()).unwrap_or(u64::MAX),
            "attempt failed; retrying"
        );
        tokio::time::sleep(sleep).await;
        delay = next;
    }
}

fn retryable_status_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused|try again")
            .expect("retry regex must compile")
    })
}

/// Status and message policy for API errors.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 408 | 409 | 429) || status >= 500 || retryable_status_regex().is_match(error_text)
}
