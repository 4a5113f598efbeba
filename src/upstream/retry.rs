//! Retry state machine for upstream requests.
//!
//! One call to [`RetryPolicy::decide`] is one transition: given the attempt
//! index and the way it failed, either wait and try again or give up with a
//! classified [`UpstreamError`]. The fetcher drives the loop; everything here
//! is pure so the attempt/backoff contract can be tested without a network.

use std::fmt;
use std::time::Duration;

use super::error::UpstreamError;
use crate::utils::truncate_str;

/// Default number of attempts per logical request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Base of the exponential backoff applied to HTTP 429 (attempt `n` waits `base * 2^n`).
pub const DEFAULT_RATE_LIMIT_BASE: Duration = Duration::from_secs(1);
/// Fixed delay before retrying timeouts, connection errors and other HTTP errors.
pub const DEFAULT_TRANSIENT_DELAY: Duration = Duration::from_secs(1);

const MAX_ERROR_BODY_CHARS: usize = 200;

/// How a single attempt failed, before any retry decision is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Non-success HTTP status with the (possibly empty) response body
    Status { code: u16, body: String },
    /// The per-call timeout elapsed
    Timeout,
    /// The connection could not be established
    Connect(String),
    /// Any other transport-level error
    Transport(String),
    /// 2xx response whose body is not valid JSON
    Decode(String),
}

impl Failure {
    /// Maps a `reqwest` error onto the transport failure classes.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                code: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code, body } if body.is_empty() => write!(f, "HTTP {code}"),
            Self::Status { code, body } => {
                write!(f, "HTTP {code}: {}", truncate_str(body, MAX_ERROR_BODY_CHARS))
            }
            Self::Timeout => write!(f, "request timed out"),
            Self::Connect(e) => write!(f, "connection error: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(e) => write!(f, "invalid JSON: {e}"),
        }
    }
}

/// Outcome of one step of the retry state machine.
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for the given duration, then make the next attempt
    Retry(Duration),
    /// Stop and surface this error to the caller
    Fail(UpstreamError),
}

/// Attempt budget and backoff schedule for one logical upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_base: Duration,
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_base: DEFAULT_RATE_LIMIT_BASE,
            transient_delay: DEFAULT_TRANSIENT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget as the default policy but without any sleeping.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            rate_limit_base: Duration::ZERO,
            transient_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Backoff before the attempt following a 429 on attempt `attempt` (0-based).
    #[must_use]
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        self.rate_limit_base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    /// Decides what to do after attempt `attempt` (0-based) failed with `failure`.
    #[must_use]
    pub fn decide(&self, endpoint: &str, attempt: u32, failure: Failure) -> RetryDecision {
        let attempts_made = attempt + 1;
        let budget_left = attempts_made < self.max_attempts.max(1);

        match failure {
            Failure::Status { code: 404, .. } => RetryDecision::Fail(UpstreamError::NotFound {
                endpoint: endpoint.to_string(),
            }),
            Failure::Status {
                code: code @ (401 | 403),
                ..
            } => RetryDecision::Fail(UpstreamError::AuthFailed { status: code }),
            Failure::Status { code: 400, body } => {
                RetryDecision::Fail(UpstreamError::BadRequest {
                    endpoint: endpoint.to_string(),
                    message: truncate_str(body, MAX_ERROR_BODY_CHARS),
                })
            }
            Failure::Decode(reason) => RetryDecision::Fail(UpstreamError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason,
            }),
            Failure::Status { code: 429, .. } => {
                if budget_left {
                    RetryDecision::Retry(self.rate_limit_backoff(attempt))
                } else {
                    RetryDecision::Fail(UpstreamError::RateLimited {
                        endpoint: endpoint.to_string(),
                        attempts: attempts_made,
                    })
                }
            }
            other => {
                if budget_left {
                    RetryDecision::Retry(self.transient_delay)
                } else {
                    RetryDecision::Fail(UpstreamError::TransportExhausted {
                        endpoint: endpoint.to_string(),
                        attempts: attempts_made,
                        last_error: other.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamErrorKind;

    fn status(code: u16) -> Failure {
        Failure::Status {
            code,
            body: String::new(),
        }
    }

    fn fail_kind(decision: RetryDecision) -> Option<UpstreamErrorKind> {
        match decision {
            RetryDecision::Fail(e) => Some(e.kind()),
            RetryDecision::Retry(_) => None,
        }
    }

    #[test]
    fn test_permanent_statuses_fail_on_first_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(
            fail_kind(policy.decide("x", 0, status(404))),
            Some(UpstreamErrorKind::NotFound)
        );
        assert_eq!(
            fail_kind(policy.decide("x", 0, status(401))),
            Some(UpstreamErrorKind::AuthFailed)
        );
        assert_eq!(
            fail_kind(policy.decide("x", 0, status(403))),
            Some(UpstreamErrorKind::AuthFailed)
        );
        assert_eq!(
            fail_kind(policy.decide("x", 0, status(400))),
            Some(UpstreamErrorKind::BadRequest)
        );
        assert_eq!(
            fail_kind(policy.decide("x", 0, Failure::Decode("eof".into()))),
            Some(UpstreamErrorKind::InvalidResponse)
        );
    }

    #[test]
    fn test_rate_limit_backoff_doubles() {
        let policy = RetryPolicy::default();
        match policy.decide("feed", 0, status(429)) {
            RetryDecision::Retry(d) => assert_eq!(d, Duration::from_secs(1)),
            RetryDecision::Fail(e) => panic!("unexpected failure: {e}"),
        }
        match policy.decide("feed", 1, status(429)) {
            RetryDecision::Retry(d) => assert_eq!(d, Duration::from_secs(2)),
            RetryDecision::Fail(e) => panic!("unexpected failure: {e}"),
        }
        match policy.decide("feed", 2, status(429)) {
            RetryDecision::Fail(UpstreamError::RateLimited { attempts, .. }) => {
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_transient_failures_use_fixed_delay() {
        let policy = RetryPolicy::default();
        for failure in [
            Failure::Timeout,
            Failure::Connect("refused".into()),
            status(502),
        ] {
            match policy.decide("feed", 0, failure.clone()) {
                RetryDecision::Retry(d) => assert_eq!(d, Duration::from_secs(1)),
                RetryDecision::Fail(e) => panic!("{failure} should be retried, got {e}"),
            }
        }
    }

    #[test]
    fn test_transient_exhaustion_keeps_last_error() {
        let policy = RetryPolicy::default();
        match policy.decide("feed", 2, Failure::Timeout) {
            RetryDecision::Fail(UpstreamError::TransportExhausted {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("expected TransportExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_single_attempt_budget() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::immediate()
        };
        assert_eq!(
            fail_kind(policy.decide("x", 0, status(429))),
            Some(UpstreamErrorKind::RateLimited)
        );
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.rate_limit_backoff(40) >= policy.rate_limit_backoff(16));
    }
}
