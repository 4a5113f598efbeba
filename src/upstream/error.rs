use thiserror::Error;

/// Errors raised by the upstream scraping API once the fetcher has given up.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP 429 on every attempt of the retry budget
    #[error("Rate limit exceeded for {endpoint} after {attempts} attempts")]
    RateLimited {
        /// Endpoint that was being requested
        endpoint: String,
        /// Number of attempts made
        attempts: u32,
    },
    /// HTTP 404
    #[error("Resource not found: {endpoint}")]
    NotFound {
        /// Endpoint that was being requested
        endpoint: String,
    },
    /// HTTP 401 or 403
    #[error("Authentication failed ({status}), check the API key")]
    AuthFailed {
        /// Status code returned by the upstream
        status: u16,
    },
    /// HTTP 400
    #[error("Bad request to {endpoint}: {message}")]
    BadRequest {
        /// Endpoint that was being requested
        endpoint: String,
        /// Truncated response body
        message: String,
    },
    /// A successful response whose body was not JSON
    #[error("Invalid JSON response from {endpoint}: {reason}")]
    InvalidResponse {
        /// Endpoint that was being requested
        endpoint: String,
        /// Decoder error
        reason: String,
    },
    /// Timeouts, connection failures or other HTTP errors after the retry budget ran out
    #[error("Request to {endpoint} failed after {attempts} attempts: {last_error}")]
    TransportExhausted {
        /// Endpoint that was being requested
        endpoint: String,
        /// Number of attempts made
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },
}

/// Discriminant of [`UpstreamError`] without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    RateLimited,
    NotFound,
    AuthFailed,
    BadRequest,
    InvalidResponse,
    TransportExhausted,
}

impl UpstreamError {
    #[must_use]
    pub const fn kind(&self) -> UpstreamErrorKind {
        match self {
            Self::RateLimited { .. } => UpstreamErrorKind::RateLimited,
            Self::NotFound { .. } => UpstreamErrorKind::NotFound,
            Self::AuthFailed { .. } => UpstreamErrorKind::AuthFailed,
            Self::BadRequest { .. } => UpstreamErrorKind::BadRequest,
            Self::InvalidResponse { .. } => UpstreamErrorKind::InvalidResponse,
            Self::TransportExhausted { .. } => UpstreamErrorKind::TransportExhausted,
        }
    }

    /// Returns `true` for errors that were raised without consuming retries.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self.kind(),
            UpstreamErrorKind::NotFound
                | UpstreamErrorKind::AuthFailed
                | UpstreamErrorKind::BadRequest
                | UpstreamErrorKind::InvalidResponse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanence_by_kind() {
        let not_found = UpstreamError::NotFound {
            endpoint: "profile".to_string(),
        };
        assert!(not_found.is_permanent());
        assert_eq!(not_found.kind(), UpstreamErrorKind::NotFound);

        let limited = UpstreamError::RateLimited {
            endpoint: "feed".to_string(),
            attempts: 3,
        };
        assert!(!limited.is_permanent());
        assert!(limited.to_string().contains("3 attempts"));
    }
}
