//! Unified Error Type System
//!
//! Centralized error types for the crate, with typed provider-failure kinds
//! for retry and fallback decisions.
//!
//! ## Failure Kinds
//!
//! - **RateLimited**: transient capacity signal (429) - retry same provider
//! - **QuotaExhausted**: hard daily/token quota - disable provider for a
//!   cool-down window, fall back
//! - **AuthFailed**: bad credentials - disable provider until re-enabled,
//!   fall back
//! - **Other**: anything else - fall back without touching health state
//!
//! Kinds are decided inside each provider adapter, where the real HTTP
//! status code and structured error payload are available. The gateway only
//! ever matches on the typed kind.

use std::time::Duration;
use thiserror::Error;

use super::ProviderId;

// =============================================================================
// Provider Failure Kinds
// =============================================================================

/// Typed classification of an upstream provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Rate limited (429-style). Retry the same provider with backoff.
    RateLimited,
    /// Hard daily/token quota exhausted. Disable for a fixed window.
    QuotaExhausted,
    /// Authentication rejected. Disable until manual re-enable.
    AuthFailed,
    /// Any other failure. Move to the next tier, health untouched.
    Other,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::QuotaExhausted => write!(f, "QUOTA_EXHAUSTED"),
            Self::AuthFailed => write!(f, "AUTH_FAILED"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

impl ProviderErrorKind {
    /// Whether the same provider should be retried before falling back.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Classify from an HTTP status code plus the raw error body.
    ///
    /// The status code decides the broad class; the body is consulted only
    /// to tell a hard daily/token quota apart from plain rate limiting.
    /// Body sniffing is inherently approximate and is confined to this one
    /// decision.
    pub fn from_http(status: u16, body: &str) -> Self {
        match status {
            429 => {
                let lower = body.to_lowercase();
                if lower.contains("daily")
                    || lower.contains("per day")
                    || lower.contains("token quota")
                {
                    Self::QuotaExhausted
                } else {
                    Self::RateLimited
                }
            }
            401 | 403 => Self::AuthFailed,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// Provider Error
// =============================================================================

/// A classified failure from one provider adapter.
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// Typed kind for routing decisions.
    pub kind: ProviderErrorKind,
    /// Provider that produced the error.
    pub provider: ProviderId,
    /// Detailed error message (upstream body or transport error).
    pub message: String,
    /// Suggested wait before retry, if the upstream sent one.
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, provider: ProviderId, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Classify an HTTP error response from this provider.
    pub fn from_http(provider: ProviderId, status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        Self {
            kind: ProviderErrorKind::from_http(status, &message),
            provider,
            message,
            retry_after: None,
        }
    }

    /// A transport-level failure (connect, timeout, body read).
    pub fn transport(provider: ProviderId, err: &reqwest::Error) -> Self {
        Self::new(ProviderErrorKind::Other, provider, err.to_string())
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// =============================================================================
// Crate Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LensError {
    /// Every configured provider was disabled, unconfigured, or failed.
    /// The only error class the evaluation pipeline lets escape.
    #[error("No provider available: {0}")]
    NoProviderAvailable(String),

    /// Classified failure from a single provider adapter. Consumed by the
    /// gateway's routing loop; callers outside `provider` never see it.
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Model output that failed shape validation after the single allowed
    /// extraction pass. Recovered locally by the caller's fallback path.
    #[error("Malformed model output: {0}")]
    ModelOutput(String),
}

impl From<ProviderError> for LensError {
    fn from(err: ProviderError) -> Self {
        LensError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_http_rate_limit() {
        let kind = ProviderErrorKind::from_http(429, "Too many requests, slow down");
        assert_eq!(kind, ProviderErrorKind::RateLimited);
        assert!(kind.is_retryable());
    }

    #[test]
    fn test_kind_from_http_daily_quota() {
        let kind = ProviderErrorKind::from_http(
            429,
            "Quota exceeded: limit of 1500 requests per day reached",
        );
        assert_eq!(kind, ProviderErrorKind::QuotaExhausted);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn test_kind_from_http_auth() {
        assert_eq!(
            ProviderErrorKind::from_http(401, "API key not valid"),
            ProviderErrorKind::AuthFailed
        );
        assert_eq!(
            ProviderErrorKind::from_http(403, "Permission denied"),
            ProviderErrorKind::AuthFailed
        );
    }

    #[test]
    fn test_kind_from_http_other() {
        assert_eq!(
            ProviderErrorKind::from_http(500, "Internal error"),
            ProviderErrorKind::Other
        );
        assert_eq!(
            ProviderErrorKind::from_http(400, "Bad request"),
            ProviderErrorKind::Other
        );
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(
            ProviderErrorKind::RateLimited,
            ProviderId::Gemini,
            "Too many requests",
        );
        assert_eq!(err.to_string(), "[gemini:RATE_LIMITED] Too many requests");
    }
}
