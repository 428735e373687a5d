//! Error taxonomy for the proxy.
//!
//! # Design Decisions
//! - Configuration errors are raised once at startup, never per request
//! - Every per-request failure is a `ProxyError` and ends up in the
//!   error responder (`pipeline::fallback`)
//! - User hooks report failures as boxed errors, wrapped into `ProxyError::Hook`

use axum::http::StatusCode;
use thiserror::Error;

/// Error type returned by user-supplied hooks and renderers.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration problems detected before the first request is served.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Both an exclusion route list and an exclusion predicate were configured.
    #[error("exclude routes and an exclude predicate were both provided; configure only one")]
    ConflictingExclusionRules,

    /// The upstream host could not be turned into a request target.
    #[error("invalid upstream host '{host}': {reason}")]
    InvalidApiHost { host: String, reason: String },

    /// A limit or timeout that would make every request fail.
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
}

/// Failures that abort the handling of a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Buffered upstream body exceeded `max_response_size_bytes`.
    #[error("response data from proxy target exceeded the maximum response size of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The upstream body could not be interpreted as layout data.
    #[error("could not extract layout data from proxy response (code: {status}): {message}")]
    UpstreamDecode { status: u16, message: String },

    /// The upstream body was declared compressed but could not be inflated.
    #[error("failed to decompress '{encoding}' upstream response: {source}")]
    Decompression {
        encoding: String,
        #[source]
        source: std::io::Error,
    },

    /// The renderer broke its completion contract.
    #[error("render contract violation: {0}")]
    RenderContractViolation(&'static str),

    /// The renderer did not complete within the configured deadline.
    #[error("renderer did not complete within {0} seconds")]
    RenderTimeout(u64),

    /// A user-supplied hook or the renderer itself reported a failure.
    #[error("{stage} failed: {source}")]
    Hook {
        stage: &'static str,
        #[source]
        source: HookError,
    },

    /// The upstream request could not be completed.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The rewritten request could not be turned into a valid upstream request.
    #[error("invalid upstream request: {0}")]
    InvalidUpstreamRequest(String),
}

impl ProxyError {
    /// Wrap a hook failure, tagging the stage it came from.
    pub fn hook(stage: &'static str, source: HookError) -> Self {
        Self::Hook { stage, source }
    }

    /// Status used when the upstream response does not supply a better one.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RenderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::PayloadTooLarge { .. } => "payload_too_large",
            ProxyError::UpstreamDecode { .. } => "upstream_decode",
            ProxyError::Decompression { .. } => "decompression",
            ProxyError::RenderContractViolation(_) => "render_contract",
            ProxyError::RenderTimeout(_) => "render_timeout",
            ProxyError::Hook { .. } => "hook",
            ProxyError::Upstream(_) => "upstream",
            ProxyError::InvalidUpstreamRequest(_) => "invalid_upstream_request",
        }
    }
}

/// Result type for per-request pipeline operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProxyError::PayloadTooLarge { limit: 10 };
        assert_eq!(
            err.to_string(),
            "response data from proxy target exceeded the maximum response size of 10 bytes"
        );

        let err = ProxyError::UpstreamDecode {
            status: 404,
            message: "Not Found".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not extract layout data from proxy response (code: 404): Not Found"
        );
    }

    #[test]
    fn test_default_status_codes() {
        assert_eq!(
            ProxyError::Upstream("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::RenderTimeout(5).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::RenderContractViolation("empty").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_hook_error_keeps_stage() {
        let err = ProxyError::hook("set_headers", "boom".into());
        assert_eq!(err.to_string(), "set_headers failed: boom");
        assert_eq!(err.kind(), "hook");
    }
}
