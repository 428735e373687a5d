//! Error responder.
//!
//! The single place that turns a per-request failure into response content.
//! Every failure is logged here before a response is produced.
//!
//! # Design Decisions
//! - An upstream client/server error status (and its reason) is reused as-is
//! - Otherwise the error's own status applies, so a failed render is never a 2xx
//! - Client-facing content is the status reason unless `on_error` supplies more
//! - A failing `on_error` hook is logged and the default response stands

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};

use crate::error::ProxyError;
use crate::hooks::ProxyHooks;
use crate::http::request::ParsedRequest;
use crate::http::response::ProxyResponseSnapshot;
use crate::observability::metrics;
use crate::pipeline::ResponseInfo;

/// Partial error response returned by an `on_error` hook. Set fields replace the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorResponseOverride {
    pub status_code: Option<StatusCode>,
    pub content: Option<String>,
}

impl ErrorResponseOverride {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Build the error response for a failed request.
pub async fn error_response_info(
    error: ProxyError,
    request: &ParsedRequest,
    upstream: &Arc<ProxyResponseSnapshot>,
    hooks: &ProxyHooks,
) -> ResponseInfo {
    tracing::error!(
        request_id = %request.request_id(),
        url = %request.url,
        upstream_status = upstream.status.as_u16(),
        kind = error.kind(),
        error = ?error,
        "Request failed: {}",
        error
    );
    metrics::record_failure(error.kind());

    let (mut status_code, mut content) = default_response(&error, upstream);

    if let Some(on_error) = &hooks.on_error {
        match on_error(Arc::new(error), Arc::clone(upstream)).await {
            Ok(custom) => {
                if let Some(status) = custom.status_code {
                    status_code = status;
                }
                if let Some(custom_content) = custom.content {
                    content = custom_content;
                }
            }
            Err(e) => tracing::warn!(
                request_id = %request.request_id(),
                error = %e,
                "on_error hook failed; using the default error response"
            ),
        }
    }

    ResponseInfo {
        content,
        status_code,
        headers: HeaderMap::new(),
    }
}

fn default_response(error: &ProxyError, upstream: &ProxyResponseSnapshot) -> (StatusCode, String) {
    let status = if upstream.status.is_client_error() || upstream.status.is_server_error() {
        upstream.status
    } else {
        error.status_code()
    };

    let message = if status == upstream.status && !upstream.status_message.is_empty() {
        upstream.status_message.clone()
    } else {
        status
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_string()
    };

    (status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use axum::http::{Method, Uri};

    fn request() -> ParsedRequest {
        let uri: Uri = "/home".parse().unwrap();
        ParsedRequest::from_uri(Method::GET, &uri)
    }

    fn upstream(status: StatusCode, message: &str) -> Arc<ProxyResponseSnapshot> {
        let mut snapshot = ProxyResponseSnapshot::with_status(status);
        snapshot.status_message = message.to_string();
        Arc::new(snapshot)
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_reused() {
        let info = error_response_info(
            ProxyError::UpstreamDecode {
                status: 503,
                message: "Down for maintenance".into(),
            },
            &request(),
            &upstream(StatusCode::SERVICE_UNAVAILABLE, "Down for maintenance"),
            &ProxyHooks::new(),
        )
        .await;

        assert_eq!(info.status_code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(info.content, "Down for maintenance");
    }

    #[tokio::test]
    async fn test_successful_upstream_never_masks_failure() {
        let info = error_response_info(
            ProxyError::PayloadTooLarge { limit: 10 },
            &request(),
            &upstream(StatusCode::OK, "OK"),
            &ProxyHooks::new(),
        )
        .await;

        assert_eq!(info.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(info.content, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_on_error_overrides_fields() {
        let hooks = ProxyHooks::new().on_error(|error, _| async move {
            Ok::<_, HookError>(ErrorResponseOverride::default().content(format!("<h1>{}</h1>", error.kind())))
        });

        let info = error_response_info(
            ProxyError::RenderContractViolation("empty"),
            &request(),
            &upstream(StatusCode::OK, "OK"),
            &hooks,
        )
        .await;

        // Status keeps its default, content is replaced.
        assert_eq!(info.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(info.content, "<h1>render_contract</h1>");
    }

    #[tokio::test]
    async fn test_failing_on_error_falls_back() {
        let hooks = ProxyHooks::new().on_error(|_, _| async move {
            Err::<ErrorResponseOverride, HookError>("hook broke".into())
        });

        let info = error_response_info(
            ProxyError::Upstream("connection refused".into()),
            &request(),
            &Arc::new(ProxyResponseSnapshot::with_status(StatusCode::BAD_GATEWAY)),
            &hooks,
        )
        .await;

        assert_eq!(info.status_code, StatusCode::BAD_GATEWAY);
        assert_eq!(info.content, "Bad Gateway");
    }
}
