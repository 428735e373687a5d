//! Transformed layout data strategy: the (already transformed) data is the response.

use axum::http::HeaderMap;
use serde_json::Value;

use crate::hooks::HookContext;
use crate::pipeline::ResponseInfo;

/// Serialize transformed layout data with the upstream status.
pub fn response_info(layout_data: &Value, ctx: &HookContext) -> ResponseInfo {
    tracing::debug!(
        request_id = %ctx.request.request_id(),
        url = %ctx.request.url,
        "Layout service request was transformed; returning transformed data"
    );

    ResponseInfo {
        content: layout_data.to_string(),
        status_code: ctx.proxy_response.status,
        headers: HeaderMap::new(),
    }
}
