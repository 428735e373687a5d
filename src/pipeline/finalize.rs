//! Response finalization.
//!
//! # Responsibilities
//! - Every strategy: drop `server`, run the `set_headers` hook
//! - Modified and error bodies: apply extra headers and the final status, set
//!   `content-length` in bytes, drop any upstream `content-encoding`
//!   (the body is produced here and is never compressed)
//! - Attach the body exactly once

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;

use crate::error::{ProxyError, ProxyResult};
use crate::hooks::ProxyHooks;
use crate::http::request::ParsedRequest;
use crate::http::response::{OutgoingResponse, ProxyResponseSnapshot};
use crate::pipeline::ResponseInfo;

/// Steps shared by all strategies, run right before the head is written.
pub fn finalize_server_response(
    outgoing: &mut OutgoingResponse,
    request: &ParsedRequest,
    upstream: &ProxyResponseSnapshot,
    hooks: &ProxyHooks,
) -> ProxyResult<()> {
    outgoing.headers.remove(header::SERVER);

    if let Some(set_headers) = &hooks.set_headers {
        set_headers(request, outgoing, upstream).map_err(|e| ProxyError::hook("set_headers", e))?;
    }

    tracing::debug!(
        request_id = %request.request_id(),
        status = %outgoing.status,
        headers = ?outgoing.headers,
        "Final response for client"
    );
    Ok(())
}

/// Apply a modified body's head: extra headers, status, length and encoding.
pub fn prepare_modified_content_response(outgoing: &mut OutgoingResponse, info: &ResponseInfo) {
    for (name, value) in &info.headers {
        outgoing.headers.insert(name.clone(), value.clone());
    }

    outgoing.status = info.status_code;
    outgoing
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(info.content.len()));
    outgoing.headers.remove(header::CONTENT_ENCODING);
}

/// Finalize and write a modified body.
pub fn write_modified_content(
    mut outgoing: OutgoingResponse,
    info: ResponseInfo,
    request: &ParsedRequest,
    upstream: &ProxyResponseSnapshot,
    hooks: &ProxyHooks,
) -> ProxyResult<Response> {
    prepare_modified_content_response(&mut outgoing, &info);
    finalize_server_response(&mut outgoing, request, upstream, hooks)?;
    Ok(outgoing.into_response(Body::from(info.content)))
}

/// Finalize and write an error body. A failing `set_headers` hook is logged, not raised again.
pub fn write_error_content(
    mut outgoing: OutgoingResponse,
    info: ResponseInfo,
    request: &ParsedRequest,
    upstream: &ProxyResponseSnapshot,
    hooks: &ProxyHooks,
) -> Response {
    prepare_modified_content_response(&mut outgoing, &info);
    if let Err(e) = finalize_server_response(&mut outgoing, request, upstream, hooks) {
        tracing::error!(
            request_id = %request.request_id(),
            error = %e,
            "Failed to finalize error response"
        );
        // The hook may have left the head half-edited; restore what the body needs.
        prepare_modified_content_response(&mut outgoing, &info);
    }
    outgoing.into_response(Body::from(info.content))
}
