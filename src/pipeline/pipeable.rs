//! Pipeable strategy: the upstream body streams through untouched.

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;

use crate::error::{ProxyError, ProxyResult};
use crate::hooks::ProxyHooks;
use crate::http::request::ParsedRequest;
use crate::http::response::{OutgoingResponse, ProxyResponseSnapshot};
use crate::pipeline::finalize::finalize_server_response;

/// Run the pipeable handler, finalize the head and hand the upstream body to the client
/// without buffering.
pub fn respond<B>(
    mut outgoing: OutgoingResponse,
    body: B,
    request: &ParsedRequest,
    upstream: &ProxyResponseSnapshot,
    hooks: &ProxyHooks,
) -> ProxyResult<Response>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    if let Some(handler) = &hooks.pipeable_handler {
        handler(request, &mut outgoing, upstream)
            .map_err(|e| ProxyError::hook("pipeable_handler", e))?;
    }
    finalize_server_response(&mut outgoing, request, upstream, hooks)?;
    Ok(outgoing.into_response(Body::new(body)))
}
