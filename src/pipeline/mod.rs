//! Upstream response pipeline.
//!
//! # Data Flow
//! ```text
//! upstream response head
//!     → snapshots (ProxyResponseSnapshot, ServerResponseSnapshot)
//!     → header pass-through + analytics cookie scrub
//!     → classify(original URL), or the `classify_response` hook
//!         Pipeable                → finalize → stream body through
//!         TransformableLayoutData → collect → extract (+transform) → JSON body (or layout_data_handler)
//!         RenderTarget            → collect → extract (+transform) → render → HTML body (or ssr_handler)
//!     → failures at any step → fallback (error responder)
//!     → finalize → write once
//! ```
//!
//! # Design Decisions
//! - Each request owns its buffer and derived values; nothing is shared but config
//! - Every failure ends in a written response; nothing is left hanging
//! - Hooks observe snapshots; only `set_headers` touches the outgoing head

pub mod collector;
pub mod extractor;
pub mod fallback;
pub mod finalize;
pub mod layout_data;
pub mod pipeable;
pub mod ssr;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;

use crate::config::ResolvedConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::hooks::{HookContext, ProxyHooks};
use crate::http::request::ParsedRequest;
use crate::http::response::{OutgoingResponse, ProxyResponseSnapshot};
use crate::observability::metrics;
use crate::render::AppRenderer;
use crate::routing::{classify, Classification};

pub use fallback::ErrorResponseOverride;

/// Uniform output of every modifying strategy.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub content: String,
    pub status_code: StatusCode,
    /// Extra headers applied over the passed-through upstream headers.
    pub headers: HeaderMap,
}

/// Everything needed to turn upstream responses into client responses.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<ResolvedConfig>,
    hooks: Arc<ProxyHooks>,
    renderer: Arc<dyn AppRenderer>,
}

impl Pipeline {
    pub fn new(
        config: Arc<ResolvedConfig>,
        hooks: Arc<ProxyHooks>,
        renderer: Arc<dyn AppRenderer>,
    ) -> Self {
        Self {
            config,
            hooks,
            renderer,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn hooks(&self) -> &ProxyHooks {
        &self.hooks
    }

    /// Handle an upstream response for `request`.
    pub async fn handle_proxy_response<B>(
        &self,
        request: Arc<ParsedRequest>,
        upstream: axum::http::Response<B>,
    ) -> Response
    where
        B: hyper::body::Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<axum::BoxError> + std::fmt::Display,
    {
        let start = Instant::now();
        let (parts, body) = upstream.into_parts();
        let proxy_response = Arc::new(ProxyResponseSnapshot::from_parts(&parts));

        tracing::debug!(
            request_id = %request.request_id(),
            url = %request.url,
            query = ?request.query,
            request_headers = ?request.headers,
            upstream_status = %proxy_response.status,
            upstream_headers = ?proxy_response.headers,
            "Handling proxied response"
        );

        let outgoing = OutgoingResponse::from_upstream(&proxy_response);
        let strategy = match &self.hooks.classify_response {
            Some(classifier) => classifier(&request, &proxy_response, &self.config),
            None => classify(&request.url, &self.config),
        };
        tracing::debug!(request_id = %request.request_id(), strategy = %strategy, "Response classified");

        let response = match strategy {
            Classification::Pipeable => {
                match pipeable::respond(outgoing.clone(), body, &request, &proxy_response, &self.hooks) {
                    Ok(response) => response,
                    Err(error) => self.fail(error, &request, &proxy_response, outgoing).await,
                }
            }
            _ => {
                let ctx = HookContext {
                    server_response: Arc::new(outgoing.snapshot()),
                    request,
                    proxy_response,
                };
                let written = match self.modified_content(strategy, body, &ctx).await {
                    Ok(info) => finalize::write_modified_content(
                        outgoing.clone(),
                        info,
                        &ctx.request,
                        &ctx.proxy_response,
                        &self.hooks,
                    ),
                    Err(error) => Err(error),
                };
                match written {
                    Ok(response) => response,
                    Err(error) => self.fail(error, &ctx.request, &ctx.proxy_response, outgoing).await,
                }
            }
        };

        metrics::record_request(strategy.as_str(), response.status().as_u16(), start);
        response
    }

    /// Respond to a request whose upstream call never produced a response.
    pub async fn handle_upstream_failure(
        &self,
        request: Arc<ParsedRequest>,
        error: ProxyError,
    ) -> Response {
        let start = Instant::now();
        let upstream = Arc::new(ProxyResponseSnapshot::with_status(error.status_code()));
        let outgoing = OutgoingResponse::from_upstream(&upstream);
        let response = self.fail(error, &request, &upstream, outgoing).await;
        metrics::record_request("upstream_error", response.status().as_u16(), start);
        response
    }

    async fn modified_content<B>(
        &self,
        strategy: Classification,
        body: B,
        ctx: &HookContext,
    ) -> ProxyResult<ResponseInfo>
    where
        B: hyper::body::Body<Data = Bytes> + Unpin,
        B::Error: std::fmt::Display,
    {
        let body = collector::collect_body(body, self.config.max_response_size_bytes).await?;
        metrics::record_buffered_bytes(body.len());

        let layout_data = extractor::extract_layout_data(
            body,
            ctx,
            &self.hooks,
            self.config.max_response_size_bytes,
        )
        .await?;

        match (strategy, &self.hooks.layout_data_handler, &self.hooks.ssr_handler) {
            (Classification::TransformableLayoutData, Some(handler), _) => {
                handler(layout_data, ctx.clone()).await
            }
            (Classification::TransformableLayoutData, None, _) => {
                Ok(layout_data::response_info(&layout_data, ctx))
            }
            (_, _, Some(handler)) => handler(layout_data, ctx.clone()).await,
            _ => {
                ssr::response_info(
                    layout_data,
                    ctx,
                    self.renderer.as_ref(),
                    &self.hooks,
                    self.config.render_timeout,
                )
                .await
            }
        }
    }

    async fn fail(
        &self,
        error: ProxyError,
        request: &ParsedRequest,
        upstream: &Arc<ProxyResponseSnapshot>,
        outgoing: OutgoingResponse,
    ) -> Response {
        let info = fallback::error_response_info(error, request, upstream, &self.hooks).await;
        finalize::write_error_content(outgoing, info, request, upstream, &self.hooks)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
