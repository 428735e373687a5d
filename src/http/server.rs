//! HTTP server setup and upstream forwarding.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Rewrite the request path and forward to the upstream host
//! - Limit `accept-encoding` on requests whose response will be decoded here
//! - Hand the upstream response to the pipeline
//! - Serve until the shutdown signal fires

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, request, HeaderValue, Request, Uri},
    response::Response,
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ProxyConfig, ResolvedConfig};
use crate::error::{ConfigurationError, ProxyError, ProxyResult};
use crate::hooks::ProxyHooks;
use crate::http::request::{ParsedRequest, X_REQUEST_ID};
use crate::http::response::remove_hop_by_hop_headers;
use crate::pipeline::Pipeline;
use crate::render::AppRenderer;
use crate::routing::{classify, Classification, DefaultPathRewriter, RequestPathRewriter};

/// Encodings the extractor can inflate.
const DECODABLE_ENCODINGS: &str = "gzip, deflate";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub rewriter: Arc<dyn RequestPathRewriter>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the layout proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ResolvedConfig>,
}

impl HttpServer {
    /// Create a server. Fails if the configuration and hooks conflict.
    pub fn new<R>(config: &ProxyConfig, hooks: ProxyHooks, renderer: R) -> Result<Self, ConfigurationError>
    where
        R: AppRenderer + 'static,
    {
        let resolved = Arc::new(ResolvedConfig::resolve(config, &hooks)?);
        tracing::debug!(config = ?resolved, hooks = ?hooks, "Resolved proxy configuration");

        let rewriter: Arc<dyn RequestPathRewriter> = match &hooks.path_rewriter {
            Some(rewriter) => Arc::clone(rewriter),
            None => Arc::new(DefaultPathRewriter),
        };

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(resolved.connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            pipeline: Pipeline::new(Arc::clone(&resolved), Arc::new(hooks), Arc::new(renderer)),
            rewriter,
            client,
        };

        let router = Self::build_router(&resolved, state);
        Ok(Self {
            router,
            config: resolved,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ResolvedConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(config.request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream_authority,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the resolved config.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Rewrites the path, forwards the request, and runs the response pipeline.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let parsed = Arc::new(ParsedRequest::from_parts(&parts));
    let config = state.pipeline.config();

    let path = match state.rewriter.rewrite(
        &parsed.url,
        &parsed,
        config,
        state.pipeline.hooks().route_parser.as_ref(),
    ) {
        Ok(path) => path,
        Err(error) => return state.pipeline.handle_upstream_failure(parsed, error).await,
    };

    tracing::debug!(
        request_id = %parsed.request_id(),
        method = %parsed.method,
        url = %parsed.url,
        upstream_path = %path,
        "Proxying request"
    );

    // A custom classifier only sees the response, so the request side uses the default decision.
    let buffered = classify(&parsed.url, config) != Classification::Pipeable;
    let upstream_request = match build_upstream_request(&parts, body, &path, config, buffered) {
        Ok(request) => request,
        Err(error) => return state.pipeline.handle_upstream_failure(parsed, error).await,
    };

    match state.client.request(upstream_request).await {
        Ok(response) => state.pipeline.handle_proxy_response(parsed, response).await,
        Err(e) => {
            let error = ProxyError::Upstream(e.to_string());
            state.pipeline.handle_upstream_failure(parsed, error).await
        }
    }
}

/// Target the upstream host with the rewritten path, changing the origin.
/// `buffered` requests only advertise encodings the extractor can inflate.
fn build_upstream_request(
    parts: &request::Parts,
    body: Body,
    path: &str,
    config: &ResolvedConfig,
    buffered: bool,
) -> ProxyResult<Request<Body>> {
    let path = format!("{}{}", config.upstream_path_prefix, path);
    let uri = Uri::builder()
        .scheme(config.upstream_scheme.clone())
        .authority(config.upstream_authority.clone())
        .path_and_query(path.as_str())
        .build()
        .map_err(|e| ProxyError::InvalidUpstreamRequest(format!("'{path}': {e}")))?;

    let mut headers = parts.headers.clone();
    remove_hop_by_hop_headers(&mut headers);
    if buffered && headers.contains_key(header::ACCEPT_ENCODING) {
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static(DECODABLE_ENCODINGS),
        );
    }
    let host = HeaderValue::from_str(config.upstream_authority.as_str())
        .map_err(|e| ProxyError::InvalidUpstreamRequest(e.to_string()))?;
    headers.insert(header::HOST, host);

    let mut upstream = Request::new(body);
    *upstream.method_mut() = parts.method.clone();
    *upstream.uri_mut() = uri;
    *upstream.headers_mut() = headers;
    Ok(upstream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn resolved() -> ResolvedConfig {
        let mut config = ProxyConfig::default();
        config.upstream.api_host = "http://cd.example.com:8080".into();
        config.upstream.api_key = "KEY".into();
        ResolvedConfig::resolve(&config, &ProxyHooks::new()).unwrap()
    }

    #[test]
    fn test_upstream_request_changes_origin() {
        let (parts, body) = Request::builder()
            .method(Method::POST)
            .uri("/home")
            .header(header::HOST, "www.example.com")
            .header(header::CONNECTION, "keep-alive")
            .header(X_REQUEST_ID, "abc")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let upstream = build_upstream_request(
            &parts,
            body,
            "/sitecore/api/layout/render/jss?item=/home&sc_apikey=KEY",
            &resolved(),
            true,
        )
        .unwrap();

        assert_eq!(upstream.method(), &Method::POST);
        assert_eq!(
            upstream.uri().to_string(),
            "http://cd.example.com:8080/sitecore/api/layout/render/jss?item=/home&sc_apikey=KEY"
        );
        assert_eq!(upstream.headers().get(header::HOST).unwrap(), "cd.example.com:8080");
        assert_eq!(upstream.headers().get(X_REQUEST_ID).unwrap(), "abc");
        assert!(upstream.headers().get(header::CONNECTION).is_none());
    }

    #[test]
    fn test_invalid_rewritten_path() {
        let (parts, body) = Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = build_upstream_request(&parts, body, "/bad path with spaces", &resolved(), true)
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidUpstreamRequest(_)));
    }

    #[test]
    fn test_accept_encoding_limited_when_buffered() {
        let parts = || {
            Request::builder()
                .uri("/home")
                .header(header::ACCEPT_ENCODING, "gzip, deflate, br, zstd")
                .body(Body::empty())
                .unwrap()
                .into_parts()
        };

        let (head, body) = parts();
        let buffered = build_upstream_request(&head, body, "/home", &resolved(), true).unwrap();
        assert_eq!(buffered.headers()[header::ACCEPT_ENCODING], "gzip, deflate");

        let (head, body) = parts();
        let piped = build_upstream_request(&head, body, "/home", &resolved(), false).unwrap();
        assert_eq!(piped.headers()[header::ACCEPT_ENCODING], "gzip, deflate, br, zstd");
    }

    #[test]
    fn test_upstream_path_prefix_is_kept() {
        let mut config = ProxyConfig::default();
        config.upstream.api_host = "http://cd.example.com/base/".into();
        config.upstream.api_key = "KEY".into();
        let resolved = ResolvedConfig::resolve(&config, &ProxyHooks::new()).unwrap();

        let (parts, body) = Request::builder()
            .uri("/home")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let upstream = build_upstream_request(&parts, body, "/home?x=1", &resolved, true).unwrap();
        assert_eq!(upstream.uri().to_string(), "http://cd.example.com/base/home?x=1");
    }
}
