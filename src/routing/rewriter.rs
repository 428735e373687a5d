//! Request path rewriting.
//!
//! Turns an application route (`/products/shoes?color=red`) into a layout
//! service call on the backend:
//!
//! ```text
//! <layout_service_route>?item=<route>&sc_apikey=<key>[&sc_lang=<lang>][&<query>]
//! ```
//!
//! # Design Decisions
//! - The incoming path is percent-decoded exactly once, before any matching
//! - Excluded paths and paths already aimed at the layout service are returned verbatim
//! - Malformed input never fails; only a failing route parser does

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::ResolvedConfig;
use crate::error::{HookError, ProxyError, ProxyResult};
use crate::http::request::ParsedRequest;
use crate::routing::matcher::decode_url;

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Item routes additionally keep their path separators readable.
const ITEM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'/');

/// Output of a user route parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRewriteResult {
    /// Backend item path; empty or absent means the site root.
    pub sitecore_route: Option<String>,
    pub lang: Option<String>,
    /// Extra query string for the layout service call.
    pub qs_params: Option<String>,
}

/// User function translating a decoded application URL into backend route parameters.
/// `Ok(None)` leaves the route untouched.
pub type RouteUrlParser =
    Arc<dyn Fn(&str) -> Result<Option<RouteRewriteResult>, HookError> + Send + Sync>;

/// Maps an incoming request path to the path requested from the backend.
pub trait RequestPathRewriter: Send + Sync {
    fn rewrite(
        &self,
        request_path: &str,
        request: &ParsedRequest,
        config: &ResolvedConfig,
        route_parser: Option<&RouteUrlParser>,
    ) -> ProxyResult<String>;
}

/// The standard layout service rewriter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPathRewriter;

impl RequestPathRewriter for DefaultPathRewriter {
    fn rewrite(
        &self,
        request_path: &str,
        request: &ParsedRequest,
        config: &ResolvedConfig,
        route_parser: Option<&RouteUrlParser>,
    ) -> ProxyResult<String> {
        rewrite_request_path(request_path, request, config, route_parser)
    }
}

impl<F> RequestPathRewriter for F
where
    F: Fn(&str, &ParsedRequest, &ResolvedConfig, Option<&RouteUrlParser>) -> ProxyResult<String>
        + Send
        + Sync,
{
    fn rewrite(
        &self,
        request_path: &str,
        request: &ParsedRequest,
        config: &ResolvedConfig,
        route_parser: Option<&RouteUrlParser>,
    ) -> ProxyResult<String> {
        self(request_path, request, config, route_parser)
    }
}

/// Rewrite an application request path into a layout service request path.
pub fn rewrite_request_path(
    request_path: &str,
    request: &ParsedRequest,
    config: &ResolvedConfig,
    route_parser: Option<&RouteUrlParser>,
) -> ProxyResult<String> {
    let decoded = decode_url(request_path);

    if config.is_excluded(&decoded) {
        tracing::debug!(
            url = %decoded,
            exclusion = ?config.exclusion,
            "URL matched the rewrite exclusion; proxying verbatim"
        );
        return Ok(request_path.to_string());
    }

    if decoded.contains(&config.layout_service_route) {
        return Ok(request_path.to_string());
    }

    tracing::debug!(url = %decoded, "Rewriting URL as a layout service request");

    let mut route = decoded.clone();
    let mut query: Vec<String> = Vec::new();

    if let Some(index) = route.find('?') {
        let qs = build_query_string(&request.query);
        if !qs.is_empty() {
            query.push(qs);
        }
        route.truncate(index);
    }

    if let Some(qs) = &config.qs_params {
        query.push(qs.clone());
    }

    let mut lang = None;
    if let Some(parser) = route_parser {
        let parsed = parser(&decoded).map_err(|e| ProxyError::hook("parse_route_url", e))?;
        if let Some(params) = parsed {
            tracing::debug!(url = %decoded, result = ?params, "Route URL parsed");

            route = params
                .sitecore_route
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "/".to_string());
            if !route.starts_with('/') {
                route.insert(0, '/');
            }
            lang = params.lang.filter(|l| !l.is_empty());
            if let Some(qs) = params.qs_params.filter(|q| !q.is_empty()) {
                query.push(qs);
            }
        }
    }

    let mut path = format!(
        "{}?item={}&sc_apikey={}",
        config.layout_service_route,
        utf8_percent_encode(&route, ITEM_ENCODE_SET),
        config.api_key
    );

    if let Some(lang) = lang {
        path.push_str("&sc_lang=");
        path.push_str(&lang);
    }

    if !query.is_empty() {
        path.push('&');
        path.push_str(&query.join("&"));
    }

    Ok(path)
}

/// Serialize query parameters as `key=value&...`, preserving their order.
pub fn build_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, COMPONENT_ENCODE_SET),
                utf8_percent_encode(value, COMPONENT_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
