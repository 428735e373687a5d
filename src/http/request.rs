//! Request snapshot handed to the rewriter, classifier and user hooks.
//!
//! # Responsibilities
//! - Capture the original URL (path + query) exactly as the client sent it
//! - Parse the query string once into ordered key/value pairs
//! - Carry the request ID assigned by the request-id layer
//!
//! # Design Decisions
//! - Snapshot is a plain value; hooks never see the live transport request
//! - The original URL is kept encoded; decoding is the rewriter's job

use axum::http::{request, HeaderMap, Method, Uri, Version};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Immutable view of an inbound client request.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: Method,
    pub version: Version,
    /// Path and query as received, still percent-encoded.
    pub url: String,
    /// Path component of `url`.
    pub path: String,
    /// Query parameters in the order they appeared.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl ParsedRequest {
    /// Build a snapshot from request parts.
    pub fn from_parts(parts: &request::Parts) -> Self {
        let mut parsed = Self::from_uri(parts.method.clone(), &parts.uri);
        parsed.version = parts.version;
        parsed.headers = parts.headers.clone();
        parsed
    }

    /// Build a snapshot from a method and URI alone (no headers).
    pub fn from_uri(method: Method, uri: &Uri) -> Self {
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            method,
            version: Version::HTTP_11,
            url,
            path: uri.path().to_string(),
            query,
            headers: HeaderMap::new(),
        }
    }

    /// Request ID assigned by the request-id layer, if any.
    pub fn request_id(&self) -> &str {
        self.headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_query_in_order() {
        let uri: Uri = "/products/shoes?size=42&color=red%20dark&size=43".parse().unwrap();
        let parsed = ParsedRequest::from_uri(Method::GET, &uri);

        assert_eq!(parsed.url, "/products/shoes?size=42&color=red%20dark&size=43");
        assert_eq!(parsed.path, "/products/shoes");
        assert_eq!(
            parsed.query,
            vec![
                ("size".to_string(), "42".to_string()),
                ("color".to_string(), "red dark".to_string()),
                ("size".to_string(), "43".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_id_from_headers() {
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        parts.headers.insert(X_REQUEST_ID, "abc-123".parse().unwrap());

        let parsed = ParsedRequest::from_parts(&parts);
        assert_eq!(parsed.request_id(), "abc-123");
        assert!(parsed.query.is_empty());
    }
}
