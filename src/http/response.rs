//! Response snapshots and outgoing header handling.
//!
//! # Responsibilities
//! - Snapshot the upstream response once its head is known (read-only view for hooks)
//! - Copy upstream status and end-to-end headers onto the outgoing response
//! - Scrub the empty analytics cookie the backend emits on alternate responses
//!
//! # Design Decisions
//! - Snapshots are plain values; nothing a hook receives can reach the transport
//! - Hop-by-hop headers are never forwarded in either direction
//! - The outgoing response stays a mutable head until the finalizer writes it

use axum::body::Body;
use axum::http::{header, response, HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use axum::response::Response;

/// Analytics cookie the backend sometimes sends with an empty value.
pub const ANALYTICS_COOKIE: &str = "SC_ANALYTICS_GLOBAL_COOKIE";

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Read-only view of the upstream response head.
#[derive(Debug, Clone)]
pub struct ProxyResponseSnapshot {
    pub status: StatusCode,
    /// Reason phrase sent by the upstream, or the canonical one.
    pub status_message: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ProxyResponseSnapshot {
    /// Snapshot the head of an upstream response.
    pub fn from_parts(parts: &response::Parts) -> Self {
        let status_message = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .or_else(|| parts.status.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            status: parts.status,
            status_message,
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }

    /// Snapshot with the given status and no headers.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    /// Value of the upstream `content-encoding` header.
    pub fn content_encoding(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
    }
}

/// Read-only view of the outgoing response as hooks may observe it.
#[derive(Debug, Clone)]
pub struct ServerResponseSnapshot {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Mutable head of the response that will be written to the client.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl OutgoingResponse {
    /// Start the outgoing response from the upstream head: same status, end-to-end headers only.
    pub fn from_upstream(upstream: &ProxyResponseSnapshot) -> Self {
        let mut headers = upstream.headers.clone();
        remove_hop_by_hop_headers(&mut headers);
        remove_empty_analytics_cookie(&mut headers);
        Self {
            status: upstream.status,
            headers,
        }
    }

    /// Freeze the current head for hooks.
    pub fn snapshot(&self) -> ServerResponseSnapshot {
        ServerResponseSnapshot {
            status: self.status,
            headers: self.headers.clone(),
        }
    }

    /// Set a header, ignoring names or values that are not valid HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }

    /// Attach a body and produce the final response.
    pub fn into_response(self, body: Body) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Strip hop-by-hop headers, including any listed in `connection`.
pub fn remove_hop_by_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// True when a `content-encoding` value names gzip or deflate (case-insensitive, compound-tolerant).
pub fn is_compressed_encoding(encoding: &str) -> bool {
    let encoding = encoding.to_ascii_lowercase();
    encoding.contains("gzip") || encoding.contains("deflate")
}

/// Drop the analytics cookie from `set-cookie` when the backend sent it with an empty value,
/// so the client keeps the cookie it already has.
pub fn remove_empty_analytics_cookie(headers: &mut HeaderMap) {
    let cookies: Vec<HeaderValue> = headers.get_all(header::SET_COOKIE).iter().cloned().collect();

    let Some(index) = cookies
        .iter()
        .position(|c| cookie_name_value(c).is_some_and(|(name, _)| name == ANALYTICS_COOKIE))
    else {
        return;
    };

    if !cookie_name_value(&cookies[index]).is_some_and(|(_, value)| value.is_empty()) {
        return;
    }

    headers.remove(header::SET_COOKIE);
    for (i, cookie) in cookies.into_iter().enumerate() {
        if i != index {
            headers.append(header::SET_COOKIE, cookie);
        }
    }
}

fn cookie_name_value(cookie: &HeaderValue) -> Option<(&str, &str)> {
    let raw = cookie.to_str().ok()?;
    let pair = raw.split(';').next().unwrap_or_default();
    let (name, value) = pair.split_once('=')?;
    Some((name.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(headers: &[(&str, &str)]) -> ProxyResponseSnapshot {
        let mut snapshot = ProxyResponseSnapshot::with_status(StatusCode::OK);
        for (name, value) in headers {
            snapshot.headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        snapshot
    }

    #[test]
    fn test_empty_analytics_cookie_removed() {
        let mut headers = upstream(&[
            ("set-cookie", "ASP.NET_SessionId=abc; path=/"),
            ("set-cookie", "SC_ANALYTICS_GLOBAL_COOKIE=; expires=Tue, 01 Jan 2030 00:00:00 GMT"),
        ])
        .headers;

        remove_empty_analytics_cookie(&mut headers);

        let cookies: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0], "ASP.NET_SessionId=abc; path=/");
    }

    #[test]
    fn test_non_empty_analytics_cookie_preserved() {
        let mut headers = upstream(&[(
            "set-cookie",
            "SC_ANALYTICS_GLOBAL_COOKIE=5f2a|True; path=/; HttpOnly",
        )])
        .headers;

        remove_empty_analytics_cookie(&mut headers);

        assert_eq!(
            headers.get(header::SET_COOKIE).unwrap(),
            "SC_ANALYTICS_GLOBAL_COOKIE=5f2a|True; path=/; HttpOnly"
        );
    }

    #[test]
    fn test_outgoing_copies_end_to_end_headers() {
        let snapshot = upstream(&[
            ("content-type", "application/json"),
            ("connection", "keep-alive, x-internal"),
            ("x-internal", "secret"),
            ("transfer-encoding", "chunked"),
            ("cache-control", "no-cache"),
        ]);

        let outgoing = OutgoingResponse::from_upstream(&snapshot);

        assert_eq!(outgoing.status, StatusCode::OK);
        assert_eq!(outgoing.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(outgoing.headers.get("cache-control").unwrap(), "no-cache");
        assert!(outgoing.headers.get("connection").is_none());
        assert!(outgoing.headers.get("x-internal").is_none());
        assert!(outgoing.headers.get("transfer-encoding").is_none());
    }

    #[test]
    fn test_compressed_encoding_detection() {
        assert!(is_compressed_encoding("gzip"));
        assert!(is_compressed_encoding("GZIP"));
        assert!(is_compressed_encoding("deflate, identity"));
        assert!(!is_compressed_encoding("br"));
        assert!(!is_compressed_encoding("identity"));
    }
}
