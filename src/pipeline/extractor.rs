//! Layout data extraction.
//!
//! # Data Flow
//! ```text
//! buffered bytes + content-encoding
//!     → inflate (gzip / zlib / raw deflate) on the blocking pool, capped at the size limit
//!     → JSON parse (failure or null = no layout data)
//!     → optional transform hook (its output replaces the data)
//! ```

use std::io::Read;

use bytes::Bytes;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use serde_json::Value;

use crate::error::{ProxyError, ProxyResult};
use crate::hooks::{HookContext, ProxyHooks};
use crate::http::response::is_compressed_encoding;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode a buffered body into JSON. `Ok(None)` means the body is not usable JSON.
/// Inflated output larger than `limit` bytes is rejected.
pub async fn extract_json(
    body: Bytes,
    content_encoding: Option<&str>,
    limit: usize,
) -> ProxyResult<Option<Value>> {
    let body = match content_encoding {
        Some(encoding) if is_compressed_encoding(encoding) => {
            tracing::debug!(encoding = %encoding, "Layout service response is compressed; decompressing");
            decompress(body, encoding, limit).await?
        }
        _ => body,
    };

    Ok(parse_json(&body))
}

/// Extract the layout data for the current response and apply the transform hook.
pub async fn extract_layout_data(
    body: Bytes,
    ctx: &HookContext,
    hooks: &ProxyHooks,
    limit: usize,
) -> ProxyResult<Value> {
    let upstream = &ctx.proxy_response;
    let data = extract_json(body, upstream.content_encoding(), limit)
        .await?
        .ok_or_else(|| ProxyError::UpstreamDecode {
            status: upstream.status.as_u16(),
            message: upstream.status_message.clone(),
        })?;

    match &hooks.transform_layout_data {
        Some(transform) => transform(data, ctx.clone())
            .await
            .map_err(|e| ProxyError::hook("transform_layout_data", e)),
        None => Ok(data),
    }
}

/// Lenient JSON parse: invalid text and a literal `null` both yield `None`.
pub fn parse_json(bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Upstream body is not valid JSON");
            None
        }
    }
}

async fn decompress(body: Bytes, encoding: &str, limit: usize) -> ProxyResult<Bytes> {
    let encoding = encoding.to_string();
    let inflated = tokio::task::spawn_blocking(move || inflate(&body, limit))
        .await
        .map_err(|e| ProxyError::Decompression {
            encoding: encoding.clone(),
            source: std::io::Error::other(e),
        })?;

    let inflated = inflated.map_err(|source| ProxyError::Decompression { encoding, source })?;
    if inflated.len() > limit {
        tracing::debug!(limit, "Inflated layout service response exceeds the size limit");
        return Err(ProxyError::PayloadTooLarge { limit });
    }
    Ok(Bytes::from(inflated))
}

/// Inflate gzip or zlib data, falling back to raw deflate streams.
/// Reads at most `limit + 1` bytes so an oversized stream is detectable without inflating it all.
fn inflate(body: &[u8], limit: usize) -> std::io::Result<Vec<u8>> {
    let cap = (limit as u64).saturating_add(1);
    let mut out = Vec::new();

    if body.starts_with(&GZIP_MAGIC) {
        MultiGzDecoder::new(body).take(cap).read_to_end(&mut out)?;
        return Ok(out);
    }

    if ZlibDecoder::new(body).take(cap).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    out.clear();
    DeflateDecoder::new(body).take(cap).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::http::request::ParsedRequest;
    use crate::http::response::{OutgoingResponse, ProxyResponseSnapshot};
    use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;

    const LAYOUT: &str = r#"{"sitecore":{"context":{"pageEditing":false},"route":{"name":"home"}}}"#;
    const LIMIT: usize = 1024 * 1024;

    fn gzip(data: &[u8]) -> Bytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    fn zlib(data: &[u8]) -> Bytes {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    fn raw_deflate(data: &[u8]) -> Bytes {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    fn context(status: StatusCode, encoding: Option<&'static str>) -> HookContext {
        let uri: Uri = "/home".parse().unwrap();
        let mut upstream = ProxyResponseSnapshot::with_status(status);
        if let Some(encoding) = encoding {
            upstream
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        let server = OutgoingResponse::from_upstream(&upstream).snapshot();
        HookContext {
            request: Arc::new(ParsedRequest::from_uri(Method::GET, &uri)),
            proxy_response: Arc::new(upstream),
            server_response: Arc::new(server),
        }
    }

    #[tokio::test]
    async fn test_plain_and_compressed_bodies_agree() {
        let expected: Value = serde_json::from_str(LAYOUT).unwrap();

        let plain = extract_json(Bytes::from_static(LAYOUT.as_bytes()), None, LIMIT).await.unwrap();
        let gz = extract_json(gzip(LAYOUT.as_bytes()), Some("gzip"), LIMIT).await.unwrap();
        let zl = extract_json(zlib(LAYOUT.as_bytes()), Some("deflate"), LIMIT).await.unwrap();
        let raw = extract_json(raw_deflate(LAYOUT.as_bytes()), Some("Deflate"), LIMIT).await.unwrap();

        assert_eq!(plain.as_ref(), Some(&expected));
        assert_eq!(gz.as_ref(), Some(&expected));
        assert_eq!(zl.as_ref(), Some(&expected));
        assert_eq!(raw.as_ref(), Some(&expected));
    }

    #[tokio::test]
    async fn test_unknown_encoding_is_not_inflated() {
        let value = extract_json(Bytes::from_static(LAYOUT.as_bytes()), Some("identity"), LIMIT)
            .await
            .unwrap();
        assert!(value.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_compressed_body_fails() {
        let err = extract_json(Bytes::from_static(b"\x1f\x8bnot really gzip"), Some("gzip"), LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Decompression { ref encoding, .. } if encoding == "gzip"));
    }

    #[test]
    fn test_parse_json_is_lenient() {
        assert!(parse_json(b"<html>error</html>").is_none());
        assert!(parse_json(b"null").is_none());
        assert!(parse_json(b"").is_none());
        assert_eq!(parse_json(b"[1,2]"), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_invalid_body_reports_upstream_status() {
        let ctx = context(StatusCode::SERVICE_UNAVAILABLE, None);
        let err = extract_layout_data(Bytes::from_static(b"Service Unavailable"), &ctx, &ProxyHooks::new(), LIMIT)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "could not extract layout data from proxy response (code: 503): Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_transform_replaces_data() {
        let hooks = ProxyHooks::new().transform_layout_data(|mut data, ctx| async move {
            data["sitecore"]["route"]["path"] = json!(ctx.request.path.clone());
            Ok::<_, HookError>(data)
        });
        let ctx = context(StatusCode::OK, Some("gzip"));

        let data = extract_layout_data(gzip(LAYOUT.as_bytes()), &ctx, &hooks, LIMIT)
            .await
            .unwrap();
        assert_eq!(data["sitecore"]["route"]["path"], "/home");
        assert_eq!(data["sitecore"]["route"]["name"], "home");
    }

    #[tokio::test]
    async fn test_transform_failure_is_hook_error() {
        let hooks = ProxyHooks::new()
            .transform_layout_data(|_, _| async move { Err::<Value, HookError>("bad data".into()) });
        let ctx = context(StatusCode::OK, None);

        let err = extract_layout_data(Bytes::from_static(LAYOUT.as_bytes()), &ctx, &hooks, LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Hook { stage: "transform_layout_data", .. }));
    }

    #[tokio::test]
    async fn test_inflated_size_is_capped() {
        // Padding compresses about 1000:1, so the gzip body itself stays small.
        let padded = format!(r#"{{"a":1,"pad":"{}"}}"#, " ".repeat(8 * LIMIT));
        let body = gzip(padded.as_bytes());
        assert!(body.len() < LIMIT);

        let err = extract_json(body, Some("gzip"), LIMIT).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { limit } if limit == LIMIT));
    }

    #[tokio::test]
    async fn test_inflated_size_at_limit_is_accepted() {
        let exact = LAYOUT.len();
        let value = extract_json(zlib(LAYOUT.as_bytes()), Some("deflate"), exact).await.unwrap();
        assert!(value.is_some());

        let err = extract_json(raw_deflate(LAYOUT.as_bytes()), Some("deflate"), exact - 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { .. }));
    }
}
