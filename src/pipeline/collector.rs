//! Bounded response body buffering.
//!
//! # Design Decisions
//! - The size check runs before a chunk is appended, so the buffer never exceeds the limit
//! - Exceeding the limit stops reading the upstream body; the rest is never pulled
//! - No decompression here; the extractor owns transcoding

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;

use crate::error::{ProxyError, ProxyResult};

/// Accumulates body chunks in arrival order up to a byte limit.
#[derive(Debug)]
pub struct BodyCollector {
    output: BytesMut,
    limit: usize,
}

impl BodyCollector {
    pub fn new(limit: usize) -> Self {
        Self {
            output: BytesMut::new(),
            limit,
        }
    }

    /// Append a raw chunk. Fails, leaving the buffer untouched, if the total would exceed the limit.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> ProxyResult<()> {
        let total = self.output.len().saturating_add(chunk.len());
        if total > self.limit {
            return Err(ProxyError::PayloadTooLarge { limit: self.limit });
        }
        self.output.extend_from_slice(chunk);
        Ok(())
    }

    /// Append a text chunk as UTF-8.
    pub fn push_text(&mut self, chunk: &str) -> ProxyResult<()> {
        self.push_bytes(chunk.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.output.freeze()
    }
}

/// Read a whole body frame by frame, failing as soon as it exceeds `limit` bytes.
pub async fn collect_body<B>(mut body: B, limit: usize) -> ProxyResult<Bytes>
where
    B: hyper::body::Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let mut collector = BodyCollector::new(limit);

    while let Some(frame) = body.frame().await {
        let frame =
            frame.map_err(|e| ProxyError::Upstream(format!("failed to read upstream body: {e}")))?;
        if let Ok(data) = frame.into_data() {
            collector.push_bytes(&data)?;
        }
    }

    Ok(collector.into_bytes())
}
