//! Newline-delimited JSON streams

use super::WireEvent;
use crate::error::OmniError;
use bytes::Bytes;
use futures::Stream;
use futures_util::{StreamExt, TryStreamExt};
use serde_json::Value;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

/// Split a byte stream into lines and parse each non-empty line as JSON.
pub fn stream_ndjson_values<S, E>(
    byte_stream: S,
    label: &'static str,
) -> impl Stream<Item = Result<WireEvent, OmniError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = StreamReader::new(
        byte_stream.map_err(|e| std::io::Error::other(e.to_string())),
    );
    let mut lines = FramedRead::new(reader, LinesCodec::new());

    async_stream::stream! {
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    yield Err(OmniError::Stream(format!("NDJSON stream error ({label}): {e}")));
                    return;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(v) => yield Ok(WireEvent::Json(v)),
                Err(e) => {
                    yield Err(OmniError::parse(format!("Failed to parse NDJSON ({label}): {e}")));
                    return;
                }
            }
        }
    }
}

/// Parse a complete NDJSON body and return its last JSON line.
pub fn last_ndjson_value(body: &str) -> Result<Value, OmniError> {
    let line = body
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| OmniError::parse("Empty NDJSON response"))?;
    Ok(serde_json::from_str(line.trim())?)
}
