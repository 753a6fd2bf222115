//! SSE JSON streaming helpers
//!
//! Converts a byte stream into JSON [`WireEvent`]s by parsing SSE `data:`
//! payloads, one JSON object per SSE message. Protocol adapters interpret the
//! resulting objects.

use super::WireEvent;
use crate::error::OmniError;
use eventsource_stream::Eventsource;
use futures::Stream;
use futures_util::StreamExt;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SseJsonStreamConfig {
    /// Label used in error messages (e.g. "anthropic" / "openai images").
    pub label: String,
    /// SSE `data` payloads that indicate end-of-stream and should be ignored.
    pub done_markers: Vec<String>,
}

impl SseJsonStreamConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            done_markers: vec!["[DONE]".to_string()],
        }
    }
}

/// Parse SSE `data:` payloads into JSON events.
///
/// - Ignores empty payloads and configurable done markers.
/// - Skips payloads that are not JSON (keep-alives, vendor pings).
/// - Copies the SSE event name into a missing `type` field.
pub fn stream_sse_json_values<S, B, E>(
    byte_stream: S,
    cfg: SseJsonStreamConfig,
) -> impl Stream<Item = Result<WireEvent, OmniError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let SseJsonStreamConfig {
        label,
        done_markers,
    } = cfg;

    async_stream::stream! {
        let mut sse_stream = byte_stream.eventsource();

        while let Some(item) = sse_stream.next().await {
            let event = match item {
                Ok(ev) => ev,
                Err(e) => {
                    yield Err(OmniError::Stream(format!("SSE stream error ({label}): {e}")));
                    return;
                }
            };

            let data = event.data.trim();
            if data.is_empty() || done_markers.iter().any(|m| m == data) {
                continue;
            }

            let mut payload: Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(%label, error = %e, "skipping non-JSON SSE payload");
                    continue;
                }
            };

            if let Value::Object(obj) = &mut payload
                && !obj.contains_key("type")
                && !event.event.is_empty()
                && event.event != "message"
            {
                obj.insert("type".into(), Value::String(event.event.clone()));
            }

            yield Ok(WireEvent::Json(payload));
        }
    }
}
