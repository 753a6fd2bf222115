//! Protocol Adapters
//!
//! One module per wire protocol. Each protocol exposes a [`ChunkParser`] for
//! streaming events and a [`ContentExtractor`] for complete responses, plus
//! the mapper set and request initialization shared by every provider that
//! speaks it. Providers hold their protocol value and delegate to it.

pub mod anthropic_messages;
pub mod binary_audio;
pub mod chat_completions;
pub mod cloud_tts;
pub mod cohere_chat;
pub mod embed_content;
pub mod generate_content;
pub mod gradium_tts;
pub mod images_sse;
pub mod ollama_generate;
pub mod open_responses;
pub mod task_polling;
pub mod tools;

use crate::error::{OmniError, Result};
use crate::streaming::WireEvent;
use crate::types::{Chunk, ChunkContent, Content, FinishReason, Usage};
use bytes::Bytes;
use serde_json::{Map, Value};

/// Parses one wire event into at most one chunk.
pub trait ChunkParser: Send + Sync {
    /// Content carried by a JSON event; `None` when the event has none.
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>>;

    /// Content carried by a raw binary frame.
    fn parse_binary(&self, _data: Bytes) -> Option<ChunkContent> {
        None
    }

    fn parse_usage(&self, _event: &Value) -> Option<Usage> {
        None
    }

    fn parse_finish_reason(&self, _event: &Value) -> Option<FinishReason> {
        None
    }

    /// A terminal error signalled in-band by the event.
    fn parse_error(&self, _event: &Value) -> Option<OmniError> {
        None
    }

    /// Whether the event is kept in the final output's `raw_events`.
    fn keep_in_metadata(&self, _event: &Value) -> bool {
        true
    }

    /// Turn one event into a chunk, or `None` to filter it.
    ///
    /// An event with no content but with usage or a finish reason becomes a
    /// chunk carrying `empty`.
    fn parse_event(&self, event: WireEvent, empty: ChunkContent) -> Result<Option<Chunk>> {
        let value = match event {
            WireEvent::Binary(data) => {
                return Ok(self.parse_binary(data).map(Chunk::new));
            }
            WireEvent::Json(value) => value,
        };
        if let Some(err) = self.parse_error(&value) {
            return Err(err);
        }
        let usage = self.parse_usage(&value).filter(|u| !u.is_empty());
        let finish_reason = self.parse_finish_reason(&value);
        let content = match self.parse_content(&value)? {
            Some(content) => content,
            None if usage.is_none() && finish_reason.is_none() => return Ok(None),
            None => empty,
        };
        let mut metadata = Map::new();
        metadata.insert("event_data".into(), value);
        Ok(Some(Chunk {
            content,
            finish_reason,
            usage,
            metadata,
        }))
    }
}

/// A complete provider response.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Json(Value),
    Binary {
        data: Bytes,
        content_type: Option<String>,
    },
}

impl RawResponse {
    pub fn json(&self) -> Option<&Value> {
        match self {
            RawResponse::Json(v) => Some(v),
            RawResponse::Binary { .. } => None,
        }
    }

    /// The JSON body, or a parse error naming `what` was expected.
    pub fn expect_json(&self, what: &str) -> Result<&Value> {
        self.json()
            .ok_or_else(|| OmniError::parse(format!("Expected JSON {what} response, got binary body")))
    }
}

/// Extracts typed content, usage and finish reason from a complete response.
pub trait ContentExtractor: Send + Sync {
    /// Fails with `ResponseParse` when the expected content is absent.
    fn parse_content(&self, response: &RawResponse) -> Result<Content>;

    fn parse_usage(&self, _response: &RawResponse) -> Usage {
        Usage::default()
    }

    fn parse_finish_reason(&self, _response: &RawResponse) -> Option<FinishReason> {
        None
    }

    /// Top-level keys removed from `raw_response` in the output metadata.
    fn content_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Extra metadata entries taken from the response.
    fn extra_metadata(&self, _response: &RawResponse) -> Map<String, Value> {
        Map::new()
    }

    /// `raw_response` with the content fields removed, plus extra entries.
    fn build_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        let mut metadata = self.extra_metadata(response);
        if let Some(Value::Object(obj)) = response.json() {
            let fields = self.content_fields();
            let filtered: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| !fields.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            metadata.insert("raw_response".into(), Value::Object(filtered));
        }
        metadata
    }
}

/// First element of the JSON array at `key`, or a parse error.
pub(crate) fn first_of<'a>(value: &'a Value, key: &str, missing: &str) -> Result<&'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .ok_or_else(|| OmniError::parse(missing.to_string()))
}

/// Event `type` discriminator, empty when absent.
pub(crate) fn event_type(event: &Value) -> &str {
    event.get("type").and_then(Value::as_str).unwrap_or_default()
}
