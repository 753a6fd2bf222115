//! Cohere Chat v2 protocol
//!
//! Streams `content-delta` events for text and closes with `message-end`
//! (usage and finish reason under `delta`). Older deployments send a
//! `stream-end` event with the same data at the top level.

use super::open_responses::expect_schema;
use super::{ChunkParser, ContentExtractor, RawResponse, event_type};
use crate::error::{OmniError, Result};
use crate::params::mapper::unwrap_list;
use crate::params::{FieldMapper, Mappers, ParameterMapper, RequestBody, parse_structured_output};
use crate::registry::Model;
use crate::types::{
    ChunkContent, Content, FinishReason, Param, ParamValue, TextInput, Usage, UsageField,
};
use serde_json::{Value, json};

pub const CHAT_PATH: &str = "/v2/chat";

const USAGE_FIELDS: &[(&str, UsageField)] = &[
    ("/billed_units/input_tokens", UsageField::InputTokens),
    ("/billed_units/output_tokens", UsageField::OutputTokens),
    ("/tokens/output_tokens", UsageField::TotalTokens),
    ("/cached_tokens", UsageField::CachedTokens),
];

pub fn init_request(model_id: &str, input: &TextInput, streaming: bool) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    request.insert(
        "messages".into(),
        serde_json::to_value(input.conversation()).unwrap_or_else(|_| json!([])),
    );
    if streaming {
        request.insert("stream".into(), json!(true));
    }
    request
}

pub fn mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Temperature, "temperature")),
        Box::new(FieldMapper::new(Param::MaxTokens, "max_tokens")),
        Box::new(FieldMapper::new(Param::Seed, "seed")),
        Box::new(ThinkingMapper),
        Box::new(JsonObjectMapper),
    ]
}

/// `thinking_budget`: `-1` enables with no budget, `0` disables.
#[derive(Debug, Clone, Copy)]
struct ThinkingMapper;

impl ParameterMapper for ThinkingMapper {
    fn name(&self) -> Param {
        Param::ThinkingBudget
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let thinking = match validated.as_i64() {
            Some(-1) => json!({"type": "enabled"}),
            Some(0) => json!({"type": "disabled"}),
            Some(budget) => json!({"type": "enabled", "token_budget": budget}),
            None => {
                return Err(OmniError::constraint(format!(
                    "thinking_budget must be an integer, got {}",
                    validated.type_name()
                )));
            }
        };
        request.insert("thinking".into(), thinking);
        Ok(())
    }
}

/// `output_schema` → `response_format` JSON object with schema.
#[derive(Debug, Clone, Copy)]
struct JsonObjectMapper;

impl ParameterMapper for JsonObjectMapper {
    fn name(&self) -> Param {
        Param::OutputSchema
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let schema = expect_schema(&validated)?;
        request.insert(
            "response_format".into(),
            json!({"type": "json_object", "schema": schema.object_schema()}),
        );
        Ok(())
    }

    fn parse_output(&self, content: Content, value: &ParamValue) -> Result<Content> {
        let schema = expect_schema(value)?;
        parse_structured_output(content, schema, |v| if schema.list { unwrap_list(v) } else { v })
    }
}

/// Usage counts only when billed input or output tokens are present.
fn usage_from(raw: &Value) -> Option<Usage> {
    let usage = Usage::from_mapping(raw, USAGE_FIELDS);
    (usage.input_tokens.is_some() || usage.output_tokens.is_some()).then_some(usage)
}

/// The object holding usage and finish reason for a terminal event.
fn terminal_payload(event: &Value) -> Option<&Value> {
    match event_type(event) {
        "message-end" => event.get("delta"),
        "stream-end" => Some(event),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CohereStream;

impl ChunkParser for CohereStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        if event_type(event) != "content-delta" {
            return Ok(None);
        }
        Ok(event
            .pointer("/delta/message/content/text")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(|t| ChunkContent::Text(t.to_string())))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        terminal_payload(event)?.get("usage").and_then(usage_from)
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        FinishReason::from_value(terminal_payload(event)?.get("finish_reason"))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        terminal_payload(event).is_some()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CohereExtractor;

impl ContentExtractor for CohereExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("chat")?;
        let text = body
            .pointer("/message/content/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| OmniError::parse("No content in response message"))?;
        Ok(Content::Text(text.to_string()))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get("usage"))
            .and_then(usage_from)
            .unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        FinishReason::from_value(response.json()?.get("finish_reason"))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["message"]
    }
}
