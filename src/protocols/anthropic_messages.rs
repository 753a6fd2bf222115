//! Anthropic Messages protocol
//!
//! Streaming uses typed SSE events. Text arrives in `content_block_delta`
//! events with a `text_delta`; usage and the stop reason arrive on
//! `message_delta`. System and developer turns are lifted out of `messages`
//! into the top-level `system` field.

use super::open_responses::expect_schema;
use super::tools::{ToolDialect, ToolsMapper, WebSearchMapper};
use super::{ChunkParser, ContentExtractor, RawResponse, event_type};
use crate::error::{OmniError, Result};
use crate::params::{
    FieldMapper, Mappers, ParameterMapper, RequestBody, parse_structured_output,
};
use crate::params::mapper::unwrap_list;
use crate::registry::Model;
use crate::types::{
    ChunkContent, Content, FinishReason, Param, ParamValue, Parameters, TextInput, Usage,
    UsageField,
};
use serde_json::{Value, json};

pub const MESSAGES_PATH: &str = "/v1/messages";
pub const API_VERSION: &str = "2023-06-01";
/// Beta flag required for `output_format`.
pub const STRUCTURED_OUTPUTS_BETA: &str = "structured-outputs-2025-11-13";
pub const DEFAULT_MAX_TOKENS: u64 = 1024;

const USAGE_FIELDS: &[(&str, UsageField)] = &[
    ("/input_tokens", UsageField::InputTokens),
    ("/output_tokens", UsageField::OutputTokens),
    ("/cache_read_input_tokens", UsageField::CachedTokens),
    ("/cache_creation_input_tokens", UsageField::CacheCreationInputTokens),
];

pub fn init_request(model_id: &str, input: &TextInput, streaming: bool) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));

    let (system, turns): (Vec<_>, Vec<_>) = input
        .conversation()
        .into_iter()
        .partition(|m| m.role == "system" || m.role == "developer");
    if !system.is_empty() {
        let blocks: Vec<Value> = system
            .iter()
            .map(|m| json!({"type": "text", "text": m.content}))
            .collect();
        request.insert("system".into(), Value::Array(blocks));
    }
    request.insert(
        "messages".into(),
        serde_json::to_value(turns).unwrap_or_else(|_| json!([])),
    );
    if streaming {
        request.insert("stream".into(), json!(true));
    }
    request
}

/// Fill `max_tokens`, which the API requires, when the caller left it out.
pub fn finalize_request(request: &mut RequestBody) {
    request
        .entry("max_tokens")
        .or_insert_with(|| json!(DEFAULT_MAX_TOKENS));
}

/// Whether the request needs the structured outputs beta header.
pub fn needs_structured_beta(params: &Parameters) -> bool {
    params.contains(Param::OutputSchema)
}

pub fn mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Temperature, "temperature")),
        Box::new(FieldMapper::new(Param::MaxTokens, "max_tokens")),
        Box::new(FieldMapper::new(Param::TopP, "top_p")),
        Box::new(FieldMapper::new(Param::TopK, "top_k")),
        Box::new(FieldMapper::new(Param::StopSequences, "stop_sequences")),
        Box::new(ThinkingMapper),
        Box::new(OutputFormatMapper),
        Box::new(ToolsMapper::new(ToolDialect::Anthropic)),
        Box::new(WebSearchMapper::new(ToolDialect::Anthropic)),
    ]
}

/// `thinking_budget` → `thinking`; `-1` lets the model decide.
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
            Some(-1) => json!({"type": "auto"}),
            Some(budget) => json!({"type": "enabled", "budget_tokens": budget}),
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

#[derive(Debug, Clone, Copy)]
struct OutputFormatMapper;

impl ParameterMapper for OutputFormatMapper {
    fn name(&self) -> Param {
        Param::OutputSchema
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let schema = expect_schema(&validated)?;
        request.insert(
            "output_format".into(),
            json!({"type": "json_schema", "schema": schema.object_schema()}),
        );
        Ok(())
    }

    fn parse_output(&self, content: Content, value: &ParamValue) -> Result<Content> {
        let schema = expect_schema(value)?;
        parse_structured_output(content, schema, |v| if schema.list { unwrap_list(v) } else { v })
    }
}

fn usage_with_total(raw: &Value) -> Usage {
    let mut usage = Usage::from_mapping(raw, USAGE_FIELDS);
    if let (Some(input), Some(output)) = (usage.input_tokens, usage.output_tokens) {
        usage.total_tokens = Some(input + output);
    }
    usage
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessagesStream;

impl ChunkParser for MessagesStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        if event_type(event) != "content_block_delta"
            || event.pointer("/delta/type").and_then(Value::as_str) != Some("text_delta")
        {
            return Ok(None);
        }
        Ok(event
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(|t| ChunkContent::Text(t.to_string())))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        match event_type(event) {
            "message_delta" | "message_stop" => event.get("usage").map(usage_with_total),
            _ => None,
        }
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        if event_type(event) != "message_delta" {
            return None;
        }
        FinishReason::from_value(event.pointer("/delta/stop_reason"))
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        if event_type(event) != "error" {
            return None;
        }
        let kind = event
            .pointer("/error/type")
            .and_then(Value::as_str)
            .unwrap_or("error");
        let message = event
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        Some(OmniError::Stream(format!("{kind}: {message}")))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        event_type(event) != "content_block_delta"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessagesExtractor;

impl ContentExtractor for MessagesExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("messages")?;
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OmniError::parse("No content in response"))?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        Ok(Content::Text(text))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get("usage"))
            .map(usage_with_total)
            .unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        FinishReason::from_value(response.json()?.get("stop_reason"))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["content"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::params::apply_mappers;
    use crate::streaming::WireEvent;
    use crate::types::{Capability, Message, Provider};

    fn model() -> Model {
        Model::new("claude-sonnet-4-5", Provider::Anthropic, "Claude Sonnet 4.5")
            .capability(Capability::TextGeneration)
            .constraint(Param::ThinkingBudget, Constraint::range_with_specials(1024.0, 64000.0, vec![-1.0]))
            .constraint(Param::MaxTokens, Constraint::Int)
    }

    #[test]
    fn system_turns_move_to_system_field() {
        let input = TextInput {
            prompt: "Hi".into(),
            messages: vec![Message::system("Be brief"), Message::assistant("Hello")],
        };
        let request = init_request("claude", &input, true);
        assert_eq!(request["system"], json!([{"type": "text", "text": "Be brief"}]));
        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(request["stream"], true);
    }

    #[test]
    fn max_tokens_default_only_when_absent() {
        let mut request = RequestBody::new();
        finalize_request(&mut request);
        assert_eq!(request["max_tokens"], 1024);

        let mut request = RequestBody::new();
        let params = Parameters::new().with(Param::MaxTokens, 50);
        apply_mappers(&mut request, &mappers(), &params, &model()).unwrap();
        finalize_request(&mut request);
        assert_eq!(request["max_tokens"], 50);
    }

    #[test]
    fn thinking_budget_shapes() {
        let mut request = RequestBody::new();
        let params = Parameters::new().with(Param::ThinkingBudget, -1);
        apply_mappers(&mut request, &mappers(), &params, &model()).unwrap();
        assert_eq!(request["thinking"], json!({"type": "auto"}));

        let mut request = RequestBody::new();
        let params = Parameters::new().with(Param::ThinkingBudget, 2048);
        apply_mappers(&mut request, &mappers(), &params, &model()).unwrap();
        assert_eq!(request["thinking"], json!({"type": "enabled", "budget_tokens": 2048}));
    }

    #[test]
    fn stream_events() {
        let parse = |v: Value| {
            MessagesStream
                .parse_event(WireEvent::Json(v), ChunkContent::Text(String::new()))
        };
        assert!(parse(json!({"type": "message_start", "message": {"id": "m1"}})).unwrap().is_none());

        let text = parse(json!({
            "type": "content_block_delta", "index": 0,
            "delta": {"type": "text_delta", "text": "Hi"}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(text.content.as_text(), Some("Hi"));
        assert!(!MessagesStream.keep_in_metadata(text.event_data().unwrap()));

        let done = parse(json!({
            "type": "message_delta",
            "delta": {"stop_reason": "end_turn"},
            "usage": {"input_tokens": 10, "output_tokens": 5, "cache_read_input_tokens": 4}
        }))
        .unwrap()
        .unwrap();
        let usage = done.usage.unwrap();
        assert_eq!(usage.total_tokens, Some(15));
        assert_eq!(usage.cached_tokens, Some(4));
        assert_eq!(done.finish_reason, Some(FinishReason::new("end_turn")));

        let err = parse(json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Stream error: overloaded_error: Overloaded");
    }

    #[test]
    fn extractor_joins_text_blocks() {
        let response = RawResponse::Json(json!({
            "id": "msg_1",
            "content": [{"type": "text", "text": "4"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 1}
        }));
        assert_eq!(MessagesExtractor.parse_content(&response).unwrap(), Content::Text("4".into()));
        assert_eq!(MessagesExtractor.parse_usage(&response).total_tokens, Some(4));
        assert!(MessagesExtractor
            .parse_content(&RawResponse::Json(json!({"content": []})))
            .is_err());
    }
}
