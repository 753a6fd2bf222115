//! Responses API protocol (OpenAI, xAI)
//!
//! Streaming events are typed by `type`: text arrives as
//! `response.output_text.delta`, usage and the terminal status on
//! `response.completed`, and failures as `type: "error"` events.

use super::tools::{ToolDialect, ToolsMapper, WebSearchMapper};
use super::{ChunkParser, ContentExtractor, RawResponse, event_type};
use crate::error::{OmniError, Result};
use crate::params::{
    FieldMapper, Mappers, NestedFieldMapper, ParameterMapper, RequestBody, object_entry,
    parse_structured_output,
};
use crate::params::mapper::unwrap_list;
use crate::registry::Model;
use crate::types::{
    ChunkContent, Content, FinishReason, Param, ParamValue, TextInput, Usage, UsageField,
};
use serde_json::{Value, json};

pub const RESPONSES_PATH: &str = "/v1/responses";

const USAGE_FIELDS: &[(&str, UsageField)] = &[
    ("/input_tokens", UsageField::InputTokens),
    ("/output_tokens", UsageField::OutputTokens),
    ("/total_tokens", UsageField::TotalTokens),
    ("/input_tokens_details/cached_tokens", UsageField::CachedTokens),
    ("/output_tokens_details/reasoning_tokens", UsageField::ReasoningTokens),
];

/// Request skeleton: model, conversation input and the stream flag.
pub fn init_request(model_id: &str, input: &TextInput, streaming: bool) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    let input_value = if input.messages.is_empty() {
        json!([{
            "role": "user",
            "content": [{"type": "input_text", "text": input.prompt}],
        }])
    } else {
        serde_json::to_value(input.conversation()).unwrap_or_else(|_| json!([]))
    };
    request.insert("input".into(), input_value);
    if streaming {
        request.insert("stream".into(), json!(true));
    }
    request
}

/// Mapper set shared by every Responses API provider.
pub fn mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Temperature, "temperature")),
        Box::new(FieldMapper::new(Param::MaxTokens, "max_output_tokens")),
        Box::new(NestedFieldMapper::new(Param::ReasoningEffort, &["reasoning", "effort"])),
        Box::new(NestedFieldMapper::new(Param::ThinkingBudget, &["reasoning", "effort"])),
        Box::new(NestedFieldMapper::new(Param::Verbosity, &["text", "verbosity"])),
        Box::new(TextFormatMapper),
        Box::new(ToolsMapper::new(ToolDialect::OpenResponses)),
        Box::new(WebSearchMapper::new(ToolDialect::OpenResponses)),
    ]
}

/// `output_schema` → `text.format` strict JSON schema.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatMapper;

impl ParameterMapper for TextFormatMapper {
    fn name(&self) -> Param {
        Param::OutputSchema
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let schema = expect_schema(&validated)?;
        let name = if schema.list {
            format!("{}_list", schema.name)
        } else {
            schema.name.clone()
        };
        object_entry(request, "text").insert(
            "format".into(),
            json!({
                "type": "json_schema",
                "name": name,
                "schema": schema.object_schema(),
                "strict": true,
            }),
        );
        Ok(())
    }

    fn parse_output(&self, content: Content, value: &ParamValue) -> Result<Content> {
        let schema = expect_schema(value)?;
        parse_structured_output(content, schema, |v| if schema.list { unwrap_list(v) } else { v })
    }
}

pub(crate) fn expect_schema(value: &ParamValue) -> Result<&crate::types::OutputSchema> {
    value.as_schema().ok_or_else(|| {
        OmniError::constraint(format!("output_schema must be a schema, got {}", value.type_name()))
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesStream;

impl ChunkParser for ResponsesStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        if event_type(event) != "response.output_text.delta" {
            return Ok(None);
        }
        Ok(event
            .get("delta")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(|d| ChunkContent::Text(d.to_string())))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        if event_type(event) != "response.completed" {
            return None;
        }
        event
            .pointer("/response/usage")
            .map(|u| Usage::from_mapping(u, USAGE_FIELDS))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        (event_type(event) == "response.completed"
            && event.pointer("/response/status").and_then(Value::as_str) == Some("completed"))
        .then(|| FinishReason::new("completed"))
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        if event_type(event) != "error" {
            return None;
        }
        let code = event.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let message = event
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        Some(OmniError::Stream(format!("{code}: {message}")))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        event.get("delta").is_none() && event_type(event) != "response.completed"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesExtractor;

impl ResponsesExtractor {
    fn message_items(response: &Value) -> Result<Vec<&Value>> {
        let output = response
            .get("output")
            .and_then(Value::as_array)
            .filter(|o| !o.is_empty())
            .ok_or_else(|| OmniError::parse("No output in response"))?;
        Ok(output
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
            .collect())
    }
}

impl ContentExtractor for ResponsesExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("responses")?;
        let text: String = Self::message_items(body)?
            .into_iter()
            .filter_map(|item| item.get("content").and_then(Value::as_array))
            .flatten()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        Ok(Content::Text(text))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get("usage"))
            .map(|u| Usage::from_mapping(u, USAGE_FIELDS))
            .unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        let body = response.json()?;
        let completed = body.get("status").and_then(Value::as_str) == Some("completed");
        let message_done = Self::message_items(body).ok()?.into_iter().any(|item| {
            item.get("status").and_then(Value::as_str) == Some("completed")
        });
        (completed && message_done).then(|| FinishReason::new("completed"))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["output"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::params::apply_mappers;
    use crate::streaming::WireEvent;
    use crate::types::{Capability, OutputSchema, Parameters, Provider};

    fn model() -> Model {
        Model::new("gpt-5", Provider::OpenAI, "GPT-5")
            .capability(Capability::TextGeneration)
            .constraint(Param::OutputSchema, Constraint::Schema)
            .constraint(Param::ReasoningEffort, Constraint::choice(["minimal", "low", "medium", "high"]))
    }

    #[test]
    fn list_schema_is_wrapped_and_named() {
        let mut request = init_request("gpt-5", &TextInput { prompt: "hi".into(), messages: vec![] }, false);
        let params = Parameters::new()
            .with(Param::OutputSchema, OutputSchema::list_of("City", json!({"type": "string"})))
            .with(Param::ReasoningEffort, "low");
        apply_mappers(&mut request, &mappers(), &params, &model()).unwrap();
        assert_eq!(request["text"]["format"]["name"], "City_list");
        assert_eq!(request["text"]["format"]["schema"]["properties"]["items"]["type"], "array");
        assert_eq!(request["reasoning"]["effort"], "low");
        assert_eq!(request["input"][0]["content"][0]["type"], "input_text");
        assert!(!request.contains_key("stream"));
    }

    #[test]
    fn stream_events_map_to_chunks() {
        let delta = ResponsesStream
            .parse_event(
                WireEvent::Json(json!({"type": "response.output_text.delta", "delta": "Hi"})),
                ChunkContent::Text(String::new()),
            )
            .unwrap()
            .unwrap();
        assert_eq!(delta.content.as_text(), Some("Hi"));

        let done = ResponsesStream
            .parse_event(
                WireEvent::Json(json!({
                    "type": "response.completed",
                    "response": {"status": "completed", "usage": {
                        "input_tokens": 5, "output_tokens": 2, "total_tokens": 7,
                        "output_tokens_details": {"reasoning_tokens": 1}
                    }}
                })),
                ChunkContent::Text(String::new()),
            )
            .unwrap()
            .unwrap();
        let usage = done.usage.as_ref().unwrap();
        assert_eq!(usage.total_tokens, Some(7));
        assert_eq!(usage.reasoning_tokens, Some(1));
        assert_eq!(done.finish_reason, Some(FinishReason::new("completed")));
        assert!(!ResponsesStream.keep_in_metadata(done.event_data().unwrap()));

        let created = json!({"type": "response.created"});
        assert!(ResponsesStream
            .parse_event(WireEvent::Json(created.clone()), ChunkContent::Empty)
            .unwrap()
            .is_none());
        assert!(ResponsesStream.keep_in_metadata(&created));
    }

    #[test]
    fn error_event_is_terminal() {
        let err = ResponsesStream
            .parse_event(
                WireEvent::Json(json!({"type": "error", "code": "rate_limit", "message": "slow down"})),
                ChunkContent::Empty,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Stream error: rate_limit: slow down");
    }

    #[test]
    fn extracts_message_text() {
        let response = RawResponse::Json(json!({
            "id": "resp_1",
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "status": "completed", "content": [
                    {"type": "output_text", "text": "Paris"}
                ]}
            ],
            "usage": {"input_tokens": 3, "output_tokens": 1}
        }));
        assert_eq!(
            ResponsesExtractor.parse_content(&response).unwrap(),
            Content::Text("Paris".into())
        );
        assert_eq!(ResponsesExtractor.parse_usage(&response).input_tokens, Some(3));
        assert_eq!(
            ResponsesExtractor.parse_finish_reason(&response),
            Some(FinishReason::new("completed"))
        );
        let metadata = ResponsesExtractor.build_metadata(&response);
        assert!(metadata["raw_response"].get("output").is_none());

        let empty = RawResponse::Json(json!({"output": []}));
        assert_eq!(
            ResponsesExtractor.parse_content(&empty).unwrap_err().to_string(),
            "Response parse error: No output in response"
        );
    }

    #[test]
    fn structured_list_output_unwraps_items() {
        let schema = OutputSchema::list_of("City", json!({"type": "string"}));
        let out = TextFormatMapper
            .parse_output(
                Content::Text("{\"items\": [\"Paris\", \"Rome\"]}".into()),
                &ParamValue::Schema(schema),
            )
            .unwrap();
        assert_eq!(out, Content::Json(json!(["Paris", "Rome"])));
    }
}
