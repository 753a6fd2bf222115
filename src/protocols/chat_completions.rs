//! Chat Completions protocol (Mistral, DeepSeek, Groq, Moonshot, Hugging Face)
//!
//! Every provider streams `choices[0].delta.content` with usage on the final
//! chunk. They differ in details captured by [`ChatFlavor`]: Mistral may send
//! content as a list of typed blocks, DeepSeek tags every streamed object with
//! `object: "chat.completion.chunk"` and reports cache and reasoning counts,
//! and Moonshot may report usage inside the final choice.
//!
//! Structured output comes in three shapes. Mistral takes a strict schema as
//! is. Groq and Hugging Face take a schema whose root must be an object, so a
//! list schema is wrapped under `items`. DeepSeek and Moonshot only offer JSON
//! mode.

use super::open_responses::expect_schema;
use super::tools::{ToolDialect, ToolsMapper, WebSearchMapper};
use super::{ChunkParser, ContentExtractor, RawResponse, first_of};
use crate::error::Result;
use crate::params::mapper::unwrap_list;
use crate::params::{
    FieldMapper, Mappers, ParameterMapper, RequestBody, parse_structured_output,
};
use crate::registry::Model;
use crate::types::{
    ChunkContent, Content, FinishReason, Param, ParamValue, TextInput, Usage, UsageField,
};
use serde_json::{Value, json};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlavor {
    Mistral,
    DeepSeek,
    Groq,
    Moonshot,
    HuggingFace,
}

const TOKEN_USAGE: &[(&str, UsageField)] = &[
    ("/prompt_tokens", UsageField::InputTokens),
    ("/completion_tokens", UsageField::OutputTokens),
    ("/total_tokens", UsageField::TotalTokens),
];

impl ChatFlavor {
    fn usage_fields(self) -> &'static [(&'static str, UsageField)] {
        match self {
            ChatFlavor::DeepSeek => &[
                ("/prompt_tokens", UsageField::InputTokens),
                ("/completion_tokens", UsageField::OutputTokens),
                ("/total_tokens", UsageField::TotalTokens),
                ("/prompt_tokens_details/cached_tokens", UsageField::CachedTokens),
                ("/completion_tokens_details/reasoning_tokens", UsageField::ReasoningTokens),
            ],
            _ => TOKEN_USAGE,
        }
    }

    /// Mapper set for this flavor.
    pub fn mappers(self) -> Mappers {
        let mut mappers: Mappers = vec![
            Box::new(FieldMapper::new(Param::Temperature, "temperature")),
            Box::new(FieldMapper::new(Param::MaxTokens, "max_tokens")),
        ];
        match self {
            ChatFlavor::Mistral => {
                mappers.push(Box::new(PromptModeMapper));
                mappers.push(Box::new(ResponseFormatMapper { flavor: self }));
                mappers.push(Box::new(ToolsMapper::new(ToolDialect::ChatCompletions)));
                mappers.push(Box::new(WebSearchMapper::new(ToolDialect::ChatCompletions)));
            }
            _ => {
                mappers.push(Box::new(ResponseFormatMapper { flavor: self }));
            }
        }
        mappers
    }
}

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

/// Mistral `thinking_budget` → `prompt_mode`: `0` disables reasoning.
#[derive(Debug, Clone, Copy)]
struct PromptModeMapper;

impl ParameterMapper for PromptModeMapper {
    fn name(&self) -> Param {
        Param::ThinkingBudget
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        if let Some(validated) = self.validate(value, model)? {
            let mode = if validated.as_i64() == Some(0) {
                Value::Null
            } else {
                json!("reasoning")
            };
            request.insert("prompt_mode".into(), mode);
        }
        Ok(())
    }
}

/// `output_schema` → `response_format`.
///
/// Outside Mistral, list output comes back wrapped in an object and is
/// unwrapped on parse.
#[derive(Debug, Clone, Copy)]
struct ResponseFormatMapper {
    flavor: ChatFlavor,
}

impl ParameterMapper for ResponseFormatMapper {
    fn name(&self) -> Param {
        Param::OutputSchema
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let schema = expect_schema(&validated)?;
        let format = match self.flavor {
            ChatFlavor::Mistral => json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.response_schema(),
                    "strict": true,
                },
            }),
            ChatFlavor::Groq | ChatFlavor::HuggingFace => {
                let (name, schema_value) = if schema.list {
                    (format!("{}_list", schema.name), wrap_list_schema(&schema.schema))
                } else {
                    (schema.name.clone(), schema.schema.clone())
                };
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": name,
                        "schema": schema_value,
                        "strict": self.flavor == ChatFlavor::HuggingFace,
                    },
                })
            }
            ChatFlavor::DeepSeek | ChatFlavor::Moonshot => json!({"type": "json_object"}),
        };
        request.insert("response_format".into(), format);
        Ok(())
    }

    fn parse_output(&self, content: Content, value: &ParamValue) -> Result<Content> {
        let schema = expect_schema(value)?;
        let unwrap = self.flavor != ChatFlavor::Mistral && schema.list;
        parse_structured_output(content, schema, |v| if unwrap { unwrap_list(v) } else { v })
    }
}

/// Object schema holding a list of `item` under `items`.
fn wrap_list_schema(item: &Value) -> Value {
    json!({
        "type": "object",
        "properties": {"items": {"type": "array", "items": item}},
        "required": ["items"],
        "additionalProperties": false,
    })
}

/// Usage at the top level or, for Moonshot, inside the first choice.
fn event_usage(event: &Value) -> Option<&Value> {
    event
        .get("usage")
        .or_else(|| event.pointer("/choices/0/usage"))
        .filter(|u| u.is_object())
}

/// Text of a message or delta `content`, which may be a string or a list of
/// `{type: "text", text}` blocks.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => Some(
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect(),
        ),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatCompletionsStream {
    flavor: ChatFlavor,
}

impl ChatCompletionsStream {
    pub fn new(flavor: ChatFlavor) -> Self {
        Self { flavor }
    }

    fn accepts(&self, event: &Value) -> bool {
        match self.flavor {
            ChatFlavor::DeepSeek => {
                event.get("object").and_then(Value::as_str) == Some("chat.completion.chunk")
            }
            _ => true,
        }
    }
}

impl ChunkParser for ChatCompletionsStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        if !self.accepts(event) {
            return Ok(None);
        }
        let text = event
            .pointer("/choices/0/delta/content")
            .and_then(content_text)
            .filter(|t| !t.is_empty());
        Ok(text.map(ChunkContent::Text))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        if !self.accepts(event) {
            return None;
        }
        event_usage(event).map(|u| Usage::from_mapping(u, self.flavor.usage_fields()))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        if !self.accepts(event) {
            return None;
        }
        FinishReason::from_value(event.pointer("/choices/0/finish_reason"))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        event_usage(event).is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatCompletionsExtractor {
    flavor: ChatFlavor,
}

impl ChatCompletionsExtractor {
    pub fn new(flavor: ChatFlavor) -> Self {
        Self { flavor }
    }
}

impl ContentExtractor for ChatCompletionsExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("chat completion")?;
        let choice = first_of(body, "choices", "No choices in response")?;
        let text = choice
            .pointer("/message/content")
            .and_then(content_text)
            .unwrap_or_default();
        Ok(Content::Text(text))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get("usage"))
            .map(|u| Usage::from_mapping(u, self.flavor.usage_fields()))
            .unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        FinishReason::from_value(response.json()?.pointer("/choices/0/finish_reason"))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["choices"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::params::apply_mappers;
    use crate::streaming::WireEvent;
    use crate::types::{Capability, OutputSchema, Parameters, Provider};

    fn parse(flavor: ChatFlavor, event: Value) -> Option<crate::types::Chunk> {
        ChatCompletionsStream::new(flavor)
            .parse_event(WireEvent::Json(event), ChunkContent::Text(String::new()))
            .unwrap()
    }

    #[test]
    fn mistral_joins_text_blocks() {
        let chunk = parse(
            ChatFlavor::Mistral,
            json!({"choices": [{"delta": {"content": [
                {"type": "thinking", "thinking": []},
                {"type": "text", "text": "Bon"},
                {"type": "text", "text": "jour"}
            ]}}]}),
        )
        .unwrap();
        assert_eq!(chunk.content.as_text(), Some("Bonjour"));
    }

    #[test]
    fn deepseek_ignores_objects_without_chunk_tag() {
        assert!(parse(
            ChatFlavor::DeepSeek,
            json!({"choices": [{"delta": {"content": "x"}}]})
        )
        .is_none());

        let last = parse(
            ChatFlavor::DeepSeek,
            json!({
                "object": "chat.completion.chunk",
                "choices": [{"delta": {"content": ""}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6,
                          "prompt_tokens_details": {"cached_tokens": 3}}
            }),
        )
        .unwrap();
        assert_eq!(last.content, ChunkContent::Text(String::new()));
        assert_eq!(last.finish_reason, Some(FinishReason::new("stop")));
        assert_eq!(last.usage.unwrap().cached_tokens, Some(3));
    }

    #[test]
    fn response_format_per_flavor() {
        let model = Model::new("m", Provider::Mistral, "M")
            .capability(Capability::TextGeneration)
            .constraint(Param::OutputSchema, Constraint::Schema)
            .constraint(Param::ThinkingBudget, Constraint::Int);
        let schema = OutputSchema::list_of("Pet", json!({"type": "object"}));
        let params = Parameters::new()
            .with(Param::OutputSchema, schema)
            .with(Param::ThinkingBudget, 0);

        let mut request = RequestBody::new();
        apply_mappers(&mut request, &ChatFlavor::Mistral.mappers(), &params, &model).unwrap();
        assert_eq!(request["response_format"]["json_schema"]["schema"]["type"], "array");
        assert_eq!(request["prompt_mode"], Value::Null);

        let mut deepseek = params;
        deepseek.remove(Param::ThinkingBudget);
        let mut request = RequestBody::new();
        apply_mappers(&mut request, &ChatFlavor::DeepSeek.mappers(), &deepseek, &model).unwrap();
        assert_eq!(request["response_format"], json!({"type": "json_object"}));
    }

    #[test]
    fn wrapped_list_schema_for_groq_and_hugging_face() {
        let model = Model::new("m", Provider::Groq, "M")
            .capability(Capability::TextGeneration)
            .constraint(Param::OutputSchema, Constraint::Schema);
        let item = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        let params = Parameters::new().with(Param::OutputSchema, OutputSchema::list_of("Pet", item.clone()));

        let mut request = RequestBody::new();
        apply_mappers(&mut request, &ChatFlavor::Groq.mappers(), &params, &model).unwrap();
        let format = &request["response_format"]["json_schema"];
        assert_eq!(format["name"], "Pet_list");
        assert_eq!(format["strict"], false);
        assert_eq!(format["schema"]["properties"]["items"]["items"], item);

        let mut request = RequestBody::new();
        apply_mappers(&mut request, &ChatFlavor::HuggingFace.mappers(), &params, &model).unwrap();
        assert_eq!(request["response_format"]["json_schema"]["strict"], true);

        let mapper = ResponseFormatMapper {
            flavor: ChatFlavor::Groq,
        };
        let parsed = mapper
            .parse_output(
                Content::Text(r#"{"items": [{"name": "Rex"}]}"#.into()),
                params.get(Param::OutputSchema).unwrap(),
            )
            .unwrap();
        assert_eq!(parsed, Content::Json(json!([{"name": "Rex"}])));
    }

    #[test]
    fn moonshot_usage_inside_choice() {
        let last = parse(
            ChatFlavor::Moonshot,
            json!({"choices": [{"delta": {}, "finish_reason": "stop",
                   "usage": {"prompt_tokens": 8, "completion_tokens": 5, "total_tokens": 13}}]}),
        )
        .unwrap();
        assert_eq!(last.usage.as_ref().unwrap().total_tokens, Some(13));
        assert!(ChatCompletionsStream::new(ChatFlavor::Moonshot).keep_in_metadata(last.event_data().unwrap()));
    }

    #[test]
    fn extractor_requires_choices() {
        let ok = RawResponse::Json(json!({
            "id": "c1",
            "choices": [{"message": {"content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        }));
        let extractor = ChatCompletionsExtractor::new(ChatFlavor::Mistral);
        assert_eq!(extractor.parse_content(&ok).unwrap(), Content::Text("hello".into()));
        assert_eq!(extractor.parse_usage(&ok).total_tokens, Some(2));
        assert_eq!(extractor.parse_finish_reason(&ok), Some(FinishReason::new("stop")));

        let err = extractor
            .parse_content(&RawResponse::Json(json!({"choices": []})))
            .unwrap_err();
        assert!(err.to_string().contains("No choices in response"));
    }
}
