//! Ollama `/api/generate` image protocol
//!
//! Responses are NDJSON: progress lines while the model steps, then a final
//! line with `done: true` and the base64 `image`.

use super::{ChunkParser, ContentExtractor, RawResponse};
use crate::error::{OmniError, Result};
use crate::params::{FieldMapper, Mappers, NestedFieldMapper, ParameterMapper, RequestBody};
use crate::registry::Model;
use crate::types::{
    Artifact, ChunkContent, Content, FinishReason, ImageInput, MediaKind, Param, ParamValue,
    Usage, UsageField,
};
use serde_json::{Value, json};

pub const GENERATE_PATH: &str = "/api/generate";

pub fn init_request(model_id: &str, input: &ImageInput, streaming: bool) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("prompt".into(), json!(input.prompt));
    request.insert("model".into(), json!(model_id));
    // Ollama streams unless told otherwise.
    request.insert("stream".into(), json!(streaming));
    request
}

pub fn mappers() -> Mappers {
    vec![
        Box::new(DimensionsMapper),
        Box::new(NestedFieldMapper::new(Param::Seed, &["options", "seed"])),
        Box::new(FieldMapper::new(Param::NegativePrompt, "negative_prompt")),
    ]
}

/// `aspect_ratio` as `"WxH"` → `width` / `height`.
#[derive(Debug, Clone, Copy)]
struct DimensionsMapper;

impl ParameterMapper for DimensionsMapper {
    fn name(&self) -> Param {
        Param::AspectRatio
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let (width, height) = parse_dimensions(validated.as_str().unwrap_or_default())?;
        request.insert("width".into(), json!(width));
        request.insert("height".into(), json!(height));
        Ok(())
    }
}

/// Split `"WxH"` into positive integers.
pub(crate) fn parse_dimensions(value: &str) -> Result<(u32, u32)> {
    let invalid = || OmniError::constraint(format!("Dimensions must be 'WIDTHxHEIGHT', got '{value}'"));
    let lower = value.to_lowercase();
    let (w, h) = lower.split_once('x').ok_or_else(invalid)?;
    let width: u32 = w.trim().parse().map_err(|_| invalid())?;
    let height: u32 = h.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

fn usage_of(event: &Value) -> Usage {
    let mut usage = Usage::default();
    if let Some(v) = event.get("prompt_eval_count") {
        usage.set(UsageField::InputTokens, v);
    }
    if let Some(v) = event.get("eval_count") {
        usage.set(UsageField::OutputTokens, v);
    }
    if let Some(v) = event.get("total_eval_count") {
        usage.set(UsageField::TotalTokens, v);
    }
    if usage.total_tokens.is_none()
        && let (Some(input), Some(output)) = (usage.input_tokens, usage.output_tokens)
    {
        usage.total_tokens = Some(input + output);
    }
    usage
}

fn image_of(event: &Value) -> Result<Option<Artifact>> {
    event
        .get("image")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|encoded| Artifact::from_base64(MediaKind::Image, encoded))
        .transpose()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaStream;

impl ChunkParser for OllamaStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        Ok(image_of(event)?.map(ChunkContent::Image))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        Some(usage_of(event))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        (event.get("done").and_then(Value::as_bool) == Some(true))
            .then(|| FinishReason::new("completed"))
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        event
            .get("error")
            .and_then(Value::as_str)
            .map(|e| OmniError::Stream(e.to_string()))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        event.get("image").is_none()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaExtractor;

impl ContentExtractor for OllamaExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("generate")?;
        image_of(body)?
            .map(Content::Image)
            .ok_or_else(|| OmniError::parse("No image in response"))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response.json().map(usage_of).unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        OllamaStream.parse_finish_reason(response.json()?)
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["image", "response"]
    }
}
