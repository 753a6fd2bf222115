//! Gemini GenerateContent protocol
//!
//! Text streams over `:streamGenerateContent?alt=sse`; each event is a full
//! `GenerateContentResponse` carrying the next text part and, on the last
//! event, `usageMetadata` and `finishReason`. Image models use the same
//! endpoint without streaming and return `inlineData` parts. Imagen models
//! share the API key but use `:predict` with `instances`/`parameters`.

use super::open_responses::expect_schema;
use super::tools::{ToolDialect, ToolsMapper, WebSearchMapper, strip_titles};
use super::{ChunkParser, ContentExtractor, RawResponse, first_of};
use crate::error::{OmniError, Result};
use crate::params::mapper::unwrap_list;
use crate::params::{
    Mappers, NestedFieldMapper, ParameterMapper, RequestBody, array_entry, object_entry,
    parse_structured_output,
};
use crate::registry::Model;
use crate::types::{
    Artifact, ChunkContent, Content, FinishReason, ImageInput, MediaKind, MimeType, Param,
    ParamValue, TextInput, Usage, UsageField,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

const USAGE_FIELDS: &[(&str, UsageField)] = &[
    ("/promptTokenCount", UsageField::InputTokens),
    ("/candidatesTokenCount", UsageField::OutputTokens),
    ("/totalTokenCount", UsageField::TotalTokens),
    ("/thoughtsTokenCount", UsageField::ReasoningTokens),
];

pub fn generate_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:generateContent")
}

pub fn stream_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:streamGenerateContent?alt=sse")
}

pub fn predict_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:predict")
}

pub fn is_imagen(model_id: &str) -> bool {
    model_id.starts_with("imagen")
}

/// Gemini roles are `user` and `model`; system turns become
/// `systemInstruction`.
pub fn init_text_request(input: &TextInput) -> RequestBody {
    let mut request = RequestBody::new();
    let mut system = Vec::new();
    let mut contents = Vec::new();
    for turn in input.conversation() {
        match turn.role.as_str() {
            "system" | "developer" => system.push(json!({"text": turn.content})),
            "assistant" | "model" => {
                contents.push(json!({"role": "model", "parts": [{"text": turn.content}]}))
            }
            _ => contents.push(json!({"role": "user", "parts": [{"text": turn.content}]})),
        }
    }
    if !system.is_empty() {
        request.insert("systemInstruction".into(), json!({"parts": system}));
    }
    request.insert("contents".into(), Value::Array(contents));
    request
}

pub fn init_image_request(input: &ImageInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert(
        "contents".into(),
        json!([{"role": "user", "parts": [{"text": input.prompt}]}]),
    );
    request.insert(
        "generationConfig".into(),
        json!({"responseModalities": ["TEXT", "IMAGE"]}),
    );
    request
}

pub fn text_mappers() -> Mappers {
    vec![
        Box::new(NestedFieldMapper::new(Param::Temperature, &["generationConfig", "temperature"])),
        Box::new(NestedFieldMapper::new(Param::MaxTokens, &["generationConfig", "maxOutputTokens"])),
        Box::new(NestedFieldMapper::new(Param::TopP, &["generationConfig", "topP"])),
        Box::new(NestedFieldMapper::new(Param::TopK, &["generationConfig", "topK"])),
        Box::new(NestedFieldMapper::new(
            Param::ThinkingBudget,
            &["generationConfig", "thinkingConfig", "thinkingBudget"],
        )),
        Box::new(NestedFieldMapper::new(
            Param::ThinkingLevel,
            &["generationConfig", "thinkingConfig", "thinkingLevel"],
        )),
        Box::new(ResponseSchemaMapper),
        Box::new(ToolsMapper::new(ToolDialect::Gemini)),
        Box::new(WebSearchMapper::new(ToolDialect::Gemini)),
    ]
}

pub fn image_mappers() -> Mappers {
    vec![
        Box::new(NestedFieldMapper::new(
            Param::AspectRatio,
            &["generationConfig", "imageConfig", "aspectRatio"],
        )),
        Box::new(NestedFieldMapper::new(
            Param::ImageSize,
            &["generationConfig", "imageConfig", "imageSize"],
        )),
        Box::new(ReferenceImagesMapper),
    ]
}

pub fn init_imagen_request(input: &ImageInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("instances".into(), json!([{"prompt": input.prompt}]));
    request.insert("parameters".into(), json!({}));
    request
}

pub fn imagen_mappers() -> Mappers {
    vec![
        Box::new(NestedFieldMapper::new(Param::NumImages, &["parameters", "sampleCount"])),
        Box::new(NestedFieldMapper::new(Param::AspectRatio, &["parameters", "aspectRatio"])),
        Box::new(NestedFieldMapper::new(Param::ImageSize, &["parameters", "imageSize"])),
    ]
}

/// `output_schema` → `responseJsonSchema` with JSON response MIME type.
#[derive(Debug, Clone, Copy)]
struct ResponseSchemaMapper;

impl ParameterMapper for ResponseSchemaMapper {
    fn name(&self) -> Param {
        Param::OutputSchema
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let schema = expect_schema(&validated)?;
        let config = object_entry(request, "generationConfig");
        config.insert("responseMimeType".into(), json!(MimeType::Json.as_str()));
        config.insert(
            "responseJsonSchema".into(),
            strip_titles(&schema.response_schema()),
        );
        Ok(())
    }

    fn parse_output(&self, content: Content, value: &ParamValue) -> Result<Content> {
        let schema = expect_schema(value)?;
        parse_structured_output(content, schema, |v| if schema.list { unwrap_list(v) } else { v })
    }
}

/// `reference_images` → image parts placed before the prompt text.
#[derive(Debug, Clone, Copy)]
struct ReferenceImagesMapper;

impl ReferenceImagesMapper {
    fn part(image: &Artifact) -> Result<Value> {
        if let Some(url) = image.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(json!({"file_data": {"file_uri": url}}));
        }
        let data = image
            .data
            .as_ref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| OmniError::Validation("Reference image must have url or data".into()))?;
        let mime = image.resolved_mime_type().unwrap_or(MimeType::Png);
        Ok(json!({"inline_data": {"mime_type": mime.as_str(), "data": STANDARD.encode(data)}}))
    }
}

impl ParameterMapper for ReferenceImagesMapper {
    fn name(&self) -> Param {
        Param::ReferenceImages
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let images = validated.as_artifacts().ok_or_else(|| {
            OmniError::constraint(format!("reference_images must be images, got {}", validated.type_name()))
        })?;
        let image_parts = images.iter().map(Self::part).collect::<Result<Vec<_>>>()?;

        let contents = array_entry(request, "contents");
        if contents.is_empty() {
            contents.push(json!({"role": "user", "parts": []}));
        }
        let Some(Value::Object(first)) = contents.first_mut() else {
            return Err(OmniError::Validation("contents[0] must be an object".into()));
        };
        let parts = array_entry(first, "parts");
        let text_at = parts
            .iter()
            .position(|p| p.get("text").is_some())
            .unwrap_or(parts.len());
        parts.splice(text_at..text_at, image_parts);
        Ok(())
    }
}

fn first_candidate_text(event: &Value) -> Option<&str> {
    event
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateContentStream;

impl ChunkParser for GenerateContentStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        Ok(first_candidate_text(event)
            .filter(|t| !t.is_empty())
            .map(|t| ChunkContent::Text(t.to_string())))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        event
            .get("usageMetadata")
            .map(|u| Usage::from_mapping(u, USAGE_FIELDS))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        FinishReason::from_value(event.pointer("/candidates/0/finishReason"))
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        let error = event.get("error")?;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        Some(OmniError::Stream(message.to_string()))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        event.get("usageMetadata").is_some()
    }
}

fn usage_of(response: &RawResponse) -> Usage {
    response
        .json()
        .and_then(|b| b.get("usageMetadata"))
        .map(|u| Usage::from_mapping(u, USAGE_FIELDS))
        .unwrap_or_default()
}

fn candidates_finish_reason(response: &RawResponse) -> Option<FinishReason> {
    let candidate = response.json()?.pointer("/candidates/0")?;
    let mut reason = FinishReason::from_value(candidate.get("finishReason"))?;
    reason.message = candidate
        .get("finishMessage")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(reason)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateContentExtractor;

impl ContentExtractor for GenerateContentExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("generate content")?;
        let candidate = first_of(body, "candidates", "No candidates in response")?;
        let text: String = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|p| p.get("thought").and_then(Value::as_bool) != Some(true))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        Ok(Content::Text(text))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        usage_of(response)
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        candidates_finish_reason(response)
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["candidates"]
    }
}

/// Images from `inlineData` parts of every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiImageExtractor;

impl ContentExtractor for GeminiImageExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("generate content")?;
        first_of(body, "candidates", "No candidates in response")?;
        let mut images = Vec::new();
        let parts = body["candidates"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|c| c.pointer("/content/parts").and_then(Value::as_array))
            .flatten();
        for part in parts {
            let Some(inline) = part.get("inlineData") else {
                continue;
            };
            let Some(data) = inline.get("data").and_then(Value::as_str).filter(|d| !d.is_empty()) else {
                continue;
            };
            let mime = inline
                .get("mimeType")
                .and_then(Value::as_str)
                .and_then(MimeType::parse)
                .unwrap_or(MimeType::Png);
            images.push(Artifact::from_base64(MediaKind::Image, data)?.with_mime_type(mime));
        }
        match images.len() {
            0 => Err(OmniError::parse("No image data in response")),
            1 => Ok(Content::Image(images.remove(0))),
            _ => Ok(Content::Images(images)),
        }
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        let mut usage = usage_of(response);
        if let Some(candidates) = response
            .json()
            .and_then(|b| b.get("candidates"))
            .and_then(Value::as_array)
        {
            usage.num_images = Some(candidates.len() as u64);
        }
        usage
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        candidates_finish_reason(response)
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["candidates"]
    }
}

/// Images from Imagen `predictions[]`; filtered predictions carry no bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagenExtractor;

impl ContentExtractor for ImagenExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("predict")?;
        let predictions = body
            .get("predictions")
            .and_then(Value::as_array)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| OmniError::parse("No predictions in response"))?;
        let mut images = Vec::new();
        for prediction in predictions {
            let Some(data) = prediction
                .get("bytesBase64Encoded")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
            else {
                continue;
            };
            let mime = prediction
                .get("mimeType")
                .and_then(Value::as_str)
                .and_then(MimeType::parse)
                .unwrap_or(MimeType::Png);
            images.push(Artifact::from_base64(MediaKind::Image, data)?.with_mime_type(mime));
        }
        match images.len() {
            0 => Err(OmniError::parse("No image data in response")),
            1 => Ok(Content::Image(images.remove(0))),
            _ => Ok(Content::Images(images)),
        }
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        let count = response
            .json()
            .and_then(|b| b.get("predictions"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        Usage {
            num_images: Some(count as u64),
            ..Usage::default()
        }
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["predictions"]
    }
}
