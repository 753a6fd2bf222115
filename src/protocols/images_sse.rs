//! Image generation over SSE (OpenAI Images, BytePlus Seedream, xAI Grok Imagine)
//!
//! All three APIs post to an `/images/generations` endpoint. OpenAI and
//! BytePlus can stream typed SSE events with partial images followed by a
//! `completed` event carrying usage; the final image is the last partial that
//! carried content. xAI answers with a complete `data` list only.

use super::{ChunkParser, ContentExtractor, RawResponse, event_type, first_of};
use crate::error::{OmniError, Result};
use crate::params::{FieldMapper, Mappers, RequestBody};
use crate::types::{
    Artifact, ChunkContent, Content, FinishReason, ImageInput, MediaKind, MimeType, Param,
    Parameters, Usage, UsageField,
};
use serde_json::{Map, Value, json};

pub const OPENAI_IMAGES_PATH: &str = "/v1/images/generations";
pub const BYTEPLUS_IMAGES_PATH: &str = "/api/v3/images/generations";

/// Models that return URLs unless `response_format` asks for base64.
const LEGACY_OPENAI_MODELS: [&str; 2] = ["dall-e-2", "dall-e-3"];

const OPENAI_USAGE: &[(&str, UsageField)] = &[
    ("/input_tokens", UsageField::InputTokens),
    ("/output_tokens", UsageField::OutputTokens),
    ("/total_tokens", UsageField::TotalTokens),
];

const BYTEPLUS_USAGE: &[(&str, UsageField)] = &[
    ("/total_tokens", UsageField::TotalTokens),
    ("/output_tokens", UsageField::OutputTokens),
    ("/generated_images", UsageField::NumImages),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageApi {
    OpenAI,
    BytePlus,
    XAi,
}

impl ImageApi {
    pub fn path(self) -> &'static str {
        match self {
            ImageApi::OpenAI | ImageApi::XAi => OPENAI_IMAGES_PATH,
            ImageApi::BytePlus => BYTEPLUS_IMAGES_PATH,
        }
    }

    pub fn init_request(self, model_id: &str, input: &ImageInput, streaming: bool) -> RequestBody {
        let mut request = RequestBody::new();
        request.insert("prompt".into(), json!(input.prompt));
        request.insert("model".into(), json!(model_id));
        match self {
            ImageApi::OpenAI => {
                if streaming {
                    request.insert("stream".into(), json!(true));
                }
            }
            ImageApi::BytePlus => {
                request.insert("response_format".into(), json!("url"));
                request.insert("stream".into(), json!(streaming));
            }
            ImageApi::XAi => {}
        }
        request
    }

    /// Provider defaults applied after the mappers ran.
    pub fn finalize_request(self, request: &mut RequestBody, model_id: &str) {
        if self != ImageApi::OpenAI {
            return;
        }
        if request.get("stream") == Some(&Value::Bool(true)) {
            request.entry("partial_images").or_insert_with(|| json!(1));
        }
        if LEGACY_OPENAI_MODELS.contains(&model_id) {
            request
                .entry("response_format")
                .or_insert_with(|| json!("b64_json"));
        }
    }

    fn default_mime(self) -> Option<MimeType> {
        match self {
            ImageApi::BytePlus => Some(MimeType::Png),
            _ => None,
        }
    }

    fn usage_fields(self) -> &'static [(&'static str, UsageField)] {
        match self {
            ImageApi::BytePlus => BYTEPLUS_USAGE,
            _ => OPENAI_USAGE,
        }
    }

    pub fn mappers(self) -> Mappers {
        match self {
            ImageApi::OpenAI => vec![
                Box::new(FieldMapper::new(Param::Size, "size")),
                Box::new(FieldMapper::new(Param::PartialImages, "partial_images")),
                Box::new(FieldMapper::new(Param::Quality, "quality")),
                Box::new(FieldMapper::new(Param::Background, "background")),
                Box::new(FieldMapper::new(Param::OutputFormat, "output_format")),
                Box::new(FieldMapper::new(Param::Style, "style")),
                Box::new(FieldMapper::new(Param::Moderation, "moderation")),
                Box::new(FieldMapper::new(Param::OutputCompression, "output_compression")),
            ],
            // `size` takes either exact dimensions or a resolution class.
            ImageApi::BytePlus => vec![
                Box::new(FieldMapper::new(Param::AspectRatio, "size")),
                Box::new(FieldMapper::new(Param::Quality, "size")),
                Box::new(FieldMapper::new(Param::Seed, "seed")),
            ],
            ImageApi::XAi => vec![
                Box::new(FieldMapper::new(Param::NumImages, "n")),
                Box::new(FieldMapper::new(Param::AspectRatio, "aspect_ratio")),
                Box::new(FieldMapper::new(Param::OutputFormat, "response_format")),
            ],
        }
    }
}

/// BytePlus `size` accepts dimensions or a resolution class, never both.
pub fn check_byteplus_size(params: &Parameters) -> Result<()> {
    if params.contains(Param::AspectRatio) && params.contains(Param::Quality) {
        return Err(OmniError::constraint(
            "Cannot use both 'aspect_ratio' and 'quality' parameters. \
             BytePlus 'size' takes either exact dimensions (aspect_ratio, e.g. '2048x2048') \
             or a resolution class (quality: '1K', '2K', '4K').",
        ));
    }
    Ok(())
}

/// Image from a `b64_json` or `url` field of a data item.
fn image_from_item(item: &Value, default_mime: Option<MimeType>) -> Result<Option<Artifact>> {
    if let Some(encoded) = item.get("b64_json").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        let mut artifact = Artifact::from_base64(MediaKind::Image, encoded)?;
        if artifact.mime_type.is_none() {
            artifact.mime_type = default_mime;
        }
        return Ok(Some(artifact));
    }
    if let Some(url) = item.get("url").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        let mut artifact = Artifact::image_url(url);
        if artifact.mime_type.is_none() {
            artifact.mime_type = default_mime;
        }
        return Ok(Some(artifact));
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy)]
pub struct ImagesStream {
    api: ImageApi,
}

impl ImagesStream {
    pub fn new(api: ImageApi) -> Self {
        Self { api }
    }

    fn is_completed(&self, event: &Value) -> bool {
        match self.api {
            ImageApi::OpenAI => matches!(
                event_type(event),
                "image_generation.completed" | "image_edit.completed"
            ),
            ImageApi::BytePlus => event_type(event) == "image_generation.completed",
            ImageApi::XAi => false,
        }
    }
}

impl ChunkParser for ImagesStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        let carries_image = match self.api {
            ImageApi::OpenAI => matches!(
                event_type(event),
                "image_generation.partial_image"
                    | "image_edit.partial_image"
                    | "image_generation.completed"
                    | "image_edit.completed"
            ),
            ImageApi::BytePlus => event_type(event) == "image_generation.partial_succeeded",
            ImageApi::XAi => false,
        };
        if !carries_image {
            return Ok(None);
        }
        let default_mime = self.api.default_mime();
        Ok(image_from_item(event, default_mime)?.map(ChunkContent::Image))
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        if !self.is_completed(event) {
            return None;
        }
        let fields = self.api.usage_fields();
        event.get("usage").map(|u| Usage::from_mapping(u, fields))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        self.is_completed(event).then(|| FinishReason::new("completed"))
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        if self.api != ImageApi::BytePlus || event_type(event) != "image_generation.partial_failed" {
            return None;
        }
        let error = event.get("error");
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
            .unwrap_or("partial_failed");
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Image generation failed");
        Some(OmniError::Stream(format!("{code}: {message}")))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        match self.api {
            ImageApi::OpenAI | ImageApi::XAi => !event_type(event).contains("partial_image"),
            ImageApi::BytePlus => event_type(event) != "image_generation.partial_succeeded",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImagesExtractor {
    api: ImageApi,
}

impl ImagesExtractor {
    pub fn new(api: ImageApi) -> Self {
        Self { api }
    }
}

impl ContentExtractor for ImagesExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("images")?;
        first_of(body, "data", "No image data in response")?;
        let default_mime = self.api.default_mime();
        let mut images = Vec::new();
        for item in body["data"].as_array().into_iter().flatten() {
            if let Some(image) = image_from_item(item, default_mime)? {
                images.push(image);
            }
        }
        match images.len() {
            0 => Err(OmniError::parse("No image URL or base64 data in response")),
            1 => Ok(Content::Image(images.remove(0))),
            _ => Ok(Content::Images(images)),
        }
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        let fields = self.api.usage_fields();
        response
            .json()
            .and_then(|b| b.get("usage"))
            .map(|u| Usage::from_mapping(u, fields))
            .unwrap_or_default()
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["data"]
    }

    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        let mut extra = Map::new();
        let Some(body) = response.json() else {
            return extra;
        };
        match self.api {
            ImageApi::OpenAI | ImageApi::XAi => {
                if let Some(revised) = body.pointer("/data/0/revised_prompt") {
                    extra.insert("revised_prompt".into(), revised.clone());
                }
            }
            ImageApi::BytePlus => {
                if let Some(seed) = body.get("seed") {
                    extra.insert("seed".into(), seed.clone());
                }
            }
        }
        extra
    }
}
