//! Submit-then-poll task protocols
//!
//! Long-running generations are submitted once and then polled until a
//! terminal status. [`TaskProtocol`] describes where to poll and how to read a
//! status response; the transport's `poll_until` drives the loop. Six
//! families share this shape:
//!
//! - Google Veo operations (`done` flag, `gs://` results)
//! - BFL image tasks (`polling_url`, `Ready`)
//! - BytePlus content generation tasks (`succeeded` / `failed` / `canceled`)
//! - OpenAI Sora jobs, whose finished video is downloaded separately
//! - xAI video requests, which may also answer with the video right away
//! - Mureka song and instrumental tasks, which also stream progress
//!   (`streaming` with a `stream_url`) when polled as events

use super::ollama_generate::parse_dimensions;
use super::{ChunkParser, ContentExtractor, RawResponse, first_of};
use crate::error::{OmniError, Result};
use crate::params::{
    FieldMapper, Mappers, NestedFieldMapper, ParameterMapper, RequestBody, array_entry,
    object_entry,
};
use crate::registry::Model;
use crate::transport::polling::PollStatus;
use crate::types::{
    Artifact, ChunkContent, Content, FinishReason, ImageInput, MediaKind, MimeType, MusicInput,
    Param, ParamValue, Usage, UsageField, VideoInput,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

/// Where a task is polled and how its status responses read.
pub trait TaskProtocol: Send + Sync {
    /// Name used in logs and error messages.
    fn label(&self) -> &'static str;

    /// Whether the submit response already is the finished result.
    fn immediate(&self, _submit: &Value) -> bool {
        false
    }

    /// Task identifier from the submit response.
    fn task_id(&self, submit: &Value) -> Result<String>;

    /// Path or absolute URL to poll for `task_id`.
    fn poll_target(&self, task_id: &str, submit: &Value) -> Result<String>;

    /// Classify one status response.
    fn status(&self, task_id: &str, response: &Value) -> PollStatus;
}

/// Key under which a finished task's status carries its id.
pub const TASK_ID_KEY: &str = "task_id";

/// `task_id` metadata entry lifted from a finished task's status.
fn task_metadata(response: &RawResponse) -> Map<String, Value> {
    let mut metadata = Map::new();
    if let Some(id) = response.json().and_then(|b| b.get(TASK_ID_KEY)) {
        metadata.insert(TASK_ID_KEY.into(), id.clone());
    }
    metadata
}

fn string_field(value: &Value, key: &str, missing: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OmniError::parse(missing.to_string()))
}

fn error_message(response: &Value) -> String {
    match response.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        _ => "Unknown error".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Google Veo
// ---------------------------------------------------------------------------

pub const VEO_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com/";

pub fn veo_submit_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:predictLongRunning")
}

/// Rewrite `gs://bucket/key` to its HTTPS storage URL.
pub fn storage_url(url: &str) -> String {
    match url.strip_prefix("gs://") {
        Some(rest) => format!("{STORAGE_BASE_URL}{rest}"),
        None => url.to_string(),
    }
}

pub fn veo_init_request(input: &VideoInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("instances".into(), json!([{"prompt": input.prompt}]));
    request
}

pub fn veo_mappers() -> Mappers {
    vec![
        Box::new(NestedFieldMapper::new(Param::AspectRatio, &["parameters", "aspectRatio"])),
        Box::new(NestedFieldMapper::new(Param::Resolution, &["parameters", "resolution"])),
        Box::new(VeoDurationMapper),
        Box::new(VeoReferenceImagesMapper),
        // first_frame must be mapped before last_frame.
        Box::new(VeoFrameMapper::first()),
        Box::new(VeoFrameMapper::last()),
    ]
}

/// `instances[0]`, created when absent.
fn first_instance(request: &mut RequestBody) -> &mut Map<String, Value> {
    let instances = array_entry(request, "instances");
    if instances.is_empty() {
        instances.push(Value::Object(Map::new()));
    }
    if !instances[0].is_object() {
        instances[0] = Value::Object(Map::new());
    }
    match &mut instances[0] {
        Value::Object(obj) => obj,
        _ => unreachable!("instances[0] was just set to an object"),
    }
}

/// Inline image payload for Veo.
fn veo_image(artifact: &Artifact, param: Param) -> Result<Value> {
    let mime = artifact.resolved_mime_type().map(|m| m.as_str());
    if let Some(data) = &artifact.data {
        return Ok(json!({"bytesBase64Encoded": STANDARD.encode(data), "mimeType": mime}));
    }
    match artifact.url.as_deref() {
        Some(url) if url.starts_with("gs://") => Ok(json!({"gcsUri": url, "mimeType": mime})),
        _ => Err(OmniError::Validation(format!(
            "Veo requires inline image data or a gs:// URL for {param}"
        ))),
    }
}

/// `duration` → `parameters.durationSeconds`; numeric strings are accepted.
#[derive(Debug, Clone, Copy)]
struct VeoDurationMapper;

impl ParameterMapper for VeoDurationMapper {
    fn name(&self) -> Param {
        Param::Duration
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let coerced = match value {
            Some(ParamValue::Str(s)) => Some(ParamValue::Int(s.trim().parse().map_err(|_| {
                OmniError::constraint(format!("duration must be an integer, got '{s}'"))
            })?)),
            other => other.cloned(),
        };
        let Some(validated) = self.validate(coerced.as_ref(), model)? else {
            return Ok(());
        };
        object_entry(request, "parameters").insert("durationSeconds".into(), validated.to_json());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct VeoReferenceImagesMapper;

impl ParameterMapper for VeoReferenceImagesMapper {
    fn name(&self) -> Param {
        Param::ReferenceImages
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let images = validated.as_artifacts().unwrap_or_default();
        let references = images
            .iter()
            .map(|img| {
                Ok(json!({
                    "image": veo_image(img, Param::ReferenceImages)?,
                    "referenceType": "asset",
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        first_instance(request).insert("referenceImages".into(), Value::Array(references));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct VeoFrameMapper {
    param: Param,
    field: &'static str,
}

impl VeoFrameMapper {
    fn first() -> Self {
        Self {
            param: Param::FirstFrame,
            field: "image",
        }
    }

    fn last() -> Self {
        Self {
            param: Param::LastFrame,
            field: "lastFrame",
        }
    }
}

impl ParameterMapper for VeoFrameMapper {
    fn name(&self) -> Param {
        self.param
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let artifact = validated.as_artifact().ok_or_else(|| {
            OmniError::constraint(format!("{} must be an image, got {}", self.param, validated.type_name()))
        })?;
        let payload = veo_image(artifact, self.param)?;
        let instance = first_instance(request);
        if self.param == Param::LastFrame && !instance.contains_key("image") {
            return Err(OmniError::Validation(
                "last_frame requires first_frame to be provided".into(),
            ));
        }
        instance.insert(self.field.into(), payload);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VeoTasks;

impl TaskProtocol for VeoTasks {
    fn label(&self) -> &'static str {
        "veo"
    }

    fn task_id(&self, submit: &Value) -> Result<String> {
        string_field(submit, "name", "No operation name in response")
    }

    fn poll_target(&self, task_id: &str, _submit: &Value) -> Result<String> {
        Ok(format!("/v1beta/{task_id}"))
    }

    fn status(&self, _task_id: &str, response: &Value) -> PollStatus {
        if response.get("done").and_then(Value::as_bool) != Some(true) {
            return PollStatus::Pending;
        }
        match response.get("error") {
            Some(error) => {
                let code = error
                    .get("code")
                    .map(|c| c.to_string().trim_matches('"').to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error");
                PollStatus::Failed(OmniError::TaskFailed(format!(
                    "Video generation failed: {code} - {message}"
                )))
            }
            None => PollStatus::Ready,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VeoExtractor;

impl ContentExtractor for VeoExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("operation")?;
        let samples = body
            .pointer("/response/generateVideoResponse")
            .unwrap_or(&Value::Null);
        let sample = first_of(samples, "generatedSamples", "No generated samples in response")?;
        let video = sample.get("video").unwrap_or(&Value::Null);
        if let Some(encoded) = video.get("bytesBase64Encoded").and_then(Value::as_str) {
            let mime = video
                .get("mimeType")
                .and_then(Value::as_str)
                .and_then(MimeType::parse)
                .unwrap_or(MimeType::Mp4);
            return Ok(Content::Video(
                Artifact::from_base64(MediaKind::Video, encoded)?.with_mime_type(mime),
            ));
        }
        let uri = string_field(video, "uri", "No video URI in generated sample")?;
        Ok(Content::Video(
            Artifact::video_url(storage_url(&uri)).with_mime_type(MimeType::Mp4),
        ))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["response"]
    }
    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        task_metadata(response)
    }
}

// ---------------------------------------------------------------------------
// BFL
// ---------------------------------------------------------------------------

pub const BFL_BASE_URL: &str = "https://api.bfl.ai";
/// Key under which the submit response is kept next to the final status.
pub const SUBMIT_RESPONSE_KEY: &str = "submit_response";

const BFL_USAGE: &[(&str, UsageField)] = &[
    ("/cost", UsageField::BilledUnits),
    ("/input_mp", UsageField::InputMp),
    ("/output_mp", UsageField::OutputMp),
];

pub fn bfl_submit_path(model_id: &str) -> String {
    format!("/v1/{model_id}")
}

pub fn bfl_init_request(input: &ImageInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("prompt".into(), json!(input.prompt));
    request
}

pub fn bfl_mappers() -> Mappers {
    vec![
        Box::new(BflDimensionsMapper),
        Box::new(FieldMapper::new(Param::Seed, "seed")),
        Box::new(FieldMapper::new(Param::OutputFormat, "output_format")),
        Box::new(BflReferenceImagesMapper),
    ]
}

/// Round to the nearest multiple of 16.
fn round16(value: u32) -> u32 {
    value.saturating_add(8) / 16 * 16
}

/// `aspect_ratio` as `"WxH"` → `width` / `height` rounded to multiples of 16.
#[derive(Debug, Clone, Copy)]
struct BflDimensionsMapper;

impl ParameterMapper for BflDimensionsMapper {
    fn name(&self) -> Param {
        Param::AspectRatio
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let (width, height) = parse_dimensions(validated.as_str().unwrap_or_default())?;
        request.insert("width".into(), json!(round16(width)));
        request.insert("height".into(), json!(round16(height)));
        Ok(())
    }
}

/// URL as-is, otherwise base64 of the inline bytes.
fn bfl_image(artifact: &Artifact) -> Result<Value> {
    if let Some(url) = &artifact.url {
        return Ok(json!(url));
    }
    match &artifact.data {
        Some(data) => Ok(json!(STANDARD.encode(data))),
        None => Err(OmniError::Validation(
            "Reference image must have a URL or data".into(),
        )),
    }
}

/// `reference_images` → `input_image`, `input_image_2`, `input_image_3`, ...
#[derive(Debug, Clone, Copy)]
struct BflReferenceImagesMapper;

impl ParameterMapper for BflReferenceImagesMapper {
    fn name(&self) -> Param {
        Param::ReferenceImages
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let images = validated.as_artifacts().unwrap_or_default();
        let encoded = images.iter().map(bfl_image).collect::<Result<Vec<_>>>()?;
        for (i, image) in encoded.into_iter().enumerate() {
            let key = match i {
                0 => "input_image".to_string(),
                n => format!("input_image_{}", n + 1),
            };
            request.insert(key, image);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BflTasks;

impl TaskProtocol for BflTasks {
    fn label(&self) -> &'static str {
        "bfl"
    }

    fn task_id(&self, submit: &Value) -> Result<String> {
        string_field(submit, "id", "No task id in bfl response")
    }

    fn poll_target(&self, _task_id: &str, submit: &Value) -> Result<String> {
        string_field(submit, "polling_url", "No polling_url in bfl response")
    }

    fn status(&self, _task_id: &str, response: &Value) -> PollStatus {
        match response.get("status").and_then(Value::as_str) {
            Some("Ready") => PollStatus::Ready,
            Some("Error" | "Failed") => PollStatus::Failed(OmniError::TaskFailed(format!(
                "bfl image generation failed: {}",
                error_message(response)
            ))),
            _ => PollStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BflExtractor;

impl ContentExtractor for BflExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("task")?;
        let result = body
            .get("result")
            .filter(|r| r.as_object().is_some_and(|o| !o.is_empty()))
            .ok_or_else(|| OmniError::parse("No result in response"))?;
        let sample = string_field(result, "sample", "No image URL in bfl response")?;
        Ok(Content::Image(Artifact::image_url(sample)))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get(SUBMIT_RESPONSE_KEY))
            .map(|submit| Usage::from_mapping(submit, BFL_USAGE))
            .unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        match response.json()?.get("status").and_then(Value::as_str)? {
            "Ready" => Some(FinishReason::new("COMPLETE")),
            _ => None,
        }
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["result"]
    }
    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        task_metadata(response)
    }
}

// ---------------------------------------------------------------------------
// BytePlus video
// ---------------------------------------------------------------------------

pub const BYTEPLUS_TASKS_PATH: &str = "/api/v3/contents/generations/tasks";

pub fn byteplus_video_init_request(model_id: &str, input: &VideoInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    request.insert("content".into(), json!([{"type": "text", "text": input.prompt}]));
    request
}

pub fn byteplus_video_mappers() -> Mappers {
    vec![
        Box::new(PromptFlagMapper::new(Param::Duration, "duration")),
        Box::new(PromptFlagMapper::new(Param::Resolution, "resolution")),
        Box::new(PromptFlagMapper::new(Param::AspectRatio, "ratio")),
        Box::new(ContentImageMapper::new(Param::ReferenceImages, "reference_image")),
        Box::new(ContentImageMapper::new(Param::FirstFrame, "first_frame")),
        Box::new(ContentImageMapper::new(Param::LastFrame, "last_frame")),
    ]
}

/// Appends `--{flag} {value}` to the text content item.
#[derive(Debug, Clone, Copy)]
struct PromptFlagMapper {
    param: Param,
    flag: &'static str,
}

impl PromptFlagMapper {
    const fn new(param: Param, flag: &'static str) -> Self {
        Self { param, flag }
    }
}

impl ParameterMapper for PromptFlagMapper {
    fn name(&self) -> Param {
        self.param
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let text_item = array_entry(request, "content")
            .iter_mut()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("text"));
        if let Some(item) = text_item {
            let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
            item["text"] = json!(format!("{text} --{} {validated}", self.flag));
        }
        Ok(())
    }
}

/// Appends `image_url` content items with a role; images must be URLs.
#[derive(Debug, Clone, Copy)]
struct ContentImageMapper {
    param: Param,
    role: &'static str,
}

impl ContentImageMapper {
    const fn new(param: Param, role: &'static str) -> Self {
        Self { param, role }
    }
}

impl ParameterMapper for ContentImageMapper {
    fn name(&self) -> Param {
        self.param
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let images = validated.as_artifacts().unwrap_or_default();
        let urls = images
            .iter()
            .map(|img| {
                img.url.clone().ok_or_else(|| {
                    OmniError::Validation(format!("BytePlus requires image URL for {}.", self.param))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let content = array_entry(request, "content");
        for url in urls {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": url},
                "role": self.role,
            }));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BytePlusVideoTasks;

impl TaskProtocol for BytePlusVideoTasks {
    fn label(&self) -> &'static str {
        "byteplus"
    }

    fn task_id(&self, submit: &Value) -> Result<String> {
        string_field(submit, "id", "No task id in BytePlus response")
    }

    fn poll_target(&self, task_id: &str, _submit: &Value) -> Result<String> {
        Ok(format!("{BYTEPLUS_TASKS_PATH}/{}", urlencoding::encode(task_id)))
    }

    fn status(&self, task_id: &str, response: &Value) -> PollStatus {
        match response.get("status").and_then(Value::as_str) {
            Some("succeeded") => PollStatus::Ready,
            Some("failed" | "canceled") => PollStatus::Failed(OmniError::TaskFailed(format!(
                "BytePlus task {task_id} failed: {}",
                error_message(response)
            ))),
            _ => PollStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BytePlusVideoExtractor;

impl ContentExtractor for BytePlusVideoExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("task")?;
        let content = body
            .get("content")
            .filter(|c| c.as_object().is_some_and(|o| !o.is_empty()))
            .ok_or_else(|| OmniError::parse("No content in response"))?;
        let url = string_field(content, "video_url", "No video_url in response content")?;
        Ok(Content::Video(Artifact::video_url(url).with_mime_type(MimeType::Mp4)))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get("usage"))
            .map(|u| Usage::from_mapping(u, &[("/total_tokens", UsageField::TotalTokens)]))
            .unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        FinishReason::from_value(response.json()?.get("status"))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["content"]
    }
    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        task_metadata(response)
    }
}

// ---------------------------------------------------------------------------
// OpenAI Sora
// ---------------------------------------------------------------------------

pub const OPENAI_VIDEOS_PATH: &str = "/v1/videos";
/// Key under which the downloaded video is carried, base64 encoded.
pub const VIDEO_DATA_KEY: &str = "video_data";
/// Private request keys combined into `size` once every mapper ran.
const ASPECT_RATIO_KEY: &str = "_aspect_ratio";
const RESOLUTION_KEY: &str = "_resolution";

pub fn sora_init_request(model_id: &str, input: &VideoInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    request.insert("prompt".into(), json!(input.prompt));
    request
}

pub fn sora_mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::AspectRatio, ASPECT_RATIO_KEY)),
        Box::new(FieldMapper::new(Param::Resolution, RESOLUTION_KEY)),
        Box::new(SecondsMapper),
    ]
}

/// `"WxH"` for an aspect ratio at a resolution class, e.g. `16:9` at `720p`
/// is `1280x720`. Unknown values fall back to `16:9` and `720p`.
pub fn sora_size(aspect_ratio: &str, resolution: &str) -> String {
    let short: u32 = match resolution {
        "1080p" => 1080,
        "4k" => 2160,
        _ => 720,
    };
    let (w, h) = match aspect_ratio {
        "9:16" => (9, 16),
        "1:1" => (1, 1),
        "4:3" => (4, 3),
        "3:4" => (3, 4),
        _ => (16, 9),
    };
    // Resolution names the short edge: 9:16 at 720p is 720x1280.
    if w >= h {
        format!("{}x{short}", short * w / h)
    } else {
        format!("{short}x{}", short * h / w)
    }
}

/// Replace the parked aspect ratio and resolution with `size`.
pub fn sora_finalize(request: &mut RequestBody) {
    let aspect = request.remove(ASPECT_RATIO_KEY);
    let resolution = request.remove(RESOLUTION_KEY);
    if aspect.is_none() && resolution.is_none() {
        return;
    }
    let aspect = aspect.as_ref().and_then(Value::as_str).unwrap_or("16:9");
    let resolution = resolution.as_ref().and_then(Value::as_str).unwrap_or("720p");
    request.insert("size".into(), json!(sora_size(aspect, resolution)));
}

/// `duration` → `seconds`, sent as a string.
#[derive(Debug, Clone, Copy)]
struct SecondsMapper;

impl ParameterMapper for SecondsMapper {
    fn name(&self) -> Param {
        Param::Duration
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let coerced = match value {
            Some(ParamValue::Int(i)) => Some(ParamValue::Str(i.to_string())),
            other => other.cloned(),
        };
        if let Some(validated) = self.validate(coerced.as_ref(), model)? {
            request.insert("seconds".into(), json!(validated.to_string()));
        }
        Ok(())
    }
}

pub fn sora_content_path(video_id: &str) -> String {
    format!("{OPENAI_VIDEOS_PATH}/{}/content", urlencoding::encode(video_id))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoraTasks;

impl TaskProtocol for SoraTasks {
    fn label(&self) -> &'static str {
        "sora"
    }

    fn task_id(&self, submit: &Value) -> Result<String> {
        string_field(submit, "id", "No video id in OpenAI response")
    }

    fn poll_target(&self, task_id: &str, _submit: &Value) -> Result<String> {
        Ok(format!("{OPENAI_VIDEOS_PATH}/{}", urlencoding::encode(task_id)))
    }

    fn status(&self, _task_id: &str, response: &Value) -> PollStatus {
        match response.get("status").and_then(Value::as_str) {
            Some("completed") => PollStatus::Ready,
            Some("failed") => PollStatus::Failed(OmniError::TaskFailed(format!(
                "Video generation failed: {}",
                error_message(response)
            ))),
            _ => PollStatus::Pending,
        }
    }
}

/// Reads the video downloaded after the job completed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoraExtractor;

impl ContentExtractor for SoraExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("video")?;
        let encoded = string_field(body, VIDEO_DATA_KEY, "No video_data in response")?;
        Ok(Content::Video(
            Artifact::from_base64(MediaKind::Video, &encoded)?.with_mime_type(MimeType::Mp4),
        ))
    }

    /// Billed in seconds of video.
    fn parse_usage(&self, response: &RawResponse) -> Usage {
        let mut usage = Usage::default();
        if let Some(seconds) = response.json().and_then(|b| b.get("seconds")) {
            let seconds = match seconds {
                Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(Value::Null),
                other => other.clone(),
            };
            usage.set(UsageField::BilledUnits, &seconds);
        }
        usage
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &[VIDEO_DATA_KEY]
    }

    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        let mut metadata = task_metadata(response);
        if let Some(body) = response.json() {
            if let Some(id) = body.get("id") {
                metadata.insert("video_id".into(), id.clone());
            }
            for key in ["seconds", "size", "created_at", "completed_at", "expires_at"] {
                if let Some(v) = body.get(key).filter(|v| !v.is_null()) {
                    metadata.insert(key.into(), v.clone());
                }
            }
        }
        metadata
    }
}

// ---------------------------------------------------------------------------
// xAI video
// ---------------------------------------------------------------------------

pub const XAI_VIDEOS_PATH: &str = "/v1/videos/generations";

const XAI_VIDEO_USAGE: &[(&str, UsageField)] = &[
    ("/input_tokens", UsageField::InputTokens),
    ("/output_tokens", UsageField::OutputTokens),
    ("/total_tokens", UsageField::TotalTokens),
];

pub fn xai_video_init_request(model_id: &str, input: &VideoInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    request.insert("prompt".into(), json!(input.prompt));
    request
}

pub fn xai_video_mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Duration, "duration")),
        Box::new(FieldMapper::new(Param::AspectRatio, "aspect_ratio")),
        Box::new(FieldMapper::new(Param::Resolution, "resolution")),
    ]
}

/// Video URL under `video.url`, or at the top level of an immediate result.
fn xai_video_url(response: &Value) -> Option<&str> {
    response
        .pointer("/video/url")
        .or_else(|| response.get("url"))
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
}

/// Polls `/v1/videos/{request_id}`. The API answers 202 while the video is
/// rendering, so readiness is read from the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct XaiVideoTasks;

impl TaskProtocol for XaiVideoTasks {
    fn label(&self) -> &'static str {
        "xai"
    }

    fn immediate(&self, submit: &Value) -> bool {
        submit.get("request_id").is_none() && xai_video_url(submit).is_some()
    }

    fn task_id(&self, submit: &Value) -> Result<String> {
        string_field(submit, "request_id", "No request_id in video generation response")
    }

    fn poll_target(&self, task_id: &str, _submit: &Value) -> Result<String> {
        Ok(format!("/v1/videos/{}", urlencoding::encode(task_id)))
    }

    fn status(&self, task_id: &str, response: &Value) -> PollStatus {
        if xai_video_url(response).is_some() {
            return PollStatus::Ready;
        }
        match response.get("status").and_then(Value::as_str) {
            Some("failed") => PollStatus::Failed(OmniError::TaskFailed(format!(
                "xAI video {task_id} failed: {}",
                error_message(response)
            ))),
            _ => PollStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XaiVideoExtractor;

impl ContentExtractor for XaiVideoExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("video")?;
        let url = xai_video_url(body).ok_or_else(|| OmniError::parse("No video URL in response"))?;
        Ok(Content::Video(Artifact::video_url(url).with_mime_type(MimeType::Mp4)))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response
            .json()
            .and_then(|b| b.get("usage"))
            .map(|u| Usage::from_mapping(u, XAI_VIDEO_USAGE))
            .unwrap_or_default()
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["video", "url"]
    }

    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        let mut metadata = task_metadata(response);
        if let Some(duration) = response.json().and_then(|b| b.pointer("/video/duration")) {
            metadata.insert("duration".into(), duration.clone());
        }
        metadata
    }
}

// ---------------------------------------------------------------------------
// Mureka
// ---------------------------------------------------------------------------

pub const MUREKA_BASE_URL: &str = "https://api.mureka.ai";
pub const SONG_GENERATE_PATH: &str = "/v1/song/generate";
pub const SONG_QUERY_PATH: &str = "/v1/song/query";
pub const INSTRUMENTAL_GENERATE_PATH: &str = "/v1/instrumental/generate";
pub const INSTRUMENTAL_QUERY_PATH: &str = "/v1/instrumental/query";
/// Private request key selecting the instrumental endpoints.
pub const INSTRUMENTAL_KEY: &str = "_instrumental";

const MUREKA_USAGE: &[(&str, UsageField)] = &[
    ("/total_tokens", UsageField::TotalTokens),
    ("/credits", UsageField::CreditsUsed),
    ("/billed_units", UsageField::BilledUnits),
];

/// Fields the instrumental endpoint rejects.
const VOCAL_FIELDS: [&str; 4] = ["lyrics", "vocal_id", "reference_id", "vocal_gender"];

pub fn mureka_init_request(model_id: &str, input: &MusicInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    request.insert("prompt".into(), json!(input.prompt));
    request
}

pub fn mureka_mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Lyrics, "lyrics")),
        Box::new(FieldMapper::new(Param::Duration, "duration")),
        Box::new(FieldMapper::new(Param::Stream, "stream")),
        Box::new(FieldMapper::new(Param::Quality, "quality")),
        Box::new(FieldMapper::new(Param::Style, "style")),
        Box::new(FieldMapper::new(Param::Genre, "genre")),
        Box::new(FieldMapper::new(Param::VocalGender, "vocal_gender")),
        Box::new(FieldMapper::new(Param::InstrumentalOnly, INSTRUMENTAL_KEY)),
    ]
}

/// Pop the instrumental flag; instrumental requests drop vocal fields.
pub fn take_instrumental(request: &mut RequestBody) -> bool {
    let instrumental = request
        .remove(INSTRUMENTAL_KEY)
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if instrumental {
        for field in VOCAL_FIELDS {
            request.remove(field);
        }
    }
    instrumental
}

pub fn mureka_generate_path(instrumental: bool) -> &'static str {
    if instrumental {
        INSTRUMENTAL_GENERATE_PATH
    } else {
        SONG_GENERATE_PATH
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MurekaTasks {
    pub instrumental: bool,
}

impl TaskProtocol for MurekaTasks {
    fn label(&self) -> &'static str {
        "mureka"
    }

    fn task_id(&self, submit: &Value) -> Result<String> {
        string_field(submit, "id", "No task ID in Mureka response")
    }

    fn poll_target(&self, task_id: &str, _submit: &Value) -> Result<String> {
        let query = if self.instrumental {
            INSTRUMENTAL_QUERY_PATH
        } else {
            SONG_QUERY_PATH
        };
        Ok(format!("{query}/{}", urlencoding::encode(task_id)))
    }

    fn status(&self, task_id: &str, response: &Value) -> PollStatus {
        match response.get("status").and_then(Value::as_str) {
            Some("succeeded") => PollStatus::Ready,
            Some("failed") => PollStatus::Failed(mureka_failure(task_id, response)),
            _ => PollStatus::Pending,
        }
    }
}

fn mureka_failure(task_id: &str, response: &Value) -> OmniError {
    let message = match response.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(_)) => error_message(response),
        _ => "Task failed without error message".to_string(),
    };
    OmniError::TaskFailed(format!("Task {task_id} failed: {message}"))
}

/// Song audio from a task status: `stream_url` or the first choice.
fn mureka_audio(response: &Value) -> Result<Artifact> {
    if let Some(url) = response.get("stream_url").and_then(Value::as_str).filter(|u| !u.is_empty()) {
        return Ok(Artifact::audio_url(url));
    }
    let choice = first_of(response, "choices", "No audio data in response")?;
    let url = choice
        .get("audio_url")
        .or_else(|| choice.get("url"))
        .and_then(Value::as_str)
        .ok_or_else(|| OmniError::parse("No audio URL in response choice"))?;
    Ok(Artifact::audio_url(url))
}

fn mureka_usage(response: &Value) -> Usage {
    response
        .get("usage")
        .map(|u| Usage::from_mapping(u, MUREKA_USAGE))
        .unwrap_or_default()
}

fn mureka_finish(response: &Value) -> Option<FinishReason> {
    let reason = FinishReason::from_value(response.get("status"))?;
    Some(match response.get("error").and_then(Value::as_str) {
        Some(message) => reason.with_message(message),
        None => reason,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MurekaExtractor;

impl ContentExtractor for MurekaExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        Ok(Content::Audio(mureka_audio(response.expect_json("task")?)?))
    }

    fn parse_usage(&self, response: &RawResponse) -> Usage {
        response.json().map(mureka_usage).unwrap_or_default()
    }

    fn parse_finish_reason(&self, response: &RawResponse) -> Option<FinishReason> {
        mureka_finish(response.json()?)
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["choices", "stream_url"]
    }

    fn extra_metadata(&self, response: &RawResponse) -> Map<String, Value> {
        let mut metadata = Map::new();
        let Some(body) = response.json() else {
            return metadata;
        };
        if let Some(id) = body.get(TASK_ID_KEY).or_else(|| body.get("id")) {
            metadata.insert(TASK_ID_KEY.into(), id.clone());
        }
        for key in ["trace_id", "duration"] {
            if let Some(v) = body.get(key) {
                metadata.insert(key.into(), v.clone());
            }
        }
        metadata
    }
}

/// Poll results as stream events: progress while `streaming`, the song once
/// `succeeded`, an error once `failed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MurekaStream;

impl ChunkParser for MurekaStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        match event.get("status").and_then(Value::as_str) {
            Some("succeeded") => Ok(Some(ChunkContent::Media(mureka_audio(event)?))),
            Some("streaming") => Ok(event
                .get("stream_url")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(|url| ChunkContent::Media(Artifact::audio_url(url)))),
            _ => Ok(None),
        }
    }

    fn parse_usage(&self, event: &Value) -> Option<Usage> {
        Some(mureka_usage(event))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        match event.get("status").and_then(Value::as_str) {
            Some("succeeded") => mureka_finish(event),
            _ => None,
        }
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        if event.get("status").and_then(Value::as_str) != Some("failed") {
            return None;
        }
        let task_id = event.get("id").and_then(Value::as_str).unwrap_or("unknown");
        Some(mureka_failure(task_id, event))
    }
}
