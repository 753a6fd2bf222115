//! OpenAI: Responses API text, Images API generation, Sora video and speech

use super::{
    ProviderAdapter, RequestContext, image_input, speech_input, submit_and_poll, text_input,
    video_input,
};
use crate::constraints::{Constraint, Voice};
use crate::error::{OmniError, Result};
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::binary_audio::{
    self, BinaryAudioExtractor, OPENAI_SPEECH_PATH, mime_for_output_format,
};
use crate::protocols::images_sse::{ImageApi, ImagesExtractor, ImagesStream};
use crate::protocols::open_responses::{self, RESPONSES_PATH, ResponsesExtractor, ResponsesStream};
use crate::protocols::task_polling::{
    OPENAI_VIDEOS_PATH, SoraExtractor, SoraTasks, VIDEO_DATA_KEY, sora_content_path, sora_finalize,
    sora_init_request, sora_mappers,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::transport::PollConfig;
use crate::types::{Capability, Input, MimeType, Param, Parameters, Provider};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://api.openai.com";

const SORA_POLL: PollConfig = PollConfig::new(Duration::from_secs(5), Duration::from_secs(600), 120);

const SPEECH_FORMATS: [&str; 4] = ["mp3", "opus", "aac", "flac"];

fn text_model(id: &str, name: &str, max_tokens: f64) -> Model {
    Model::new(id, Provider::OpenAI, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::range(0.0, 2.0))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::OutputSchema, Constraint::Schema)
        .constraint(Param::WebSearch, Constraint::Bool)
        .constraint(Param::Tools, Constraint::tools(&["web_search", "code_execution"]))
}

fn reasoning_model(id: &str, name: &str) -> Model {
    Model::new(id, Provider::OpenAI, name)
        .streaming(true)
        .constraint(Param::MaxTokens, Constraint::range(1.0, 128_000.0))
        .constraint(
            Param::ReasoningEffort,
            Constraint::choice(["minimal", "low", "medium", "high"]),
        )
        .constraint(Param::Verbosity, Constraint::choice(["low", "medium", "high"]))
        .constraint(Param::OutputSchema, Constraint::Schema)
        .constraint(Param::WebSearch, Constraint::Bool)
        .constraint(Param::Tools, Constraint::tools(&["web_search", "code_execution"]))
}

fn text_models() -> Vec<Model> {
    vec![
        text_model("gpt-4o", "GPT-4o", 16_384.0),
        text_model("gpt-4o-mini", "GPT-4o Mini", 16_384.0),
        text_model("gpt-4.1", "GPT-4.1", 32_768.0),
        reasoning_model("gpt-5", "GPT-5"),
        reasoning_model("gpt-5-mini", "GPT-5 Mini"),
    ]
}

fn image_models() -> Vec<Model> {
    let gpt_image = |id: &str, name: &str| {
        Model::new(id, Provider::OpenAI, name)
            .streaming(true)
            .constraint(Param::PartialImages, Constraint::range(0.0, 3.0))
            .constraint(
                Param::Size,
                Constraint::choice(["1024x1024", "1536x1024", "1024x1536", "auto"]),
            )
            .constraint(Param::Quality, Constraint::choice(["low", "medium", "high", "auto"]))
            .constraint(Param::Background, Constraint::choice(["transparent", "opaque", "auto"]))
            .constraint(Param::OutputFormat, Constraint::choice(["png", "jpeg", "webp"]))
            .constraint(Param::Moderation, Constraint::choice(["low", "auto"]))
            .constraint(Param::OutputCompression, Constraint::range(0.0, 100.0))
    };
    vec![
        Model::new("dall-e-3", Provider::OpenAI, "DALL-E 3")
            .constraint(
                Param::Size,
                Constraint::choice(["1024x1024", "1792x1024", "1024x1792"]),
            )
            .constraint(Param::Quality, Constraint::choice(["standard", "hd"]))
            .constraint(Param::Style, Constraint::choice(["vivid", "natural"])),
        gpt_image("gpt-image-1", "GPT Image 1"),
        gpt_image("gpt-image-1-mini", "GPT Image 1 Mini"),
    ]
}

fn video_models() -> Vec<Model> {
    let sora = |id: &str, name: &str| {
        Model::new(id, Provider::OpenAI, name)
            .constraint(Param::Duration, Constraint::choice(["4", "8", "12"]))
            .constraint(Param::AspectRatio, Constraint::choice(["16:9", "9:16"]))
            .constraint(Param::Resolution, Constraint::choice(["720p"]))
    };
    vec![
        sora("sora-2", "Sora 2"),
        sora("sora-2-pro", "Sora 2 Pro"),
        sora("sora-2-2025-12-08", "Sora 2 (December 2025)"),
    ]
}

fn voices(with_ballad: bool) -> Vec<Voice> {
    let mut ids = vec![
        "alloy", "ash", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
    ];
    if with_ballad {
        ids.push("ballad");
    }
    ids.into_iter()
        .map(|id| {
            let mut name = id.to_string();
            name[..1].make_ascii_uppercase();
            Voice::new(id, name)
        })
        .collect()
}

fn speech_models() -> Vec<Model> {
    let tts = |id: &str, name: &str, with_ballad: bool| {
        Model::new(id, Provider::OpenAI, name)
            .constraint(Param::Voice, Constraint::voices(voices(with_ballad)))
            .constraint(Param::Speed, Constraint::range(0.25, 4.0))
            .constraint(Param::OutputFormat, Constraint::choice(SPEECH_FORMATS))
    };
    vec![
        tts("tts-1", "TTS-1", false),
        tts("tts-1-hd", "TTS-1 HD", false),
        tts("gpt-4o-mini-tts", "GPT-4o Mini TTS", true)
            .constraint(Param::Instructions, Constraint::string()),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_models(image_models(), Capability::ImageGeneration)?;
    registry.register_models(video_models(), Capability::VideoGeneration)?;
    registry.register_models(speech_models(), Capability::SpeechGeneration)?;
    registry.register_adapter(Arc::new(OpenAiText::default()));
    registry.register_adapter(Arc::new(OpenAiImages::default()));
    registry.register_adapter(Arc::new(Sora::default()));
    registry.register_adapter(Arc::new(OpenAiSpeech::default()));
    Ok(())
}

pub struct OpenAiText {
    mappers: Mappers,
}

impl Default for OpenAiText {
    fn default() -> Self {
        Self {
            mappers: open_responses::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiText {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn capability(&self) -> Capability {
        Capability::TextGeneration
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, streaming: bool) -> Result<RequestBody> {
        Ok(open_responses::init_request(&model.id, text_input(input)?, streaming))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        RESPONSES_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(ResponsesExtractor)
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ResponsesStream))
    }
}

pub struct OpenAiImages {
    mappers: Mappers,
}

impl Default for OpenAiImages {
    fn default() -> Self {
        Self {
            mappers: ImageApi::OpenAI.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiImages {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn capability(&self) -> Capability {
        Capability::ImageGeneration
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, streaming: bool) -> Result<RequestBody> {
        Ok(ImageApi::OpenAI.init_request(&model.id, image_input(input)?, streaming))
    }

    fn finalize_request(&self, request: &mut RequestBody, _params: &Parameters, model: &Model) -> Result<()> {
        ImageApi::OpenAI.finalize_request(request, &model.id);
        Ok(())
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        ImageApi::OpenAI.path().to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(ImagesExtractor::new(ImageApi::OpenAI))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ImagesStream::new(ImageApi::OpenAI)))
    }
}

/// Sora jobs: create, poll until `completed`, then download the MP4.
pub struct Sora {
    mappers: Mappers,
}

impl Default for Sora {
    fn default() -> Self {
        Self {
            mappers: sora_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for Sora {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn capability(&self) -> Capability {
        Capability::VideoGeneration
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(sora_init_request(&model.id, video_input(input)?))
    }

    fn finalize_request(&self, request: &mut RequestBody, _params: &Parameters, _model: &Model) -> Result<()> {
        sora_finalize(request);
        Ok(())
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        OPENAI_VIDEOS_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(SoraExtractor)
    }

    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let submit_url = ctx.url(self.base_url(), OPENAI_VIDEOS_PATH);
        let outcome =
            submit_and_poll(ctx, &SoraTasks, self.base_url(), &submit_url, &request, SORA_POLL).await?;
        let mut status = outcome.status;
        let video_id = status
            .get("id")
            .and_then(Value::as_str)
            .or_else(|| outcome.submit.get("id").and_then(Value::as_str))
            .ok_or_else(|| OmniError::parse("No video id in OpenAI response"))?
            .to_string();
        let download = ctx
            .transport
            .get_binary(self.provider(), &ctx.url(self.base_url(), &sora_content_path(&video_id)), ctx.auth)
            .await?;
        let RawResponse::Binary { data, .. } = download else {
            return Err(OmniError::parse("Expected binary video content"));
        };
        if let Value::Object(map) = &mut status {
            map.insert(VIDEO_DATA_KEY.into(), Value::String(STANDARD.encode(&data)));
        }
        Ok(RawResponse::Json(status))
    }
}

/// Text-to-speech over `/v1/audio/speech`; the body is the audio file.
pub struct OpenAiSpeech {
    mappers: Mappers,
}

impl Default for OpenAiSpeech {
    fn default() -> Self {
        Self {
            mappers: binary_audio::openai_speech_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiSpeech {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn capability(&self) -> Capability {
        Capability::SpeechGeneration
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(binary_audio::openai_speech_init_request(&model.id, speech_input(input)?))
    }

    /// Only steerable models accept `instructions`.
    fn finalize_request(&self, request: &mut RequestBody, params: &Parameters, model: &Model) -> Result<()> {
        if params.get(Param::Instructions).is_some() && !model.supports(Param::Instructions) {
            return Err(OmniError::UnsupportedParameter {
                parameter: Param::Instructions.to_string(),
                model_id: model.id.clone(),
            });
        }
        binary_audio::openai_speech_finalize(request);
        Ok(())
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        OPENAI_SPEECH_PATH.to_string()
    }

    fn extractor(&self, params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(BinaryAudioExtractor::new(self.requested_mime(params)))
    }

    fn output_mime(&self, params: &Parameters) -> Option<MimeType> {
        Some(self.requested_mime(params))
    }

    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let url = ctx.url(self.base_url(), OPENAI_SPEECH_PATH);
        ctx.transport
            .post_binary(self.provider(), &url, ctx.auth, &request)
            .await
    }
}

impl OpenAiSpeech {
    fn requested_mime(&self, params: &Parameters) -> MimeType {
        mime_for_output_format(params.get(Param::OutputFormat).and_then(|v| v.as_str()))
    }
}
