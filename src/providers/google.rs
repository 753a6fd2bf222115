//! Google: Gemini text, Gemini and Imagen images, Veo video, Cloud TTS
//! speech and Gemini embeddings

use super::{
    ProviderAdapter, RequestContext, embedding_input, image_input, speech_input, submit_and_poll,
    text_input, video_input,
};
use crate::constraints::{Constraint, Voice};
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::cloud_tts::{self, CloudTtsExtractor, SYNTHESIZE_PATH};
use crate::protocols::embed_content::{self, EmbedContentExtractor};
use crate::protocols::generate_content::{
    self, GeminiImageExtractor, GenerateContentExtractor, GenerateContentStream, ImagenExtractor,
    is_imagen,
};
use crate::protocols::task_polling::{
    VEO_BASE_URL, VeoExtractor, VeoTasks, veo_init_request, veo_mappers, veo_submit_path,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::transport::PollConfig;
use crate::types::{Capability, Input, MimeType, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = VEO_BASE_URL;

const VEO_POLL: PollConfig = PollConfig::new(Duration::from_secs(10), Duration::from_secs(600), 60);

const FRAME_TYPES: [MimeType; 3] = [MimeType::Png, MimeType::Jpeg, MimeType::Webp];

fn gemini(id: &str, name: &str) -> Model {
    Model::new(id, Provider::Google, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::range(0.0, 2.0))
        .constraint(Param::MaxTokens, Constraint::range(1.0, 65_536.0))
        .constraint(Param::OutputSchema, Constraint::Schema)
        .constraint(Param::WebSearch, Constraint::Bool)
        .constraint(Param::Tools, Constraint::tools(&["web_search", "code_execution"]))
}

fn text_models() -> Vec<Model> {
    vec![
        gemini("gemini-2.5-flash", "Gemini 2.5 Flash")
            .constraint(Param::ThinkingBudget, Constraint::range(-1.0, 24_576.0)),
        gemini("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite").constraint(
            Param::ThinkingBudget,
            Constraint::range_with_specials(512.0, 24_576.0, vec![-1.0, 0.0]),
        ),
        gemini("gemini-2.5-pro", "Gemini 2.5 Pro").constraint(
            Param::ThinkingBudget,
            Constraint::range_with_specials(128.0, 32_768.0, vec![-1.0]),
        ),
        gemini("gemini-3-pro-preview", "Gemini 3 Pro Preview")
            .constraint(Param::ThinkingLevel, Constraint::choice(["low", "high"])),
        gemini("gemini-3-flash-preview", "Gemini 3 Flash Preview")
            .constraint(Param::ThinkingLevel, Constraint::choice(["low", "high"])),
    ]
}

fn image_models() -> Vec<Model> {
    let ratios = [
        "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
    ];
    vec![
        Model::new("gemini-2.5-flash-image", Provider::Google, "Gemini 2.5 Flash Image")
            .constraint(Param::AspectRatio, Constraint::choice(ratios))
            .constraint(Param::ReferenceImages, Constraint::images(None, Some(3))),
        Model::new("gemini-3-pro-image-preview", Provider::Google, "Gemini 3 Pro Image Preview")
            .constraint(Param::AspectRatio, Constraint::choice(ratios))
            .constraint(Param::ImageSize, Constraint::choice(["1K", "2K", "4K"]))
            .constraint(Param::ReferenceImages, Constraint::images(None, Some(14))),
        imagen("imagen-4.0-generate-001", "Imagen 4", &["1K", "2K"]),
        imagen("imagen-4.0-fast-generate-001", "Imagen 4 Fast", &["1K"]),
        imagen("imagen-4.0-ultra-generate-001", "Imagen 4 Ultra", &["1K", "2K"]),
    ]
}

fn imagen(id: &str, name: &str, sizes: &[&str]) -> Model {
    Model::new(id, Provider::Google, name)
        .constraint(Param::NumImages, Constraint::range(1.0, 4.0))
        .constraint(
            Param::AspectRatio,
            Constraint::choice(["1:1", "3:4", "4:3", "9:16", "16:9"]),
        )
        .constraint(Param::ImageSize, Constraint::choice(sizes.iter().copied()))
}

fn embedding_models() -> Vec<Model> {
    vec![
        Model::new("gemini-embedding-001", Provider::Google, "Gemini Embedding")
            .constraint(Param::Dimensions, Constraint::range(128.0, 3072.0)),
        Model::new("text-embedding-004", Provider::Google, "Text Embedding 004")
            .constraint(Param::Dimensions, Constraint::range(1.0, 768.0)),
    ]
}

fn video_models() -> Vec<Model> {
    let veo = |id: &str, name: &str, resolutions: &[&str]| {
        Model::new(id, Provider::Google, name)
            .constraint(Param::AspectRatio, Constraint::choice(["16:9", "9:16"]))
            .constraint(Param::Resolution, Constraint::choice(resolutions.iter().copied()))
            .constraint(Param::Duration, Constraint::choice([4, 6, 8]))
            .constraint(Param::FirstFrame, Constraint::image(Some(FRAME_TYPES.to_vec())))
    };
    vec![
        veo("veo-3.0-generate-001", "Veo 3", &["720p"]),
        veo("veo-3.0-fast-generate-001", "Veo 3 Fast", &["720p"]),
        veo("veo-3.1-generate-preview", "Veo 3.1 Preview", &["720p", "1080p", "4k"])
            .constraint(
                Param::ReferenceImages,
                Constraint::images(Some(FRAME_TYPES.to_vec()), Some(3)),
            )
            .constraint(Param::LastFrame, Constraint::image(Some(FRAME_TYPES.to_vec()))),
        veo("veo-3.1-fast-generate-preview", "Veo 3.1 Fast Preview", &["720p", "1080p", "4k"])
            .constraint(Param::LastFrame, Constraint::image(Some(FRAME_TYPES.to_vec()))),
    ]
}

fn voices() -> Vec<Voice> {
    [
        ("Zephyr", "Bright"),
        ("Puck", "Upbeat"),
        ("Charon", "Informative"),
        ("Kore", "Firm"),
        ("Fenrir", "Excitable"),
        ("Leda", "Youthful"),
        ("Orus", "Firm"),
        ("Aoede", "Breezy"),
        ("Callirrhoe", "Easy-going"),
        ("Autonoe", "Bright"),
        ("Enceladus", "Breathy"),
        ("Iapetus", "Clear"),
        ("Umbriel", "Easy-going"),
        ("Algieba", "Smooth"),
        ("Despina", "Smooth"),
        ("Erinome", "Clear"),
        ("Algenib", "Gravelly"),
        ("Rasalgethi", "Informative"),
        ("Laomedeia", "Upbeat"),
        ("Achernar", "Soft"),
        ("Alnilam", "Firm"),
        ("Schedar", "Even"),
        ("Gacrux", "Mature"),
        ("Pulcherrima", "Forward"),
        ("Achird", "Friendly"),
        ("Zubenelgenubi", "Casual"),
        ("Vindemiatrix", "Gentle"),
        ("Sadachbia", "Lively"),
        ("Sadaltager", "Knowledgeable"),
        ("Sulafat", "Warm"),
    ]
    .into_iter()
    .map(|(id, tone)| Voice::new(id, format!("{id} ({tone})")))
    .collect()
}

fn speech_models() -> Vec<Model> {
    let languages = [
        "ar", "de", "en", "es", "fr", "hi", "id", "it", "ja", "ko", "pt", "ru", "nl", "pl", "th",
        "tr", "vi", "ro", "uk", "ta",
    ];
    let tts = |id: &str, name: &str| {
        Model::new(id, Provider::Google, name)
            .constraint(Param::Voice, Constraint::voices(voices()))
            .constraint(Param::Language, Constraint::choice(languages))
            .constraint(Param::OutputFormat, Constraint::choice(["mp3", "wav", "ogg", "pcm"]))
            .constraint(Param::Prompt, Constraint::string())
    };
    vec![
        tts("gemini-2.5-flash-tts", "Gemini 2.5 Flash TTS"),
        tts("gemini-2.5-pro-tts", "Gemini 2.5 Pro TTS"),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_models(image_models(), Capability::ImageGeneration)?;
    registry.register_models(video_models(), Capability::VideoGeneration)?;
    registry.register_models(speech_models(), Capability::SpeechGeneration)?;
    registry.register_models(embedding_models(), Capability::Embeddings)?;
    registry.register_adapter(Arc::new(GeminiText::default()));
    registry.register_adapter(Arc::new(GeminiImages::default()));
    registry.register_adapter(Arc::new(Veo::default()));
    registry.register_adapter(Arc::new(CloudTts::default()));
    registry.register_adapter(Arc::new(GeminiEmbeddings::default()));
    Ok(())
}

pub struct GeminiText {
    mappers: Mappers,
}

impl Default for GeminiText {
    fn default() -> Self {
        Self {
            mappers: generate_content::text_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiText {
    fn provider(&self) -> Provider {
        Provider::Google
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

    fn init_request(&self, input: &Input, _model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(generate_content::init_text_request(text_input(input)?))
    }

    fn endpoint(&self, model: &Model, streaming: bool) -> String {
        if streaming {
            generate_content::stream_path(&model.id)
        } else {
            generate_content::generate_path(&model.id)
        }
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(GenerateContentExtractor)
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(GenerateContentStream))
    }
}

/// Gemini image models over `:generateContent`; `imagen-*` over `:predict`.
pub struct GeminiImages {
    mappers: Mappers,
    imagen_mappers: Mappers,
}

impl Default for GeminiImages {
    fn default() -> Self {
        Self {
            mappers: generate_content::image_mappers(),
            imagen_mappers: generate_content::imagen_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiImages {
    fn provider(&self) -> Provider {
        Provider::Google
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

    fn mappers_for(&self, model: &Model) -> &[Box<dyn ParameterMapper>] {
        if is_imagen(&model.id) {
            &self.imagen_mappers
        } else {
            &self.mappers
        }
    }

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        let input = image_input(input)?;
        if is_imagen(&model.id) {
            Ok(generate_content::init_imagen_request(input))
        } else {
            Ok(generate_content::init_image_request(input))
        }
    }

    fn endpoint(&self, model: &Model, _streaming: bool) -> String {
        if is_imagen(&model.id) {
            generate_content::predict_path(&model.id)
        } else {
            generate_content::generate_path(&model.id)
        }
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(GeminiImageExtractor)
    }

    fn extractor_for(&self, model: &Model, params: &Parameters) -> Box<dyn ContentExtractor> {
        if is_imagen(&model.id) {
            Box::new(ImagenExtractor)
        } else {
            self.extractor(params)
        }
    }
}

/// Veo runs as a long-running operation: submit, then poll until `done`.
pub struct Veo {
    mappers: Mappers,
}

impl Default for Veo {
    fn default() -> Self {
        Self {
            mappers: veo_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for Veo {
    fn provider(&self) -> Provider {
        Provider::Google
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

    fn init_request(&self, input: &Input, _model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(veo_init_request(video_input(input)?))
    }

    fn endpoint(&self, model: &Model, _streaming: bool) -> String {
        veo_submit_path(&model.id)
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(VeoExtractor)
    }

    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let submit_url = ctx.url(self.base_url(), &self.endpoint(ctx.model, false));
        let outcome =
            submit_and_poll(ctx, &VeoTasks, self.base_url(), &submit_url, &request, VEO_POLL).await?;
        Ok(RawResponse::Json(outcome.status))
    }
}

/// Gemini TTS through the Cloud Text-to-Speech API.
pub struct CloudTts {
    mappers: Mappers,
}

impl Default for CloudTts {
    fn default() -> Self {
        Self {
            mappers: cloud_tts::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CloudTts {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn capability(&self) -> Capability {
        Capability::SpeechGeneration
    }

    fn base_url(&self) -> &'static str {
        cloud_tts::BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(cloud_tts::init_request(&model.id, speech_input(input)?))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        SYNTHESIZE_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(CloudTtsExtractor)
    }
}

pub struct GeminiEmbeddings {
    mappers: Mappers,
}

impl Default for GeminiEmbeddings {
    fn default() -> Self {
        Self {
            mappers: embed_content::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiEmbeddings {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn capability(&self) -> Capability {
        Capability::Embeddings
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        embed_content::init_request(&model.id, embedding_input(input)?)
    }

    fn endpoint(&self, model: &Model, _streaming: bool) -> String {
        embed_content::embed_path(&model.id)
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(EmbedContentExtractor)
    }

    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let url = ctx.url(self.base_url(), &embed_content::path_for(&ctx.model.id, &request));
        let body = ctx
            .transport
            .post_json(self.provider(), &url, ctx.auth, &request)
            .await?;
        Ok(RawResponse::Json(body))
    }
}
