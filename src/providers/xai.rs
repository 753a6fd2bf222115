//! xAI: Grok text over the Responses API, Grok Imagine images and video

use super::{ProviderAdapter, RequestContext, image_input, submit_and_poll, text_input, video_input};
use crate::constraints::Constraint;
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::images_sse::{ImageApi, ImagesExtractor};
use crate::protocols::open_responses::{self, RESPONSES_PATH, ResponsesExtractor, ResponsesStream};
use crate::protocols::task_polling::{
    XAI_VIDEOS_PATH, XaiVideoExtractor, XaiVideoTasks, xai_video_init_request, xai_video_mappers,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::transport::PollConfig;
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://api.x.ai";

const VIDEO_POLL: PollConfig = PollConfig::new(Duration::from_secs(5), Duration::from_secs(600), 120);

const IMAGE_ASPECT_RATIOS: [&str; 13] = [
    "1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3", "2:1", "1:2", "19.5:9", "9:19.5", "20:9", "9:20",
];

fn grok(id: &str, name: &str, max_tokens: f64) -> Model {
    Model::new(id, Provider::XAi, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::range(0.0, 2.0))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::OutputSchema, Constraint::Schema)
        .constraint(Param::WebSearch, Constraint::Bool)
        .constraint(
            Param::Tools,
            Constraint::tools(&["web_search", "x_search", "code_execution"]),
        )
}

fn text_models() -> Vec<Model> {
    vec![
        grok("grok-4-1-fast-reasoning", "Grok 4.1 Fast Reasoning", 30_000.0),
        grok("grok-4-1-fast-non-reasoning", "Grok 4.1 Fast Non-Reasoning", 30_000.0),
        grok("grok-4-fast-reasoning", "Grok 4 Fast Reasoning", 30_000.0),
        grok("grok-3-mini", "Grok 3 Mini", 8_192.0)
            .constraint(Param::ReasoningEffort, Constraint::choice(["low", "high"])),
    ]
}

fn image_models() -> Vec<Model> {
    vec![
        Model::new("grok-imagine-image", Provider::XAi, "Grok Imagine Image")
            .constraint(Param::NumImages, Constraint::range(1.0, 10.0))
            .constraint(Param::AspectRatio, Constraint::choice(IMAGE_ASPECT_RATIOS))
            .constraint(Param::OutputFormat, Constraint::choice(["url", "b64_json"])),
    ]
}

fn video_models() -> Vec<Model> {
    vec![
        Model::new("grok-imagine-video", Provider::XAi, "Grok Imagine Video")
            .constraint(Param::Duration, Constraint::range(1.0, 15.0))
            .constraint(Param::AspectRatio, Constraint::choice(["16:9", "9:16", "1:1"]))
            .constraint(Param::Resolution, Constraint::choice(["480p", "720p"])),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_models(image_models(), Capability::ImageGeneration)?;
    registry.register_models(video_models(), Capability::VideoGeneration)?;
    registry.register_adapter(Arc::new(XaiText::default()));
    registry.register_adapter(Arc::new(XaiImages::default()));
    registry.register_adapter(Arc::new(XaiVideo::default()));
    Ok(())
}

pub struct XaiText {
    mappers: Mappers,
}

impl Default for XaiText {
    fn default() -> Self {
        Self {
            mappers: open_responses::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for XaiText {
    fn provider(&self) -> Provider {
        Provider::XAi
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

/// Grok Imagine images; non-streaming, OpenAI-shaped `data[]` response.
pub struct XaiImages {
    mappers: Mappers,
}

impl Default for XaiImages {
    fn default() -> Self {
        Self {
            mappers: ImageApi::XAi.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for XaiImages {
    fn provider(&self) -> Provider {
        Provider::XAi
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

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(ImageApi::XAi.init_request(&model.id, image_input(input)?, false))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        ImageApi::XAi.path().to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(ImagesExtractor::new(ImageApi::XAi))
    }
}

/// Grok Imagine video. Short clips may come back on submit; longer ones
/// are polled by request id.
pub struct XaiVideo {
    mappers: Mappers,
}

impl Default for XaiVideo {
    fn default() -> Self {
        Self {
            mappers: xai_video_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for XaiVideo {
    fn provider(&self) -> Provider {
        Provider::XAi
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
        Ok(xai_video_init_request(&model.id, video_input(input)?))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        XAI_VIDEOS_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(XaiVideoExtractor)
    }

    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let url = ctx.url(self.base_url(), XAI_VIDEOS_PATH);
        let outcome =
            submit_and_poll(ctx, &XaiVideoTasks, self.base_url(), &url, &request, VIDEO_POLL).await?;
        Ok(RawResponse::Json(outcome.status))
    }
}
