//! Ollama: local text over the Responses API, local image generation over NDJSON
//!
//! Local model names are whatever the server has pulled; the catalog holds a
//! few common ones and callers register others with `Registry::register_models`.

use super::{ProviderAdapter, RequestContext, StreamWire, image_input, text_input};
use crate::constraints::{Constraint, Dimensions};
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::ollama_generate::{self, GENERATE_PATH, OllamaExtractor, OllamaStream};
use crate::protocols::open_responses::{self, RESPONSES_PATH, ResponsesExtractor, ResponsesStream};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;

pub const BASE_URL: &str = "http://localhost:11434";

fn local_image(id: &str, name: &str) -> Model {
    let dims = Dimensions::new(256 * 256, 2048 * 2048, 0.25, 4.0)
        .with_preset("square", "1024x1024")
        .with_preset("landscape", "1344x768")
        .with_preset("portrait", "768x1344");
    Model::new(id, Provider::Ollama, name)
        .streaming(true)
        .constraint(Param::AspectRatio, Constraint::Dimensions(dims))
        .constraint(Param::Seed, Constraint::Int)
        .constraint(Param::NegativePrompt, Constraint::string())
}

fn image_models() -> Vec<Model> {
    vec![
        local_image("x/z-image-turbo", "Z-Image Turbo"),
        local_image("x/flux2-klein", "FLUX.2 Klein"),
    ]
}

fn local_text(id: &str, name: &str) -> Model {
    Model::new(id, Provider::Ollama, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::range(0.0, 2.0))
        .constraint(Param::MaxTokens, Constraint::range(1.0, 32_768.0))
        .constraint(Param::OutputSchema, Constraint::Schema)
}

fn text_models() -> Vec<Model> {
    vec![
        local_text("gpt-oss:20b", "gpt-oss 20B"),
        local_text("llama3.2", "Llama 3.2"),
        local_text("qwen3", "Qwen3"),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_models(image_models(), Capability::ImageGeneration)?;
    registry.register_adapter(Arc::new(OllamaText::default()));
    registry.register_adapter(Arc::new(OllamaImages::default()));
    Ok(())
}

pub struct OllamaText {
    mappers: Mappers,
}

impl Default for OllamaText {
    fn default() -> Self {
        Self {
            mappers: open_responses::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaText {
    fn provider(&self) -> Provider {
        Provider::Ollama
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

pub struct OllamaImages {
    mappers: Mappers,
}

impl Default for OllamaImages {
    fn default() -> Self {
        Self {
            mappers: ollama_generate::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaImages {
    fn provider(&self) -> Provider {
        Provider::Ollama
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
        Ok(ollama_generate::init_request(&model.id, image_input(input)?, streaming))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        GENERATE_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(OllamaExtractor)
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(OllamaStream))
    }

    fn stream_wire(&self) -> StreamWire {
        StreamWire::Ndjson
    }

    /// Servers may still answer `stream: false` with NDJSON; the last line is the result.
    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let url = ctx.url(self.base_url(), GENERATE_PATH);
        let body = ctx
            .transport
            .post_ndjson_final(self.provider(), &url, ctx.auth, &request)
            .await?;
        Ok(RawResponse::Json(body))
    }
}
