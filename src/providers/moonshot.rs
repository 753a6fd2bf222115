//! Moonshot: Kimi chat completions

use super::{ProviderAdapter, text_input};
use crate::constraints::Constraint;
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::chat_completions::{
    self, CHAT_COMPLETIONS_PATH, ChatCompletionsExtractor, ChatCompletionsStream, ChatFlavor,
};
use crate::protocols::{ChunkParser, ContentExtractor};
use crate::registry::{Model, Registry};
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;

pub const BASE_URL: &str = "https://api.moonshot.ai";

fn kimi(id: &str, name: &str, max_tokens: f64) -> Model {
    Model::new(id, Provider::Moonshot, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::stepped_range(0.0, 1.0, 0.01))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::OutputSchema, Constraint::Schema)
}

fn text_models() -> Vec<Model> {
    vec![
        kimi("moonshot-v1-8k-vision-preview", "Moonshot v1 8K Vision Preview", 8_192.0),
        kimi("kimi-k2-0905-preview", "Kimi K2 0905 Preview", 32_768.0),
        kimi("kimi-k2-0711-preview", "Kimi K2 0711 Preview", 32_768.0),
        kimi("kimi-k2-turbo-preview", "Kimi K2 Turbo Preview", 32_768.0),
        kimi("kimi-k2-thinking-turbo", "Kimi K2 Thinking Turbo", 32_768.0),
        kimi("kimi-k2-thinking", "Kimi K2 Thinking", 32_768.0),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_adapter(Arc::new(MoonshotText::default()));
    Ok(())
}

pub struct MoonshotText {
    mappers: Mappers,
}

impl Default for MoonshotText {
    fn default() -> Self {
        Self {
            mappers: ChatFlavor::Moonshot.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MoonshotText {
    fn provider(&self) -> Provider {
        Provider::Moonshot
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
        Ok(chat_completions::init_request(&model.id, text_input(input)?, streaming))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        CHAT_COMPLETIONS_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(ChatCompletionsExtractor::new(ChatFlavor::Moonshot))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ChatCompletionsStream::new(ChatFlavor::Moonshot)))
    }
}
