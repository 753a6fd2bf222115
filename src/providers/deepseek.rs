//! DeepSeek: chat completions

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

pub const BASE_URL: &str = "https://api.deepseek.com";

fn chat(id: &str, name: &str, max_tokens: f64) -> Model {
    Model::new(id, Provider::DeepSeek, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::stepped_range(0.0, 2.0, 0.01))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::OutputSchema, Constraint::Schema)
}

fn text_models() -> Vec<Model> {
    vec![
        chat("deepseek-chat", "DeepSeek V3.2", 8_192.0),
        chat("deepseek-reasoner", "DeepSeek V3.2 Reasoner", 65_536.0),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_adapter(Arc::new(DeepSeekText::default()));
    Ok(())
}

pub struct DeepSeekText {
    mappers: Mappers,
}

impl Default for DeepSeekText {
    fn default() -> Self {
        Self {
            mappers: ChatFlavor::DeepSeek.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for DeepSeekText {
    fn provider(&self) -> Provider {
        Provider::DeepSeek
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
        Box::new(ChatCompletionsExtractor::new(ChatFlavor::DeepSeek))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ChatCompletionsStream::new(ChatFlavor::DeepSeek)))
    }
}
