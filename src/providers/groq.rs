//! Groq: chat completions on the OpenAI-compatible endpoint

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

pub const BASE_URL: &str = "https://api.groq.com/openai";

fn chat(id: &str, name: &str, max_tokens: f64) -> Model {
    Model::new(id, Provider::Groq, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::stepped_range(0.0, 2.0, 0.01))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::OutputSchema, Constraint::Schema)
}

fn text_models() -> Vec<Model> {
    vec![
        chat("llama-3.3-70b-versatile", "Llama 3.3 70B Versatile", 32_768.0),
        chat("llama-3.1-8b-instant", "Llama 3.1 8B Instant", 131_072.0),
        chat("qwen/qwen3-32b", "Qwen3 32B", 40_960.0),
        chat("moonshotai/kimi-k2-instruct", "Kimi K2 Instruct", 16_384.0),
        chat("moonshotai/kimi-k2-instruct-0905", "Kimi K2 Instruct 0905", 16_384.0),
        chat("meta-llama/llama-4-scout-17b-16e-instruct", "Llama 4 Scout", 8_192.0),
        chat("meta-llama/llama-4-maverick-17b-128e-instruct", "Llama 4 Maverick", 8_192.0),
        chat("openai/gpt-oss-20b", "GPT-OSS 20B", 65_536.0),
        chat("openai/gpt-oss-120b", "GPT-OSS 120B", 65_536.0),
        chat("openai/gpt-oss-safeguard-20b", "GPT-OSS Safeguard 20B", 65_536.0),
        chat("groq/compound", "Compound", 8_192.0),
        chat("groq/compound-mini", "Compound Mini", 8_192.0),
        chat("allam-2-7b", "ALLaM 2 7B", 4_096.0),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_adapter(Arc::new(GroqText::default()));
    Ok(())
}

pub struct GroqText {
    mappers: Mappers,
}

impl Default for GroqText {
    fn default() -> Self {
        Self {
            mappers: ChatFlavor::Groq.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GroqText {
    fn provider(&self) -> Provider {
        Provider::Groq
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
        Box::new(ChatCompletionsExtractor::new(ChatFlavor::Groq))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ChatCompletionsStream::new(ChatFlavor::Groq)))
    }
}
