//! Mistral: chat completions

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

pub const BASE_URL: &str = "https://api.mistral.ai";

fn chat(id: &str, name: &str, max_tokens: f64) -> Model {
    Model::new(id, Provider::Mistral, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::stepped_range(0.0, 1.5, 0.01))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::OutputSchema, Constraint::Schema)
        .constraint(Param::WebSearch, Constraint::Bool)
        .constraint(Param::Tools, Constraint::tools(&["web_search"]))
}

fn text_models() -> Vec<Model> {
    vec![
        chat("mistral-large-latest", "Mistral Large", 32_768.0),
        chat("mistral-medium-latest", "Mistral Medium", 32_768.0),
        chat("mistral-small-latest", "Mistral Small", 32_768.0),
        chat("magistral-medium-latest", "Magistral Medium", 40_000.0)
            .constraint(Param::ThinkingBudget, Constraint::range(-1.0, 40_000.0)),
        chat("magistral-small-latest", "Magistral Small", 40_000.0)
            .constraint(Param::ThinkingBudget, Constraint::range(-1.0, 40_000.0)),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_adapter(Arc::new(MistralText::default()));
    Ok(())
}

pub struct MistralText {
    mappers: Mappers,
}

impl Default for MistralText {
    fn default() -> Self {
        Self {
            mappers: ChatFlavor::Mistral.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MistralText {
    fn provider(&self) -> Provider {
        Provider::Mistral
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
        Box::new(ChatCompletionsExtractor::new(ChatFlavor::Mistral))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ChatCompletionsStream::new(ChatFlavor::Mistral)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OmniError;
    use crate::params::apply_mappers;

    #[test]
    fn thinking_budget_switches_prompt_mode() {
        let adapter = MistralText::default();
        let magistral = text_models().remove(3);

        let params = Parameters::new().with(Param::ThinkingBudget, 1024);
        let mut request = adapter.init_request(&Input::text("hi"), &magistral, false).unwrap();
        apply_mappers(&mut request, adapter.mappers(), &params, &magistral).unwrap();
        assert_eq!(request["prompt_mode"], "reasoning");

        let params = Parameters::new().with(Param::ThinkingBudget, 0);
        let mut request = adapter.init_request(&Input::text("hi"), &magistral, false).unwrap();
        apply_mappers(&mut request, adapter.mappers(), &params, &magistral).unwrap();
        assert!(request["prompt_mode"].is_null());
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let adapter = MistralText::default();
        let model = text_models().remove(0);
        let params = Parameters::new().with(Param::Voice, "alloy");
        let mut request = adapter.init_request(&Input::text("hi"), &model, false).unwrap();
        let err = apply_mappers(&mut request, adapter.mappers(), &params, &model).unwrap_err();
        assert!(matches!(err, OmniError::UnsupportedParameter { .. }));
    }
}
