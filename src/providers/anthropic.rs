//! Anthropic: Claude text over the Messages API

use super::{ProviderAdapter, text_input};
use crate::constraints::Constraint;
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::anthropic_messages::{
    self, API_VERSION, MESSAGES_PATH, MessagesExtractor, MessagesStream, STRUCTURED_OUTPUTS_BETA,
};
use crate::protocols::{ChunkParser, ContentExtractor};
use crate::registry::{Model, Registry};
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::sync::Arc;

pub const BASE_URL: &str = "https://api.anthropic.com";

fn claude(id: &str, name: &str, max_tokens: f64, thinking: f64, structured: bool) -> Model {
    let model = Model::new(id, Provider::Anthropic, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::range(0.0, 1.0))
        .constraint(Param::MaxTokens, Constraint::range(1.0, max_tokens))
        .constraint(Param::ThinkingBudget, Constraint::range(-1.0, thinking))
        .constraint(Param::WebSearch, Constraint::Bool)
        .constraint(Param::Tools, Constraint::tools(&["web_search", "code_execution"]));
    if structured {
        model.constraint(Param::OutputSchema, Constraint::Schema)
    } else {
        model
    }
}

fn text_models() -> Vec<Model> {
    vec![
        claude("claude-sonnet-4-5", "Claude Sonnet 4.5", 64_000.0, 64_000.0, true),
        claude("claude-haiku-4-5", "Claude Haiku 4.5", 64_000.0, 32_000.0, true),
        claude("claude-opus-4-5", "Claude Opus 4.5", 64_000.0, 32_000.0, true),
        claude("claude-opus-4-1", "Claude Opus 4.1", 32_000.0, 32_000.0, true),
        claude("claude-sonnet-4-20250514", "Claude Sonnet 4", 64_000.0, 64_000.0, false),
        claude("claude-opus-4-20250514", "Claude Opus 4", 32_000.0, 32_000.0, false),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_adapter(Arc::new(AnthropicText::default()));
    Ok(())
}

pub struct AnthropicText {
    mappers: Mappers,
}

impl Default for AnthropicText {
    fn default() -> Self {
        Self {
            mappers: anthropic_messages::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicText {
    fn provider(&self) -> Provider {
        Provider::Anthropic
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
        Ok(anthropic_messages::init_request(&model.id, text_input(input)?, streaming))
    }

    fn finalize_request(&self, request: &mut RequestBody, _params: &Parameters, _model: &Model) -> Result<()> {
        anthropic_messages::finalize_request(request);
        Ok(())
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        MESSAGES_PATH.to_string()
    }

    fn extra_headers(&self, request: &RequestBody) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        if request.contains_key("output_format") {
            headers.insert("anthropic-beta", HeaderValue::from_static(STRUCTURED_OUTPUTS_BETA));
        }
        headers
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(MessagesExtractor)
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(MessagesStream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::apply_mappers;
    use crate::types::OutputSchema;
    use serde_json::json;

    #[test]
    fn structured_output_adds_beta_header() {
        let adapter = AnthropicText::default();
        let model = text_models().remove(0);
        let params = Parameters::new().with(
            Param::OutputSchema,
            OutputSchema::new("answer", json!({"type": "object", "properties": {"x": {"type": "string"}}})),
        );
        let mut request = adapter.init_request(&Input::text("hi"), &model, false).unwrap();
        apply_mappers(&mut request, adapter.mappers(), &params, &model).unwrap();
        adapter.finalize_request(&mut request, &params, &model).unwrap();

        let headers = adapter.extra_headers(&request);
        assert_eq!(headers["anthropic-version"], API_VERSION);
        assert_eq!(headers["anthropic-beta"], STRUCTURED_OUTPUTS_BETA);
    }

    #[test]
    fn plain_request_has_no_beta_header() {
        let adapter = AnthropicText::default();
        let model = text_models().remove(1);
        let mut request = adapter.init_request(&Input::text("hi"), &model, true).unwrap();
        adapter.finalize_request(&mut request, &Parameters::new(), &model).unwrap();
        assert!(!adapter.extra_headers(&request).contains_key("anthropic-beta"));
        assert_eq!(request["max_tokens"], anthropic_messages::DEFAULT_MAX_TOKENS);
    }
}
