//! Cohere: Command models over the v2 chat API

use super::{ProviderAdapter, text_input};
use crate::constraints::Constraint;
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::cohere_chat::{self, CHAT_PATH, CohereExtractor, CohereStream};
use crate::protocols::{ChunkParser, ContentExtractor};
use crate::registry::{Model, Registry};
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;

pub const BASE_URL: &str = "https://api.cohere.com";

fn command(id: &str, name: &str) -> Model {
    Model::new(id, Provider::Cohere, name)
        .streaming(true)
        .constraint(Param::Temperature, Constraint::stepped_range(0.0, 1.0, 0.01))
        .constraint(Param::MaxTokens, Constraint::stepped_range(1.0, 4_096.0, 1.0))
        .constraint(Param::Seed, Constraint::Int)
        .constraint(Param::OutputSchema, Constraint::Schema)
}

fn text_models() -> Vec<Model> {
    vec![
        command("command-a-03-2025", "Command A"),
        command("command-a-vision-07-2025", "Command A Vision"),
        command("command-a-reasoning-08-2025", "Command A Reasoning")
            .constraint(Param::ThinkingBudget, Constraint::range(-1.0, 32_000.0)),
        command("command-r7b-12-2024", "Command R7B"),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(text_models(), Capability::TextGeneration)?;
    registry.register_adapter(Arc::new(CohereText::default()));
    Ok(())
}

pub struct CohereText {
    mappers: Mappers,
}

impl Default for CohereText {
    fn default() -> Self {
        Self {
            mappers: cohere_chat::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CohereText {
    fn provider(&self) -> Provider {
        Provider::Cohere
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
        Ok(cohere_chat::init_request(&model.id, text_input(input)?, streaming))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        CHAT_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(CohereExtractor)
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(CohereStream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::apply_mappers;
    use serde_json::json;

    #[test]
    fn reasoning_model_maps_thinking_budget() {
        let adapter = CohereText::default();
        let model = text_models().remove(2);
        let params = Parameters::new().with(Param::ThinkingBudget, 2048).with(Param::Seed, 7);
        let mut request = adapter.init_request(&Input::text("why"), &model, false).unwrap();
        apply_mappers(&mut request, adapter.mappers(), &params, &model).unwrap();
        assert_eq!(request["thinking"], json!({"type": "enabled", "token_budget": 2048}));
        assert_eq!(request["seed"], 7);
        assert_eq!(adapter.endpoint(&model, true), "/v2/chat");
    }
}
