//! Black Forest Labs: FLUX image generation

use super::{ProviderAdapter, RequestContext, image_input, submit_and_poll};
use crate::constraints::{Constraint, Dimensions};
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::task_polling::{
    BFL_BASE_URL, BflExtractor, BflTasks, SUBMIT_RESPONSE_KEY, bfl_init_request, bfl_mappers,
    bfl_submit_path,
};
use crate::protocols::{ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::transport::PollConfig;
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = BFL_BASE_URL;

const POLL: PollConfig = PollConfig::new(Duration::from_secs(1), Duration::from_secs(300), 300);

fn flux_dimensions() -> Constraint {
    let dims = [
        ("Square 1K", "1024x1024"),
        ("Square 2K", "2048x2048"),
        ("HD 16:9", "1920x1080"),
        ("Portrait HD", "1080x1920"),
        ("4:3", "1280x960"),
        ("3:4", "960x1280"),
        ("Ultra-wide 21:9", "1920x832"),
        ("Portrait 9:21", "832x1920"),
    ]
    .into_iter()
    .fold(Dimensions::new(64 * 64, 2048 * 2048, 9.0 / 21.0, 21.0 / 9.0), |d, (label, size)| {
        d.with_preset(label, size)
    });
    Constraint::Dimensions(dims)
}

fn flux(id: &str, name: &str, max_references: usize) -> Model {
    Model::new(id, Provider::Bfl, name)
        .constraint(Param::AspectRatio, flux_dimensions())
        .constraint(Param::ReferenceImages, Constraint::images(None, Some(max_references)))
        .constraint(Param::Seed, Constraint::Int)
        .constraint(Param::OutputFormat, Constraint::choice(["jpeg", "png"]))
}

fn image_models() -> Vec<Model> {
    vec![
        flux("flux-2-max", "FLUX.2 [max]", 7),
        flux("flux-2-pro", "FLUX.2 [pro]", 7),
        flux("flux-2-flex", "FLUX.2 [flex]", 9),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(image_models(), Capability::ImageGeneration)?;
    registry.register_adapter(Arc::new(FluxImages::default()));
    Ok(())
}

pub struct FluxImages {
    mappers: Mappers,
}

impl Default for FluxImages {
    fn default() -> Self {
        Self {
            mappers: bfl_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for FluxImages {
    fn provider(&self) -> Provider {
        Provider::Bfl
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

    fn init_request(&self, input: &Input, _model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(bfl_init_request(image_input(input)?))
    }

    fn endpoint(&self, model: &Model, _streaming: bool) -> String {
        bfl_submit_path(&model.id)
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(BflExtractor)
    }

    /// Billing lives on the submit response, so it rides along with the
    /// final status under `submit_response`.
    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let submit_url = ctx.url(self.base_url(), &self.endpoint(ctx.model, false));
        let outcome = submit_and_poll(ctx, &BflTasks, self.base_url(), &submit_url, &request, POLL).await?;
        let mut status = outcome.status;
        if let Value::Object(map) = &mut status {
            map.insert(SUBMIT_RESPONSE_KEY.into(), outcome.submit);
        }
        Ok(RawResponse::Json(status))
    }
}
