//! BytePlus ModelArk: Seedream images and Seedance video

use super::{ProviderAdapter, RequestContext, image_input, submit_and_poll, video_input};
use crate::constraints::{Constraint, Dimensions};
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::images_sse::{ImageApi, ImagesExtractor, ImagesStream, check_byteplus_size};
use crate::protocols::task_polling::{
    BYTEPLUS_TASKS_PATH, BytePlusVideoExtractor, BytePlusVideoTasks, byteplus_video_init_request,
    byteplus_video_mappers,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::transport::PollConfig;
use crate::types::{Capability, Input, MimeType, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://ark.ap-southeast.bytepluses.com";

const VIDEO_POLL: PollConfig = PollConfig::new(Duration::from_secs(5), Duration::from_secs(600), 120);

const SIZE_PRESETS: &[(&str, &str)] = &[
    ("1K 1:1", "1024x1024"),
    ("1K 3:4", "864x1152"),
    ("1K 4:3", "1152x864"),
    ("1K 16:9", "1312x736"),
    ("1K 9:16", "736x1312"),
    ("2K 1:1", "2048x2048"),
    ("2K 3:4", "1728x2304"),
    ("2K 4:3", "2304x1728"),
    ("2K 16:9", "2848x1600"),
    ("2K 9:16", "1600x2848"),
    ("4K 1:1", "4096x4096"),
    ("4K 16:9", "5504x3040"),
    ("4K 9:16", "3040x5504"),
];

fn seedream_dimensions(min_pixels: u64) -> Constraint {
    let dims = SIZE_PRESETS
        .iter()
        .fold(Dimensions::new(min_pixels, 4096 * 4096, 1.0 / 16.0, 16.0), |d, (label, size)| {
            d.with_preset(*label, *size)
        });
    Constraint::Dimensions(dims)
}

fn image_models() -> Vec<Model> {
    vec![
        Model::new("seedream-4-0-250828", Provider::BytePlus, "Seedream 4.0")
            .streaming(true)
            .constraint(Param::AspectRatio, seedream_dimensions(1280 * 720))
            .constraint(Param::Quality, Constraint::choice(["1K", "2K", "4K"]))
            .constraint(Param::Seed, Constraint::Int),
        Model::new("seedream-4-5-251128", Provider::BytePlus, "Seedream 4.5")
            .streaming(true)
            .constraint(Param::AspectRatio, seedream_dimensions(1920 * 1920))
            .constraint(Param::Quality, Constraint::choice(["2K", "4K"]))
            .constraint(Param::Seed, Constraint::Int),
    ]
}

fn video_models() -> Vec<Model> {
    let frame = || Constraint::image(Some(vec![MimeType::Png, MimeType::Jpeg, MimeType::Webp]));
    let seedance = |id: &str, name: &str, min_duration: f64, resolutions: &[&str]| {
        Model::new(id, Provider::BytePlus, name)
            .constraint(Param::Duration, Constraint::stepped_range(min_duration, 12.0, 1.0))
            .constraint(Param::Resolution, Constraint::choice(resolutions.iter().copied()))
            .constraint(
                Param::AspectRatio,
                Constraint::choice(["16:9", "4:3", "1:1", "3:4", "9:16", "21:9", "adaptive"]),
            )
            .constraint(Param::FirstFrame, frame())
            .constraint(Param::LastFrame, frame())
    };
    let hd = ["480p", "720p", "1080p"];
    vec![
        seedance("seedance-1-0-lite-t2v-250428", "Seedance 1.0 Lite T2V", 2.0, &hd),
        seedance("seedance-1-0-lite-i2v-250428", "Seedance 1.0 Lite I2V", 2.0, &hd)
            .constraint(Param::ReferenceImages, Constraint::images(None, Some(4))),
        seedance("seedance-1-0-pro-250528", "Seedance 1.0 Pro", 2.0, &hd),
        seedance("seedance-1-0-pro-fast-251015", "Seedance 1.0 Pro Fast", 2.0, &hd),
        seedance("seedance-1-5-pro-251215", "Seedance 1.5 Pro", 4.0, &["480p", "720p"]),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(image_models(), Capability::ImageGeneration)?;
    registry.register_models(video_models(), Capability::VideoGeneration)?;
    registry.register_adapter(Arc::new(SeedreamImages::default()));
    registry.register_adapter(Arc::new(SeedanceVideo::default()));
    Ok(())
}

pub struct SeedreamImages {
    mappers: Mappers,
}

impl Default for SeedreamImages {
    fn default() -> Self {
        Self {
            mappers: ImageApi::BytePlus.mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for SeedreamImages {
    fn provider(&self) -> Provider {
        Provider::BytePlus
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
        Ok(ImageApi::BytePlus.init_request(&model.id, image_input(input)?, streaming))
    }

    fn finalize_request(&self, _request: &mut RequestBody, params: &Parameters, _model: &Model) -> Result<()> {
        check_byteplus_size(params)
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        ImageApi::BytePlus.path().to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(ImagesExtractor::new(ImageApi::BytePlus))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(ImagesStream::new(ImageApi::BytePlus)))
    }
}

pub struct SeedanceVideo {
    mappers: Mappers,
}

impl Default for SeedanceVideo {
    fn default() -> Self {
        Self {
            mappers: byteplus_video_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for SeedanceVideo {
    fn provider(&self) -> Provider {
        Provider::BytePlus
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
        Ok(byteplus_video_init_request(&model.id, video_input(input)?))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        BYTEPLUS_TASKS_PATH.to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(BytePlusVideoExtractor)
    }

    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let submit_url = ctx.url(self.base_url(), BYTEPLUS_TASKS_PATH);
        let outcome = submit_and_poll(
            ctx,
            &BytePlusVideoTasks,
            self.base_url(),
            &submit_url,
            &request,
            VIDEO_POLL,
        )
        .await?;
        Ok(RawResponse::Json(outcome.status))
    }
}
