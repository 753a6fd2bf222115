//! Mureka: song and instrumental generation
//!
//! Generation is a submitted task polled until `succeeded`. Streaming models
//! report `streaming` with a growing `stream_url` first, so the stream is the
//! sequence of poll results.
//!
//! [`MurekaAccount`] covers the account-level endpoints that are not
//! generation calls: lyrics, song description, stems and billing.

use super::{ProviderAdapter, RequestContext, music_input, submit_and_poll};
use crate::auth::{Authentication, ResolvedHeaders};
use crate::config::ClientConfig;
use crate::constraints::Constraint;
use crate::error::{OmniError, Result};
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::task_polling::{
    MUREKA_BASE_URL, MurekaExtractor, MurekaStream, MurekaTasks, TaskProtocol, mureka_generate_path,
    mureka_init_request, mureka_mappers, take_instrumental,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::streaming::EventSource;
use crate::transport::polling::poll_events;
use crate::transport::{HttpTransport, PollConfig};
use crate::types::{Capability, Input, Param, Parameters, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = MUREKA_BASE_URL;

const POLL: PollConfig = PollConfig::new(Duration::from_secs(2), Duration::from_secs(300), 150);

fn music_model(id: &str, name: &str, max_duration: f64) -> Model {
    Model::new(id, Provider::Mureka, name)
        .constraint(Param::Duration, Constraint::range(5.0, max_duration))
        .constraint(Param::Quality, Constraint::choice(["low", "standard", "high", "premium"]))
        .constraint(Param::Lyrics, Constraint::string_len(None, Some(3_000)))
        .constraint(Param::Style, Constraint::string())
        .constraint(
            Param::Genre,
            Constraint::choice([
                "pop", "rock", "jazz", "classical", "electronic", "hip-hop", "country", "r&b",
                "metal", "folk", "blues", "reggae", "latin", "ambient", "instrumental",
            ]),
        )
        .constraint(Param::VocalGender, Constraint::choice(["male", "female", "neutral", "mixed"]))
        .constraint(Param::InstrumentalOnly, Constraint::Bool)
}

fn music_models() -> Vec<Model> {
    vec![
        music_model("mureka-v1", "Mureka V1", 600.0)
            .streaming(true)
            .constraint(Param::Stream, Constraint::Bool),
        music_model("mureka-o1", "Mureka O1", 180.0),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(music_models(), Capability::MusicGeneration)?;
    registry.register_adapter(Arc::new(MurekaMusic::default()));
    Ok(())
}

pub struct MurekaMusic {
    mappers: Mappers,
}

impl Default for MurekaMusic {
    fn default() -> Self {
        Self {
            mappers: mureka_mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MurekaMusic {
    fn provider(&self) -> Provider {
        Provider::Mureka
    }

    fn capability(&self) -> Capability {
        Capability::MusicGeneration
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(mureka_init_request(&model.id, music_input(input)?))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        mureka_generate_path(false).to_string()
    }

    fn extractor(&self, _params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(MurekaExtractor)
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(MurekaStream))
    }

    async fn send(&self, ctx: &RequestContext<'_>, mut request: RequestBody) -> Result<RawResponse> {
        let instrumental = take_instrumental(&mut request);
        let submit_url = ctx.url(self.base_url(), mureka_generate_path(instrumental));
        let tasks = MurekaTasks { instrumental };
        let outcome = submit_and_poll(ctx, &tasks, self.base_url(), &submit_url, &request, POLL).await?;
        Ok(RawResponse::Json(outcome.status))
    }

    async fn open_stream(&self, ctx: &RequestContext<'_>, mut request: RequestBody) -> Result<EventSource> {
        let instrumental = take_instrumental(&mut request);
        request.insert("stream".into(), json!(true));
        let submit_url = ctx.url(self.base_url(), mureka_generate_path(instrumental));
        let submit = ctx
            .transport
            .post_json(self.provider(), &submit_url, ctx.auth, &request)
            .await?;

        let tasks = MurekaTasks { instrumental };
        let task_id = tasks.task_id(&submit)?;
        let poll_url = ctx.url(self.base_url(), &tasks.poll_target(&task_id, &submit)?);
        tracing::info!(model = %ctx.model.id, task_id, "mureka streaming task submitted");

        let transport = ctx.transport.clone();
        let auth = ResolvedHeaders::capture(ctx.auth)?;
        let poll = move || {
            let transport = transport.clone();
            let auth = auth.clone();
            let url = poll_url.clone();
            async move { transport.get_json(Provider::Mureka, &url, &auth).await }
        };
        Ok(poll_events(
            POLL.with_overrides(ctx.config),
            tasks.label(),
            poll,
            move |status| tasks.status(&task_id, status),
        ))
    }
}

/// Lyrics returned by the lyrics endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsOutput {
    pub title: String,
    pub lyrics: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongDescription {
    #[serde(alias = "instrument")]
    pub instruments: Vec<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub description: String,
}

/// Separated tracks, packaged as one archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemOutput {
    pub zip_url: String,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingInfo {
    pub account_id: Option<i64>,
    pub balance: f64,
    pub total_recharge: f64,
    pub total_spending: f64,
    pub concurrent_request_limit: Option<u32>,
}

/// Account-level Mureka endpoints.
#[derive(Debug, Clone)]
pub struct MurekaAccount {
    transport: HttpTransport,
    auth: Arc<dyn Authentication>,
    base_url: String,
}

impl MurekaAccount {
    pub fn new(config: &ClientConfig, auth: Arc<dyn Authentication>) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(config)?,
            auth,
            base_url: config.base_url(Provider::Mureka, BASE_URL),
        })
    }

    fn url(&self, path: &str) -> String {
        crate::transport::http::join_url(&self.base_url, path)
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, body: Value) -> Result<T> {
        let Value::Object(body) = body else {
            return Err(OmniError::Validation("Request body must be a JSON object".into()));
        };
        let response = self
            .transport
            .post_json(Provider::Mureka, &self.url(path), self.auth.as_ref(), &body)
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Lyrics for a theme or description.
    pub async fn generate_lyrics(&self, prompt: &str) -> Result<LyricsOutput> {
        tracing::info!(chars = prompt.len(), "generating lyrics");
        self.post("/v1/lyrics/generate", json!({"prompt": prompt})).await
    }

    /// Continue existing lyrics.
    pub async fn extend_lyrics(&self, lyrics: &str) -> Result<LyricsOutput> {
        tracing::info!(chars = lyrics.len(), "extending lyrics");
        self.post("/v1/lyrics/extend", json!({"lyrics": lyrics})).await
    }

    /// Describe a song given its URL or a base64 data URL.
    pub async fn describe_song(&self, url: &str) -> Result<SongDescription> {
        self.post("/v1/song/describe", json!({"url": url})).await
    }

    /// Split a song into stems.
    pub async fn stem_song(&self, url: &str) -> Result<StemOutput> {
        self.post("/v1/song/stem", json!({"url": url})).await
    }

    pub async fn get_billing(&self) -> Result<BillingInfo> {
        let response = self
            .transport
            .get_json(Provider::Mureka, &self.url("/v1/account/billing"), self.auth.as_ref())
            .await?;
        Ok(serde_json::from_value(response)?)
    }
}
