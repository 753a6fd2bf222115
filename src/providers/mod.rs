//! Provider Adapters
//!
//! One module per provider. Each adapter serves one `(capability, provider)`
//! pair: it owns the ordered mapper set, builds the request skeleton, knows
//! the endpoint and delegates response handling to its protocol's
//! [`ContentExtractor`] and [`ChunkParser`].
//!
//! Every module also exposes `register(&mut Registry)`, which loads its
//! models and adapters as one package. Packages are gated by cargo features.

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "bfl")]
pub mod bfl;
#[cfg(feature = "byteplus")]
pub mod byteplus;
#[cfg(feature = "cohere")]
pub mod cohere;
#[cfg(feature = "deepseek")]
pub mod deepseek;
#[cfg(feature = "elevenlabs")]
pub mod elevenlabs;
#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "gradium")]
pub mod gradium;
#[cfg(feature = "groq")]
pub mod groq;
#[cfg(feature = "huggingface")]
pub mod huggingface;
#[cfg(feature = "mistral")]
pub mod mistral;
#[cfg(feature = "moonshot")]
pub mod moonshot;
#[cfg(feature = "mureka")]
pub mod mureka;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "xai")]
pub mod xai;

use crate::auth::{Authentication, WithHeaders};
use crate::config::ClientConfig;
use crate::error::{OmniError, Result};
use crate::params::{ParameterMapper, RequestBody};
use crate::protocols::task_polling::{TASK_ID_KEY, TaskProtocol};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::streaming::EventSource;
use crate::transport::http::join_url;
use crate::transport::polling::{PollConfig, poll_until};
use crate::transport::HttpTransport;
use crate::types::{
    Capability, EmbeddingInput, ImageInput, Input, MimeType, MusicInput, Parameters, Provider,
    SpeechInput, TextInput, VideoInput,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::Arc;

/// Everything an adapter needs to reach the network for one call.
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    pub model: &'a Model,
    pub transport: &'a HttpTransport,
    pub auth: &'a dyn Authentication,
    pub config: &'a ClientConfig,
}

impl<'a> RequestContext<'a> {
    /// Absolute URL for `path` under the configured or default base URL.
    pub fn url(&self, default_base: &str, path: &str) -> String {
        join_url(&self.config.base_url(self.model.provider, default_base), path)
    }

    /// Auth headers plus provider-fixed headers.
    pub fn auth_with(&self, extra: HeaderMap) -> WithHeaders<'a> {
        WithHeaders::new(self.auth, extra)
    }
}

/// How a streamed response body is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamWire {
    Sse,
    Ndjson,
    Binary,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn capability(&self) -> Capability;

    /// Default base URL; overridable per provider in [`ClientConfig`].
    fn base_url(&self) -> &'static str;

    /// Ordered mapper set.
    fn mappers(&self) -> &[Box<dyn ParameterMapper>];

    /// Mapper set for `model`, for adapters serving model families with
    /// different request shapes.
    fn mappers_for(&self, _model: &Model) -> &[Box<dyn ParameterMapper>] {
        self.mappers()
    }

    /// Request skeleton before any mapper runs.
    fn init_request(&self, input: &Input, model: &Model, streaming: bool) -> Result<RequestBody>;

    /// Provider defaults and cross-parameter checks after the mappers ran.
    fn finalize_request(&self, _request: &mut RequestBody, _params: &Parameters, _model: &Model) -> Result<()> {
        Ok(())
    }

    /// Endpoint path for a complete or streamed request.
    fn endpoint(&self, model: &Model, streaming: bool) -> String;

    /// Non-secret headers the provider requires for this request.
    fn extra_headers(&self, _request: &RequestBody) -> HeaderMap {
        HeaderMap::new()
    }

    fn extractor(&self, params: &Parameters) -> Box<dyn ContentExtractor>;

    fn extractor_for(&self, _model: &Model, params: &Parameters) -> Box<dyn ContentExtractor> {
        self.extractor(params)
    }

    /// MIME type of generated audio when the request's output format fixes it.
    ///
    /// Streamed audio is assembled from raw bytes, so the declared format is
    /// the only reliable source for its type.
    fn output_mime(&self, _params: &Parameters) -> Option<MimeType> {
        None
    }

    /// Parser for streamed events; `None` when the adapter cannot stream.
    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        None
    }

    fn stream_wire(&self) -> StreamWire {
        StreamWire::Sse
    }

    /// Send a complete request.
    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let url = ctx.url(self.base_url(), &self.endpoint(ctx.model, false));
        let auth = ctx.auth_with(self.extra_headers(&request));
        let body = ctx
            .transport
            .post_json(self.provider(), &url, &auth, &request)
            .await?;
        Ok(RawResponse::Json(body))
    }

    /// Open a streamed request.
    async fn open_stream(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<EventSource> {
        let url = ctx.url(self.base_url(), &self.endpoint(ctx.model, true));
        let auth = ctx.auth_with(self.extra_headers(&request));
        let provider = self.provider();
        match self.stream_wire() {
            StreamWire::Sse => ctx.transport.post_sse(provider, &url, &auth, &request).await,
            StreamWire::Ndjson => ctx.transport.post_ndjson(provider, &url, &auth, &request).await,
            StreamWire::Binary => {
                ctx.transport
                    .post_byte_stream(provider, &url, &auth, &request)
                    .await
            }
        }
    }
}

fn wrong_input(expected: Capability, input: &Input) -> OmniError {
    OmniError::Validation(format!(
        "Expected {expected} input, got {} input",
        input.capability()
    ))
}

pub(crate) fn text_input(input: &Input) -> Result<&TextInput> {
    match input {
        Input::Text(t) => Ok(t),
        other => Err(wrong_input(Capability::TextGeneration, other)),
    }
}

pub(crate) fn image_input(input: &Input) -> Result<&ImageInput> {
    match input {
        Input::Image(i) => Ok(i),
        other => Err(wrong_input(Capability::ImageGeneration, other)),
    }
}

pub(crate) fn video_input(input: &Input) -> Result<&VideoInput> {
    match input {
        Input::Video(v) => Ok(v),
        other => Err(wrong_input(Capability::VideoGeneration, other)),
    }
}

pub(crate) fn speech_input(input: &Input) -> Result<&SpeechInput> {
    match input {
        Input::Speech(s) => Ok(s),
        other => Err(wrong_input(Capability::SpeechGeneration, other)),
    }
}

pub(crate) fn music_input(input: &Input) -> Result<&MusicInput> {
    match input {
        Input::Music(m) => Ok(m),
        other => Err(wrong_input(Capability::MusicGeneration, other)),
    }
}

pub(crate) fn embedding_input(input: &Input) -> Result<&EmbeddingInput> {
    match input {
        Input::Embedding(e) => Ok(e),
        other => Err(wrong_input(Capability::Embeddings, other)),
    }
}

/// Result of a submitted and completed task.
#[derive(Debug, Clone)]
pub(crate) struct TaskOutcome {
    pub submit: Value,
    /// Final poll response, carrying the task id under [`TASK_ID_KEY`].
    pub status: Value,
}

/// Submit `request` to `submit_url`, then poll until the task is terminal.
///
/// The task id is recorded on the final status unless the provider already
/// reports one there. A submit response that already holds the result is
/// returned as the final status without polling.
pub(crate) async fn submit_and_poll(
    ctx: &RequestContext<'_>,
    protocol: &dyn TaskProtocol,
    base_url: &str,
    submit_url: &str,
    request: &RequestBody,
    poll: PollConfig,
) -> Result<TaskOutcome> {
    let provider = ctx.model.provider;
    let submit = ctx
        .transport
        .post_json(provider, submit_url, ctx.auth, request)
        .await?;
    if protocol.immediate(&submit) {
        tracing::info!(%provider, model = %ctx.model.id, "task finished on submit");
        return Ok(TaskOutcome {
            status: submit.clone(),
            submit,
        });
    }
    let task_id = protocol.task_id(&submit)?;
    let poll_url = ctx.url(base_url, &protocol.poll_target(&task_id, &submit)?);
    tracing::info!(%provider, model = %ctx.model.id, task_id, "task submitted");

    let poll = poll.with_overrides(ctx.config);
    let mut status = poll_until(
        poll,
        protocol.label(),
        || ctx.transport.get_json(provider, &poll_url, ctx.auth),
        |v| protocol.status(&task_id, v),
    )
    .await?;
    if let Value::Object(map) = &mut status {
        map.entry(TASK_ID_KEY).or_insert(Value::String(task_id));
    }
    Ok(TaskOutcome { submit, status })
}

/// Load every provider package enabled at compile time.
pub fn register_builtin(registry: &mut Registry) -> Result<()> {
    #[cfg(feature = "openai")]
    registry.load_package("openai", openai::register)?;
    #[cfg(feature = "anthropic")]
    registry.load_package("anthropic", anthropic::register)?;
    #[cfg(feature = "google")]
    registry.load_package("google", google::register)?;
    #[cfg(feature = "mistral")]
    registry.load_package("mistral", mistral::register)?;
    #[cfg(feature = "cohere")]
    registry.load_package("cohere", cohere::register)?;
    #[cfg(feature = "deepseek")]
    registry.load_package("deepseek", deepseek::register)?;
    #[cfg(feature = "xai")]
    registry.load_package("xai", xai::register)?;
    #[cfg(feature = "byteplus")]
    registry.load_package("byteplus", byteplus::register)?;
    #[cfg(feature = "bfl")]
    registry.load_package("bfl", bfl::register)?;
    #[cfg(feature = "elevenlabs")]
    registry.load_package("elevenlabs", elevenlabs::register)?;
    #[cfg(feature = "gradium")]
    registry.load_package("gradium", gradium::register)?;
    #[cfg(feature = "ollama")]
    registry.load_package("ollama", ollama::register)?;
    #[cfg(feature = "mureka")]
    registry.load_package("mureka", mureka::register)?;
    #[cfg(feature = "groq")]
    registry.load_package("groq", groq::register)?;
    #[cfg(feature = "moonshot")]
    registry.load_package("moonshot", moonshot::register)?;
    #[cfg(feature = "huggingface")]
    registry.load_package("huggingface", huggingface::register)?;
    Ok(())
}
