//! Gradium: text-to-speech over a WebSocket session

use super::{ProviderAdapter, RequestContext, speech_input};
use crate::constraints::{Constraint, Voice};
use crate::error::{OmniError, Result};
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::binary_audio::BinaryAudioExtractor;
use crate::protocols::gradium_tts::{
    self, END_OF_STREAM, GradiumStream, READY, SessionScript, TTS_PATH, mime_for_output_format,
    output_format_of,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::streaming::{EventSource, WireEvent};
use crate::transport::websocket::{SessionPlan, open_session};
use crate::types::{Capability, ChunkContent, Input, MimeType, Param, Parameters, Provider};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use std::sync::Arc;

pub const BASE_URL: &str = gradium_tts::BASE_URL;

fn voices() -> Vec<Voice> {
    vec![
        Voice::new(gradium_tts::DEFAULT_VOICE_ID, "Emma"),
        Voice::new("LFZvm12tW_z0xfGo", "Kent"),
        Voice::new("jtEKaLYNn6iif5PR", "Sydney"),
        Voice::new("KWJiFWu2O9nMPYcR", "John"),
        Voice::new("ubuXFxVQwVYnZQhy", "Eva"),
        Voice::new("m86j6D7UZpGzHsNu", "Jack"),
        Voice::new("b35yykvVppLXyw_l", "Elise"),
        Voice::new("axlOaUiFyOZhy4nv", "Leo"),
        Voice::new("-uP9MuGtBqAvEyxI", "Mia"),
        Voice::new("0y1VZjPabOBU3rWy", "Maximilian"),
    ]
}

fn speech_models() -> Vec<Model> {
    vec![
        Model::new("default", Provider::Gradium, "Gradium Default TTS")
            .streaming(true)
            .constraint(Param::Voice, Constraint::voices(voices()))
            .constraint(
                Param::OutputFormat,
                Constraint::choice(["wav", "pcm", "opus", "ulaw_8000", "alaw_8000", "pcm_16000", "pcm_24000"]),
            )
            .constraint(Param::PaddingBonus, Constraint::range(-4.0, 4.0)),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(speech_models(), Capability::SpeechGeneration)?;
    registry.register_adapter(Arc::new(GradiumSpeech::default()));
    Ok(())
}

pub struct GradiumSpeech {
    mappers: Mappers,
}

impl Default for GradiumSpeech {
    fn default() -> Self {
        Self {
            mappers: gradium_tts::mappers(),
        }
    }
}

fn requested_mime(params: &Parameters) -> MimeType {
    let format = params
        .get(Param::OutputFormat)
        .and_then(|v| v.as_str())
        .unwrap_or(gradium_tts::DEFAULT_OUTPUT_FORMAT);
    mime_for_output_format(format)
}

impl GradiumSpeech {
    async fn session(&self, ctx: &RequestContext<'_>, request: &RequestBody) -> Result<EventSource> {
        let script = SessionScript::for_request(&ctx.model.id, request);
        let plan = SessionPlan {
            setup: script.setup,
            messages: script.messages,
            ready_type: READY,
            end_type: END_OF_STREAM,
        };
        let url = ctx.url(self.base_url(), TTS_PATH);
        let headers = ctx.transport.headers(ctx.auth)?;
        open_session(&url, headers, plan).await
    }
}

#[async_trait]
impl ProviderAdapter for GradiumSpeech {
    fn provider(&self) -> Provider {
        Provider::Gradium
    }

    fn capability(&self) -> Capability {
        Capability::SpeechGeneration
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn mappers(&self) -> &[Box<dyn ParameterMapper>] {
        &self.mappers
    }

    fn init_request(&self, input: &Input, _model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(gradium_tts::init_request(speech_input(input)?))
    }

    fn endpoint(&self, _model: &Model, _streaming: bool) -> String {
        TTS_PATH.to_string()
    }

    fn extractor(&self, params: &Parameters) -> Box<dyn ContentExtractor> {
        Box::new(BinaryAudioExtractor::new(requested_mime(params)))
    }

    fn output_mime(&self, params: &Parameters) -> Option<MimeType> {
        Some(requested_mime(params))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(GradiumStream))
    }

    /// Runs a whole session and concatenates its audio frames.
    async fn send(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<RawResponse> {
        let mime = mime_for_output_format(output_format_of(&request));
        let mut source = self.session(ctx, &request).await?;
        let mut audio = BytesMut::new();
        while let Some(event) = source.next().await {
            let WireEvent::Json(frame) = event? else {
                continue;
            };
            if let Some(err) = GradiumStream.parse_error(&frame) {
                return Err(err);
            }
            if let Some(ChunkContent::Audio(data)) = GradiumStream.parse_content(&frame)? {
                audio.extend_from_slice(&data);
            }
        }
        if audio.is_empty() {
            return Err(OmniError::parse("No audio frames received from Gradium"));
        }
        Ok(RawResponse::Binary {
            data: audio.freeze(),
            content_type: Some(mime.as_str().to_string()),
        })
    }

    async fn open_stream(&self, ctx: &RequestContext<'_>, request: RequestBody) -> Result<EventSource> {
        self.session(ctx, &request).await
    }
}
