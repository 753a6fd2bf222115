//! ElevenLabs: text-to-speech with binary audio bodies

use super::{ProviderAdapter, RequestContext, StreamWire, speech_input};
use crate::constraints::{Constraint, Voice};
use crate::error::Result;
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::protocols::binary_audio::{
    self, BinaryAudioExtractor, BinaryAudioStream, mime_for_output_format, take_voice,
};
use crate::protocols::{ChunkParser, ContentExtractor, RawResponse};
use crate::registry::{Model, Registry};
use crate::streaming::EventSource;
use crate::types::{Capability, Input, MimeType, Param, Parameters, Provider};
use async_trait::async_trait;
use std::sync::Arc;

pub const BASE_URL: &str = "https://api.elevenlabs.io";

const OUTPUT_FORMATS: [&str; 19] = [
    "mp3_22050_32",
    "mp3_44100_32",
    "mp3_44100_64",
    "mp3_44100_96",
    "mp3_44100_128",
    "mp3_44100_192",
    "pcm_8000",
    "pcm_16000",
    "pcm_22050",
    "pcm_24000",
    "pcm_44100",
    "pcm_48000",
    "ulaw_8000",
    "alaw_8000",
    "opus_48000_32",
    "opus_48000_64",
    "opus_48000_96",
    "opus_48000_128",
    "opus_48000_192",
];

const LANGUAGES: [&str; 29] = [
    "en", "ja", "zh", "de", "hi", "fr", "ko", "pt", "it", "es", "id", "nl", "tr", "fil", "pl",
    "sv", "bg", "ro", "ar", "cs", "el", "fi", "hr", "ms", "sk", "da", "ta", "uk", "ru",
];

fn voices() -> Vec<Voice> {
    vec![
        Voice::new(binary_audio::DEFAULT_VOICE_ID, "Rachel"),
        Voice::new("pNInz6obpgDQGcFmaJgB", "Adam"),
        Voice::new("ErXwobaYiN019PkySvjV", "Antoni"),
        Voice::new("EXAVITQu4vr4xnSDxMaL", "Sarah"),
        Voice::new("AZnzlk1XvdvUeBnXmlld", "Domi"),
        Voice::new("MF3mGyEYCl7XYWbV9V6O", "Elli"),
        Voice::new("TxGEqnHWrfWFTfGW9XjX", "Josh"),
        Voice::new("VR6AewLTigWG4xSOukaG", "Arnold"),
        Voice::new("yoZ06aMxZJJ28mfd3POQ", "Sam"),
    ]
}

fn tts(id: &str, name: &str) -> Model {
    Model::new(id, Provider::ElevenLabs, name)
        .streaming(true)
        .constraint(Param::Voice, Constraint::voices(voices()))
        .constraint(Param::Speed, Constraint::range(0.7, 1.2))
        .constraint(Param::OutputFormat, Constraint::choice(OUTPUT_FORMATS))
}

fn speech_models() -> Vec<Model> {
    vec![
        tts("eleven_v3", "Eleven v3"),
        tts("eleven_multilingual_v2", "Eleven Multilingual v2"),
        tts("eleven_turbo_v2_5", "Eleven Turbo v2.5")
            .constraint(Param::Language, Constraint::choice(LANGUAGES)),
        tts("eleven_turbo_v2", "Eleven Turbo v2"),
        tts("eleven_flash_v2_5", "Eleven Flash v2.5")
            .constraint(Param::Language, Constraint::choice(LANGUAGES)),
        tts("eleven_flash_v2", "Eleven Flash v2"),
    ]
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register_models(speech_models(), Capability::SpeechGeneration)?;
    registry.register_adapter(Arc::new(ElevenLabsSpeech::default()));
    Ok(())
}

pub struct ElevenLabsSpeech {
    mappers: Mappers,
}

impl Default for ElevenLabsSpeech {
    fn default() -> Self {
        Self {
            mappers: binary_audio::mappers(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ElevenLabsSpeech {
    fn provider(&self) -> Provider {
        Provider::ElevenLabs
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

    fn init_request(&self, input: &Input, model: &Model, _streaming: bool) -> Result<RequestBody> {
        Ok(binary_audio::init_request(&model.id, speech_input(input)?))
    }

    /// Path for the default voice; requests carry their own voice id.
    fn endpoint(&self, _model: &Model, streaming: bool) -> String {
        binary_audio::speech_path(binary_audio::DEFAULT_VOICE_ID, streaming)
    }

    fn extractor(&self, params: &Parameters) -> Box<dyn ContentExtractor> {
        let format = params.get(Param::OutputFormat).and_then(|v| v.as_str());
        Box::new(BinaryAudioExtractor::new(mime_for_output_format(format)))
    }

    fn output_mime(&self, params: &Parameters) -> Option<MimeType> {
        let format = params.get(Param::OutputFormat).and_then(|v| v.as_str());
        Some(mime_for_output_format(format))
    }

    fn chunk_parser(&self) -> Option<Arc<dyn ChunkParser>> {
        Some(Arc::new(BinaryAudioStream))
    }

    fn stream_wire(&self) -> StreamWire {
        StreamWire::Binary
    }

    async fn send(&self, ctx: &RequestContext<'_>, mut request: RequestBody) -> Result<RawResponse> {
        let voice = take_voice(&mut request);
        let url = ctx.url(self.base_url(), &binary_audio::speech_path(&voice, false));
        ctx.transport
            .post_binary(self.provider(), &url, ctx.auth, &request)
            .await
    }

    async fn open_stream(&self, ctx: &RequestContext<'_>, mut request: RequestBody) -> Result<EventSource> {
        let voice = take_voice(&mut request);
        let url = ctx.url(self.base_url(), &binary_audio::speech_path(&voice, true));
        ctx.transport
            .post_byte_stream(self.provider(), &url, ctx.auth, &request)
            .await
    }
}
