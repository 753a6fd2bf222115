//! Text-to-speech with binary audio bodies (ElevenLabs, OpenAI)
//!
//! The response body is the audio itself. ElevenLabs serves a complete
//! endpoint and `/stream`; the voice goes into the URL path, so the voice
//! mapper parks it under a private request key that the adapter pops before
//! sending. OpenAI takes everything in the JSON body of `/v1/audio/speech`.

use super::{ChunkParser, ContentExtractor, RawResponse};
use crate::error::{OmniError, Result};
use crate::params::{FieldMapper, Mappers, NestedFieldMapper, ParameterMapper, RequestBody};
use crate::registry::Model;
use crate::types::{Artifact, ChunkContent, Content, MimeType, Param, ParamValue, SpeechInput};
use bytes::Bytes;
use serde_json::{Value, json};

pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";
/// Private request key holding the voice id for the URL path.
pub const VOICE_KEY: &str = "_voice_id";

pub fn speech_path(voice_id: &str, streaming: bool) -> String {
    let voice_id = urlencoding::encode(voice_id);
    if streaming {
        format!("/v1/text-to-speech/{voice_id}/stream")
    } else {
        format!("/v1/text-to-speech/{voice_id}")
    }
}

pub fn init_request(model_id: &str, input: &SpeechInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("text".into(), json!(input.text));
    request.insert("model_id".into(), json!(model_id));
    request
}

/// Remove the parked voice id, falling back to the default voice.
pub fn take_voice(request: &mut RequestBody) -> String {
    request
        .remove(VOICE_KEY)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string())
}

pub fn mappers() -> Mappers {
    vec![
        Box::new(VoiceMapper),
        Box::new(OutputFormatMapper),
        Box::new(NestedFieldMapper::new(Param::Speed, &["voice_settings", "speed"])),
        Box::new(LanguageCodeMapper),
    ]
}

#[derive(Debug, Clone, Copy)]
struct VoiceMapper;

impl ParameterMapper for VoiceMapper {
    fn name(&self) -> Param {
        Param::Voice
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        if let Some(validated) = self.validate(value, model)? {
            request.insert(VOICE_KEY.into(), validated.to_json());
        }
        Ok(())
    }
}

/// `output_format`, defaulting to `mp3_44100_128`.
#[derive(Debug, Clone, Copy)]
struct OutputFormatMapper;

impl ParameterMapper for OutputFormatMapper {
    fn name(&self) -> Param {
        Param::OutputFormat
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let format = match self.validate(value, model)? {
            Some(validated) => validated.to_json(),
            None => json!(DEFAULT_OUTPUT_FORMAT),
        };
        request.insert("output_format".into(), format);
        Ok(())
    }
}

/// `language` as a string `language_code`.
#[derive(Debug, Clone, Copy)]
struct LanguageCodeMapper;

impl ParameterMapper for LanguageCodeMapper {
    fn name(&self) -> Param {
        Param::Language
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        if let Some(validated) = self.validate(value, model)? {
            request.insert("language_code".into(), json!(validated.to_string()));
        }
        Ok(())
    }
}

/// MIME type for an output format of the form `{codec}_{rate}[_{bitrate}]`.
pub fn mime_for_output_format(format: Option<&str>) -> MimeType {
    let codec = format
        .and_then(|f| f.split('_').next())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match codec.as_str() {
        "pcm" | "ulaw" | "alaw" => MimeType::Pcm,
        "aac" => MimeType::Aac,
        "flac" => MimeType::Flac,
        "opus" => MimeType::Ogg,
        "wav" => MimeType::Wav,
        _ => MimeType::Mp3,
    }
}

/// Output format recorded on a request, if any.
pub fn output_format_of(request: &RequestBody) -> Option<String> {
    request
        .get("output_format")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryAudioStream;

impl ChunkParser for BinaryAudioStream {
    fn parse_content(&self, _event: &Value) -> Result<Option<ChunkContent>> {
        Ok(None)
    }

    fn parse_binary(&self, data: Bytes) -> Option<ChunkContent> {
        (!data.is_empty()).then_some(ChunkContent::Audio(data))
    }
}

pub const OPENAI_SPEECH_PATH: &str = "/v1/audio/speech";
pub const OPENAI_DEFAULT_VOICE: &str = "alloy";

pub fn openai_speech_init_request(model_id: &str, input: &SpeechInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("model".into(), json!(model_id));
    request.insert("input".into(), json!(input.text));
    request
}

pub fn openai_speech_mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Voice, "voice")),
        Box::new(FieldMapper::new(Param::Speed, "speed")),
        Box::new(FieldMapper::new(Param::OutputFormat, "response_format")),
        Box::new(FieldMapper::new(Param::Instructions, "instructions")),
    ]
}

/// OpenAI requires a voice; `alloy` stands in when none was given.
pub fn openai_speech_finalize(request: &mut RequestBody) {
    request
        .entry("voice")
        .or_insert_with(|| json!(OPENAI_DEFAULT_VOICE));
}

#[derive(Debug, Clone, Default)]
pub struct BinaryAudioExtractor {
    mime_type: Option<MimeType>,
}

impl BinaryAudioExtractor {
    pub fn new(mime_type: MimeType) -> Self {
        Self {
            mime_type: Some(mime_type),
        }
    }
}

impl ContentExtractor for BinaryAudioExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let RawResponse::Binary { data, content_type } = response else {
            return Err(OmniError::parse("Expected binary audio response, got JSON body"));
        };
        if data.is_empty() {
            return Err(OmniError::parse("No audio data in response"));
        }
        let mime_type = self
            .mime_type
            .or_else(|| content_type.as_deref().and_then(MimeType::parse))
            .unwrap_or(MimeType::Mp3);
        Ok(Content::Audio(
            Artifact::audio_data(data.clone()).with_mime_type(mime_type),
        ))
    }
}
