//! Gradium text-to-speech over WebSocket
//!
//! A session sends `setup`, waits for `ready`, then sends the text followed by
//! `end_of_stream`. The server answers with base64 `audio` frames and a final
//! `end_of_stream`.

use super::{ChunkParser, event_type};
use crate::error::{OmniError, Result};
use crate::params::{FieldMapper, Mappers, NestedFieldMapper, RequestBody};
use crate::types::{ChunkContent, FinishReason, MimeType, Param, SpeechInput};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::{Value, json};

pub const BASE_URL: &str = "wss://eu.api.gradium.ai";
pub const TTS_PATH: &str = "/api/speech/tts";
pub const DEFAULT_VOICE_ID: &str = "YTpq7expH9539ERJ";
pub const DEFAULT_OUTPUT_FORMAT: &str = "wav";
pub const READY: &str = "ready";
pub const END_OF_STREAM: &str = "end_of_stream";

pub fn init_request(input: &SpeechInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("text".into(), json!(input.text));
    request
}

pub fn mappers() -> Mappers {
    vec![
        Box::new(FieldMapper::new(Param::Voice, "voice_id")),
        Box::new(FieldMapper::new(Param::OutputFormat, "output_format")),
        Box::new(NestedFieldMapper::new(Param::PaddingBonus, &["json_config", "padding_bonus"])),
    ]
}

/// Frames sent over one synthesis session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionScript {
    /// Sent first; the server must answer with `ready`.
    pub setup: Value,
    /// Sent after `ready`, in order.
    pub messages: Vec<Value>,
}

impl SessionScript {
    pub fn for_request(model_id: &str, request: &RequestBody) -> Self {
        let mut setup = json!({
            "type": "setup",
            "model_name": model_id,
            "voice_id": request.get("voice_id").and_then(Value::as_str).unwrap_or(DEFAULT_VOICE_ID),
            "output_format": output_format_of(request),
        });
        if let Some(config) = request.get("json_config") {
            setup["json_config"] = config.clone();
        }
        let text = request.get("text").and_then(Value::as_str).unwrap_or_default();
        Self {
            setup,
            messages: vec![
                json!({"type": "text", "text": text}),
                json!({"type": END_OF_STREAM}),
            ],
        }
    }
}

pub fn output_format_of(request: &RequestBody) -> &str {
    request
        .get("output_format")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_OUTPUT_FORMAT)
}

/// Opus is delivered in an Ogg container; everything else is treated as WAV.
pub fn mime_for_output_format(format: &str) -> MimeType {
    match format {
        "opus" => MimeType::Ogg,
        _ => MimeType::Wav,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GradiumStream;

impl ChunkParser for GradiumStream {
    fn parse_content(&self, event: &Value) -> Result<Option<ChunkContent>> {
        if event_type(event) != "audio" {
            return Ok(None);
        }
        let Some(encoded) = event.get("audio").and_then(Value::as_str) else {
            return Ok(None);
        };
        let data = STANDARD
            .decode(encoded)
            .map_err(|e| OmniError::parse(format!("Invalid base64 audio frame: {e}")))?;
        Ok((!data.is_empty()).then(|| ChunkContent::Audio(Bytes::from(data))))
    }

    fn parse_finish_reason(&self, event: &Value) -> Option<FinishReason> {
        (event_type(event) == END_OF_STREAM).then(|| FinishReason::new("stop"))
    }

    fn parse_error(&self, event: &Value) -> Option<OmniError> {
        if event_type(event) != "error" {
            return None;
        }
        let message = event
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        Some(OmniError::Stream(format!("Gradium TTS error: {message}")))
    }

    fn keep_in_metadata(&self, event: &Value) -> bool {
        event_type(event) != "audio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::params::apply_mappers;
    use crate::registry::Model;
    use crate::streaming::WireEvent;
    use crate::types::{Capability, Parameters, Provider};

    #[test]
    fn setup_frame_carries_voice_format_and_config() {
        let model = Model::new("default", Provider::Gradium, "Gradium TTS")
            .capability(Capability::SpeechGeneration)
            .constraint(Param::OutputFormat, Constraint::choice(["wav", "pcm", "opus"]))
            .constraint(Param::PaddingBonus, Constraint::range(-4.0, 4.0));
        let params = Parameters::new()
            .with(Param::OutputFormat, "opus")
            .with(Param::PaddingBonus, 1.5);
        let mut request = init_request(&SpeechInput { text: "Hello there".into() });
        apply_mappers(&mut request, &mappers(), &params, &model).unwrap();

        let script = SessionScript::for_request("default", &request);
        assert_eq!(
            script.setup,
            json!({
                "type": "setup",
                "model_name": "default",
                "voice_id": DEFAULT_VOICE_ID,
                "output_format": "opus",
                "json_config": {"padding_bonus": 1.5}
            })
        );
        assert_eq!(script.messages[0], json!({"type": "text", "text": "Hello there"}));
        assert_eq!(script.messages[1], json!({"type": "end_of_stream"}));
        assert_eq!(mime_for_output_format(output_format_of(&request)), MimeType::Ogg);
    }

    #[test]
    fn frames_decode_to_audio_and_stop() {
        let parse = |v: Value| {
            GradiumStream.parse_event(WireEvent::Json(v), ChunkContent::Audio(Bytes::new()))
        };
        let audio = parse(json!({"type": "audio", "audio": "AQID"})).unwrap().unwrap();
        assert_eq!(audio.content, ChunkContent::Audio(Bytes::from_static(&[1, 2, 3])));

        let end = parse(json!({"type": "end_of_stream"})).unwrap().unwrap();
        assert_eq!(end.finish_reason, Some(FinishReason::new("stop")));
        assert_eq!(end.content, ChunkContent::Audio(Bytes::new()));

        let err = parse(json!({"type": "error", "message": "bad voice"})).unwrap_err();
        assert_eq!(err.to_string(), "Stream error: Gradium TTS error: bad voice");
        assert!(parse(json!({"type": "audio", "audio": "%%%"})).is_err());
    }
}
