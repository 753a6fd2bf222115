//! Google Cloud Text-to-Speech `text:synthesize`
//!
//! Complete responses only; the audio comes back base64 encoded in
//! `audioContent`.

use super::{ContentExtractor, RawResponse};
use crate::error::{OmniError, Result};
use crate::params::{Mappers, NestedFieldMapper, ParameterMapper, RequestBody, set_path};
use crate::registry::Model;
use crate::types::{Artifact, Content, MediaKind, MimeType, Param, ParamValue, SpeechInput};
use serde_json::{Value, json};

pub const BASE_URL: &str = "https://texttospeech.googleapis.com";
pub const SYNTHESIZE_PATH: &str = "/v1/text:synthesize";
pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";

/// Two-letter language → the locale used for voice selection.
const LOCALES: &[(&str, &str)] = &[
    ("ar", "ar-EG"),
    ("de", "de-DE"),
    ("en", "en-US"),
    ("es", "es-US"),
    ("fr", "fr-FR"),
    ("hi", "hi-IN"),
    ("id", "id-ID"),
    ("it", "it-IT"),
    ("ja", "ja-JP"),
    ("ko", "ko-KR"),
    ("nl", "nl-NL"),
    ("pl", "pl-PL"),
    ("pt", "pt-BR"),
    ("ro", "ro-RO"),
    ("ru", "ru-RU"),
    ("ta", "ta-IN"),
    ("th", "th-TH"),
    ("tr", "tr-TR"),
    ("uk", "uk-UA"),
    ("vi", "vi-VN"),
];

pub fn init_request(model_id: &str, input: &SpeechInput) -> RequestBody {
    let mut request = RequestBody::new();
    request.insert("input".into(), json!({"text": input.text}));
    request.insert("voice".into(), json!({"modelName": model_id}));
    request.insert("audioConfig".into(), json!({}));
    request
}

pub fn mappers() -> Mappers {
    vec![
        Box::new(NestedFieldMapper::new(Param::Voice, &["voice", "name"])),
        Box::new(LanguageMapper),
        Box::new(NestedFieldMapper::new(Param::Prompt, &["input", "prompt"])),
        Box::new(AudioEncodingMapper),
    ]
}

/// `language` → `voice.languageCode`, defaulting to `en-US`.
///
/// Two-letter codes resolve through the locale table; full locales such as
/// `en-GB` pass through.
#[derive(Debug, Clone, Copy)]
struct LanguageMapper;

impl ParameterMapper for LanguageMapper {
    fn name(&self) -> Param {
        Param::Language
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let code = match self.validate(value, model)? {
            None => DEFAULT_LANGUAGE_CODE.to_string(),
            Some(validated) => {
                let raw = validated.to_string();
                LOCALES
                    .iter()
                    .find(|(lang, _)| *lang == raw)
                    .map(|(_, locale)| (*locale).to_string())
                    .unwrap_or(raw)
            }
        };
        set_path(request, &["voice", "languageCode"], json!(code));
        Ok(())
    }
}

/// `output_format` → `audioConfig.audioEncoding`, defaulting to MP3.
#[derive(Debug, Clone, Copy)]
struct AudioEncodingMapper;

impl AudioEncodingMapper {
    fn mime_of(value: &ParamValue) -> MimeType {
        let raw = value.to_string().to_ascii_lowercase();
        match raw.as_str() {
            "mp3" => MimeType::Mp3,
            "wav" | "linear16" => MimeType::Wav,
            "ogg" | "ogg_opus" | "opus" => MimeType::Ogg,
            "pcm" => MimeType::Pcm,
            other => MimeType::parse(other).unwrap_or(MimeType::Mp3),
        }
    }

    fn encoding(mime: MimeType) -> &'static str {
        match mime {
            MimeType::Wav => "LINEAR16",
            MimeType::Ogg => "OGG_OPUS",
            MimeType::Pcm => "PCM",
            _ => "MP3",
        }
    }
}

impl ParameterMapper for AudioEncodingMapper {
    fn name(&self) -> Param {
        Param::OutputFormat
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let encoding = self
            .validate(value, model)?
            .map(|v| Self::encoding(Self::mime_of(&v)))
            .unwrap_or("MP3");
        set_path(request, &["audioConfig", "audioEncoding"], json!(encoding));
        Ok(())
    }

    fn parse_output(&self, content: Content, value: &ParamValue) -> Result<Content> {
        match content {
            Content::Audio(artifact) => Ok(Content::Audio(
                artifact.with_mime_type(Self::mime_of(value)),
            )),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CloudTtsExtractor;

impl ContentExtractor for CloudTtsExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("synthesize")?;
        let encoded = body
            .get("audioContent")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OmniError::parse("No audioContent in response"))?;
        let artifact = Artifact::from_base64(MediaKind::Audio, encoded)?;
        Ok(Content::Audio(artifact.with_mime_type(MimeType::Mp3)))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["audioContent"]
    }
}
