//! MIME type vocabulary for artifacts

use super::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "image/bmp")]
    Bmp,
    #[serde(rename = "image/tiff")]
    Tiff,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "video/mp4")]
    Mp4,
    #[serde(rename = "video/x-msvideo")]
    Avi,
    #[serde(rename = "video/quicktime")]
    Mov,
    #[serde(rename = "audio/mpeg")]
    Mp3,
    #[serde(rename = "audio/wav")]
    Wav,
    #[serde(rename = "audio/ogg")]
    Ogg,
    #[serde(rename = "audio/webm")]
    Webm,
    #[serde(rename = "audio/aac")]
    Aac,
    #[serde(rename = "audio/flac")]
    Flac,
    #[serde(rename = "audio/aiff")]
    Aiff,
    #[serde(rename = "audio/mp4")]
    M4a,
    #[serde(rename = "audio/x-ms-wma")]
    Wma,
    #[serde(rename = "audio/pcm")]
    Pcm,
    #[serde(rename = "application/json")]
    Json,
}

const ALL: [MimeType; 20] = [
    MimeType::Png,
    MimeType::Jpeg,
    MimeType::Webp,
    MimeType::Bmp,
    MimeType::Tiff,
    MimeType::Gif,
    MimeType::Mp4,
    MimeType::Avi,
    MimeType::Mov,
    MimeType::Mp3,
    MimeType::Wav,
    MimeType::Ogg,
    MimeType::Webm,
    MimeType::Aac,
    MimeType::Flac,
    MimeType::Aiff,
    MimeType::M4a,
    MimeType::Wma,
    MimeType::Pcm,
    MimeType::Json,
];

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Png => "image/png",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Webp => "image/webp",
            MimeType::Bmp => "image/bmp",
            MimeType::Tiff => "image/tiff",
            MimeType::Gif => "image/gif",
            MimeType::Mp4 => "video/mp4",
            MimeType::Avi => "video/x-msvideo",
            MimeType::Mov => "video/quicktime",
            MimeType::Mp3 => "audio/mpeg",
            MimeType::Wav => "audio/wav",
            MimeType::Ogg => "audio/ogg",
            MimeType::Webm => "audio/webm",
            MimeType::Aac => "audio/aac",
            MimeType::Flac => "audio/flac",
            MimeType::Aiff => "audio/aiff",
            MimeType::M4a => "audio/mp4",
            MimeType::Wma => "audio/x-ms-wma",
            MimeType::Pcm => "audio/pcm",
            MimeType::Json => "application/json",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self.as_str().split('/').next() {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            Some("audio") => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }

    /// Parse a MIME string, tolerating parameters and common aliases.
    pub fn parse(value: &str) -> Option<Self> {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let canonical = match essence.as_str() {
            "image/jpg" => "image/jpeg",
            "audio/mp3" => "audio/mpeg",
            "audio/x-wav" | "audio/wave" => "audio/wav",
            "audio/x-flac" => "audio/flac",
            "audio/x-aiff" => "audio/aiff",
            "audio/x-m4a" => "audio/mp4",
            "audio/opus" => "audio/ogg",
            other => other,
        };
        ALL.into_iter().find(|m| m.as_str() == canonical)
    }

    /// Sniff magic numbers.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        infer::get(bytes).and_then(|k| Self::parse(k.mime_type()))
    }

    /// Guess from a file path or URL extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.split(['?', '#']).next().unwrap_or(path);
        mime_guess::from_path(trimmed)
            .first_raw()
            .and_then(Self::parse)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
