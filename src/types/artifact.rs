use super::MimeType;
use crate::error::{OmniError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media value holding a URL, raw bytes or a local file path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Artifact {
    /// An artifact with no representation set.
    pub fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            url: None,
            data: None,
            path: None,
            mime_type: None,
            metadata: Map::new(),
        }
    }

    pub fn from_url(kind: MediaKind, url: impl Into<String>) -> Self {
        let url = url.into();
        let mime_type = MimeType::from_path(&url).filter(|m| m.kind() == kind);
        Self {
            url: Some(url),
            mime_type,
            ..Self::empty(kind)
        }
    }

    pub fn from_data(kind: MediaKind, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mime_type = MimeType::from_bytes(&data).filter(|m| m.kind() == kind);
        Self {
            data: Some(data),
            mime_type,
            ..Self::empty(kind)
        }
    }

    pub fn from_path(kind: MediaKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = path
            .to_str()
            .and_then(MimeType::from_path)
            .filter(|m| m.kind() == kind);
        Self {
            path: Some(path),
            mime_type,
            ..Self::empty(kind)
        }
    }

    /// Decode a base64 payload into an artifact.
    pub fn from_base64(kind: MediaKind, encoded: &str) -> Result<Self> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| OmniError::parse(format!("Invalid base64 {kind} data: {e}")))?;
        Ok(Self::from_data(kind, data))
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::from_url(MediaKind::Image, url)
    }

    pub fn image_data(data: impl Into<Bytes>) -> Self {
        Self::from_data(MediaKind::Image, data)
    }

    pub fn video_url(url: impl Into<String>) -> Self {
        Self::from_url(MediaKind::Video, url)
    }

    pub fn audio_url(url: impl Into<String>) -> Self {
        Self::from_url(MediaKind::Audio, url)
    }

    pub fn audio_data(data: impl Into<Bytes>) -> Self {
        Self::from_data(MediaKind::Audio, data)
    }

    pub fn with_mime_type(mut self, mime_type: MimeType) -> Self {
        self.mime_type = Some(mime_type);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn has_content(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
            || self.data.as_ref().is_some_and(|d| !d.is_empty())
            || self
                .path
                .as_ref()
                .is_some_and(|p| !p.as_os_str().is_empty())
    }

    /// Raw bytes, reading from `path` when only a path is set.
    pub async fn bytes(&self) -> Result<Bytes> {
        if let Some(data) = &self.data {
            return Ok(data.clone());
        }
        if let Some(path) = &self.path {
            let data = tokio::fs::read(path).await.map_err(|e| {
                OmniError::Validation(format!("Cannot read {} file {}: {e}", self.kind, path.display()))
            })?;
            return Ok(Bytes::from(data));
        }
        Err(OmniError::Validation(format!(
            "{} artifact has no inline data or path",
            self.kind
        )))
    }

    /// Base64 of the raw bytes, for providers that only accept inline media.
    pub async fn base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.bytes().await?))
    }

    /// MIME type, falling back to sniffing data or the path extension.
    pub fn resolved_mime_type(&self) -> Option<MimeType> {
        self.mime_type
            .or_else(|| self.data.as_deref().and_then(MimeType::from_bytes))
            .or_else(|| {
                self.path
                    .as_ref()
                    .and_then(|p| p.to_str())
                    .and_then(MimeType::from_path)
            })
            .or_else(|| self.url.as_deref().and_then(MimeType::from_path))
    }
}

mod b64_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Bytes>, s: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(d) => s.serialize_str(&STANDARD.encode(d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Bytes>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| {
            STANDARD
                .decode(s)
                .map(Bytes::from)
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
