//! Core Data Types
//!
//! Capability-neutral request and response types shared by every provider.
//! Content is a closed sum type so that streaming and assembly are written once.

mod artifact;
mod io;
mod mime;
mod params;

pub use artifact::{Artifact, MediaKind};
pub use io::{
    Chunk, ChunkContent, Content, EmbeddingInput, FinishReason, ImageInput, Input, Message,
    MusicInput, Output, SpeechInput, TextInput, Usage, UsageField, VideoInput,
};
pub use mime::MimeType;
pub use params::{FunctionTool, OutputSchema, Param, ParamValue, Parameters, Tool};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
    Mistral,
    Cohere,
    #[serde(rename = "xai")]
    XAi,
    DeepSeek,
    BytePlus,
    Bfl,
    ElevenLabs,
    Gradium,
    Ollama,
    Mureka,
    Groq,
    Moonshot,
    #[serde(rename = "huggingface")]
    HuggingFace,
}

impl Provider {
    pub const ALL: [Provider; 16] = [
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::Google,
        Provider::Mistral,
        Provider::Cohere,
        Provider::XAi,
        Provider::DeepSeek,
        Provider::BytePlus,
        Provider::Bfl,
        Provider::ElevenLabs,
        Provider::Gradium,
        Provider::Ollama,
        Provider::Mureka,
        Provider::Groq,
        Provider::Moonshot,
        Provider::HuggingFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Mistral => "mistral",
            Provider::Cohere => "cohere",
            Provider::XAi => "xai",
            Provider::DeepSeek => "deepseek",
            Provider::BytePlus => "byteplus",
            Provider::Bfl => "bfl",
            Provider::ElevenLabs => "elevenlabs",
            Provider::Gradium => "gradium",
            Provider::Ollama => "ollama",
            Provider::Mureka => "mureka",
            Provider::Groq => "groq",
            Provider::Moonshot => "moonshot",
            Provider::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = crate::error::OmniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| crate::error::OmniError::UnsupportedProvider(s.to_string()))
    }
}

/// A category of AI operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    TextGeneration,
    ImageGeneration,
    VideoGeneration,
    SpeechGeneration,
    MusicGeneration,
    Embeddings,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TextGeneration => "text-generation",
            Capability::ImageGeneration => "image-generation",
            Capability::VideoGeneration => "video-generation",
            Capability::SpeechGeneration => "speech-generation",
            Capability::MusicGeneration => "music-generation",
            Capability::Embeddings => "embeddings",
        }
    }

    /// Content used for a chunk that only carries usage or a finish reason.
    pub fn empty_chunk_content(&self) -> ChunkContent {
        match self {
            Capability::TextGeneration => ChunkContent::Text(String::new()),
            Capability::SpeechGeneration => ChunkContent::Audio(bytes::Bytes::new()),
            _ => ChunkContent::Empty,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
