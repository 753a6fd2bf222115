//! Input, output and streaming chunk types

use super::{Artifact, Capability, MediaKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unified usage vocabulary. Providers report disjoint subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageField {
    InputTokens,
    OutputTokens,
    TotalTokens,
    CachedTokens,
    ReasoningTokens,
    BilledTokens,
    NumImages,
    BilledUnits,
    InputMp,
    OutputMp,
    CacheCreationInputTokens,
    CacheReadInputTokens,
    GeneratedDuration,
    CreditsUsed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billed_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_images: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billed_units: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_mp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<f64>,
}

impl Usage {
    /// Build usage from a JSON object using `(json pointer, field)` pairs.
    ///
    /// Missing or non-numeric values stay `None`.
    pub fn from_mapping(source: &Value, mapping: &[(&str, UsageField)]) -> Self {
        let mut usage = Usage::default();
        for (pointer, field) in mapping {
            if let Some(v) = source.pointer(pointer) {
                usage.set(*field, v);
            }
        }
        usage
    }

    pub fn set(&mut self, field: UsageField, value: &Value) {
        let int = value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64));
        let float = value.as_f64();
        match field {
            UsageField::InputTokens => self.input_tokens = int,
            UsageField::OutputTokens => self.output_tokens = int,
            UsageField::TotalTokens => self.total_tokens = int,
            UsageField::CachedTokens => self.cached_tokens = int,
            UsageField::ReasoningTokens => self.reasoning_tokens = int,
            UsageField::BilledTokens => self.billed_tokens = int,
            UsageField::NumImages => self.num_images = int,
            UsageField::BilledUnits => self.billed_units = float,
            UsageField::InputMp => self.input_mp = float,
            UsageField::OutputMp => self.output_mp = float,
            UsageField::CacheCreationInputTokens => self.cache_creation_input_tokens = int,
            UsageField::CacheReadInputTokens => self.cache_read_input_tokens = int,
            UsageField::GeneratedDuration => self.generated_duration = float,
            UsageField::CreditsUsed => self.credits_used = float,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Usage::default()
    }
}

/// Raw provider finish reason, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishReason {
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FinishReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// `None` when the value is absent or not a string.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        value.and_then(Value::as_str).map(Self::new)
    }
}

/// Fully assembled content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Json(Value),
    Image(Artifact),
    Images(Vec<Artifact>),
    Video(Artifact),
    Audio(Artifact),
    Embedding(Vec<f64>),
    Embeddings(Vec<Vec<f64>>),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Vectors of an embedding result, one per input text.
    pub fn vectors(&self) -> Option<Vec<&[f64]>> {
        match self {
            Content::Embedding(v) => Some(vec![v.as_slice()]),
            Content::Embeddings(list) => Some(list.iter().map(Vec::as_slice).collect()),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            Content::Image(a) | Content::Video(a) | Content::Audio(a) => Some(a),
            Content::Images(list) => list.first(),
            _ => None,
        }
    }

    /// Wrap a single artifact in the variant matching its media kind.
    pub fn from_artifact(artifact: Artifact) -> Self {
        match artifact.kind {
            MediaKind::Video => Content::Video(artifact),
            MediaKind::Audio => Content::Audio(artifact),
            _ => Content::Image(artifact),
        }
    }
}

/// Incremental content carried by one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkContent {
    Text(String),
    Image(Artifact),
    Audio(Bytes),
    /// Video or music payload, usually a URL.
    Media(Artifact),
    Empty,
}

impl ChunkContent {
    pub fn is_empty(&self) -> bool {
        match self {
            ChunkContent::Text(t) => t.is_empty(),
            ChunkContent::Audio(b) => b.is_empty(),
            ChunkContent::Image(a) | ChunkContent::Media(a) => !a.has_content(),
            ChunkContent::Empty => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChunkContent::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            ChunkContent::Image(a) | ChunkContent::Media(a) => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub content: Content,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
    pub metadata: Map<String, Value>,
}

impl Output {
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: ChunkContent,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    pub metadata: Map<String, Value>,
}

impl Chunk {
    pub fn new(content: ChunkContent) -> Self {
        Self {
            content,
            finish_reason: None,
            usage: None,
            metadata: Map::new(),
        }
    }

    /// The JSON wire event this chunk was parsed from.
    pub fn event_data(&self) -> Option<&Value> {
        self.metadata.get("event_data")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextInput {
    pub prompt: String,
    /// Prior conversation turns, sent before `prompt`.
    pub messages: Vec<Message>,
}

impl TextInput {
    /// Conversation turns including the prompt as the final user message.
    pub fn conversation(&self) -> Vec<Message> {
        let mut turns = self.messages.clone();
        if !self.prompt.is_empty() {
            turns.push(Message::user(self.prompt.clone()));
        }
        turns
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInput {
    pub prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInput {
    pub prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechInput {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MusicInput {
    pub prompt: String,
}

/// Texts to embed. A batch always yields one vector per text, even for a
/// single text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
    pub batch: bool,
}

/// Capability-specific input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(TextInput),
    Image(ImageInput),
    Video(VideoInput),
    Speech(SpeechInput),
    Music(MusicInput),
    Embedding(EmbeddingInput),
}

impl Input {
    pub fn text(prompt: impl Into<String>) -> Self {
        Input::Text(TextInput {
            prompt: prompt.into(),
            messages: Vec::new(),
        })
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Input::Image(ImageInput {
            prompt: prompt.into(),
        })
    }

    pub fn video(prompt: impl Into<String>) -> Self {
        Input::Video(VideoInput {
            prompt: prompt.into(),
        })
    }

    pub fn speech(text: impl Into<String>) -> Self {
        Input::Speech(SpeechInput { text: text.into() })
    }

    pub fn music(prompt: impl Into<String>) -> Self {
        Input::Music(MusicInput {
            prompt: prompt.into(),
        })
    }

    pub fn embed(text: impl Into<String>) -> Self {
        Input::Embedding(EmbeddingInput {
            texts: vec![text.into()],
            batch: false,
        })
    }

    pub fn embed_batch<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Input::Embedding(EmbeddingInput {
            texts: texts.into_iter().map(Into::into).collect(),
            batch: true,
        })
    }

    pub fn capability(&self) -> Capability {
        match self {
            Input::Text(_) => Capability::TextGeneration,
            Input::Image(_) => Capability::ImageGeneration,
            Input::Video(_) => Capability::VideoGeneration,
            Input::Speech(_) => Capability::SpeechGeneration,
            Input::Music(_) => Capability::MusicGeneration,
            Input::Embedding(_) => Capability::Embeddings,
        }
    }

    /// The main text of the input: prompt, speech script or first text to embed.
    pub fn prompt(&self) -> &str {
        match self {
            Input::Text(t) => &t.prompt,
            Input::Image(i) => &i.prompt,
            Input::Video(v) => &v.prompt,
            Input::Speech(s) => &s.text,
            Input::Music(m) => &m.prompt,
            Input::Embedding(e) => e.texts.first().map(String::as_str).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_mapping_never_fabricates_zeros() {
        let raw = json!({"prompt_tokens": 12, "details": {"cached": 4}});
        let usage = Usage::from_mapping(
            &raw,
            &[
                ("/prompt_tokens", UsageField::InputTokens),
                ("/completion_tokens", UsageField::OutputTokens),
                ("/details/cached", UsageField::CachedTokens),
            ],
        );
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, None);
        assert_eq!(usage.cached_tokens, Some(4));
        assert!(!usage.is_empty());
        assert!(Usage::from_mapping(&json!({}), &[("/x", UsageField::TotalTokens)]).is_empty());
    }

    #[test]
    fn conversation_appends_prompt() {
        let input = TextInput {
            prompt: "and now?".into(),
            messages: vec![Message::system("be brief"), Message::user("hi")],
        };
        let turns = input.conversation();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2], Message::user("and now?"));
    }

    #[test]
    fn embedding_inputs_keep_batch_shape() {
        let single = Input::embed("hello");
        assert_eq!(single.capability(), Capability::Embeddings);
        assert_eq!(single.prompt(), "hello");

        let Input::Embedding(batch) = Input::embed_batch(["only"]) else {
            panic!("expected embedding input");
        };
        assert!(batch.batch);
        assert_eq!(batch.texts, vec!["only".to_string()]);

        let vectors = Content::Embeddings(vec![vec![0.1, 0.2], vec![0.3]]);
        assert_eq!(vectors.vectors().unwrap().len(), 2);
        assert_eq!(Content::Embedding(vec![1.0]).vectors().unwrap()[0], &[1.0][..]);
    }
}
