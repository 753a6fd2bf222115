//! Capability-neutral parameter names and values

use super::Artifact;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Logical parameter names shared across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    // text
    Temperature,
    MaxTokens,
    TopP,
    TopK,
    StopSequences,
    Seed,
    ThinkingBudget,
    ThinkingLevel,
    ReasoningEffort,
    Verbosity,
    OutputSchema,
    WebSearch,
    Tools,
    // image
    Size,
    AspectRatio,
    ImageSize,
    Quality,
    PartialImages,
    Background,
    OutputFormat,
    Style,
    Moderation,
    OutputCompression,
    ReferenceImages,
    NegativePrompt,
    NumImages,
    // video
    FirstFrame,
    LastFrame,
    Duration,
    Resolution,
    // speech
    Voice,
    Speed,
    Language,
    Prompt,
    PaddingBonus,
    Instructions,
    // music
    Stream,
    Genre,
    Tempo,
    Key,
    Mood,
    Lyrics,
    InstrumentalOnly,
    VocalGender,
    // embeddings
    Dimensions,
}

impl Param {
    pub fn as_str(&self) -> &'static str {
        match self {
            Param::Temperature => "temperature",
            Param::MaxTokens => "max_tokens",
            Param::TopP => "top_p",
            Param::TopK => "top_k",
            Param::StopSequences => "stop_sequences",
            Param::Seed => "seed",
            Param::ThinkingBudget => "thinking_budget",
            Param::ThinkingLevel => "thinking_level",
            Param::ReasoningEffort => "reasoning_effort",
            Param::Verbosity => "verbosity",
            Param::OutputSchema => "output_schema",
            Param::WebSearch => "web_search",
            Param::Tools => "tools",
            Param::Size => "size",
            Param::AspectRatio => "aspect_ratio",
            Param::ImageSize => "image_size",
            Param::Quality => "quality",
            Param::PartialImages => "partial_images",
            Param::Background => "background",
            Param::OutputFormat => "output_format",
            Param::Style => "style",
            Param::Moderation => "moderation",
            Param::OutputCompression => "output_compression",
            Param::ReferenceImages => "reference_images",
            Param::NegativePrompt => "negative_prompt",
            Param::NumImages => "num_images",
            Param::FirstFrame => "first_frame",
            Param::LastFrame => "last_frame",
            Param::Duration => "duration",
            Param::Resolution => "resolution",
            Param::Voice => "voice",
            Param::Speed => "speed",
            Param::Language => "language",
            Param::Prompt => "prompt",
            Param::PaddingBonus => "padding_bonus",
            Param::Instructions => "instructions",
            Param::Stream => "stream",
            Param::Genre => "genre",
            Param::Tempo => "tempo",
            Param::Key => "key",
            Param::Mood => "mood",
            Param::Lyrics => "lyrics",
            Param::InstrumentalOnly => "instrumental_only",
            Param::VocalGender => "vocal_gender",
            Param::Dimensions => "dimensions",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JSON Schema describing structured text output.
///
/// `list` asks for an array of items matching `schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
    #[serde(default)]
    pub list: bool,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            list: false,
        }
    }

    pub fn list_of(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            list: true,
        }
    }

    /// The schema a full response must satisfy (arrays for list schemas).
    pub fn response_schema(&self) -> Value {
        if self.list {
            json!({"type": "array", "items": self.schema})
        } else {
            self.schema.clone()
        }
    }

    /// Object schema wrapping list output in an `items` property, for
    /// providers that require an object at the top level.
    pub fn object_schema(&self) -> Value {
        if self.list {
            json!({
                "type": "object",
                "properties": {"items": {"type": "array", "items": self.schema}},
                "required": ["items"],
                "additionalProperties": false,
            })
        } else {
            self.schema.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// Tools a text model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    WebSearch {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_domains: Vec<String>,
    },
    XSearch,
    CodeExecution,
    Function(FunctionTool),
}

impl Tool {
    pub fn web_search() -> Self {
        Tool::WebSearch {
            allowed_domains: Vec::new(),
        }
    }

    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Tool::Function(FunctionTool {
            name: name.into(),
            description: Some(description.into()),
            parameters,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Tool::WebSearch { .. } => "web_search",
            Tool::XSearch => "x_search",
            Tool::CodeExecution => "code_execution",
            Tool::Function(_) => "function",
        }
    }
}

/// A parameter value as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Json(Value),
    Artifact(Artifact),
    Artifacts(Vec<Artifact>),
    Tools(Vec<Tool>),
    Schema(OutputSchema),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            ParamValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ParamValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            ParamValue::Artifact(a) => Some(a),
            _ => None,
        }
    }

    /// Artifacts as a slice, treating a single artifact as a list of one.
    pub fn as_artifacts(&self) -> Option<&[Artifact]> {
        match self {
            ParamValue::Artifact(a) => Some(std::slice::from_ref(a)),
            ParamValue::Artifacts(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_tools(&self) -> Option<&[Tool]> {
        match self {
            ParamValue::Tools(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&OutputSchema> {
        match self {
            ParamValue::Schema(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form written into request bodies.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => json!(i),
            ParamValue::Float(f) => json!(f),
            ParamValue::Str(s) => Value::String(s.clone()),
            ParamValue::Json(v) => v.clone(),
            ParamValue::Artifact(a) => serde_json::to_value(a).unwrap_or(Value::Null),
            ParamValue::Artifacts(list) => serde_json::to_value(list).unwrap_or(Value::Null),
            ParamValue::Tools(t) => serde_json::to_value(t).unwrap_or(Value::Null),
            ParamValue::Schema(s) => s.response_schema(),
        }
    }

    /// Short description used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "str",
            ParamValue::Json(_) => "json",
            ParamValue::Artifact(_) => "artifact",
            ParamValue::Artifacts(_) => "list",
            ParamValue::Tools(_) => "tools",
            ParamValue::Schema(_) => "schema",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Json(v) => write!(f, "{v}"),
            ParamValue::Artifact(a) => write!(f, "<{} artifact>", a.kind),
            ParamValue::Artifacts(list) => write!(f, "<{} artifacts>", list.len()),
            ParamValue::Tools(t) => {
                let kinds: Vec<_> = t.iter().map(Tool::kind).collect();
                write!(f, "{kinds:?}")
            }
            ParamValue::Schema(s) => write!(f, "<schema {}>", s.name),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        ParamValue::Json(v)
    }
}

impl From<Artifact> for ParamValue {
    fn from(v: Artifact) -> Self {
        ParamValue::Artifact(v)
    }
}

impl From<Vec<Artifact>> for ParamValue {
    fn from(v: Vec<Artifact>) -> Self {
        ParamValue::Artifacts(v)
    }
}

impl From<Vec<Tool>> for ParamValue {
    fn from(v: Vec<Tool>) -> Self {
        ParamValue::Tools(v)
    }
}

impl From<OutputSchema> for ParamValue {
    fn from(v: OutputSchema) -> Self {
        ParamValue::Schema(v)
    }
}

/// Caller-supplied parameters keyed by logical name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(BTreeMap<Param, ParamValue>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, param: Param, value: impl Into<ParamValue>) -> Self {
        self.0.insert(param, value.into());
        self
    }

    pub fn insert(&mut self, param: Param, value: impl Into<ParamValue>) {
        self.0.insert(param, value.into());
    }

    pub fn get(&self, param: Param) -> Option<&ParamValue> {
        self.0.get(&param)
    }

    pub fn remove(&mut self, param: Param) -> Option<ParamValue> {
        self.0.remove(&param)
    }

    pub fn contains(&self, param: Param) -> bool {
        self.0.contains_key(&param)
    }

    pub fn keys(&self) -> impl Iterator<Item = Param> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Param, ParamValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (Param, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
