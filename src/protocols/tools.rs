//! Tool definitions per wire dialect
//!
//! The same [`Tool`] list serializes differently for each protocol family.
//! [`ToolsMapper`] and [`WebSearchMapper`] append to the request's `tools`
//! array so both can be supplied together.

use crate::error::{OmniError, Result};
use crate::params::{ParameterMapper, RequestBody, array_entry};
use crate::registry::Model;
use crate::types::{Param, ParamValue, Tool};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolDialect {
    /// OpenAI / xAI Responses API
    OpenResponses,
    /// Mistral / DeepSeek Chat Completions
    ChatCompletions,
    Anthropic,
    Gemini,
}

impl ToolDialect {
    fn label(self) -> &'static str {
        match self {
            ToolDialect::OpenResponses => "responses",
            ToolDialect::ChatCompletions => "chat completions",
            ToolDialect::Anthropic => "anthropic messages",
            ToolDialect::Gemini => "generate content",
        }
    }

    /// Wire form of one tool.
    pub fn tool_json(self, tool: &Tool) -> Result<Value> {
        let unsupported = || {
            OmniError::Validation(format!(
                "Tool '{}' is not supported by the {} protocol",
                tool.kind(),
                self.label()
            ))
        };
        let value = match (self, tool) {
            (ToolDialect::OpenResponses, Tool::WebSearch { allowed_domains }) => {
                let mut obj = json!({"type": "web_search"});
                if !allowed_domains.is_empty() {
                    obj["filters"] = json!({"allowed_domains": allowed_domains});
                }
                obj
            }
            (ToolDialect::OpenResponses, Tool::XSearch) => json!({"type": "x_search"}),
            (ToolDialect::OpenResponses, Tool::CodeExecution) => {
                json!({"type": "code_interpreter", "container": {"type": "auto"}})
            }
            (ToolDialect::OpenResponses, Tool::Function(f)) => {
                let mut obj = json!({"type": "function", "name": f.name, "parameters": f.parameters});
                if let Some(description) = &f.description {
                    obj["description"] = json!(description);
                }
                obj
            }
            (ToolDialect::ChatCompletions, Tool::WebSearch { .. }) => json!({"type": "web_search"}),
            (ToolDialect::ChatCompletions, Tool::Function(f)) => {
                let mut function = json!({"name": f.name, "parameters": f.parameters});
                if let Some(description) = &f.description {
                    function["description"] = json!(description);
                }
                json!({"type": "function", "function": function})
            }
            (ToolDialect::Anthropic, Tool::WebSearch { allowed_domains }) => {
                let mut obj = json!({"type": "web_search_20250305", "name": "web_search"});
                if !allowed_domains.is_empty() {
                    obj["allowed_domains"] = json!(allowed_domains);
                }
                obj
            }
            (ToolDialect::Anthropic, Tool::CodeExecution) => {
                json!({"type": "code_execution_20250522", "name": "code_execution"})
            }
            (ToolDialect::Anthropic, Tool::Function(f)) => {
                let mut obj = json!({"name": f.name, "input_schema": f.parameters});
                if let Some(description) = &f.description {
                    obj["description"] = json!(description);
                }
                obj
            }
            (ToolDialect::Gemini, Tool::WebSearch { .. }) => json!({"google_search": {}}),
            (ToolDialect::Gemini, Tool::CodeExecution) => json!({"code_execution": {}}),
            (ToolDialect::Gemini, Tool::Function(f)) => {
                let mut decl = json!({"name": f.name, "parameters": f.parameters});
                if let Some(description) = &f.description {
                    decl["description"] = json!(description);
                }
                json!({"function_declarations": [decl]})
            }
            _ => return Err(unsupported()),
        };
        Ok(value)
    }
}

/// `tools` parameter → the dialect's `tools` array.
#[derive(Debug, Clone, Copy)]
pub struct ToolsMapper {
    dialect: ToolDialect,
}

impl ToolsMapper {
    pub const fn new(dialect: ToolDialect) -> Self {
        Self { dialect }
    }
}

impl ParameterMapper for ToolsMapper {
    fn name(&self) -> Param {
        Param::Tools
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let tools = validated.as_tools().ok_or_else(|| {
            OmniError::constraint(format!("tools must be a list of tools, got {}", validated.type_name()))
        })?;
        let encoded = tools
            .iter()
            .map(|t| self.dialect.tool_json(t))
            .collect::<Result<Vec<_>>>()?;
        array_entry(request, "tools").extend(encoded);
        Ok(())
    }
}

/// `web_search: true` → one default web search tool.
#[derive(Debug, Clone, Copy)]
pub struct WebSearchMapper {
    dialect: ToolDialect,
}

impl WebSearchMapper {
    pub const fn new(dialect: ToolDialect) -> Self {
        Self { dialect }
    }
}

impl ParameterMapper for WebSearchMapper {
    fn name(&self) -> Param {
        Param::WebSearch
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        if validated.as_bool() != Some(true) {
            return Ok(());
        }
        let tool = self.dialect.tool_json(&Tool::web_search())?;
        array_entry(request, "tools").push(tool);
        Ok(())
    }
}

/// Remove `title` keys recursively; Gemini rejects them in response schemas.
pub fn strip_titles(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .filter(|(k, _)| k.as_str() != "title")
                .map(|(k, v)| (k.clone(), strip_titles(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_titles).collect()),
        other => other.clone(),
    }
}
