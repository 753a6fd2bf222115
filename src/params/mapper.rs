//! Reusable mapper building blocks
//!
//! Nested writes use set-default composition: parents are created only when
//! absent, so independent mappers targeting the same object or array compose
//! instead of clobbering each other.

use super::{ParameterMapper, RequestBody};
use crate::error::{OmniError, Result};
use crate::registry::Model;
use crate::types::{Content, OutputSchema, Param, ParamValue};
use serde_json::{Map, Value};

/// Maps a parameter straight onto a top-level request field.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper {
    name: Param,
    field: &'static str,
}

impl FieldMapper {
    pub const fn new(name: Param, field: &'static str) -> Self {
        Self { name, field }
    }
}

impl ParameterMapper for FieldMapper {
    fn name(&self) -> Param {
        self.name
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        if let Some(validated) = self.validate(value, model)? {
            request.insert(self.field.to_string(), validated.to_json());
        }
        Ok(())
    }
}

/// Maps a parameter onto a nested path such as `voice.name`.
#[derive(Debug, Clone, Copy)]
pub struct NestedFieldMapper {
    name: Param,
    path: &'static [&'static str],
}

impl NestedFieldMapper {
    pub const fn new(name: Param, path: &'static [&'static str]) -> Self {
        Self { name, path }
    }
}

impl ParameterMapper for NestedFieldMapper {
    fn name(&self) -> Param {
        self.name
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        if let Some(validated) = self.validate(value, model)? {
            set_path(request, self.path, validated.to_json());
        }
        Ok(())
    }
}

/// Get `map[key]` as an object, inserting an empty one when absent.
///
/// A non-object value at `key` is replaced.
pub fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just set to an object"),
    }
}

/// Get `map[key]` as an array, inserting an empty one when absent.
pub fn array_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Vec<Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just set to an array"),
    }
}

/// Write `value` at `path`, creating intermediate objects with set-default semantics.
pub fn set_path(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for key in parents {
        current = object_entry(current, key);
    }
    current.insert((*last).to_string(), value);
}

/// Parse text output as JSON and validate it against `schema`.
///
/// `unwrap` extracts the payload for providers that wrap list output in an
/// object. Markdown code fences around the JSON are tolerated.
pub fn parse_structured_output(
    content: Content,
    schema: &OutputSchema,
    unwrap: impl FnOnce(Value) -> Value,
) -> Result<Content> {
    let text = match content {
        Content::Text(text) => text,
        Content::Json(value) => return validate_structured(unwrap(value), schema),
        other => return Ok(other),
    };
    let trimmed = strip_code_fence(&text);
    let value: Value = serde_json::from_str(trimmed).map_err(|e| {
        OmniError::parse(format!(
            "Structured output for '{}' is not valid JSON: {e}",
            schema.name
        ))
    })?;
    validate_structured(unwrap(value), schema)
}

fn validate_structured(value: Value, schema: &OutputSchema) -> Result<Content> {
    let validator = jsonschema::validator_for(&schema.response_schema()).map_err(|e| {
        OmniError::constraint(format!("Invalid JSON schema for '{}': {e}", schema.name))
    })?;
    let errors: Vec<String> = validator
        .iter_errors(&value)
        .take(3)
        .map(|err| format!("{err} at {}", err.instance_path))
        .collect();
    if !errors.is_empty() {
        return Err(OmniError::parse(format!(
            "Structured output does not match schema '{}': {}",
            schema.name,
            errors.join("; ")
        )));
    }
    Ok(Content::Json(value))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Take `items` out of an object, or the object's values, for list schemas.
pub fn unwrap_list(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => match obj.remove("items") {
            Some(items @ Value::Array(_)) => items,
            Some(other) => {
                obj.insert("items".into(), other);
                Value::Array(obj.into_iter().map(|(_, v)| v).collect())
            }
            None => Value::Array(obj.into_iter().map(|(_, v)| v).collect()),
        },
        other => other,
    }
}
