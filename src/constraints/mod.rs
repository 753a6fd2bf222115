//! Constraint Engine
//!
//! A [`Constraint`] validates and normalizes one parameter value. Constraints
//! are pure: no shared state, and applying one to its own output returns the
//! same value. Every failure is an [`OmniError::ConstraintViolation`] with a
//! human-readable message; out-of-range values are never clamped.
//!
//! ```rust
//! use omnigen::constraints::Constraint;
//! use omnigen::types::ParamValue;
//!
//! let c = Constraint::range(0.0, 2.0);
//! assert!(c.validate(&ParamValue::Float(0.7)).is_ok());
//! assert!(c.validate(&ParamValue::Float(3.0)).is_err());
//! ```

mod dimensions;
mod media;

pub use dimensions::Dimensions;

use crate::error::{OmniError, Result};
use crate::types::{MediaKind, MimeType, ParamValue, Tool};
use regex::Regex;
use serde_json::Value;

/// A named voice accepted by speech models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: String,
    pub name: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Constraint {
    /// Value must equal one of the options (case-sensitive).
    Choice { options: Vec<ParamValue> },
    /// Numeric bounds, inclusive. `special_values` bypass the bounds.
    Range {
        min: f64,
        max: f64,
        step: Option<f64>,
        special_values: Vec<f64>,
    },
    /// Anchored regex match on a string.
    Pattern(Regex),
    Dimensions(Dimensions),
    Str {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Int,
    Float,
    Bool,
    /// Value must be an output schema that compiles as JSON Schema.
    Schema,
    /// A single media artifact of `kind`.
    Media {
        kind: MediaKind,
        supported_mime_types: Option<Vec<MimeType>>,
    },
    /// One or more media artifacts of `kind`; a single value is normalized to a list.
    MediaList {
        kind: MediaKind,
        supported_mime_types: Option<Vec<MimeType>>,
        max_count: Option<usize>,
    },
    /// Allowed built-in tool kinds. User function tools are always accepted.
    ToolSupport { tools: Vec<&'static str> },
    /// Voice id or name; normalized to the id.
    Voice { voices: Vec<Voice> },
}

/// Structural equality; patterns compare by their source.
impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Choice { options: a }, Constraint::Choice { options: b }) => a == b,
            (
                Constraint::Range {
                    min,
                    max,
                    step,
                    special_values,
                },
                Constraint::Range {
                    min: other_min,
                    max: other_max,
                    step: other_step,
                    special_values: other_specials,
                },
            ) => {
                min == other_min
                    && max == other_max
                    && step == other_step
                    && special_values == other_specials
            }
            (Constraint::Pattern(a), Constraint::Pattern(b)) => a.as_str() == b.as_str(),
            (Constraint::Dimensions(a), Constraint::Dimensions(b)) => a == b,
            (
                Constraint::Str {
                    min_length,
                    max_length,
                },
                Constraint::Str {
                    min_length: other_min,
                    max_length: other_max,
                },
            ) => min_length == other_min && max_length == other_max,
            (Constraint::Int, Constraint::Int)
            | (Constraint::Float, Constraint::Float)
            | (Constraint::Bool, Constraint::Bool)
            | (Constraint::Schema, Constraint::Schema) => true,
            (
                Constraint::Media {
                    kind,
                    supported_mime_types,
                },
                Constraint::Media {
                    kind: other_kind,
                    supported_mime_types: other_types,
                },
            ) => kind == other_kind && supported_mime_types == other_types,
            (
                Constraint::MediaList {
                    kind,
                    supported_mime_types,
                    max_count,
                },
                Constraint::MediaList {
                    kind: other_kind,
                    supported_mime_types: other_types,
                    max_count: other_count,
                },
            ) => {
                kind == other_kind
                    && supported_mime_types == other_types
                    && max_count == other_count
            }
            (Constraint::ToolSupport { tools: a }, Constraint::ToolSupport { tools: b }) => a == b,
            (Constraint::Voice { voices: a }, Constraint::Voice { voices: b }) => a == b,
            _ => false,
        }
    }
}

impl Constraint {
    pub fn choice<I, V>(options: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Constraint::Choice {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Constraint::Range {
            min,
            max,
            step: None,
            special_values: Vec::new(),
        }
    }

    pub fn stepped_range(min: f64, max: f64, step: f64) -> Self {
        Constraint::Range {
            min,
            max,
            step: Some(step),
            special_values: Vec::new(),
        }
    }

    pub fn range_with_specials(min: f64, max: f64, special_values: Vec<f64>) -> Self {
        Constraint::Range {
            min,
            max,
            step: None,
            special_values,
        }
    }

    /// Full-match regex constraint.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(Constraint::Pattern)
            .map_err(|e| OmniError::Configuration(format!("Invalid pattern '{pattern}': {e}")))
    }

    pub fn string() -> Self {
        Constraint::Str {
            min_length: None,
            max_length: None,
        }
    }

    pub fn string_len(min_length: Option<usize>, max_length: Option<usize>) -> Self {
        Constraint::Str {
            min_length,
            max_length,
        }
    }

    pub fn image(supported: Option<Vec<MimeType>>) -> Self {
        Constraint::Media {
            kind: MediaKind::Image,
            supported_mime_types: supported,
        }
    }

    pub fn images(supported: Option<Vec<MimeType>>, max_count: Option<usize>) -> Self {
        Constraint::MediaList {
            kind: MediaKind::Image,
            supported_mime_types: supported,
            max_count,
        }
    }

    pub fn tools(tools: &[&'static str]) -> Self {
        Constraint::ToolSupport {
            tools: tools.to_vec(),
        }
    }

    pub fn voices(voices: Vec<Voice>) -> Self {
        Constraint::Voice { voices }
    }

    /// Validate `value` and return its normalized form.
    pub fn validate(&self, value: &ParamValue) -> Result<ParamValue> {
        let value = normalize_json(value);
        match self {
            Constraint::Choice { options } => {
                if options.iter().any(|o| values_equal(o, &value)) {
                    Ok(value)
                } else {
                    Err(OmniError::constraint(format!(
                        "Must be one of {}, got {}",
                        repr_list(options),
                        repr(&value)
                    )))
                }
            }
            Constraint::Range {
                min,
                max,
                step,
                special_values,
            } => validate_range(&value, *min, *max, *step, special_values),
            Constraint::Pattern(regex) => {
                let s = expect_str(&value)?;
                if regex.is_match(s) {
                    Ok(value)
                } else {
                    Err(OmniError::constraint(format!(
                        "Must match pattern '{}', got '{s}'",
                        pattern_source(regex)
                    )))
                }
            }
            Constraint::Dimensions(d) => d.validate(&value),
            Constraint::Str {
                min_length,
                max_length,
            } => {
                let s = expect_str(&value)?;
                let len = s.chars().count();
                if let Some(min) = min_length
                    && len < *min
                {
                    return Err(OmniError::constraint(format!(
                        "String too short (min {min}), got length {len}: '{s}'"
                    )));
                }
                if let Some(max) = max_length
                    && len > *max
                {
                    return Err(OmniError::constraint(format!(
                        "String too long (max {max}), got length {len}: '{s}'"
                    )));
                }
                Ok(value)
            }
            Constraint::Int => validate_int(&value),
            Constraint::Float => match value {
                ParamValue::Int(i) => Ok(ParamValue::Float(i as f64)),
                ParamValue::Float(_) => Ok(value),
                other => Err(OmniError::constraint(format!(
                    "Must be float or int, got {}",
                    other.type_name()
                ))),
            },
            Constraint::Bool => match value {
                ParamValue::Bool(_) => Ok(value),
                other => Err(OmniError::constraint(format!(
                    "Must be bool, got {}",
                    other.type_name()
                ))),
            },
            Constraint::Schema => validate_schema(&value),
            Constraint::Media {
                kind,
                supported_mime_types,
            } => media::validate_single(&value, *kind, supported_mime_types.as_deref()),
            Constraint::MediaList {
                kind,
                supported_mime_types,
                max_count,
            } => media::validate_list(&value, *kind, supported_mime_types.as_deref(), *max_count),
            Constraint::ToolSupport { tools } => {
                let list = value.as_tools().ok_or_else(|| {
                    OmniError::constraint(format!("Must be a list of tools, got {}", value.type_name()))
                })?;
                for tool in list {
                    if matches!(tool, Tool::Function(_)) {
                        continue;
                    }
                    if !tools.contains(&tool.kind()) {
                        return Err(OmniError::constraint(format!(
                            "Tool '{}' not supported. Supported: {:?}",
                            tool.kind(),
                            tools
                        )));
                    }
                }
                Ok(value)
            }
            Constraint::Voice { voices } => {
                let s = expect_str(&value)?;
                if voices.iter().any(|v| v.id == s) {
                    return Ok(value);
                }
                if let Some(v) = voices.iter().find(|v| v.name == s) {
                    return Ok(ParamValue::Str(v.id.clone()));
                }
                let names: Vec<&str> = voices.iter().map(|v| v.name.as_str()).collect();
                let ids: Vec<&str> = voices.iter().map(|v| v.id.as_str()).collect();
                Err(OmniError::constraint(format!(
                    "Must be one of {names:?} (names) or {ids:?} (IDs), got '{s}'"
                )))
            }
        }
    }
}

/// Unwrap JSON scalars into native variants so callers may pass either.
fn normalize_json(value: &ParamValue) -> ParamValue {
    match value {
        ParamValue::Json(Value::Bool(b)) => ParamValue::Bool(*b),
        ParamValue::Json(Value::String(s)) => ParamValue::Str(s.clone()),
        ParamValue::Json(Value::Number(n)) => n
            .as_i64()
            .map(ParamValue::Int)
            .or_else(|| n.as_f64().map(ParamValue::Float))
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn values_equal(a: &ParamValue, b: &ParamValue) -> bool {
    match (a, b) {
        (ParamValue::Bool(_), _) | (_, ParamValue::Bool(_)) => a == b,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

pub(crate) fn repr(value: &ParamValue) -> String {
    match value {
        ParamValue::Str(s) => format!("'{s}'"),
        ParamValue::Float(f) => fmt_num(*f),
        other => other.to_string(),
    }
}

fn repr_list(values: &[ParamValue]) -> String {
    let items: Vec<String> = values.iter().map(repr).collect();
    format!("[{}]", items.join(", "))
}

/// Integral values print without a fractional part.
pub(crate) fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn expect_str(value: &ParamValue) -> Result<&str> {
    value.as_str().ok_or_else(|| {
        OmniError::constraint(format!("Must be string, got {}", value.type_name()))
    })
}

fn pattern_source(regex: &Regex) -> &str {
    let src = regex.as_str();
    src.strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(src)
}

fn validate_range(
    value: &ParamValue,
    min: f64,
    max: f64,
    step: Option<f64>,
    special_values: &[f64],
) -> Result<ParamValue> {
    let v = match value {
        ParamValue::Int(i) => *i as f64,
        ParamValue::Float(f) => *f,
        other => {
            return Err(OmniError::constraint(format!(
                "Must be numeric, got {}",
                other.type_name()
            )));
        }
    };

    if special_values.contains(&v) {
        return Ok(value.clone());
    }

    if !(min <= v && v <= max) {
        let special_msg = if special_values.is_empty() {
            String::new()
        } else {
            let specials: Vec<String> = special_values.iter().map(|s| fmt_num(*s)).collect();
            format!(" or one of [{}]", specials.join(", "))
        };
        return Err(OmniError::constraint(format!(
            "Must be between {} and {}{special_msg}, got {}",
            fmt_num(min),
            fmt_num(max),
            repr(value)
        )));
    }

    if let Some(step) = step {
        const EPSILON: f64 = 1e-9;
        let remainder = (v - min).rem_euclid(step);
        if remainder.abs() > EPSILON && (remainder - step).abs() > EPSILON {
            let below = min + ((v - min) / step).trunc() * step;
            let above = below + step;
            return Err(OmniError::constraint(format!(
                "Value must match step {}. Nearest valid: {} or {}, got {}",
                fmt_num(step),
                fmt_num(below),
                fmt_num(above),
                repr(value)
            )));
        }
    }

    Ok(value.clone())
}

fn validate_int(value: &ParamValue) -> Result<ParamValue> {
    match value {
        ParamValue::Int(_) => Ok(value.clone()),
        ParamValue::Str(s) => {
            let digits = s.strip_prefix('-').unwrap_or(s);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(OmniError::constraint(format!("Must be int, got '{s}'")));
            }
            s.parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| OmniError::constraint(format!("Must be int, got '{s}'")))
        }
        ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(ParamValue::Int(*f as i64)),
        ParamValue::Float(f) => Err(OmniError::constraint(format!("Must be int, got {f}"))),
        other => Err(OmniError::constraint(format!(
            "Must be int, got {}",
            other.type_name()
        ))),
    }
}

fn validate_schema(value: &ParamValue) -> Result<ParamValue> {
    let schema = value.as_schema().ok_or_else(|| {
        OmniError::constraint(format!("Must be an output schema, got {}", value.type_name()))
    })?;
    if !schema.schema.is_object() {
        return Err(OmniError::constraint(format!(
            "Schema '{}' must be a JSON object, got {}",
            schema.name, schema.schema
        )));
    }
    jsonschema::validator_for(&schema.response_schema()).map_err(|e| {
        OmniError::constraint(format!("Invalid JSON schema for '{}': {e}", schema.name))
    })?;
    Ok(value.clone())
}
