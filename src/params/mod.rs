//! Parameter Management Module
//!
//! Handles parameter mapping and validation. Each provider adapter owns an
//! ordered list of [`ParameterMapper`]s; building a request runs every mapper
//! in that order, and the inverse `parse_output` transforms run over the
//! parsed response content.

pub mod mapper;

pub use mapper::{
    FieldMapper, NestedFieldMapper, array_entry, object_entry, parse_structured_output, set_path,
};

use crate::error::{OmniError, Result};
use crate::registry::Model;
use crate::types::{Artifact, Content, Param, ParamValue, Parameters};
use serde_json::{Map, Value};

/// Provider-native request body under construction.
pub type RequestBody = Map<String, Value>;

/// Translates one logical parameter into one provider's request shape.
pub trait ParameterMapper: Send + Sync {
    fn name(&self) -> Param;

    /// Write `value` into `request`. `None` means the caller did not supply
    /// the parameter; mappers leave the request untouched unless they
    /// document a provider default.
    ///
    /// Implementations validate before writing so a failing value leaves the
    /// request key as it was.
    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()>;

    /// Inverse transform applied to parsed content when the parameter was supplied.
    fn parse_output(&self, content: Content, _value: &ParamValue) -> Result<Content> {
        Ok(content)
    }

    /// Validate with the model's constraint for [`ParameterMapper::name`].
    fn validate(&self, value: Option<&ParamValue>, model: &Model) -> Result<Option<ParamValue>> {
        value.map(|v| model.validate(self.name(), v)).transpose()
    }
}

/// Ordered mapper list owned by a provider adapter.
pub type Mappers = Vec<Box<dyn ParameterMapper>>;

/// Run every mapper in order over `request`.
///
/// Fails with `UnsupportedParameter` when the caller supplied a parameter
/// that no mapper consumes.
pub fn apply_mappers(
    request: &mut RequestBody,
    mappers: &[Box<dyn ParameterMapper>],
    params: &Parameters,
    model: &Model,
) -> Result<()> {
    if let Some(unknown) = params
        .keys()
        .find(|p| !mappers.iter().any(|m| m.name() == *p))
    {
        return Err(OmniError::UnsupportedParameter {
            parameter: unknown.to_string(),
            model_id: model.id.clone(),
        });
    }
    for mapper in mappers {
        mapper.map(request, params.get(mapper.name()), model)?;
    }
    Ok(())
}

/// Apply `parse_output` of every mapper whose parameter was supplied.
pub fn transform_output(
    mut content: Content,
    mappers: &[Box<dyn ParameterMapper>],
    params: &Parameters,
) -> Result<Content> {
    for mapper in mappers {
        if let Some(value) = params.get(mapper.name()) {
            content = mapper.parse_output(content, value)?;
        }
    }
    Ok(content)
}

/// Load file-backed artifacts into memory so request building stays free of I/O.
pub async fn resolve_artifacts(params: &mut Parameters) -> Result<()> {
    let keys: Vec<Param> = params.keys().collect();
    for key in keys {
        let Some(value) = params.get(key) else {
            continue;
        };
        let resolved = match value {
            ParamValue::Artifact(a) => ParamValue::Artifact(load(a).await?),
            ParamValue::Artifacts(list) => {
                let mut out = Vec::with_capacity(list.len());
                for a in list {
                    out.push(load(a).await?);
                }
                ParamValue::Artifacts(out)
            }
            _ => continue,
        };
        params.insert(key, resolved);
    }
    Ok(())
}

async fn load(artifact: &Artifact) -> Result<Artifact> {
    if artifact.data.is_some() || artifact.url.is_some() || artifact.path.is_none() {
        return Ok(artifact.clone());
    }
    let data = artifact.bytes().await?;
    let mut loaded = artifact.clone();
    loaded.mime_type = loaded.resolved_mime_type();
    loaded.data = Some(data);
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::types::{Capability, MediaKind, Provider};
    use serde_json::json;

    fn model() -> Model {
        Model::new("m", Provider::OpenAI, "M")
            .capability(Capability::TextGeneration)
            .constraint(Param::Temperature, Constraint::range(0.0, 2.0))
            .constraint(Param::Voice, Constraint::string())
    }

    fn mappers() -> Mappers {
        vec![
            Box::new(FieldMapper::new(Param::Temperature, "temperature")),
            Box::new(NestedFieldMapper::new(Param::Voice, &["voice", "name"])),
        ]
    }

    #[test]
    fn builds_flat_and_nested_fields() {
        let mut request = RequestBody::new();
        let params = Parameters::new()
            .with(Param::Temperature, 0.7)
            .with(Param::Voice, "en-US-Neural2-A");
        apply_mappers(&mut request, &mappers(), &params, &model()).unwrap();
        assert_eq!(request["temperature"], json!(0.7));
        assert_eq!(request["voice"]["name"], "en-US-Neural2-A");
    }

    #[test]
    fn absent_parameters_leave_request_untouched() {
        let mut request = RequestBody::new();
        apply_mappers(&mut request, &mappers(), &Parameters::new(), &model()).unwrap();
        assert!(request.is_empty());
    }

    #[test]
    fn out_of_range_value_leaves_key_unmodified() {
        let mut request = RequestBody::new();
        request.insert("temperature".into(), json!(1.0));
        let params = Parameters::new().with(Param::Temperature, 5.0);
        let err = apply_mappers(&mut request, &mappers(), &params, &model()).unwrap_err();
        assert!(matches!(err, OmniError::ConstraintViolation(_)));
        assert_eq!(request["temperature"], json!(1.0));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut request = RequestBody::new();
        let params = Parameters::new().with(Param::Seed, 1);
        let err = apply_mappers(&mut request, &mappers(), &params, &model()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'seed' is not supported by model 'm'"
        );
    }

    #[tokio::test]
    async fn resolve_artifacts_reads_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ref.png");
        std::fs::write(&file, [1u8, 2, 3]).unwrap();
        let mut params = Parameters::new()
            .with(Param::FirstFrame, Artifact::from_path(MediaKind::Image, &file))
            .with(Param::Temperature, 0.2);
        resolve_artifacts(&mut params).await.unwrap();
        let a = params.get(Param::FirstFrame).unwrap().as_artifact().unwrap();
        assert_eq!(a.data.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(params.get(Param::Temperature), Some(&ParamValue::Float(0.2)));
    }
}
