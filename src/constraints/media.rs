use crate::error::{OmniError, Result};
use crate::types::{Artifact, MediaKind, MimeType, ParamValue};

fn mime_list(supported: &[MimeType]) -> String {
    let items: Vec<String> = supported.iter().map(|m| format!("'{m}'")).collect();
    format!("[{}]", items.join(", "))
}

fn got_mime(artifact: &Artifact) -> String {
    artifact
        .resolved_mime_type()
        .map(|m| format!("'{m}'"))
        .unwrap_or_else(|| "None".to_string())
}

fn check_artifact(artifact: &Artifact, kind: MediaKind, supported: Option<&[MimeType]>) -> Result<()> {
    if artifact.kind != kind {
        return Err(OmniError::constraint(format!(
            "Must be {kind} artifact, got {} artifact",
            artifact.kind
        )));
    }
    if let Some(supported) = supported
        && !artifact
            .resolved_mime_type()
            .is_some_and(|m| supported.contains(&m))
    {
        return Err(OmniError::constraint(format!(
            "mime_type must be one of {}, got {}",
            mime_list(supported),
            got_mime(artifact)
        )));
    }
    Ok(())
}

pub(super) fn validate_single(
    value: &ParamValue,
    kind: MediaKind,
    supported: Option<&[MimeType]>,
) -> Result<ParamValue> {
    match value {
        ParamValue::Artifacts(_) => Err(OmniError::constraint(format!(
            "{kind} parameter requires a single {kind} artifact, not a list"
        ))),
        ParamValue::Artifact(a) => {
            check_artifact(a, kind, supported)?;
            Ok(value.clone())
        }
        other => Err(OmniError::constraint(format!(
            "Must be {kind} artifact, got {}",
            other.type_name()
        ))),
    }
}

pub(super) fn validate_list(
    value: &ParamValue,
    kind: MediaKind,
    supported: Option<&[MimeType]>,
    max_count: Option<usize>,
) -> Result<ParamValue> {
    let items = value.as_artifacts().ok_or_else(|| {
        OmniError::constraint(format!(
            "Must be {kind} artifact or list, got {}",
            value.type_name()
        ))
    })?;
    if let Some(max) = max_count
        && items.len() > max
    {
        return Err(OmniError::constraint(format!(
            "Must have at most {max} {kind}(s), got {}",
            items.len()
        )));
    }
    let label = capitalize(kind.as_str());
    for (i, item) in items.iter().enumerate() {
        check_artifact(item, kind, supported)
            .map_err(|e| OmniError::constraint(format!("{label} {}: {}", i + 1, e)))?;
    }
    Ok(ParamValue::Artifacts(items.to_vec()))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
