//! Gemini embeddings over `:embedContent` and `:batchEmbedContents`
//!
//! A single text goes to `:embedContent` and comes back as `embedding`;
//! a batch is sent as `requests[]` and comes back as `embeddings[]`. The
//! API reports no usage and no finish reason.

use super::{ContentExtractor, RawResponse};
use crate::error::{OmniError, Result};
use crate::params::{Mappers, ParameterMapper, RequestBody};
use crate::registry::Model;
use crate::types::{Content, EmbeddingInput, Param, ParamValue};
use serde_json::{Value, json};

pub fn embed_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:embedContent")
}

pub fn batch_embed_path(model_id: &str) -> String {
    format!("/v1beta/models/{model_id}:batchEmbedContents")
}

pub fn is_batch(request: &RequestBody) -> bool {
    request.contains_key("requests")
}

/// Path for the request shape built by [`init_request`].
pub fn path_for(model_id: &str, request: &RequestBody) -> String {
    if is_batch(request) {
        batch_embed_path(model_id)
    } else {
        embed_path(model_id)
    }
}

fn content(text: &str) -> Value {
    json!({"parts": [{"text": text}]})
}

/// A batch input always uses `requests[]`, so a one-text batch still gets a
/// list of vectors back.
pub fn init_request(model_id: &str, input: &EmbeddingInput) -> Result<RequestBody> {
    let mut request = RequestBody::new();
    match input.texts.as_slice() {
        [] => return Err(OmniError::Validation("Nothing to embed".into())),
        [text] if !input.batch => {
            request.insert("content".into(), content(text));
        }
        texts => {
            let requests = texts
                .iter()
                .map(|t| json!({"model": format!("models/{model_id}"), "content": content(t)}))
                .collect();
            request.insert("requests".into(), Value::Array(requests));
        }
    }
    Ok(request)
}

pub fn mappers() -> Mappers {
    vec![Box::new(DimensionsMapper)]
}

/// `dimensions` → `outputDimensionality`, on every batch entry when batched.
#[derive(Debug, Clone, Copy)]
struct DimensionsMapper;

impl ParameterMapper for DimensionsMapper {
    fn name(&self) -> Param {
        Param::Dimensions
    }

    fn map(&self, request: &mut RequestBody, value: Option<&ParamValue>, model: &Model) -> Result<()> {
        let Some(validated) = self.validate(value, model)? else {
            return Ok(());
        };
        let dims = validated.to_json();
        match request.get_mut("requests") {
            Some(Value::Array(entries)) => {
                for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
                    entry.insert("outputDimensionality".into(), dims.clone());
                }
            }
            _ => {
                request.insert("outputDimensionality".into(), dims);
            }
        }
        Ok(())
    }
}

fn values(embedding: &Value) -> Result<Vec<f64>> {
    embedding
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| OmniError::parse("Embedding without values"))?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| OmniError::parse("Non-numeric embedding value")))
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedContentExtractor;

impl ContentExtractor for EmbedContentExtractor {
    fn parse_content(&self, response: &RawResponse) -> Result<Content> {
        let body = response.expect_json("embedding")?;
        if let Some(single) = body.get("embedding") {
            return Ok(Content::Embedding(values(single)?));
        }
        if let Some(list) = body.get("embeddings").and_then(Value::as_array) {
            return Ok(Content::Embeddings(list.iter().map(values).collect::<Result<_>>()?));
        }
        Err(OmniError::parse(
            "Unexpected response format: missing 'embedding' or 'embeddings' field",
        ))
    }

    fn content_fields(&self) -> &'static [&'static str] {
        &["embedding", "embeddings"]
    }
}
