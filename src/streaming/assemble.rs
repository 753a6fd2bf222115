//! Final assembly of streamed chunks
//!
//! Every function here is a pure function of the chunk list, so assembling
//! the same list twice yields the same result.

use crate::error::{OmniError, Result};
use crate::types::{Artifact, Capability, Chunk, ChunkContent, Content, FinishReason, MediaKind, Usage};
use bytes::BytesMut;
use serde_json::Value;

/// Build the capability's final content from the ordered chunk list.
pub fn assemble(capability: Capability, chunks: &[Chunk]) -> Result<Content> {
    match capability {
        Capability::TextGeneration => Ok(Content::Text(
            chunks
                .iter()
                .filter_map(|c| c.content.as_text())
                .collect(),
        )),
        Capability::SpeechGeneration => {
            let mut buf = BytesMut::new();
            for chunk in chunks {
                if let ChunkContent::Audio(data) = &chunk.content {
                    buf.extend_from_slice(data);
                }
            }
            if buf.is_empty() {
                return Err(OmniError::parse("Stream completed without audio data"));
            }
            Ok(Content::Audio(Artifact::from_data(MediaKind::Audio, buf.freeze())))
        }
        Capability::ImageGeneration => last_artifact(chunks)
            .map(Content::Image)
            .ok_or_else(|| OmniError::parse("Stream completed without image content")),
        Capability::VideoGeneration => last_artifact(chunks)
            .map(Content::Video)
            .ok_or_else(|| OmniError::parse("Stream completed without video content")),
        Capability::MusicGeneration => last_artifact(chunks)
            .map(Content::Audio)
            .ok_or_else(|| OmniError::parse("Stream completed without audio content")),
        Capability::Embeddings => Err(OmniError::parse("Embeddings cannot be streamed")),
    }
}

fn last_artifact(chunks: &[Chunk]) -> Option<Artifact> {
    chunks.iter().rev().find_map(|c| match &c.content {
        ChunkContent::Image(a) | ChunkContent::Media(a) if a.has_content() => Some(a.clone()),
        _ => None,
    })
}

/// Usage from the last chunk that carries any; never summed.
pub fn last_usage(chunks: &[Chunk]) -> Usage {
    chunks
        .iter()
        .rev()
        .find_map(|c| c.usage.clone().filter(|u| !u.is_empty()))
        .unwrap_or_default()
}

/// Finish reason from the last chunk that carries one.
pub fn last_finish_reason(chunks: &[Chunk]) -> Option<FinishReason> {
    chunks.iter().rev().find_map(|c| c.finish_reason.clone())
}

/// Raw JSON events of the chunks, filtered by `keep`.
pub fn raw_events(chunks: &[Chunk], keep: impl Fn(&Value) -> bool) -> Vec<Value> {
    chunks
        .iter()
        .filter_map(Chunk::event_data)
        .filter(|v| keep(v))
        .cloned()
        .collect()
}
