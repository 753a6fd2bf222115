//! Test fixture utilities: load `.sse` fixtures and drive chunk parsers over them
#![allow(dead_code)]

use futures_util::StreamExt;
use omnigen::protocols::ChunkParser;
use omnigen::streaming::sse::{SseJsonStreamConfig, stream_sse_json_values};
use omnigen::streaming::{ChunkStream, EventSource};
use omnigen::{Capability, Chunk};
use std::io;
use std::sync::Arc;

pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Raw fixture text, e.g. to serve as a mock response body.
pub fn load_sse_fixture(name: &str) -> io::Result<String> {
    Ok(std::fs::read_to_string(fixture_path(name))?.replace("\r\n", "\n"))
}

/// Load an `.sse` fixture and split it into SSE messages (separated by blank lines)
pub fn load_sse_fixture_as_bytes(name: &str) -> io::Result<Vec<Result<Vec<u8>, io::Error>>> {
    let raw = load_sse_fixture(name)?;
    let mut out = Vec::new();
    for chunk in raw.split("\n\n") {
        let s = chunk.trim_end_matches('\n');
        if s.is_empty() {
            continue;
        }
        let mut owned = String::from(s);
        owned.push_str("\n\n");
        out.push(Ok(owned.into_bytes()));
    }
    Ok(out)
}

/// A chunk stream reading a fixture through the SSE decoder and `parser`.
pub fn fixture_stream(name: &str, parser: Arc<dyn ChunkParser>, capability: Capability) -> ChunkStream {
    let bytes = load_sse_fixture_as_bytes(name).expect("load fixture");
    let events = stream_sse_json_values(
        futures_util::stream::iter(bytes),
        SseJsonStreamConfig::new("fixture"),
    );
    ChunkStream::new(EventSource::new(events), parser, capability)
}

/// Drain `stream`, panicking on the first error.
pub async fn collect_chunks(stream: &mut ChunkStream) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item.expect("chunk ok"));
    }
    chunks
}

/// Text deltas of `chunks`, skipping usage-only chunks.
pub fn text_deltas(chunks: &[Chunk]) -> Vec<String> {
    chunks
        .iter()
        .filter_map(|c| c.content.as_text())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
