//! Gemini generateContent streaming fixtures

use omnigen::protocols::generate_content::GenerateContentStream;
use omnigen::{Capability, FinishReason};
use std::sync::Arc;

#[path = "../support/stream_fixture.rs"]
mod support;

#[tokio::test]
async fn gemini_text_stream_fixture() {
    let mut stream = support::fixture_stream(
        "gemini/text_stream.sse",
        Arc::new(GenerateContentStream),
        Capability::TextGeneration,
    );
    let chunks = support::collect_chunks(&mut stream).await;
    assert_eq!(support::text_deltas(&chunks), vec!["Tides ", "turn slowly"]);

    let output = stream.output().unwrap();
    assert_eq!(output.text(), Some("Tides turn slowly"));
    assert_eq!(output.usage.input_tokens, Some(5));
    assert_eq!(output.usage.output_tokens, Some(3));
    assert_eq!(output.usage.total_tokens, Some(8));
    assert_eq!(output.finish_reason, Some(FinishReason::new("STOP")));
    // Only the usage-bearing event is kept.
    assert_eq!(output.metadata["raw_events"].as_array().unwrap().len(), 1);
}
