//! Anthropic Messages streaming fixtures

use omnigen::protocols::anthropic_messages::MessagesStream;
use omnigen::streaming::StreamState;
use omnigen::{Capability, FinishReason, OmniError};
use futures_util::StreamExt;
use std::sync::Arc;

#[path = "../support/stream_fixture.rs"]
mod support;

#[tokio::test]
async fn anthropic_message_start_deltas_stop_fixture() {
    let mut stream = support::fixture_stream(
        "anthropic/message_start_deltas_stop.sse",
        Arc::new(MessagesStream),
        Capability::TextGeneration,
    );
    let chunks = support::collect_chunks(&mut stream).await;

    assert_eq!(support::text_deltas(&chunks), vec!["Hello", " world"]);
    // Two deltas plus the usage-only message_delta.
    assert_eq!(chunks.len(), 3);

    let output = stream.output().expect("output after exhaustion");
    assert_eq!(output.text(), Some("Hello world"));
    assert_eq!(output.usage.input_tokens, Some(8));
    assert_eq!(output.usage.output_tokens, Some(4));
    assert_eq!(output.usage.total_tokens, Some(12));
    assert_eq!(output.finish_reason, Some(FinishReason::new("end_turn")));

    let raw_events = output.metadata["raw_events"].as_array().unwrap();
    assert!(
        raw_events
            .iter()
            .all(|e| e["type"] != "content_block_delta")
    );
}

#[tokio::test]
async fn anthropic_error_event_closes_the_stream() {
    let mut stream = support::fixture_stream(
        "anthropic/error_midstream.sse",
        Arc::new(MessagesStream),
        Capability::TextGeneration,
    );

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content.as_text(), Some("Hel"));

    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Stream error: overloaded_error: Overloaded");
    assert_eq!(stream.state(), StreamState::Closed);

    // Events after the error are never parsed.
    assert!(stream.next().await.is_none());
    assert!(matches!(stream.output(), Err(OmniError::StreamNotExhausted)));
}
