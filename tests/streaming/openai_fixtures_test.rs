//! OpenAI Responses and Images streaming fixtures

use omnigen::protocols::images_sse::{ImageApi, ImagesStream};
use omnigen::protocols::open_responses::ResponsesStream;
use omnigen::{Capability, ChunkContent, Content, FinishReason, MimeType};
use std::sync::Arc;

#[path = "../support/stream_fixture.rs"]
mod support;

#[tokio::test]
async fn responses_text_fixture_ignores_done_marker() {
    let mut stream = support::fixture_stream(
        "openai/responses_text.sse",
        Arc::new(ResponsesStream),
        Capability::TextGeneration,
    );
    let chunks = support::collect_chunks(&mut stream).await;
    assert_eq!(support::text_deltas(&chunks), vec!["Deimos", " and Phobos"]);

    let output = stream.output().unwrap();
    assert_eq!(output.text(), Some("Deimos and Phobos"));
    assert_eq!(output.usage.total_tokens, Some(13));
    assert_eq!(output.finish_reason, Some(FinishReason::new("completed")));
}

#[tokio::test]
async fn image_partials_then_final_image() {
    let mut stream = support::fixture_stream(
        "openai/image_partial_then_completed.sse",
        Arc::new(ImagesStream::new(ImageApi::OpenAI)),
        Capability::ImageGeneration,
    );
    let chunks = support::collect_chunks(&mut stream).await;
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| matches!(c.content, ChunkContent::Image(_))));
    assert!(chunks[0].usage.is_none());

    let output = stream.output().unwrap();
    let Content::Image(image) = &output.content else {
        panic!("expected image content, got {:?}", output.content);
    };
    // The completed image, not the partial one.
    assert_eq!(image.data.as_ref().map(|d| d.len()), Some(16));
    assert_eq!(image.resolved_mime_type(), Some(MimeType::Png));
    assert_eq!(output.usage.total_tokens, Some(110));
    assert_eq!(output.finish_reason, Some(FinishReason::new("completed")));
}
