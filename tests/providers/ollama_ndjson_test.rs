//! Ollama image generation over NDJSON

use omnigen::prelude::*;
use omnigen::{FinishReason, MimeType};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "../support/stream_fixture.rs"]
mod support;

const NDJSON: &str = concat!(
    "{\"model\":\"x/z-image-turbo\",\"done\":false,\"completed\":1,\"total\":4}\n",
    "{\"model\":\"x/z-image-turbo\",\"done\":false,\"completed\":3,\"total\":4}\n",
    "{\"model\":\"x/z-image-turbo\",\"done\":true,\"image\":\"iVBORw0KGgo=\",\"prompt_eval_count\":4,\"eval_count\":6}\n",
);

fn client(server: &MockServer) -> Client {
    Omnigen::builder()
        .config(ClientConfig::builder().base_url(Provider::Ollama, server.uri()).build())
        .build()
        .unwrap()
        .create_client(Capability::ImageGeneration, "x/z-image-turbo", None)
        .unwrap()
}

#[tokio::test]
async fn streamed_generation_skips_progress_lines() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": true, "width": 1344, "height": 768})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(NDJSON, "application/x-ndjson"))
        .mount(&server)
        .await;

    let params = Parameters::new().with(Param::AspectRatio, "landscape");
    let mut stream = client(&server)
        .stream(&Input::image("a lighthouse at dusk"), &params)
        .await
        .unwrap();
    let chunks = support::collect_chunks(&mut stream).await;
    assert_eq!(chunks.len(), 1);

    let output = stream.output().unwrap();
    let Content::Image(image) = &output.content else {
        panic!("expected image, got {:?}", output.content);
    };
    assert_eq!(image.resolved_mime_type(), Some(MimeType::Png));
    assert_eq!(output.usage.total_tokens, Some(10));
    assert_eq!(output.finish_reason, Some(FinishReason::new("completed")));
    assert_eq!(output.metadata["provider"], "ollama");
}

#[tokio::test]
async fn complete_generation_reads_the_last_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(NDJSON, "application/x-ndjson"))
        .mount(&server)
        .await;

    let output = client(&server)
        .generate(&Input::image("a lighthouse at dusk"), &Parameters::new())
        .await
        .unwrap();
    assert!(matches!(output.content, Content::Image(_)));
    assert_eq!(output.usage.input_tokens, Some(4));
    assert!(output.metadata["raw_response"].get("image").is_none());
}
