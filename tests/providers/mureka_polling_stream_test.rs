//! Mureka song tasks, polled directly and as a stream

use omnigen::prelude::*;
use omnigen::{FinishReason, StreamState};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "../support/stream_fixture.rs"]
mod support;

fn client(server: &MockServer, model: &str) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::Mureka, "mk"))
        .config(
            ClientConfig::builder()
                .base_url(Provider::Mureka, server.uri())
                .poll_interval(Duration::from_millis(10))
                .build(),
        )
        .build()
        .unwrap()
        .create_client(Capability::MusicGeneration, model, None)
        .unwrap()
}

async fn mount_status(server: &MockServer, query: &str, body: serde_json::Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(query))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn streamed_song_reports_progress_then_the_final_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/song/generate"))
        .and(header("authorization", "Bearer mk"))
        .and(body_partial_json(json!({"model": "mureka-v1", "stream": true, "lyrics": "[Verse] ok"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "song-1", "status": "preparing"})))
        .mount(&server)
        .await;
    mount_status(&server, "/v1/song/query/song-1", json!({"id": "song-1", "status": "preparing"}), 1).await;
    mount_status(
        &server,
        "/v1/song/query/song-1",
        json!({"id": "song-1", "status": "streaming", "stream_url": "https://stream.example/song-1.mp3"}),
        1,
    )
    .await;
    mount_status(
        &server,
        "/v1/song/query/song-1",
        json!({
            "id": "song-1",
            "status": "succeeded",
            "choices": [{"audio_url": "https://cdn.example/song-1-final.mp3", "duration": 61000}],
            "usage": {"credits": 12},
        }),
        1,
    )
    .await;

    let params = Parameters::new().with(Param::Lyrics, "[Verse] ok");
    let mut stream = client(&server, "mureka-v1")
        .stream(&Input::music("city pop"), &params)
        .await
        .unwrap();
    let chunks = support::collect_chunks(&mut stream).await;

    let urls: Vec<_> = chunks
        .iter()
        .filter_map(|c| c.content.as_artifact())
        .filter_map(|a| a.url.clone())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://stream.example/song-1.mp3".to_string(),
            "https://cdn.example/song-1-final.mp3".to_string(),
        ]
    );
    assert_eq!(stream.state(), StreamState::Done);

    let output = stream.output().unwrap();
    let Content::Audio(audio) = &output.content else {
        panic!("expected audio, got {:?}", output.content);
    };
    assert_eq!(audio.url.as_deref(), Some("https://cdn.example/song-1-final.mp3"));
    assert_eq!(output.finish_reason, Some(FinishReason::new("succeeded")));
}

#[tokio::test]
async fn failed_task_ends_the_stream_with_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/song/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "song-2"})))
        .mount(&server)
        .await;
    mount_status(
        &server,
        "/v1/song/query/song-2",
        json!({"id": "song-2", "status": "failed", "error": "lyrics rejected"}),
        1,
    )
    .await;

    let mut stream = client(&server, "mureka-v1")
        .stream(&Input::music("city pop"), &Parameters::new())
        .await
        .unwrap();
    let first = futures_util::StreamExt::next(&mut stream).await.unwrap();
    let err = first.unwrap_err();
    assert!(matches!(err, OmniError::TaskFailed(_)));
    assert!(err.to_string().contains("lyrics rejected"));
    assert_eq!(stream.state(), StreamState::Closed);
}

#[tokio::test]
async fn instrumental_generation_uses_the_instrumental_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/instrumental/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "inst-9", "status": "preparing"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "/v1/instrumental/query/inst-9", json!({"id": "inst-9", "status": "running"}), 1).await;
    mount_status(
        &server,
        "/v1/instrumental/query/inst-9",
        json!({
            "id": "inst-9",
            "status": "succeeded",
            "trace_id": "tr-1",
            "choices": [{"url": "https://cdn.example/inst-9.mp3"}],
        }),
        1,
    )
    .await;

    let params = Parameters::new()
        .with(Param::InstrumentalOnly, true)
        .with(Param::Lyrics, "ignored for instrumentals");
    let output = client(&server, "mureka-o1")
        .generate(&Input::music("ambient piano"), &params)
        .await
        .unwrap();

    assert_eq!(
        output.content.as_artifact().and_then(|a| a.url.as_deref()),
        Some("https://cdn.example/inst-9.mp3")
    );
    assert_eq!(output.metadata["task_id"], "inst-9");
    assert_eq!(output.metadata["trace_id"], "tr-1");

    let submitted = &server.received_requests().await.unwrap()[0];
    let body: serde_json::Value = serde_json::from_slice(&submitted.body).unwrap();
    assert!(body.get("lyrics").is_none());
    assert!(body.get("_instrumental").is_none());
}
