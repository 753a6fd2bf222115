//! OpenAI speech over binary bodies and Sora create-poll-download

use omnigen::prelude::*;
use omnigen::MimeType;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, capability: Capability, model: &str) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::OpenAI, "sk-test"))
        .config(
            ClientConfig::builder()
                .base_url(Provider::OpenAI, server.uri())
                .poll_interval(Duration::from_millis(10))
                .max_poll_attempts(5)
                .build(),
        )
        .build()
        .unwrap()
        .create_client(capability, model, None)
        .unwrap()
}

#[tokio::test]
async fn speech_body_is_the_requested_audio_format() {
    let server = MockServer::start().await;
    let audio = b"fLaC\x00\x00\x00\x22frames".to_vec();
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini-tts",
            "input": "Mind the gap",
            "voice": "ballad",
            "response_format": "flac",
            "instructions": "Sound calm",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(audio.clone(), "audio/flac"))
        .expect(1)
        .mount(&server)
        .await;

    let params = Parameters::new()
        .with(Param::Voice, "Ballad")
        .with(Param::OutputFormat, "flac")
        .with(Param::Instructions, "Sound calm");
    let output = client(&server, Capability::SpeechGeneration, "gpt-4o-mini-tts")
        .generate(&Input::speech("Mind the gap"), &params)
        .await
        .unwrap();

    let Content::Audio(artifact) = &output.content else {
        panic!("expected audio, got {:?}", output.content);
    };
    assert_eq!(artifact.data.as_deref(), Some(audio.as_slice()));
    assert_eq!(artifact.mime_type, Some(MimeType::Flac));
}

#[tokio::test]
async fn speech_defaults_to_alloy_and_rejects_instructions_on_tts_1() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({"model": "tts-1", "voice": "alloy"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"ID3".to_vec(), "audio/mpeg"))
        .mount(&server)
        .await;

    let tts = client(&server, Capability::SpeechGeneration, "tts-1");
    let output = tts.generate(&Input::speech("hi"), &Parameters::new()).await.unwrap();
    assert_eq!(output.content.as_artifact().and_then(|a| a.mime_type), Some(MimeType::Mp3));

    let err = tts
        .generate(
            &Input::speech("hi"),
            &Parameters::new().with(Param::Instructions, "whisper"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OmniError::UnsupportedParameter { .. }), "{err:?}");
}

#[tokio::test]
async fn sora_polls_then_downloads_the_video() {
    let server = MockServer::start().await;
    let mp4 = b"\x00\x00\x00\x18ftypmp42sora".to_vec();
    Mock::given(method("POST"))
        .and(path("/v1/videos"))
        .and(body_partial_json(json!({
            "model": "sora-2",
            "prompt": "waves at night",
            "seconds": "8",
            "size": "720x1280",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "video_42",
            "status": "queued",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/video_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "video_42",
            "status": "in_progress",
            "progress": 40,
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/video_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "video_42",
            "status": "completed",
            "seconds": "8",
            "size": "720x1280",
            "created_at": 1_760_000_000,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/video_42/content"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(mp4.clone(), "video/mp4"))
        .expect(1)
        .mount(&server)
        .await;

    let params = Parameters::new()
        .with(Param::Duration, "8")
        .with(Param::AspectRatio, "9:16")
        .with(Param::Resolution, "720p");
    let output = client(&server, Capability::VideoGeneration, "sora-2")
        .generate(&Input::video("waves at night"), &params)
        .await
        .unwrap();

    let Content::Video(video) = &output.content else {
        panic!("expected video, got {:?}", output.content);
    };
    assert_eq!(video.data.as_deref(), Some(mp4.as_slice()));
    assert_eq!(video.mime_type, Some(MimeType::Mp4));
    assert_eq!(output.usage.billed_units, Some(8.0));
    assert_eq!(output.metadata["task_id"], "video_42");
    assert_eq!(output.metadata["video_id"], "video_42");
    assert!(output.metadata["raw_response"].get("video_data").is_none());
}

#[tokio::test]
async fn sora_failure_carries_the_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "video_9", "status": "queued"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/video_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "video_9",
            "status": "failed",
            "error": {"message": "moderation_blocked"},
        })))
        .mount(&server)
        .await;

    let err = client(&server, Capability::VideoGeneration, "sora-2")
        .generate(&Input::video("forbidden"), &Parameters::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Video generation failed: moderation_blocked");
}
