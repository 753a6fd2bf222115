//! ElevenLabs speech over binary bodies

use omnigen::prelude::*;
use omnigen::MimeType;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "../support/stream_fixture.rs"]
mod support;

const ADAM: &str = "pNInz6obpgDQGcFmaJgB";

fn client(server: &MockServer) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::ElevenLabs, "el-key"))
        .config(ClientConfig::builder().base_url(Provider::ElevenLabs, server.uri()).build())
        .build()
        .unwrap()
        .create_client(Capability::SpeechGeneration, "eleven_multilingual_v2", None)
        .unwrap()
}

#[tokio::test]
async fn voice_goes_into_the_path_and_audio_comes_back_binary() {
    let server = MockServer::start().await;
    let audio = b"ID3\x04\x00\x00fake-mp3-frames".to_vec();
    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{ADAM}")))
        .and(header("xi-api-key", "el-key"))
        .and(body_partial_json(json!({
            "text": "Good evening",
            "model_id": "eleven_multilingual_v2",
            "output_format": "mp3_44100_128",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(audio.clone(), "audio/mpeg"))
        .mount(&server)
        .await;

    let output = client(&server)
        .generate(
            &Input::speech("Good evening"),
            &Parameters::new().with(Param::Voice, "Adam"),
        )
        .await
        .unwrap();

    let Content::Audio(artifact) = &output.content else {
        panic!("expected audio, got {:?}", output.content);
    };
    assert_eq!(artifact.data.as_deref(), Some(audio.as_slice()));
    assert_eq!(artifact.mime_type, Some(MimeType::Mp3));
}

#[tokio::test]
async fn streamed_audio_concatenates_in_order() {
    let server = MockServer::start().await;
    let audio: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(audio.clone(), "audio/mpeg"))
        .mount(&server)
        .await;

    let mut stream = client(&server)
        .stream(&Input::speech("Good evening"), &Parameters::new())
        .await
        .unwrap();
    let chunks = support::collect_chunks(&mut stream).await;
    assert!(!chunks.is_empty());

    let Content::Audio(artifact) = &stream.output().unwrap().content else {
        panic!("expected audio");
    };
    assert_eq!(artifact.data.as_deref(), Some(audio.as_slice()));
    assert_eq!(artifact.mime_type, Some(MimeType::Mp3));
}

#[tokio::test]
async fn pcm_output_format_types_both_generated_and_streamed_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"))
        .and(body_partial_json(json!({"output_format": "pcm_24000"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3, 4], "audio/mpeg"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM/stream"))
        .and(body_partial_json(json!({"output_format": "pcm_24000"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3, 4], "audio/mpeg"))
        .mount(&server)
        .await;

    let client = client(&server);
    let params = Parameters::new().with(Param::OutputFormat, "pcm_24000");
    let generated = client.generate(&Input::speech("hi"), &params).await.unwrap();
    assert_eq!(generated.content.as_artifact().unwrap().mime_type, Some(MimeType::Pcm));

    let mut stream = client.stream(&Input::speech("hi"), &params).await.unwrap();
    support::collect_chunks(&mut stream).await;
    let streamed = stream.output().unwrap();
    let artifact = streamed.content.as_artifact().unwrap();
    assert_eq!(artifact.data.as_deref(), Some([1u8, 2, 3, 4].as_slice()));
    assert_eq!(artifact.mime_type, Some(MimeType::Pcm));
}

#[tokio::test]
async fn unknown_voice_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let err = client(&server)
        .generate(
            &Input::speech("hi"),
            &Parameters::new().with(Param::Voice, "Nobody"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OmniError::ConstraintViolation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
