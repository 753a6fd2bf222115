//! xAI Grok Imagine images and video

use omnigen::prelude::*;
use omnigen::MimeType;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, capability: Capability, model: &str) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::XAi, "xai-key"))
        .config(
            ClientConfig::builder()
                .base_url(Provider::XAi, server.uri())
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
async fn images_come_back_as_a_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer xai-key"))
        .and(body_partial_json(json!({
            "model": "grok-imagine-image",
            "prompt": "two moons",
            "n": 2,
            "aspect_ratio": "16:9",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"url": "https://imgen.x.ai/a.jpg", "revised_prompt": "two moons over a lake"},
                {"url": "https://imgen.x.ai/b.jpg"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = Parameters::new()
        .with(Param::NumImages, 2)
        .with(Param::AspectRatio, "16:9");
    let output = client(&server, Capability::ImageGeneration, "grok-imagine-image")
        .generate(&Input::image("two moons"), &params)
        .await
        .unwrap();

    let Content::Images(images) = &output.content else {
        panic!("expected images, got {:?}", output.content);
    };
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].url.as_deref(), Some("https://imgen.x.ai/a.jpg"));
    assert_eq!(output.metadata["revised_prompt"], "two moons over a lake");
}

#[tokio::test]
async fn video_ready_on_submit_is_not_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/generations"))
        .and(body_partial_json(json!({"model": "grok-imagine-video", "duration": 6})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video": {"url": "https://vidgen.x.ai/clip.mp4", "duration": 6},
            "usage": {"input_tokens": 12, "output_tokens": 0, "total_tokens": 12},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = client(&server, Capability::VideoGeneration, "grok-imagine-video")
        .generate(
            &Input::video("a paper boat"),
            &Parameters::new().with(Param::Duration, 6),
        )
        .await
        .unwrap();

    let Content::Video(video) = &output.content else {
        panic!("expected video, got {:?}", output.content);
    };
    assert_eq!(video.url.as_deref(), Some("https://vidgen.x.ai/clip.mp4"));
    assert_eq!(video.mime_type, Some(MimeType::Mp4));
    assert_eq!(output.metadata["duration"], 6);
    assert_eq!(output.usage.input_tokens, Some(12));

    let gets = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 0);
}

#[tokio::test]
async fn video_with_request_id_is_polled_until_it_has_a_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/videos/generations"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"request_id": "req-9"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/req-9"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "pending"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/req-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video": {"url": "https://vidgen.x.ai/long.mp4", "duration": 12},
        })))
        .mount(&server)
        .await;

    let output = client(&server, Capability::VideoGeneration, "grok-imagine-video")
        .generate(&Input::video("a slow sunrise"), &Parameters::new())
        .await
        .unwrap();

    assert_eq!(
        output.content.as_artifact().and_then(|a| a.url.as_deref()),
        Some("https://vidgen.x.ai/long.mp4")
    );
    assert_eq!(output.metadata["task_id"], "req-9");
}
