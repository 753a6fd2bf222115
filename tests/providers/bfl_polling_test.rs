//! BFL submit-then-poll image generation

use omnigen::prelude::*;
use omnigen::FinishReason;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, max_attempts: u32) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::Bfl, "bfl-key"))
        .config(
            ClientConfig::builder()
                .base_url(Provider::Bfl, server.uri())
                .poll_interval(Duration::from_millis(10))
                .max_poll_attempts(max_attempts)
                .build(),
        )
        .build()
        .unwrap()
        .create_client(Capability::ImageGeneration, "flux-2-pro", None)
        .unwrap()
}

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/flux-2-pro"))
        .and(header("x-key", "bfl-key"))
        .and(body_partial_json(json!({"prompt": "a red fox", "width": 1024, "height": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "task-7",
            "polling_url": format!("{}/v1/get_result?id=task-7", server.uri()),
            "cost": 4.5,
            "input_mp": 0.0,
            "output_mp": 1.05,
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn square() -> Parameters {
    Parameters::new().with(Param::AspectRatio, "Square 1K")
}

#[tokio::test]
async fn polls_the_returned_url_until_ready() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/get_result"))
        .and(query_param("id", "task-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "task-7", "status": "Pending"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/get_result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "task-7",
            "status": "Ready",
            "result": {"sample": "https://delivery.example/fox.jpeg", "seed": 11},
        })))
        .mount(&server)
        .await;

    let output = client(&server, 10)
        .generate(&Input::image("a red fox"), &square())
        .await
        .unwrap();

    let Content::Image(image) = &output.content else {
        panic!("expected image, got {:?}", output.content);
    };
    assert_eq!(image.url.as_deref(), Some("https://delivery.example/fox.jpeg"));
    assert_eq!(output.usage.billed_units, Some(4.5));
    assert_eq!(output.usage.output_mp, Some(1.05));
    assert_eq!(output.finish_reason, Some(FinishReason::new("COMPLETE")));
    assert_eq!(output.metadata["raw_response"]["id"], "task-7");
    assert_eq!(output.metadata["task_id"], "task-7");

    let polls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn error_status_is_task_failed() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/get_result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "task-7",
            "status": "Error",
            "details": {"message": "Content moderated"},
        })))
        .mount(&server)
        .await;

    let err = client(&server, 10)
        .generate(&Input::image("a red fox"), &square())
        .await
        .unwrap_err();
    assert!(matches!(err, OmniError::TaskFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn pending_forever_times_out_after_max_attempts() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/get_result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Pending"})))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .generate(&Input::image("a red fox"), &square())
        .await
        .unwrap_err();
    assert!(matches!(err, OmniError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn bfl_models_do_not_stream() {
    let server = MockServer::start().await;
    let err = client(&server, 3)
        .stream(&Input::image("a red fox"), &Parameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OmniError::StreamingNotSupported { .. }));
}
