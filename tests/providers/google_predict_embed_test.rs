//! Gemini embeddings and Imagen `:predict`

use omnigen::prelude::*;
use omnigen::MimeType;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, capability: Capability, model: &str) -> Client {
    Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::Google, "g-key"))
        .config(ClientConfig::builder().base_url(Provider::Google, server.uri()).build())
        .build()
        .unwrap()
        .create_client(capability, model, None)
        .unwrap()
}

#[tokio::test]
async fn single_text_embeds_to_one_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-embedding-001:embedContent"))
        .and(body_partial_json(json!({
            "content": {"parts": [{"text": "tidal pool"}]},
            "outputDimensionality": 256,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": {"values": [0.25, -0.5, 1.0]},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = client(&server, Capability::Embeddings, "gemini-embedding-001")
        .generate(
            &Input::embed("tidal pool"),
            &Parameters::new().with(Param::Dimensions, 256),
        )
        .await
        .unwrap();

    assert_eq!(output.content, Content::Embedding(vec![0.25, -0.5, 1.0]));
    assert_eq!(output.usage, Default::default());
}

#[tokio::test]
async fn batch_uses_batch_endpoint_even_for_one_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
        .and(body_partial_json(json!({
            "requests": [{
                "model": "models/text-embedding-004",
                "content": {"parts": [{"text": "only"}]},
            }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [{"values": [0.1, 0.2]}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = client(&server, Capability::Embeddings, "text-embedding-004")
        .generate(&Input::embed_batch(["only"]), &Parameters::new())
        .await
        .unwrap();

    assert_eq!(output.content, Content::Embeddings(vec![vec![0.1, 0.2]]));
}

#[tokio::test]
async fn embeddings_cannot_stream() {
    let server = MockServer::start().await;
    let result = client(&server, Capability::Embeddings, "gemini-embedding-001")
        .stream(&Input::embed("x"), &Parameters::new())
        .await;
    assert!(result.is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn imagen_predicts_several_images() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/imagen-4.0-generate-001:predict"))
        .and(body_partial_json(json!({
            "instances": [{"prompt": "glass birds"}],
            "parameters": {"sampleCount": 2, "aspectRatio": "3:4"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [
                {"bytesBase64Encoded": "iVBORw==", "mimeType": "image/png"},
                {"bytesBase64Encoded": "iVBORw==", "mimeType": "image/png"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = Parameters::new()
        .with(Param::NumImages, 2)
        .with(Param::AspectRatio, "3:4");
    let output = client(&server, Capability::ImageGeneration, "imagen-4.0-generate-001")
        .generate(&Input::image("glass birds"), &params)
        .await
        .unwrap();

    let Content::Images(images) = &output.content else {
        panic!("expected images, got {:?}", output.content);
    };
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].data.as_deref(), Some(&[0x89u8, b'P', b'N', b'G'][..]));
    assert_eq!(images[0].mime_type, Some(MimeType::Png));
    assert_eq!(output.usage.num_images, Some(2));
    assert!(output.metadata["raw_response"].get("predictions").is_none());
}
