use omnigen::prelude::*;
use omnigen::Registry;
use omnigen::providers::ProviderAdapter;

#[test]
fn every_catalog_model_has_an_adapter_for_each_capability() {
    let registry = Registry::with_builtin().unwrap();
    let models = registry.list_models(None, None);
    assert!(!models.is_empty());
    for model in models {
        assert!(!model.capabilities.is_empty(), "{} has no capability", model.id);
        for capability in &model.capabilities {
            assert!(
                registry.adapter(*capability, model.provider).is_ok(),
                "{} ({}) has no {capability} adapter",
                model.id,
                model.provider
            );
        }
    }
}

#[test]
fn streaming_models_have_a_chunk_parser() {
    let registry = Registry::with_builtin().unwrap();
    for model in registry.list_models(None, None).into_iter().filter(|m| m.streaming) {
        for capability in &model.capabilities {
            let adapter = registry.adapter(*capability, model.provider).unwrap();
            assert!(adapter.chunk_parser().is_some(), "{} streams without a parser", model.id);
        }
    }
}

#[test]
fn capability_filters_narrow_the_catalog() {
    let registry = Registry::with_builtin().unwrap();
    let music = registry.list_models(None, Some(Capability::MusicGeneration));
    assert!(music.iter().all(|m| m.has_capability(Capability::MusicGeneration)));
    assert!(registry.providers_for(Capability::MusicGeneration).contains(&Provider::Mureka));
    assert!(registry.providers_for(Capability::SpeechGeneration).contains(&Provider::ElevenLabs));
    assert!(!registry.providers_for(Capability::VideoGeneration).contains(&Provider::Ollama));
}

#[tokio::test]
async fn parameters_no_mapper_consumes_are_rejected_before_sending() {
    let omni = Omnigen::builder()
        .credentials(Credentials::new().with_key(Provider::OpenAI, "sk-test"))
        .config(ClientConfig::builder().base_url(Provider::OpenAI, "http://127.0.0.1:9").build())
        .build()
        .unwrap();
    let client = omni.create_client(Capability::TextGeneration, "gpt-4o", None).unwrap();

    let err = client
        .generate(&Input::text("hi"), &Parameters::new().with(Param::Voice, "Adam"))
        .await
        .unwrap_err();
    match err {
        OmniError::UnsupportedParameter { parameter, model_id } => {
            assert_eq!(parameter, Param::Voice.to_string());
            assert_eq!(model_id, "gpt-4o");
        }
        other => panic!("expected UnsupportedParameter, got {other:?}"),
    }
}
