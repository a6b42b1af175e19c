//! OpenAI capability contract tests.
//!
//! Verify the Chat Completions request format, response parsing and error
//! mapping against a mock server, then drive the whole pipeline from a
//! [`ScoutConfig`] whose endpoints all point at that server.

use std::time::Duration;

use dataset_scout::scout_search::{
    CapabilityError, LlmCapability, ResponseSchema, SourceId, TranslationStrategy,
};
use dataset_scout::{LlmConfig, OpenAiCapability, Scout, ScoutConfig, SearchRequest};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn llm_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        model: "gpt-4o-mini".into(),
        ..Default::default()
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

// ── Request format ────────────────────────────────────────────

#[tokio::test]
async fn request_has_model_schema_and_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "dataset_query"}
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"keywords": ["housing", "prices"]}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let capability = OpenAiCapability::from_config(&llm_config(&server)).unwrap();
    let value = capability
        .complete("housing prices", &ResponseSchema::structured_query())
        .await
        .unwrap();

    assert_eq!(value["keywords"], json!(["housing", "prices"]));
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = llm_config(&server);
    config.base_url = format!("{}/", server.uri());
    let capability = OpenAiCapability::from_config(&config).unwrap();
    assert!(
        capability
            .complete("x", &ResponseSchema::structured_query())
            .await
            .is_ok()
    );
}

// ── Error mapping ─────────────────────────────────────────────

#[tokio::test]
async fn error_statuses_are_mapped() {
    let cases: [(u16, fn(&CapabilityError) -> bool); 4] = [
        (401, |e| matches!(e, CapabilityError::Auth(_))),
        (403, |e| matches!(e, CapabilityError::Auth(_))),
        (429, |e| matches!(e, CapabilityError::Unavailable(_))),
        (500, |e| matches!(e, CapabilityError::Unavailable(_))),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"message": "nope", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let capability = OpenAiCapability::from_config(&llm_config(&server)).unwrap();
        let err = capability
            .complete("x", &ResponseSchema::structured_query())
            .await
            .unwrap_err();
        assert!(expected(&err), "HTTP {status} mapped to {err:?}");
        assert!(!err.to_string().contains("test-key"));
    }
}

#[tokio::test]
async fn slow_endpoint_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("{}"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = llm_config(&server);
    config.request_timeout_ms = 200;
    let capability = OpenAiCapability::from_config(&config).unwrap();
    let err = capability
        .complete("x", &ResponseSchema::structured_query())
        .await
        .unwrap_err();
    assert!(matches!(err, CapabilityError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn non_json_body_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let capability = OpenAiCapability::from_config(&llm_config(&server)).unwrap();
    let err = capability
        .complete("x", &ResponseSchema::structured_query())
        .await
        .unwrap_err();
    assert!(matches!(err, CapabilityError::Unavailable(_)));
}

// ── Full pipeline ─────────────────────────────────────────────

#[tokio::test]
async fn config_driven_pipeline_searches_mock_catalogs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"keywords": ["taxi", "trips"], "sources": ["kaggle", "huggingface"]}"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/kaggle/datasets/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ref": "nyc/yellow-taxi", "title": "Yellow Taxi Trips", "usabilityRating": 0.8}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hf/datasets"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = ScoutConfig::default();
    config.llm = llm_config(&server);
    config.kaggle.base_url = format!("{}/kaggle", server.uri());
    config.huggingface.base_url = format!("{}/hf", server.uri());
    config.google_dataset.enabled = false;
    config.search.max_retries = 0;

    let scout = Scout::from_config(&config).unwrap();
    let outcome = scout
        .search(&SearchRequest::new("NYC taxi trip records"))
        .await
        .unwrap();

    assert_eq!(outcome.translation.strategy, TranslationStrategy::Llm);
    assert_eq!(outcome.result.records.len(), 1);
    assert_eq!(outcome.result.records[0].url, "https://www.kaggle.com/datasets/nyc/yellow-taxi");
    assert!(outcome.result.partial_failures.contains_key(&SourceId::HuggingFace));

    let printed = serde_json::to_value(&outcome).unwrap();
    assert_eq!(printed["status"]["state"], "partial");
    assert_eq!(printed["cache_hit"], false);
}
