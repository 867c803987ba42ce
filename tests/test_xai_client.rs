//! XaiClient against a local fake provider: request shape, SSE streaming,
//! one-shot parsing, provider errors and the model directory.

mod common;

use common::VERDICT_JSON;
use common::fake_provider::{FakeProvider, FakeResponse, split_chars};
use futures_util::StreamExt;
use serde_json::json;
use smash_or_pass::client::{
    JudgeRequest, ModelDirectory, ProviderConfig, VerdictProvider, XaiClient,
};
use smash_or_pass::error::{GENERIC_FAILURE, HasRecoverySuggestion};
use smash_or_pass::processing::{PreprocessOptions, preprocess_bytes};
use smash_or_pass::verdict::{PartialVerdict, VerdictKind};

fn client(server: &FakeProvider) -> XaiClient {
    XaiClient::new(ProviderConfig::with_base_url(&server.base_url)).unwrap()
}

fn request() -> JudgeRequest {
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    JudgeRequest {
        api_key: "xai-test".into(),
        model: "grok-4".into(),
        persona_prompt: "You are a fair judge.".into(),
        image: preprocess_bytes(&png, &PreprocessOptions::default()).unwrap(),
    }
}

#[tokio::test]
async fn test_stream_yields_growing_snapshots() {
    let deltas = split_chars(VERDICT_JSON, 7);
    let server = FakeProvider::chat(FakeResponse::sse(&deltas)).await;

    let mut stream = client(&server).judge_stream(&request()).await.unwrap();
    let mut snapshots: Vec<PartialVerdict> = Vec::new();
    while let Some(item) = stream.next().await {
        snapshots.push(item.unwrap());
    }

    assert!(snapshots.len() >= 3, "got {snapshots:?}");
    for pair in snapshots.windows(2) {
        assert!(pair[1].field_count() >= pair[0].field_count());
        if let Some(verdict) = pair[0].verdict {
            assert_eq!(pair[1].verdict, Some(verdict));
        }
    }
    let last = snapshots.last().unwrap().clone().into_complete().unwrap();
    assert_eq!(last.verdict, VerdictKind::Smash);
    assert_eq!(last.rating.get(), 8);
    assert_eq!(last.explanation, "Great light and a confident pose.");
}

#[tokio::test]
async fn test_request_shape() {
    let server = FakeProvider::chat(FakeResponse::sse(&[VERDICT_JSON])).await;
    let mut stream = client(&server).judge_stream(&request()).await.unwrap();
    while stream.next().await.is_some() {}

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.path, "/v1/chat/completions");
    assert_eq!(sent.authorization.as_deref(), Some("Bearer xai-test"));

    let body = sent.json();
    assert_eq!(body["model"], "grok-4");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0], json!({ "role": "system", "content": "You are a fair judge." }));
    let url = body["messages"][1]["content"][0]["image_url"]["url"].as_str().unwrap();
    assert!(url.starts_with("data:image/jpeg;base64,"));
    let schema = &body["response_format"]["json_schema"]["schema"];
    assert_eq!(schema["required"], json!(["verdict", "rating", "explanation"]));
}

#[tokio::test]
async fn test_one_shot_parses_message_content() {
    let server = FakeProvider::chat(FakeResponse::completion(VERDICT_JSON)).await;
    let verdict = client(&server).judge(&request()).await.unwrap();
    assert_eq!(verdict.headline(), "Smash (8 / 10)");
    assert_eq!(server.requests()[0].json()["stream"], false);
}

#[tokio::test]
async fn test_provider_message_surfaces() {
    let server = FakeProvider::chat(FakeResponse::json(
        400,
        json!({ "code": "Client specified an invalid argument", "error": "Incorrect API key provided: xa***st." }),
    ))
    .await;
    let err = client(&server).judge_stream(&request()).await.err().unwrap();
    assert_eq!(err.category(), "provider");
    assert_eq!(err.user_message(), "Incorrect API key provided: xa***st.");
    assert_eq!(err.context().operation.as_deref(), Some("chat completion"));
}

#[tokio::test]
async fn test_unauthorized_model_listing_suggests_key_fix() {
    let server = FakeProvider::models(FakeResponse::json(
        401,
        json!({ "error": "Incorrect API key provided: xa***st." }),
    ))
    .await;
    let directory = ModelDirectory::new(client(&server));
    let err = directory.models("xai-test").await.unwrap_err();
    assert!(smash_or_pass::error::classify::is_auth_failure(&err));
    assert!(err.recovery_suggestion().unwrap().contains("sop settings"));
    assert_eq!(directory.cached("xai-test"), None);
}

#[tokio::test]
async fn test_provider_without_message_is_generic() {
    let server = FakeProvider::chat(FakeResponse::text(502, "<html>bad gateway</html>")).await;
    let err = client(&server).judge(&request()).await.unwrap_err();
    assert_eq!(err.user_message(), GENERIC_FAILURE);
}

#[tokio::test]
async fn test_truncated_stream_ends_with_error() {
    let server = FakeProvider::chat(FakeResponse::sse(&[
        r#"{"verdict":"pass","rating":"3","explanation":"Cut o"#,
    ]))
    .await;
    let mut stream = client(&server).judge_stream(&request()).await.unwrap();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    let last = items.pop().unwrap();
    assert_eq!(last.unwrap_err().category(), "malformed_response");
    let shown = items.last().unwrap().as_ref().unwrap();
    assert_eq!(shown.explanation.as_deref(), Some("Cut o"));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = XaiClient::new(ProviderConfig::with_base_url(format!("http://{addr}/v1"))).unwrap();
    let err = client.judge(&request()).await.unwrap_err();
    assert_eq!(err.category(), "network");
    assert_eq!(err.user_message(), GENERIC_FAILURE);
}

#[tokio::test]
async fn test_model_directory_lists_and_caches() {
    let server = FakeProvider::models(FakeResponse::json(
        200,
        json!({
            "object": "list",
            "data": [
                { "id": "grok-4", "created": 1752019200, "object": "model", "owned_by": "xai" },
                { "id": "grok-2-vision-1212", "created": 1733961600, "object": "model", "owned_by": "xai" }
            ]
        }),
    ))
    .await;
    let directory = ModelDirectory::new(client(&server));

    let models = directory.models("xai-test").await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "grok-4");
    assert_eq!(models[0].owner, "xai");
    assert_eq!(models[0].created_at.timestamp(), 1_752_019_200);

    directory.models("xai-test").await.unwrap();
    assert_eq!(server.request_count(), 1);
    let sent = &server.requests()[0];
    assert_eq!(sent.method, "GET");
    assert_eq!(sent.path, "/v1/models");
    assert_eq!(sent.authorization.as_deref(), Some("Bearer xai-test"));

    directory.refresh("xai-test").await.unwrap();
    assert_eq!(server.request_count(), 2);

    assert!(directory.models("").await.unwrap_err().is_precondition());
    assert_eq!(server.request_count(), 2);
}
