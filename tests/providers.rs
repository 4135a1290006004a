use repo_complexity::error::AnalyzerError;
use repo_complexity::models::ScorePolicy;
use repo_complexity::provider::{ComplexityProvider, ProviderKind, ProviderSettings};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn assessment_json(total: f64) -> String {
    serde_json::json!({
        "total_score": total,
        "cyclomatic_score": 40.0,
        "architectural_score": 50.0,
        "algorithmic_score": 45.0,
        "line_count": 80,
        "function_count": 5,
        "class_count": 1,
        "patterns_detected": ["Factory", "Singleton"],
        "reasoning": "Factory in build() at line 12, guarded singleton at line 40"
    })
    .to_string()
}

fn provider(name: &str, server: &MockServer, model: Option<&str>) -> Box<dyn ComplexityProvider> {
    let settings = ProviderSettings {
        api_key: "test-key".to_string(),
        model: model.map(str::to_string),
        base_url: Some(server.uri()),
    };
    ProviderKind::from_name(name, settings)
        .unwrap()
        .into_provider(ScorePolicy::default())
}

fn openai_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

fn anthropic_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_1",
        "type": "message",
        "content": [{ "type": "text", "text": content }]
    })
}

#[tokio::test]
async fn test_openai_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "model": "gpt-4o" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(&assessment_json(46.5))))
        .mount(&server)
        .await;

    let provider = provider("openai", &server, Some("gpt-4o"));
    let file = provider
        .analyze_file("def build():\n    pass\n", "src/factory.py")
        .await
        .unwrap();
    assert_eq!(file.file_path, "src/factory.py");
    assert_eq!(file.total_score, 46.5);
    assert_eq!(file.patterns_detected, vec!["Factory", "Singleton"]);
}

#[tokio::test]
async fn test_openai_auth_failure_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = provider("openai", &server, None)
        .analyze_file("x = 1", "x.py")
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::ProviderTransport { status: Some(401), .. }));
}

#[tokio::test]
async fn test_openai_incoherent_scores_are_response_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(&assessment_json(5.0))))
        .mount(&server)
        .await;

    let err = provider("openai", &server, None)
        .analyze_file("x = 1", "x.py")
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::ProviderResponse(_)));
}

#[tokio::test]
async fn test_openai_long_file_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(&assessment_json(46.5))))
        .mount(&server)
        .await;

    let long = "é".repeat(40_000);
    provider("openai", &server, None)
        .analyze_file(&long, "big.py")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert_eq!(user.matches('é').count(), repo_complexity::openai::MAX_CONTENT_CHARS);
}

#[tokio::test]
async fn test_anthropic_success_with_fenced_json() {
    let server = MockServer::start().await;
    let fenced = format!("```json\n{}\n```", assessment_json(48.0));
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply(&fenced)))
        .mount(&server)
        .await;

    let provider = provider("anthropic", &server, None);
    assert_eq!(provider.model(), "claude-3-opus-20240229");
    let file = provider.analyze_file("class A: pass", "a.py").await.unwrap();
    assert_eq!(file.total_score, 48.0);
    assert_eq!(file.line_count, 80);
}

#[tokio::test]
async fn test_anthropic_non_json_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(anthropic_reply("This file is quite simple overall.")),
        )
        .mount(&server)
        .await;

    let err = provider("anthropic", &server, None)
        .analyze_file("class A: pass", "a.py")
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::ProviderResponse(_)));
}

#[tokio::test]
async fn test_anthropic_overloaded_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = provider("anthropic", &server, None)
        .analyze_file("class A: pass", "a.py")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_unknown_provider_fails_fast() {
    let err = ProviderKind::from_name("cohere", ProviderSettings::default()).unwrap_err();
    assert_eq!(err, AnalyzerError::UnknownProvider("cohere".to_string()));
}
