/*!
 * Integration tests for the HTTP backends against a local stub server
 */

use std::time::Duration;

use dataset_translator::app_config::{BackendConfig, BackendId, Config};
use dataset_translator::errors::FailureKind;
use dataset_translator::providers::fanar::FanarBackend;
use dataset_translator::providers::nvidia::NvidiaBackend;
use dataset_translator::providers::{build_backend_chain, TranslationBackend};

use crate::common::{chat_body, init_logger, StubServer};

fn backend_config(endpoint: &str) -> BackendConfig {
    BackendConfig {
        api_key: "test-key".to_string(),
        endpoint: endpoint.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_nvidia_withSuccessfulResponse_shouldReturnContent() {
    init_logger();
    let server = StubServer::start(200, &chat_body("صباح الخير")).await.unwrap();
    let backend = NvidiaBackend::new(&backend_config(&server.base_url), Duration::from_secs(5)).unwrap();

    let translated = backend.translate("Good morning").await.unwrap();

    assert_eq!(translated, "صباح الخير");
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
    assert_eq!(body["model"], "nvidia/riva-translate-4b-instruct-v1.1");
    assert!(body["messages"][1]["content"].as_str().unwrap().contains("Good morning"));
}

#[tokio::test]
async fn test_fanar_withSuccessfulResponse_shouldSendFanarPrompt() {
    init_logger();
    let server = StubServer::start(200, &chat_body("مرحبا")).await.unwrap();
    let backend = FanarBackend::new(&backend_config(&server.base_url), Duration::from_secs(5)).unwrap();

    assert_eq!(backend.translate("Hello").await.unwrap(), "مرحبا");
    let body: serde_json::Value = serde_json::from_str(&server.requests()[0]).unwrap();
    assert_eq!(body["model"], "Fanar");
    assert_eq!(body["messages"][1]["content"], "Translate to Arabic: Hello");
}

#[tokio::test]
async fn test_httpErrors_shouldBeClassified() {
    init_logger();
    let cases = [
        (401, FailureKind::AuthError, false),
        (429, FailureKind::RateLimited, true),
        (503, FailureKind::Unknown, true),
        (400, FailureKind::Unknown, false),
    ];

    for (status, kind, retryable) in cases {
        let server = StubServer::start(status, r#"{"error": "nope"}"#).await.unwrap();
        let backend = NvidiaBackend::new(&backend_config(&server.base_url), Duration::from_secs(5)).unwrap();

        let error = backend.translate("Hello").await.unwrap_err();
        assert_eq!(error.kind(), kind, "status {}", status);
        assert_eq!(error.is_retryable(), retryable, "status {}", status);
    }
}

#[tokio::test]
async fn test_emptyChoices_shouldBeMalformed() {
    init_logger();
    let server = StubServer::start(200, r#"{"choices": []}"#).await.unwrap();
    let backend = FanarBackend::new(&backend_config(&server.base_url), Duration::from_secs(5)).unwrap();

    let error = backend.translate("Hello").await.unwrap_err();
    assert_eq!(error.kind(), FailureKind::MalformedResponse);
}

#[tokio::test]
async fn test_unreachableEndpoint_shouldFailTransiently() {
    init_logger();
    // Bind and drop a listener so the port is very likely closed
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let backend = NvidiaBackend::new(
        &backend_config(&format!("http://127.0.0.1:{}/v1", port)),
        Duration::from_secs(2),
    )
    .unwrap();

    let error = backend.test_connection().await.unwrap_err();
    assert!(error.is_retryable());
}

#[test]
fn test_buildBackendChain_withoutKey_shouldNameEnvironmentVariable() {
    let mut config = Config::default();
    config.dataset.source = "data.csv".to_string();
    config.apis.nvidia.api_key = "key".to_string();

    let error = build_backend_chain(&config).unwrap_err();
    assert!(error.to_string().contains("FANAR_API_KEY"));

    config.translation.enable_fallback = false;
    let chain = build_backend_chain(&config).unwrap();
    assert_eq!(chain.iter().map(|b| b.id()).collect::<Vec<_>>(), vec![BackendId::Nvidia]);
}
