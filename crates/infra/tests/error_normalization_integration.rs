//! Normalizing errors produced by the real transport

mod support;

use std::time::Duration;

use quire_core::api::{normalize, RawError};
use quire_core::{HttpMethod, Transport, TransportRequest};
use quire_domain::constants::NO_CONNECTIVITY_MESSAGE;
use quire_infra::ReqwestTransport;
use serde_json::json;
use support::unreachable_base_url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new().expect("transport")
}

async fn raw_error(request: TransportRequest) -> RawError {
    match transport().send(request).await {
        Ok(response) => RawError::from_response(&response),
        Err(err) => RawError::from(err),
    }
}

#[tokio::test]
async fn test_response_errors_normalize_consistently() {
    let cases = [
        (404, ResponseTemplate::new(404).set_body_json(json!({ "message": "Article not found" }))),
        (500, ResponseTemplate::new(500).set_body_string("<html>oops</html>")),
        (
            400,
            ResponseTemplate::new(400)
                .set_body_json(json!({ "message": ["a", "b"], "errors": { "login": "taken" } })),
        ),
        (418, ResponseTemplate::new(418)),
    ];

    for (status, template) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(template).mount(&server).await;

        let raw = raw_error(TransportRequest::json(
            HttpMethod::Get,
            server.uri(),
            Duration::from_secs(5),
        ))
        .await;

        let first = normalize(&raw);
        let second = normalize(&raw);
        assert_eq!(first, second);
        assert_eq!(first.status_code, status);
        assert!(!first.is_network_error);
        assert!(!first.message.is_empty());
    }
}

#[tokio::test]
async fn test_fallback_message_uses_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(502)).mount(&server).await;

    let raw =
        raw_error(TransportRequest::json(HttpMethod::Get, server.uri(), Duration::from_secs(5)))
            .await;

    assert_eq!(normalize(&raw).message, "Request failed with status code 502");
}

#[tokio::test]
async fn test_unreachable_host_normalizes_to_network_error() {
    let raw = raw_error(TransportRequest::json(
        HttpMethod::Get,
        unreachable_base_url(),
        Duration::from_secs(5),
    ))
    .await;

    let first = normalize(&raw);
    assert_eq!(first, normalize(&raw));
    assert!(first.is_network_error);
    assert_eq!(first.status_code, 0);
    assert_eq!(first.message, NO_CONNECTIVITY_MESSAGE);
}

#[tokio::test]
async fn test_unsendable_request_normalizes_to_internal_error() {
    let raw = raw_error(TransportRequest::json(
        HttpMethod::Get,
        "no scheme here".to_string(),
        Duration::from_secs(5),
    ))
    .await;

    let err = normalize(&raw);
    assert_eq!(err.status_code, 500);
    assert!(!err.is_network_error);
    assert_eq!(err, normalize(&raw));
}
