//! Integration tests for single-flight token refresh over HTTP

mod support;

use std::time::Duration;

use futures::future::join_all;
use quire_core::{AuthService, TokenStore};
use quire_domain::constants::SESSION_EXPIRED_MESSAGE;
use quire_domain::{Credentials, TokenPair};
use serde_json::{json, Value};
use support::TestClient;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONCURRENT_REQUESTS: usize = 5;

async fn mount_protected(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "route": route })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    let routes: Vec<String> = (0..CONCURRENT_REQUESTS).map(|i| format!("/articles/{i}")).collect();
    for route in &routes {
        mount_protected(&server, route).await;
    }
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let harness = TestClient::for_server(&server);

    let results = join_all(routes.iter().map(|route| harness.client.get_value(route, None))).await;

    for (route, result) in routes.iter().zip(results) {
        assert_eq!(result.expect("request recovered"), json!({ "route": route }));
    }
    assert_eq!(harness.tokens.current(), Some(TokenPair::new("access-2", "refresh-2")));
    assert!(!harness.client.refresh_coordinator().is_refreshing());
    assert_eq!(harness.client.refresh_coordinator().pending_count(), 0);
}

#[tokio::test]
async fn test_failed_refresh_fails_all_requests_identically() {
    let server = MockServer::start().await;
    let routes: Vec<String> = (0..CONCURRENT_REQUESTS).map(|i| format!("/articles/{i}")).collect();
    for route in &routes {
        mount_protected(&server, route).await;
    }
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Refresh token revoked" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let harness = TestClient::for_server(&server);

    let results = join_all(routes.iter().map(|route| harness.client.get_value(route, None))).await;
    let errors: Vec<_> = results.into_iter().map(|r| r.expect_err("refresh failed")).collect();

    let first = &errors[0];
    assert_eq!(first.status_code, 401);
    assert!(first.is_auth_expired());
    assert!(errors.iter().all(|err| err == first), "all callers see the same failure");
    assert_eq!(harness.tokens.current(), None, "failed refresh clears the session");
}

#[tokio::test]
async fn test_rejected_replay_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Account locked" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let harness = TestClient::for_server(&server);

    let err = harness.client.get_value("/articles", None).await.expect_err("still rejected");

    assert_eq!(err.status_code, 401);
    assert_eq!(err.message, "Account locked");
    assert_eq!(harness.tokens.current(), None, "caller must sign in again");
}

#[tokio::test]
async fn test_missing_refresh_token_expires_session() {
    let server = MockServer::start().await;
    mount_protected(&server, "/articles").await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = TestClient::for_server(&server);
    harness.tokens.clear_tokens().await.expect("tokens cleared");

    let err = harness.client.get_value("/articles", None).await.expect_err("no session");

    assert_eq!(err.status_code, 401);
    assert_eq!(err.message, SESSION_EXPIRED_MESSAGE);
}

#[tokio::test]
async fn test_login_401_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = TestClient::for_server(&server);
    let auth = AuthService::new(harness.client.clone());

    let err = auth.sign_in(&Credentials::new("ada", "wrong")).await.expect_err("rejected");

    assert_eq!(err.status_code, 401);
    assert_eq!(err.message, "Invalid credentials");
    assert_eq!(harness.tokens.current(), Some(TokenPair::new("access-1", "refresh-1")));
}

#[tokio::test]
async fn test_sign_in_stores_tokens_used_by_later_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/login"))
        .and(body_json(json!({ "login": "ada", "password": "secret" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_protected(&server, "/users/roles").await;

    let harness = TestClient::new(&server.uri(), "stale", "stale");
    let auth = AuthService::new(harness.client.clone());

    auth.sign_in(&Credentials::new("ada", "secret")).await.expect("signed in");
    let roles: Value = harness.client.get("/users/roles", None).await.expect("authorized");

    assert_eq!(roles, json!({ "route": "/users/roles" }));
    assert!(auth.is_signed_in().await);
}
