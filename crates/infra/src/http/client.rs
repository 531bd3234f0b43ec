use std::time::Duration;

use async_trait::async_trait;
use quire_core::api::ports::{
    Headers, HttpMethod, Transport, TransportError, TransportRequest, TransportResponse,
};
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

/// [`Transport`] backed by a shared reqwest client.
///
/// Each request carries its own timeout. Non-success statuses are returned as
/// responses; only exchanges that produce no response become errors.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str())
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let query = request.query_pairs();
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let outbound = builder.build().map_err(|err| TransportError::Dispatch(err.to_string()))?;
        let method = outbound.method().clone();
        let url = outbound.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(outbound).await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            map_send_error(&err)
        })?;

        let status = response.status().as_u16();
        debug!(%method, %url, status, "received HTTP response");

        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::NoResponse(format!("failed to read body: {err}")))?;

        Ok(TransportResponse { status, headers, body: body.to_vec() })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder errors never left the client; everything else (timeouts, refused
/// connections, resets) means no response was received.
fn map_send_error(err: &reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::Dispatch(err.to_string())
    } else if err.is_timeout() {
        TransportError::NoResponse(format!("request timed out: {err}"))
    } else {
        TransportError::NoResponse(err.to_string())
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Duration,
    user_agent: Option<String>,
    accept_invalid_certs: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10), user_agent: None, accept_invalid_certs: false }
    }
}

impl ReqwestTransportBuilder {
    /// Set the TCP connect timeout (default 10s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header sent with every request.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut builder =
            ReqwestClient::builder().connect_timeout(self.connect_timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::Dispatch(format!("failed to build HTTP client: {err}")))?;

        Ok(ReqwestTransport { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::builder().user_agent("quire-tests").build().expect("transport")
    }

    fn request(method: HttpMethod, url: String) -> TransportRequest {
        TransportRequest::json(method, url, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn forwards_headers_query_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/articles"))
            .and(query_param("page", "2"))
            .and(header("authorization", "Bearer a1"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "a_title": "Hi" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "a_id": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let outbound = request(HttpMethod::Post, format!("{}/articles", server.uri()))
            .with_bearer("a1")
            .with_query(Some(json!({ "page": 2 })))
            .with_body(Some(json!({ "a_title": "Hi" })));
        let response = transport().send(outbound).await.expect("response");

        assert_eq!(response.status, 201);
        assert_eq!(response.json_body(), Some(json!({ "a_id": 1 })));
    }

    #[tokio::test]
    async fn returns_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Not found" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response =
            transport().send(request(HttpMethod::Get, server.uri())).await.expect("response");

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn refused_connection_is_no_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let result = transport().send(request(HttpMethod::Get, format!("http://{addr}"))).await;

        assert!(matches!(result, Err(TransportError::NoResponse(_))));
    }

    #[tokio::test]
    async fn timeout_is_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let outbound = TransportRequest::json(HttpMethod::Get, server.uri(), Duration::from_millis(50));
        let result = transport().send(outbound).await;

        match result {
            Err(TransportError::NoResponse(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_url_is_dispatch_error() {
        let result = transport().send(request(HttpMethod::Get, "not a url".to_string())).await;

        assert!(matches!(result, Err(TransportError::Dispatch(_))));
    }
}
