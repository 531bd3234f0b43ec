//! Single-flight access token refresh
//!
//! When several requests fail with 401 at once, exactly one of them performs
//! the refresh. The others subscribe and are resumed with its outcome: the new
//! access token on success, or the same [`ApiError`] on failure. A request
//! that reaches the coordinator after a refresh already completed since it was
//! sent reuses that outcome instead of starting another one.
//!
//! State lives behind a synchronous mutex that is never held across an
//! `.await`, so the coordinator is safe on a multi-threaded runtime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quire_domain::constants::{REFRESH_ENDPOINT, SESSION_EXPIRED_MESSAGE};
use quire_domain::{ApiError, ApiResult, RefreshRequest, TokenPair};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::normalizer::{normalize, RawError};
use super::ports::{HttpMethod, Transport, TransportRequest};
use crate::auth::ports::TokenStore;

type Outcome = ApiResult<String>;

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    /// Requests parked until the running refresh completes
    pending: Vec<oneshot::Sender<Outcome>>,
    /// Completed refreshes so far
    generation: u64,
    /// Outcome of the most recent completed refresh
    last: Option<Outcome>,
}

enum Role {
    Lead,
    Wait(oneshot::Receiver<Outcome>),
    Reuse(Outcome),
}

/// Coordinates token refreshes for one client
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    refresh_url: String,
    timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Create a coordinator posting to `<base_url>/users/refresh`.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            refresh_url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_ENDPOINT),
            timeout,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Number of refreshes completed so far.
    ///
    /// Callers capture this before sending a request and pass it to
    /// [`recover`](Self::recover) if the request comes back 401.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// True while a refresh request is in flight
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().is_refreshing
    }

    /// Callers waiting on the in-flight refresh
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Obtain a fresh access token after a 401.
    ///
    /// `seen_generation` is the value of [`generation`](Self::generation)
    /// when the failed request was sent.
    pub async fn recover(&self, seen_generation: u64) -> ApiResult<String> {
        let role = {
            let mut state = self.state.lock();
            if state.is_refreshing {
                let (tx, rx) = oneshot::channel();
                state.pending.push(tx);
                Role::Wait(rx)
            } else if state.generation > seen_generation {
                Role::Reuse(state.last.clone().unwrap_or_else(|| Err(session_expired())))
            } else {
                state.is_refreshing = true;
                Role::Lead
            }
        };

        match role {
            Role::Wait(rx) => {
                debug!("waiting for in-flight token refresh");
                rx.await.unwrap_or_else(|_| Err(session_expired()))
            }
            Role::Reuse(outcome) => {
                debug!("reusing outcome of a token refresh completed after dispatch");
                outcome
            }
            Role::Lead => {
                let mut guard = LeadGuard { coordinator: self, finished: false };
                let outcome = self.refresh().await;
                if let Err(e) = &outcome {
                    error!(status = e.status_code, error = %e, "token refresh failed; clearing session");
                    self.clear_session().await;
                }
                guard.finish(outcome.clone());
                outcome
            }
        }
    }

    async fn refresh(&self) -> ApiResult<String> {
        let refresh_token = match self.tokens.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("no refresh token stored");
                return Err(session_expired());
            }
            Err(e) => {
                warn!(error = %e, "failed to read refresh token");
                return Err(session_expired());
            }
        };

        let body = serde_json::to_value(RefreshRequest { refresh_token })
            .map_err(|e| ApiError::internal(format!("Failed to encode refresh request: {e}")))?;
        let request = TransportRequest::json(HttpMethod::Post, &self.refresh_url, self.timeout)
            .with_body(Some(body));

        info!("refreshing access token");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| normalize(&RawError::from(e)))?;
        if !response.is_success() {
            return Err(normalize(&RawError::from_response(&response)));
        }

        let tokens: TokenPair = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::internal(format!("Invalid token refresh response: {e}")))?;
        if let Err(e) = self.tokens.save_tokens(&tokens).await {
            warn!(error = %e, "failed to persist refreshed tokens");
        }

        info!("access token refreshed");
        Ok(tokens.access_token)
    }

    async fn clear_session(&self) {
        if let Err(e) = self.tokens.clear_tokens().await {
            warn!(error = %e, "failed to clear tokens after refresh failure");
        }
    }

    /// Return to idle, record the outcome and resume every subscriber with it.
    fn complete(&self, outcome: Outcome) {
        let pending = {
            let mut state = self.state.lock();
            state.is_refreshing = false;
            state.generation += 1;
            state.last = Some(outcome.clone());
            std::mem::take(&mut state.pending)
        };

        debug!(subscribers = pending.len(), success = outcome.is_ok(), "token refresh settled");
        for subscriber in pending {
            let _ = subscriber.send(outcome.clone());
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.refresh_url)
            .field("is_refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

/// Settles the refresh even if the leading request is dropped mid-flight.
struct LeadGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    finished: bool,
}

impl LeadGuard<'_> {
    fn finish(&mut self, outcome: Outcome) {
        self.finished = true;
        self.coordinator.complete(outcome);
    }
}

impl Drop for LeadGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("token refresh abandoned before completion");
            self.coordinator.complete(Err(session_expired()));
        }
    }
}

fn session_expired() -> ApiError {
    ApiError::new(401, SESSION_EXPIRED_MESSAGE)
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use serde_json::json;

    use super::*;
    use crate::api::ports::{TransportError, TransportResponse};
    use crate::testing::{InMemoryTokenStore, ScriptedTransport};

    const BASE: &str = "http://api.test";

    fn coordinator(
        transport: &ScriptedTransport,
        tokens: &Arc<InMemoryTokenStore>,
    ) -> Arc<RefreshCoordinator> {
        Arc::new(RefreshCoordinator::new(
            Arc::new(transport.clone()),
            tokens.clone(),
            BASE,
            Duration::from_secs(5),
        ))
    }

    fn refresh_ok() -> ScriptedTransport {
        ScriptedTransport::new(|request| {
            assert_eq!(request.bearer_token(), None);
            assert_eq!(request.body, Some(json!({ "refreshToken": "r1" })));
            Ok(TransportResponse::json(
                200,
                &json!({ "accessToken": "a2", "refreshToken": "r2" }),
            ))
        })
    }

    #[tokio::test]
    async fn test_successful_refresh_persists_pair() {
        let transport = refresh_ok();
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let token = coordinator.recover(coordinator.generation()).await.unwrap();

        assert_eq!(token, "a2");
        assert_eq!(tokens.current(), Some(TokenPair::new("a2", "r2")));
        assert_eq!(transport.count(REFRESH_ENDPOINT), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.generation(), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_expires_session() {
        let transport = refresh_ok();
        let tokens = Arc::new(InMemoryTokenStore::new());
        let coordinator = coordinator(&transport, &tokens);

        let err = coordinator.recover(0).await.unwrap_err();

        assert_eq!(err.status_code, 401);
        assert_eq!(err.message, SESSION_EXPIRED_MESSAGE);
        assert_eq!(transport.total(), 0);
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_tokens() {
        let transport = ScriptedTransport::new(|_| {
            Ok(TransportResponse::json(401, &json!({ "message": "Invalid refresh token" })))
        });
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let err = coordinator.recover(0).await.unwrap_err();

        assert_eq!(err.status_code, 401);
        assert_eq!(err.message, "Invalid refresh token");
        assert_eq!(tokens.current(), None);
    }

    #[tokio::test]
    async fn test_unreachable_refresh_is_network_error() {
        let transport =
            ScriptedTransport::new(|_| Err(TransportError::NoResponse("refused".into())));
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let err = coordinator.recover(0).await.unwrap_err();

        assert!(err.is_network_error);
        assert_eq!(tokens.current(), None);
    }

    #[tokio::test]
    async fn test_malformed_refresh_response() {
        let transport =
            ScriptedTransport::new(|_| Ok(TransportResponse::json(200, &json!({ "token": 1 }))));
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let err = coordinator.recover(0).await.unwrap_err();

        assert_eq!(err.status_code, 500);
        assert!(err.message.starts_with("Invalid token refresh response"));
    }

    #[tokio::test]
    async fn test_concurrent_recoveries_share_one_refresh() {
        let transport = refresh_ok().with_delay(REFRESH_ENDPOINT, Duration::from_millis(50));
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let outcomes = join_all((0..5).map(|_| coordinator.recover(0))).await;

        assert!(outcomes.iter().all(|outcome| outcome.as_deref() == Ok("a2")));
        assert_eq!(transport.count(REFRESH_ENDPOINT), 1);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_identical() {
        let transport = ScriptedTransport::new(|_| {
            Ok(TransportResponse::json(403, &json!({ "message": "Refresh token revoked" })))
        })
        .with_delay(REFRESH_ENDPOINT, Duration::from_millis(50));
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let outcomes = join_all((0..4).map(|_| coordinator.recover(0))).await;

        let expected = ApiError::new(403, "Refresh token revoked");
        assert!(outcomes.iter().all(|outcome| outcome.as_ref().err() == Some(&expected)));
        assert_eq!(transport.count(REFRESH_ENDPOINT), 1);
    }

    #[tokio::test]
    async fn test_late_request_reuses_completed_refresh() {
        let transport = refresh_ok();
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let seen = coordinator.generation();
        coordinator.recover(seen).await.unwrap();
        let token = coordinator.recover(seen).await.unwrap();

        assert_eq!(token, "a2");
        assert_eq!(transport.count(REFRESH_ENDPOINT), 1);
    }

    #[tokio::test]
    async fn test_abandoned_lead_releases_subscribers() {
        let transport = refresh_ok().with_delay(REFRESH_ENDPOINT, Duration::from_secs(30));
        let tokens = Arc::new(InMemoryTokenStore::with_tokens("a1", "r1"));
        let coordinator = coordinator(&transport, &tokens);

        let lead = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.recover(0).await })
        };
        while !coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.recover(0).await })
        };
        while coordinator.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        lead.abort();
        let err = waiter.await.unwrap().unwrap_err();

        assert_eq!(err.message, SESSION_EXPIRED_MESSAGE);
        assert!(!coordinator.is_refreshing());
    }
}
