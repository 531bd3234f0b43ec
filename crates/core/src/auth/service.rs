//! Account operations: roles, registration and session lifecycle

use std::sync::Arc;

use quire_domain::constants::{LOGIN_ENDPOINT, USERS_ENDPOINT, USER_ROLES_ENDPOINT};
use quire_domain::{ApiError, ApiResult, Credentials, NewUser, Role, TokenPair};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::api::ApiClient;

/// Session and account management on top of [`ApiClient`]
#[derive(Debug, Clone)]
pub struct AuthService {
    client: Arc<ApiClient>,
}

impl AuthService {
    /// Create the service on a shared client.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Roles a new user can be registered with.
    pub async fn roles(&self) -> ApiResult<Vec<Role>> {
        self.client.get(USER_ROLES_ENDPOINT, None).await
    }

    /// Register a user. Does not sign in.
    #[instrument(skip(self, user), fields(login = %user.login))]
    pub async fn sign_up(&self, user: &NewUser) -> ApiResult<Value> {
        self.client.post(USERS_ENDPOINT, user).await
    }

    /// Exchange credentials for a token pair and persist it.
    ///
    /// # Errors
    ///
    /// Returns the server's error for rejected credentials, or a 500 when the
    /// tokens cannot be stored.
    #[instrument(skip(self, credentials), fields(login = %credentials.login))]
    pub async fn sign_in(&self, credentials: &Credentials) -> ApiResult<()> {
        let tokens: TokenPair = self.client.post(LOGIN_ENDPOINT, credentials).await?;
        self.client
            .tokens()
            .save_tokens(&tokens)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store tokens: {e}")))?;
        info!("signed in");
        Ok(())
    }

    /// Forget the stored session and every response cached under it.
    pub async fn sign_out(&self) -> ApiResult<()> {
        self.client.clear_cache();
        self.client
            .tokens()
            .clear_tokens()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to clear tokens: {e}")))?;
        info!("signed out");
        Ok(())
    }

    /// True when an access token is stored. Store failures read as signed out.
    pub async fn is_signed_in(&self) -> bool {
        match self.client.tokens().access_token().await {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "failed to read access token");
                false
            }
        }
    }
}
