//! Three-legged authorization-code flow for end users.
//!
//! ```text
//! Unregistered -> Registered -> RedirectIssued -> CallbackReceived -> TokenStored
//! ```
//!
//! Registration persists an [`AuthorizationRecord`]. The redirect step hands
//! out fresh `state` / `nonce` values, the callback exchanges the code for a
//! user token pair. A failed step never advances the state.

use std::sync::Arc;

use crate::authorization::{
    generate_flow_token, validate_grant_type, validate_new_record, validate_redirect_uri,
    AuthorizationRecord, AuthorizationToken, ClientUpdateRequest, NewAuthorizationRecord,
    NewAuthorizationToken, RedirectParams, TokenRotation, UpdateAuthorizationRecord, USER_SCOPES,
};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::partner::token_prefix;
use crate::store::{AuthorizationStore, AuthorizationTokenStore};
use crate::upstream::{ClientCredentials, CodeExchange, TokenEndpoint, TokenGrant};

pub struct AuthorizationFlow {
    records: Arc<dyn AuthorizationStore>,
    tokens: Arc<dyn AuthorizationTokenStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    /// Registered client that provider callbacks are exchanged for.
    callback_client_id: String,
}

impl AuthorizationFlow {
    pub fn new(
        records: Arc<dyn AuthorizationStore>,
        tokens: Arc<dyn AuthorizationTokenStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
        callback_client_id: impl Into<String>,
    ) -> Self {
        Self {
            records,
            tokens,
            endpoint,
            clock,
            callback_client_id: callback_client_id.into(),
        }
    }

    pub fn callback_client_id(&self) -> &str {
        &self.callback_client_id
    }

    // ---- client registration ----

    pub async fn register_client(
        &self,
        mut input: NewAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError> {
        validate_new_record(&mut input)?;
        let record = self.records.create_authorization(&input).await?;
        tracing::info!(
            client_id = %record.client_id,
            grant_type = %record.grant_type,
            "Client registered"
        );
        Ok(record)
    }

    /// Change the grant type and/or redirect URI of a registered client.
    ///
    /// Supplying a `client_secret`, or a `client_id` other than the one in
    /// the path, is a [`CoreError::Conflict`].
    pub async fn update_client(
        &self,
        client_id: &str,
        request: ClientUpdateRequest,
    ) -> Result<AuthorizationRecord, CoreError> {
        if request.client_secret.is_some() {
            return Err(CoreError::Conflict(
                "clientSecret cannot be changed after registration".to_string(),
            ));
        }
        if let Some(body_id) = request.client_id.as_deref() {
            if body_id != client_id {
                return Err(CoreError::Conflict(format!(
                    "clientId cannot be changed after registration ({client_id} -> {body_id})"
                )));
            }
        }
        if let Some(grant_type) = request.grant_type.as_deref() {
            validate_grant_type(grant_type)?;
        }
        if let Some(redirect_uri) = request.redirect_uri.as_deref() {
            validate_redirect_uri(redirect_uri)?;
        }

        let existing = self.find_client(client_id).await?;
        let update = UpdateAuthorizationRecord {
            grant_type: request.grant_type,
            redirect_uri: request.redirect_uri,
        };
        let record = self.records.update_authorization(existing.id, &update).await?;
        tracing::info!(client_id, "Client updated");
        Ok(record)
    }

    pub async fn find_client(&self, client_id: &str) -> Result<AuthorizationRecord, CoreError> {
        self.records
            .find_authorization(client_id)
            .await?
            .ok_or_else(|| CoreError::not_found("AuthorizationRecord", client_id))
    }

    // ---- redirect / callback ----

    /// Build the parameters for sending a user to the consent page.
    pub async fn prepare_redirect(&self, client_id: &str) -> Result<RedirectParams, CoreError> {
        let record = self.find_client(client_id).await?;
        let params = RedirectParams {
            client_id: record.client_id,
            redirect_uri: record.redirect_uri,
            scope: USER_SCOPES.to_string(),
            state: generate_flow_token(),
            nonce: generate_flow_token(),
            prompt_missing_scopes: false,
            require_requested_scopes: false,
        };
        tracing::debug!(client_id, state = %params.state, "Redirect prepared");
        Ok(params)
    }

    /// Exchange a callback `code` for a user token pair and store it.
    ///
    /// Every exchange is its own grant; earlier grants of the same client
    /// stay active.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthorizationToken, CoreError> {
        if code.trim().is_empty() {
            return Err(CoreError::Validation("code must not be empty".to_string()));
        }

        let record = self.find_client(&self.callback_client_id).await?;
        let exchange = CodeExchange {
            credentials: ClientCredentials::new(&record.client_id, &record.client_secret),
            code: code.to_string(),
            redirect_uri: record.redirect_uri.clone(),
        };
        let grant = upstream(
            self.endpoint.exchange_authorization_code(&exchange).await,
            &record.client_id,
        )?;

        let token = self
            .tokens
            .create_token(&NewAuthorizationToken {
                code: code.to_string(),
                client_id: record.client_id,
                client_secret: record.client_secret,
                access_token: grant.access_token,
                refresh_token: grant.refresh_token.unwrap_or_default(),
                scope: grant.scope.unwrap_or_else(|| USER_SCOPES.to_string()),
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(
            client_id = %token.client_id,
            access_token = token_prefix(&token.access_token),
            "User token stored"
        );
        Ok(token)
    }

    // ---- user token maintenance ----

    /// Rotate a stored user token through the refresh-token grant.
    pub async fn refresh_user_token(
        &self,
        access_token: &str,
    ) -> Result<AuthorizationToken, CoreError> {
        let token = self.find_active_token(access_token).await?;
        if token.refresh_token.is_empty() {
            return Err(CoreError::Validation(format!(
                "token for client {} has no refresh token",
                token.client_id
            )));
        }

        let credentials = ClientCredentials::new(&token.client_id, &token.client_secret);
        let grant = upstream(
            self.endpoint.refresh_token(&credentials, &token.refresh_token).await,
            &token.client_id,
        )?;

        let rotation = TokenRotation {
            access_token: grant.access_token,
            // Providers may omit the refresh token when it is not rotated.
            refresh_token: grant.refresh_token.unwrap_or(token.refresh_token),
            scope: grant.scope.unwrap_or(token.scope),
            updated_at: self.clock.now(),
        };
        let refreshed = self.tokens.update_token(token.id, &rotation).await?;
        tracing::info!(
            client_id = %refreshed.client_id,
            access_token = token_prefix(&refreshed.access_token),
            "User token refreshed"
        );
        Ok(refreshed)
    }

    /// Soft-delete a stored user token.
    pub async fn revoke_user_token(&self, access_token: &str) -> Result<(), CoreError> {
        let token = self.find_active_token(access_token).await?;
        if !self.tokens.soft_delete_token(token.id).await? {
            return Err(CoreError::not_found(
                "AuthorizationToken",
                token_prefix(access_token),
            ));
        }
        tracing::info!(client_id = %token.client_id, "User token revoked");
        Ok(())
    }

    async fn find_active_token(&self, access_token: &str) -> Result<AuthorizationToken, CoreError> {
        if access_token.is_empty() {
            return Err(CoreError::Validation(
                "accessToken must not be empty".to_string(),
            ));
        }
        self.tokens
            .find_token_by_access_token(access_token)
            .await?
            .ok_or_else(|| CoreError::not_found("AuthorizationToken", token_prefix(access_token)))
    }
}

fn upstream(result: Result<TokenGrant, CoreError>, client_id: &str) -> Result<TokenGrant, CoreError> {
    result.map_err(|e| {
        tracing::warn!(client_id, error = %e, "User token request failed");
        match e {
            CoreError::UpstreamUnavailable(_) => e,
            other => CoreError::UpstreamUnavailable(other.to_string()),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
