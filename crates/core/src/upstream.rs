//! Capability trait for the provider's OAuth2 token endpoint.
//!
//! The core never speaks HTTP itself; it hands [`ClientCredentials`] to a
//! [`TokenEndpoint`] and receives raw [`TokenGrant`] material back. Any
//! transport, status, or decoding failure is reported as
//! [`CoreError::UpstreamUnavailable`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A client id / secret pair issued by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Raw token material returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// A bearer grant without refresh or id token.
    pub fn bearer(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in,
            refresh_token: None,
            id_token: None,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Input for the authorization-code grant.
#[derive(Debug, Clone)]
pub struct CodeExchange {
    pub credentials: ClientCredentials,
    pub code: String,
    pub redirect_uri: String,
}

/// The provider's OAuth2 token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `grant_type=client_credentials` for the broker's own partner token.
    async fn fetch_client_credentials(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenGrant, CoreError>;

    /// `grant_type=authorization_code` for a code delivered to the callback.
    async fn exchange_authorization_code(
        &self,
        exchange: &CodeExchange,
    ) -> Result<TokenGrant, CoreError>;

    /// `grant_type=refresh_token` for an existing user grant.
    async fn refresh_token(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, CoreError>;
}
