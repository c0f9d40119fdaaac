//! HTTP client for the provider token endpoint and fleet API.

use std::time::Duration;

use async_trait::async_trait;
use fleetbroker_core::error::CoreError;
use fleetbroker_core::partner::Partner;
use fleetbroker_core::upstream::{ClientCredentials, CodeExchange, TokenEndpoint, TokenGrant};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::FleetConfig;
use crate::error::FleetError;

/// Scope requested for the broker's own client-credentials token.
pub const PARTNER_SCOPES: &str = "openid user_data vehicle_device_data vehicle_location \
     vehicle_cmds vehicle_charging_cmds energy_device_data energy_cmds";

/// Provider error body, RFC 6749 section 5.2.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Fleet API envelope: every payload sits under `response`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct PublicKeyBody {
    public_key: String,
}

/// Client for the provider's OAuth2 token endpoint and partner-account API.
///
/// Holds one [`reqwest::Client`] with a bounded timeout; clone the
/// surrounding `Arc` rather than the client.
pub struct FleetAuthClient {
    client: reqwest::Client,
    config: FleetConfig,
}

impl FleetAuthClient {
    pub fn new(config: FleetConfig) -> Result<Self, FleetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// `POST /api/1/partner_accounts` registering `domain` for this application.
    pub async fn register_partner_domain(
        &self,
        partner: &Partner,
        domain: &str,
    ) -> Result<serde_json::Value, FleetError> {
        let response = self
            .client
            .post(format!("{}/api/1/partner_accounts", self.config.api_base_url))
            .header(reqwest::header::AUTHORIZATION, partner.authorization_header())
            .json(&serde_json::json!({ "domain": domain }))
            .send()
            .await?;

        let body: Envelope<serde_json::Value> = Self::parse_response(response).await?;
        Ok(body.response)
    }

    /// `GET /api/1/partner_accounts/public_key?domain=` for a registered domain.
    pub async fn partner_public_key(
        &self,
        partner: &Partner,
        domain: &str,
    ) -> Result<String, FleetError> {
        let response = self
            .client
            .get(format!(
                "{}/api/1/partner_accounts/public_key",
                self.config.api_base_url
            ))
            .query(&[("domain", domain)])
            .header(reqwest::header::AUTHORIZATION, partner.authorization_header())
            .send()
            .await?;

        let body: Envelope<PublicKeyBody> = Self::parse_response(response).await?;
        Ok(body.response.public_key)
    }

    // ---- private helpers ----

    /// Form-encoded POST to the token endpoint.
    async fn request_token(
        &self,
        grant_type: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenGrant, FleetError> {
        tracing::debug!(grant_type, url = %self.config.token_url, "Requesting token");
        let mut fields = Vec::with_capacity(form.len() + 1);
        fields.push(("grant_type", grant_type));
        fields.extend_from_slice(form);

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&fields)
            .send()
            .await?;

        let grant: TokenGrant = Self::parse_response(response).await?;
        if grant.access_token.is_empty() {
            return Err(FleetError::Decode(
                "token response carries an empty access_token".to_string(),
            ));
        }
        Ok(grant)
    }

    /// Ensure the response has a success status code, turning a provider
    /// error body into [`FleetError::Api`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, FleetError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let (error, description) = match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(parsed) => (parsed.error, parsed.error_description),
            Err(_) => ("http_error".to_string(), body),
        };
        Err(FleetError::Api {
            status: status.as_u16(),
            error,
            description,
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FleetError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FleetError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TokenEndpoint for FleetAuthClient {
    async fn fetch_client_credentials(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenGrant, CoreError> {
        let grant = self
            .request_token(
                "client_credentials",
                &[
                    ("client_id", credentials.client_id.as_str()),
                    ("client_secret", credentials.client_secret.as_str()),
                    ("audience", self.config.audience.as_str()),
                    ("scope", PARTNER_SCOPES),
                ],
            )
            .await?;
        Ok(grant)
    }

    async fn exchange_authorization_code(
        &self,
        exchange: &CodeExchange,
    ) -> Result<TokenGrant, CoreError> {
        let grant = self
            .request_token(
                "authorization_code",
                &[
                    ("client_id", exchange.credentials.client_id.as_str()),
                    ("client_secret", exchange.credentials.client_secret.as_str()),
                    ("code", exchange.code.as_str()),
                    ("audience", self.config.audience.as_str()),
                    ("redirect_uri", exchange.redirect_uri.as_str()),
                ],
            )
            .await?;
        Ok(grant)
    }

    async fn refresh_token(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, CoreError> {
        let grant = self
            .request_token(
                "refresh_token",
                &[
                    ("client_id", credentials.client_id.as_str()),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;
        Ok(grant)
    }
}
