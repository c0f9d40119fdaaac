//! Registered client applications, user-level grants, and redirect parameters
//! for the three-legged authorization-code flow.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Full permission set requested from end users during the redirect.
///
/// `offline_access` is what makes the provider hand out a refresh token.
pub const USER_SCOPES: &str = "openid offline_access user_data vehicle_device_data \
     vehicle_location vehicle_cmds vehicle_charging_cmds energy_device_data energy_cmds";

/// Grant type names accepted for a registered client.
pub mod grant_types {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const REFRESH_TOKEN: &str = "refresh_token";

    pub const ALL: &[&str] = &[AUTHORIZATION_CODE, CLIENT_CREDENTIALS, REFRESH_TOKEN];
}

// ---------------------------------------------------------------------------
// Authorization record (registered client application)
// ---------------------------------------------------------------------------

/// A registered client application.
///
/// `client_id` and `client_secret` are fixed at creation time. The secret is
/// never serialized to responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    pub id: DbId,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub grant_type: String,
    #[serde(rename = "redirectURI")]
    pub redirect_uri: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a client application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthorizationRecord {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub grant_type: String,
    #[serde(rename = "redirectURI", alias = "redirectUri")]
    pub redirect_uri: String,
}

/// DTO for changing the mutable fields of a client application.
///
/// Only `grant_type` and `redirect_uri` are ever written by a store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthorizationRecord {
    pub grant_type: Option<String>,
    #[serde(rename = "redirectURI", alias = "redirectUri")]
    pub redirect_uri: Option<String>,
}

/// Body of an update request as received from callers.
///
/// `client_id` and `client_secret` are accepted only so that attempts to
/// change them can be rejected; they are never written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdateRequest {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub grant_type: Option<String>,
    #[serde(rename = "redirectURI", alias = "redirectUri")]
    pub redirect_uri: Option<String>,
}

/// Validate a registration request, filling in the default grant type.
pub fn validate_new_record(input: &mut NewAuthorizationRecord) -> Result<(), CoreError> {
    require_non_empty("clientId", &input.client_id)?;
    require_non_empty("clientSecret", &input.client_secret)?;
    validate_redirect_uri(&input.redirect_uri)?;
    if input.grant_type.trim().is_empty() {
        input.grant_type = grant_types::AUTHORIZATION_CODE.to_string();
    }
    validate_grant_type(&input.grant_type)
}

/// Validate that a grant type is one of [`grant_types::ALL`].
pub fn validate_grant_type(grant_type: &str) -> Result<(), CoreError> {
    if grant_types::ALL.contains(&grant_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported grant type '{grant_type}'. Must be one of: {}",
            grant_types::ALL.join(", ")
        )))
    }
}

/// Validate that a redirect URI is an absolute http(s) URL.
pub fn validate_redirect_uri(uri: &str) -> Result<(), CoreError> {
    require_non_empty("redirectURI", uri)?;
    if uri.starts_with("https://") || uri.starts_with("http://") {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "redirectURI must be an absolute http(s) URL, got '{uri}'"
        )))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        Err(CoreError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Authorization token (user-level grant)
// ---------------------------------------------------------------------------

/// Token pair obtained on behalf of an end user through the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationToken {
    pub id: DbId,
    /// Authorization code the token pair was exchanged from.
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted: bool,
}

/// DTO for storing a freshly exchanged token pair.
#[derive(Debug, Clone)]
pub struct NewAuthorizationToken {
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub created_at: Timestamp,
}

/// Fields replaced when a user token is refreshed.
#[derive(Debug, Clone)]
pub struct TokenRotation {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Redirect parameters
// ---------------------------------------------------------------------------

/// Parameters a front-end needs to send the user to the provider's consent page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectParams {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub nonce: String,
    pub prompt_missing_scopes: bool,
    pub require_requested_scopes: bool,
}

/// Generate an unguessable, time-ordered identifier for `state` / `nonce`.
pub fn generate_flow_token() -> String {
    uuid::Uuid::now_v7().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
