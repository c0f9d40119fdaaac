//! Partner (client-credentials) token model and expiry arithmetic.
//!
//! A partner row caches the access token the broker itself uses against the
//! fleet API. The token is usable while `issued_at + expires_in > now`; the
//! exact boundary counts as expired.

use chrono::Duration;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Number of leading characters of a token that may appear in log lines.
pub const LOGGED_TOKEN_PREFIX_LEN: usize = 8;

/// A cached partner token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: DbId,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds, counted from [`Partner::issued_at`].
    pub expires_in: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting the first partner row of a client.
#[derive(Debug, Clone)]
pub struct NewPartner {
    pub client_id: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i32,
    pub created_at: Timestamp,
}

/// Fields written when a stale partner token is replaced in place.
///
/// `id`, `client_id` and `created_at` are never part of a refresh.
#[derive(Debug, Clone)]
pub struct PartnerTokenUpdate {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i32,
    pub updated_at: Timestamp,
}

impl Partner {
    /// Timestamp at which the current token material was written.
    ///
    /// Equals `created_at` until the first refresh, then the refresh time
    /// recorded in `updated_at`.
    pub fn issued_at(&self) -> Timestamp {
        self.updated_at.max(self.created_at)
    }

    /// Absolute expiry of the current token.
    ///
    /// Fails with [`CoreError::Validation`] when the stored lifetime is
    /// negative or the sum overflows the timestamp range.
    pub fn expires_at(&self) -> Result<Timestamp, CoreError> {
        if self.expires_in < 0 {
            return Err(CoreError::Validation(format!(
                "partner {} has negative expires_in {}",
                self.client_id, self.expires_in
            )));
        }
        self.issued_at()
            .checked_add_signed(Duration::seconds(i64::from(self.expires_in)))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "partner {} expiry overflows timestamp range",
                    self.client_id
                ))
            })
    }

    /// Whether the token must be replaced at `now`. `now == expires_at` is expired.
    pub fn is_expired(&self, now: Timestamp) -> Result<bool, CoreError> {
        Ok(now >= self.expires_at()?)
    }

    /// Value for an `Authorization` header, e.g. `Bearer abc`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Truncate a token for logging so full credentials never reach log sinks.
pub fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(LOGGED_TOKEN_PREFIX_LEN)
        .map_or(token.len(), |(idx, _)| idx);
    &token[..end]
}

/// Convert an upstream lifetime to the stored column width.
pub fn expires_in_from_upstream(expires_in: i64) -> Result<i32, CoreError> {
    i32::try_from(expires_in)
        .ok()
        .filter(|secs| *secs >= 0)
        .ok_or_else(|| {
            CoreError::UpstreamUnavailable(format!(
                "token endpoint returned unusable expires_in {expires_in}"
            ))
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
