use fleetbroker_core::authorization::AuthorizationToken;
use fleetbroker_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `authorization_tokens` table.
///
/// A token is soft-deleted when `deleted_at` is set.
#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationTokenRow {
    pub id: DbId,
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<AuthorizationTokenRow> for AuthorizationToken {
    fn from(row: AuthorizationTokenRow) -> Self {
        AuthorizationToken {
            id: row.id,
            code: row.code,
            client_id: row.client_id,
            client_secret: row.client_secret,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            scope: row.scope,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted: row.deleted_at.is_some(),
        }
    }
}
