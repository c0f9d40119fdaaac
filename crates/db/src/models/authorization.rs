use fleetbroker_core::authorization::AuthorizationRecord;
use fleetbroker_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `authorizations` table.
#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationRow {
    pub id: DbId,
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
    pub redirect_uri: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<AuthorizationRow> for AuthorizationRecord {
    fn from(row: AuthorizationRow) -> Self {
        AuthorizationRecord {
            id: row.id,
            client_id: row.client_id,
            client_secret: row.client_secret,
            grant_type: row.grant_type,
            redirect_uri: row.redirect_uri,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
