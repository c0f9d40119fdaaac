use fleetbroker_core::partner::Partner;
use fleetbroker_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `partners` table.
#[derive(Debug, Clone, FromRow)]
pub struct PartnerRow {
    pub id: DbId,
    pub client_id: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Partner {
            id: row.id,
            client_id: row.client_id,
            access_token: row.access_token,
            token_type: row.token_type,
            expires_in: row.expires_in,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
