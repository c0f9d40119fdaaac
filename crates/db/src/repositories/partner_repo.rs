//! Repository for the `partners` table.

use fleetbroker_core::partner::{NewPartner, PartnerTokenUpdate};
use fleetbroker_core::types::DbId;
use sqlx::PgPool;

use crate::models::partner::PartnerRow;

const COLUMNS: &str =
    "id, client_id, access_token, token_type, expires_in, created_at, updated_at";

/// Provides lookup, insert and in-place refresh for partner tokens.
pub struct PartnerRepo;

impl PartnerRepo {
    pub async fn find_by_client_id(
        pool: &PgPool,
        client_id: &str,
    ) -> Result<Option<PartnerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM partners WHERE client_id = $1");
        sqlx::query_as::<_, PartnerRow>(&query)
            .bind(client_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert the first row for a client. `created_at` and `updated_at` both
    /// take the supplied timestamp.
    ///
    /// Fails with a unique violation on `uq_partners_client_id` if the client
    /// already has a row.
    pub async fn create(pool: &PgPool, input: &NewPartner) -> Result<PartnerRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO partners (client_id, access_token, token_type, expires_in, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PartnerRow>(&query)
            .bind(&input.client_id)
            .bind(&input.access_token)
            .bind(&input.token_type)
            .bind(input.expires_in)
            .bind(input.created_at)
            .fetch_one(pool)
            .await
    }

    /// Replace the token material of an existing row.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update_token(
        pool: &PgPool,
        id: DbId,
        update: &PartnerTokenUpdate,
    ) -> Result<Option<PartnerRow>, sqlx::Error> {
        let query = format!(
            "UPDATE partners SET
                access_token = $2,
                token_type = $3,
                expires_in = $4,
                updated_at = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PartnerRow>(&query)
            .bind(id)
            .bind(&update.access_token)
            .bind(&update.token_type)
            .bind(update.expires_in)
            .bind(update.updated_at)
            .fetch_optional(pool)
            .await
    }
}
