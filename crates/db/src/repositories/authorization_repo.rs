//! Repository for the `authorizations` table.

use fleetbroker_core::authorization::{NewAuthorizationRecord, UpdateAuthorizationRecord};
use fleetbroker_core::types::DbId;
use sqlx::PgPool;

use crate::models::authorization::AuthorizationRow;

const COLUMNS: &str =
    "id, client_id, client_secret, grant_type, redirect_uri, created_at, updated_at";

/// Provides CRUD operations for registered client applications.
pub struct AuthorizationRepo;

impl AuthorizationRepo {
    pub async fn find_by_client_id(
        pool: &PgPool,
        client_id: &str,
    ) -> Result<Option<AuthorizationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM authorizations WHERE client_id = $1");
        sqlx::query_as::<_, AuthorizationRow>(&query)
            .bind(client_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        input: &NewAuthorizationRecord,
    ) -> Result<AuthorizationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO authorizations (client_id, client_secret, grant_type, redirect_uri)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuthorizationRow>(&query)
            .bind(&input.client_id)
            .bind(&input.client_secret)
            .bind(&input.grant_type)
            .bind(&input.redirect_uri)
            .fetch_one(pool)
            .await
    }

    /// Update the mutable fields. Only non-`None` fields in `input` are applied;
    /// `client_id` and `client_secret` are not part of the statement.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateAuthorizationRecord,
    ) -> Result<Option<AuthorizationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE authorizations SET
                grant_type = COALESCE($2, grant_type),
                redirect_uri = COALESCE($3, redirect_uri),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuthorizationRow>(&query)
            .bind(id)
            .bind(&input.grant_type)
            .bind(&input.redirect_uri)
            .fetch_optional(pool)
            .await
    }
}
