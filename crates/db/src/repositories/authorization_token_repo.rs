//! Repository for the `authorization_tokens` table.
//!
//! Every finder excludes soft-deleted rows.

use fleetbroker_core::authorization::{NewAuthorizationToken, TokenRotation};
use fleetbroker_core::types::DbId;
use sqlx::PgPool;

use crate::models::authorization_token::AuthorizationTokenRow;

const COLUMNS: &str = "id, code, client_id, client_secret, access_token, refresh_token, \
     scope, deleted_at, created_at, updated_at";

/// Provides storage for user-level token pairs.
pub struct AuthorizationTokenRepo;

impl AuthorizationTokenRepo {
    pub async fn create(
        pool: &PgPool,
        input: &NewAuthorizationToken,
    ) -> Result<AuthorizationTokenRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO authorization_tokens
                (code, client_id, client_secret, access_token, refresh_token, scope, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuthorizationTokenRow>(&query)
            .bind(&input.code)
            .bind(&input.client_id)
            .bind(&input.client_secret)
            .bind(&input.access_token)
            .bind(&input.refresh_token)
            .bind(&input.scope)
            .bind(input.created_at)
            .fetch_one(pool)
            .await
    }

    /// Rotate the token pair of an active row.
    pub async fn rotate(
        pool: &PgPool,
        id: DbId,
        rotation: &TokenRotation,
    ) -> Result<Option<AuthorizationTokenRow>, sqlx::Error> {
        let query = format!(
            "UPDATE authorization_tokens SET
                access_token = $2,
                refresh_token = $3,
                scope = $4,
                updated_at = $5
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuthorizationTokenRow>(&query)
            .bind(id)
            .bind(&rotation.access_token)
            .bind(&rotation.refresh_token)
            .bind(&rotation.scope)
            .bind(rotation.updated_at)
            .fetch_optional(pool)
            .await
    }

    /// Newest active token of a client.
    pub async fn find_latest_by_client_id(
        pool: &PgPool,
        client_id: &str,
    ) -> Result<Option<AuthorizationTokenRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM authorization_tokens
             WHERE client_id = $1 AND deleted_at IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, AuthorizationTokenRow>(&query)
            .bind(client_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_access_token(
        pool: &PgPool,
        access_token: &str,
    ) -> Result<Option<AuthorizationTokenRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM authorization_tokens
             WHERE access_token = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, AuthorizationTokenRow>(&query)
            .bind(access_token)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a token by ID. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE authorization_tokens SET deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
