//! [`CredentialStore`] backed by PostgreSQL.

use async_trait::async_trait;
use fleetbroker_core::authorization::{
    AuthorizationRecord, AuthorizationToken, NewAuthorizationRecord, NewAuthorizationToken,
    TokenRotation, UpdateAuthorizationRecord,
};
use fleetbroker_core::error::CoreError;
use fleetbroker_core::partner::{NewPartner, Partner, PartnerTokenUpdate};
use fleetbroker_core::store::{
    AuthorizationStore, AuthorizationTokenStore, CredentialStore, PartnerStore,
};
use fleetbroker_core::types::DbId;

use crate::repositories::{AuthorizationRepo, AuthorizationTokenRepo, PartnerRepo};
use crate::DbPool;

/// Adapts the repositories to the core store traits.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error onto the core error kinds.
///
/// - Unique violations on a `uq_` constraint become [`CoreError::Conflict`].
/// - Check violations become [`CoreError::Validation`].
/// - Everything else is [`CoreError::Internal`].
pub fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return CoreError::Conflict(format!(
                        "Duplicate value violates unique constraint: {constraint}"
                    ));
                }
            }
            Some("23514") => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return CoreError::Validation(format!(
                    "Value violates check constraint: {constraint}"
                ));
            }
            _ => {}
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(err.to_string())
}

#[async_trait]
impl PartnerStore for PgCredentialStore {
    async fn find_partner(&self, client_id: &str) -> Result<Option<Partner>, CoreError> {
        let row = PartnerRepo::find_by_client_id(&self.pool, client_id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Partner::from))
    }

    async fn create_partner(&self, input: &NewPartner) -> Result<Partner, CoreError> {
        PartnerRepo::create(&self.pool, input)
            .await
            .map(Partner::from)
            .map_err(map_db_error)
    }

    async fn update_partner(
        &self,
        id: DbId,
        update: &PartnerTokenUpdate,
    ) -> Result<Partner, CoreError> {
        PartnerRepo::update_token(&self.pool, id, update)
            .await
            .map_err(map_db_error)?
            .map(Partner::from)
            .ok_or_else(|| CoreError::not_found("Partner", id))
    }
}

#[async_trait]
impl AuthorizationStore for PgCredentialStore {
    async fn find_authorization(
        &self,
        client_id: &str,
    ) -> Result<Option<AuthorizationRecord>, CoreError> {
        let row = AuthorizationRepo::find_by_client_id(&self.pool, client_id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(AuthorizationRecord::from))
    }

    async fn create_authorization(
        &self,
        input: &NewAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError> {
        AuthorizationRepo::create(&self.pool, input)
            .await
            .map(AuthorizationRecord::from)
            .map_err(map_db_error)
    }

    async fn update_authorization(
        &self,
        id: DbId,
        update: &UpdateAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError> {
        AuthorizationRepo::update(&self.pool, id, update)
            .await
            .map_err(map_db_error)?
            .map(AuthorizationRecord::from)
            .ok_or_else(|| CoreError::not_found("AuthorizationRecord", id))
    }
}

#[async_trait]
impl AuthorizationTokenStore for PgCredentialStore {
    async fn create_token(
        &self,
        input: &NewAuthorizationToken,
    ) -> Result<AuthorizationToken, CoreError> {
        AuthorizationTokenRepo::create(&self.pool, input)
            .await
            .map(AuthorizationToken::from)
            .map_err(map_db_error)
    }

    async fn update_token(
        &self,
        id: DbId,
        rotation: &TokenRotation,
    ) -> Result<AuthorizationToken, CoreError> {
        AuthorizationTokenRepo::rotate(&self.pool, id, rotation)
            .await
            .map_err(map_db_error)?
            .map(AuthorizationToken::from)
            .ok_or_else(|| CoreError::not_found("AuthorizationToken", id))
    }

    async fn find_token_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<AuthorizationToken>, CoreError> {
        let row = AuthorizationTokenRepo::find_latest_by_client_id(&self.pool, client_id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(AuthorizationToken::from))
    }

    async fn find_token_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthorizationToken>, CoreError> {
        let row = AuthorizationTokenRepo::find_by_access_token(&self.pool, access_token)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(AuthorizationToken::from))
    }

    async fn soft_delete_token(&self, id: DbId) -> Result<bool, CoreError> {
        AuthorizationTokenRepo::soft_delete(&self.pool, id)
            .await
            .map_err(map_db_error)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(map_db_error)
    }
}
