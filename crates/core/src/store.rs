//! Persistence capabilities consumed by the token manager and the
//! authorization flow.
//!
//! Each entity gets a small `{find, create, update}` trait so the core logic
//! can run against PostgreSQL in production and [`crate::memory::MemoryStore`]
//! in tests. Absent rows are `Ok(None)`; the caller decides whether that is a
//! [`CoreError::NotFound`].

use async_trait::async_trait;

use crate::authorization::{
    AuthorizationRecord, AuthorizationToken, NewAuthorizationRecord, NewAuthorizationToken,
    TokenRotation, UpdateAuthorizationRecord,
};
use crate::error::CoreError;
use crate::partner::{NewPartner, Partner, PartnerTokenUpdate};
use crate::types::DbId;

#[async_trait]
pub trait PartnerStore: Send + Sync {
    async fn find_partner(&self, client_id: &str) -> Result<Option<Partner>, CoreError>;

    /// Insert a partner row. A second row for the same `client_id` is a
    /// [`CoreError::Conflict`].
    async fn create_partner(&self, input: &NewPartner) -> Result<Partner, CoreError>;

    async fn update_partner(
        &self,
        id: DbId,
        update: &PartnerTokenUpdate,
    ) -> Result<Partner, CoreError>;
}

#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    async fn find_authorization(
        &self,
        client_id: &str,
    ) -> Result<Option<AuthorizationRecord>, CoreError>;

    async fn create_authorization(
        &self,
        input: &NewAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError>;

    /// Write `grant_type` / `redirect_uri` only. Implementations must never
    /// touch `client_id` or `client_secret`.
    async fn update_authorization(
        &self,
        id: DbId,
        update: &UpdateAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError>;
}

#[async_trait]
pub trait AuthorizationTokenStore: Send + Sync {
    async fn create_token(
        &self,
        input: &NewAuthorizationToken,
    ) -> Result<AuthorizationToken, CoreError>;

    async fn update_token(
        &self,
        id: DbId,
        rotation: &TokenRotation,
    ) -> Result<AuthorizationToken, CoreError>;

    /// Newest non-deleted token for a client.
    async fn find_token_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<AuthorizationToken>, CoreError>;

    async fn find_token_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthorizationToken>, CoreError>;

    /// Mark a token deleted. Returns `false` if it was already deleted or absent.
    async fn soft_delete_token(&self, id: DbId) -> Result<bool, CoreError>;
}

/// Everything the broker persists, plus a liveness probe.
#[async_trait]
pub trait CredentialStore: PartnerStore + AuthorizationStore + AuthorizationTokenStore {
    async fn health_check(&self) -> Result<(), CoreError>;
}
