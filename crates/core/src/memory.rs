//! In-memory [`CredentialStore`] and scripted [`TokenEndpoint`] used by tests
//! and local experiments.
//!
//! The store mirrors the uniqueness and immutability rules of the PostgreSQL schema:
//! one partner and one authorization record per `client_id`, and updates
//! that never rewrite `client_id` / `client_secret`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::authorization::{
    AuthorizationRecord, AuthorizationToken, NewAuthorizationRecord, NewAuthorizationToken,
    TokenRotation, UpdateAuthorizationRecord,
};
use crate::error::CoreError;
use crate::partner::{NewPartner, Partner, PartnerTokenUpdate};
use crate::store::{AuthorizationStore, AuthorizationTokenStore, CredentialStore, PartnerStore};
use crate::types::DbId;
use crate::upstream::{ClientCredentials, CodeExchange, TokenEndpoint, TokenGrant};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    partners: Vec<Partner>,
    authorizations: Vec<AuthorizationRecord>,
    tokens: Vec<AuthorizationToken>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store backed by vectors behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partner rows, including every client.
    pub async fn partner_count(&self) -> usize {
        self.tables.read().await.partners.len()
    }

    /// All token rows, soft-deleted ones included.
    pub async fn all_tokens(&self) -> Vec<AuthorizationToken> {
        self.tables.read().await.tokens.clone()
    }
}

#[async_trait]
impl PartnerStore for MemoryStore {
    async fn find_partner(&self, client_id: &str) -> Result<Option<Partner>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .partners
            .iter()
            .find(|p| p.client_id == client_id)
            .cloned())
    }

    async fn create_partner(&self, input: &NewPartner) -> Result<Partner, CoreError> {
        let mut tables = self.tables.write().await;
        if tables.partners.iter().any(|p| p.client_id == input.client_id) {
            return Err(CoreError::Conflict(format!(
                "partner for client {} already exists",
                input.client_id
            )));
        }
        let partner = Partner {
            id: tables.next_id(),
            client_id: input.client_id.clone(),
            access_token: input.access_token.clone(),
            token_type: input.token_type.clone(),
            expires_in: input.expires_in,
            created_at: input.created_at,
            updated_at: input.created_at,
        };
        tables.partners.push(partner.clone());
        Ok(partner)
    }

    async fn update_partner(
        &self,
        id: DbId,
        update: &PartnerTokenUpdate,
    ) -> Result<Partner, CoreError> {
        let mut tables = self.tables.write().await;
        let partner = tables
            .partners
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::not_found("Partner", id))?;
        partner.access_token = update.access_token.clone();
        partner.token_type = update.token_type.clone();
        partner.expires_in = update.expires_in;
        partner.updated_at = update.updated_at;
        Ok(partner.clone())
    }
}

#[async_trait]
impl AuthorizationStore for MemoryStore {
    async fn find_authorization(
        &self,
        client_id: &str,
    ) -> Result<Option<AuthorizationRecord>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .authorizations
            .iter()
            .find(|a| a.client_id == client_id)
            .cloned())
    }

    async fn create_authorization(
        &self,
        input: &NewAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .authorizations
            .iter()
            .any(|a| a.client_id == input.client_id)
        {
            return Err(CoreError::Conflict(format!(
                "client {} is already registered",
                input.client_id
            )));
        }
        let now = chrono::Utc::now();
        let record = AuthorizationRecord {
            id: tables.next_id(),
            client_id: input.client_id.clone(),
            client_secret: input.client_secret.clone(),
            grant_type: input.grant_type.clone(),
            redirect_uri: input.redirect_uri.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.authorizations.push(record.clone());
        Ok(record)
    }

    async fn update_authorization(
        &self,
        id: DbId,
        update: &UpdateAuthorizationRecord,
    ) -> Result<AuthorizationRecord, CoreError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .authorizations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::not_found("AuthorizationRecord", id))?;
        if let Some(grant_type) = &update.grant_type {
            record.grant_type = grant_type.clone();
        }
        if let Some(redirect_uri) = &update.redirect_uri {
            record.redirect_uri = redirect_uri.clone();
        }
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }
}

#[async_trait]
impl AuthorizationTokenStore for MemoryStore {
    async fn create_token(
        &self,
        input: &NewAuthorizationToken,
    ) -> Result<AuthorizationToken, CoreError> {
        let mut tables = self.tables.write().await;
        let token = AuthorizationToken {
            id: tables.next_id(),
            code: input.code.clone(),
            client_id: input.client_id.clone(),
            client_secret: input.client_secret.clone(),
            access_token: input.access_token.clone(),
            refresh_token: input.refresh_token.clone(),
            scope: input.scope.clone(),
            created_at: input.created_at,
            updated_at: input.created_at,
            deleted: false,
        };
        tables.tokens.push(token.clone());
        Ok(token)
    }

    async fn update_token(
        &self,
        id: DbId,
        rotation: &TokenRotation,
    ) -> Result<AuthorizationToken, CoreError> {
        let mut tables = self.tables.write().await;
        let token = tables
            .tokens
            .iter_mut()
            .find(|t| t.id == id && !t.deleted)
            .ok_or_else(|| CoreError::not_found("AuthorizationToken", id))?;
        token.access_token = rotation.access_token.clone();
        token.refresh_token = rotation.refresh_token.clone();
        token.scope = rotation.scope.clone();
        token.updated_at = rotation.updated_at;
        Ok(token.clone())
    }

    async fn find_token_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<AuthorizationToken>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .iter()
            .rev()
            .find(|t| t.client_id == client_id && !t.deleted)
            .cloned())
    }

    async fn find_token_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthorizationToken>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .iter()
            .find(|t| t.access_token == access_token && !t.deleted)
            .cloned())
    }

    async fn soft_delete_token(&self, id: DbId) -> Result<bool, CoreError> {
        let mut tables = self.tables.write().await;
        match tables.tokens.iter_mut().find(|t| t.id == id && !t.deleted) {
            Some(token) => {
                token.deleted = true;
                token.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted token endpoint
// ---------------------------------------------------------------------------

/// One request observed by [`ScriptedTokenEndpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCall {
    ClientCredentials { client_id: String },
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
}

/// A [`TokenEndpoint`] that replays queued responses in order.
///
/// An empty queue answers with [`CoreError::UpstreamUnavailable`].
#[derive(Default)]
pub struct ScriptedTokenEndpoint {
    responses: Mutex<VecDeque<Result<TokenGrant, String>>>,
    calls: Mutex<Vec<UpstreamCall>>,
}

impl ScriptedTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_grant(&self, grant: TokenGrant) {
        self.lock_responses().push_back(Ok(grant));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_responses().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<TokenGrant, String>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn respond(&self, call: UpstreamCall) -> Result<TokenGrant, CoreError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        match self.lock_responses().pop_front() {
            Some(Ok(grant)) => Ok(grant),
            Some(Err(message)) => Err(CoreError::UpstreamUnavailable(message)),
            None => Err(CoreError::UpstreamUnavailable(
                "no scripted response left".to_string(),
            )),
        }
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedTokenEndpoint {
    async fn fetch_client_credentials(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenGrant, CoreError> {
        self.respond(UpstreamCall::ClientCredentials {
            client_id: credentials.client_id.clone(),
        })
    }

    async fn exchange_authorization_code(
        &self,
        exchange: &CodeExchange,
    ) -> Result<TokenGrant, CoreError> {
        self.respond(UpstreamCall::AuthorizationCode {
            code: exchange.code.clone(),
            redirect_uri: exchange.redirect_uri.clone(),
        })
    }

    async fn refresh_token(
        &self,
        _credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, CoreError> {
        self.respond(UpstreamCall::RefreshToken {
            refresh_token: refresh_token.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
