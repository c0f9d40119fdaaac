//! Integration tests for the PostgreSQL credential store.
//!
//! Exercises the repositories and `PgCredentialStore` against a real database:
//! - Partner rows are unique per client and refreshed in place
//! - Client id and secret of a registered client never change on update
//! - Soft-deleted user tokens are hidden from every finder
//! - The partner token manager runs unchanged on top of PostgreSQL

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use fleetbroker_core::authorization::{
    NewAuthorizationRecord, NewAuthorizationToken, TokenRotation, UpdateAuthorizationRecord,
};
use fleetbroker_core::clock::ManualClock;
use fleetbroker_core::error::CoreError;
use fleetbroker_core::memory::ScriptedTokenEndpoint;
use fleetbroker_core::partner::{NewPartner, PartnerTokenUpdate};
use fleetbroker_core::store::{AuthorizationStore, AuthorizationTokenStore, PartnerStore};
use fleetbroker_core::token_manager::PartnerTokenManager;
use fleetbroker_core::types::Timestamp;
use fleetbroker_core::upstream::{ClientCredentials, TokenGrant};
use fleetbroker_db::PgCredentialStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 8, 21, 7, 47, 43).unwrap()
}

fn new_partner(client_id: &str, token: &str) -> NewPartner {
    NewPartner {
        client_id: client_id.to_string(),
        access_token: token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: 3600,
        created_at: t0(),
    }
}

fn new_record(client_id: &str) -> NewAuthorizationRecord {
    NewAuthorizationRecord {
        client_id: client_id.to_string(),
        client_secret: "s3cret".to_string(),
        grant_type: "authorization_code".to_string(),
        redirect_uri: "https://app.example.com/callback".to_string(),
    }
}

fn new_token(client_id: &str, access_token: &str, created_at: Timestamp) -> NewAuthorizationToken {
    NewAuthorizationToken {
        code: "CN_code".to_string(),
        client_id: client_id.to_string(),
        client_secret: "s3cret".to_string(),
        access_token: access_token.to_string(),
        refresh_token: "R1".to_string(),
        scope: "openid offline_access".to_string(),
        created_at,
    }
}

// ---------------------------------------------------------------------------
// Partners
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_partner_round_trip(pool: PgPool) {
    let store = PgCredentialStore::new(pool);

    let created = store.create_partner(&new_partner("abc", "T1")).await.unwrap();
    let found = store.find_partner("abc").await.unwrap().unwrap();

    assert_eq!(found, created);
    assert_eq!(found.created_at, t0());
    assert_eq!(found.updated_at, t0());
    assert!(store.find_partner("other").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_partner_is_conflict(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store.create_partner(&new_partner("abc", "T1")).await.unwrap();

    assert_matches!(
        store.create_partner(&new_partner("abc", "T2")).await,
        Err(CoreError::Conflict(msg)) if msg.contains("uq_partners_client_id")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_partner_refresh_keeps_identity(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let created = store.create_partner(&new_partner("abc", "T1")).await.unwrap();

    let refreshed = store
        .update_partner(
            created.id,
            &PartnerTokenUpdate {
                access_token: "T2".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 7200,
                updated_at: t0() + Duration::seconds(3601),
            },
        )
        .await
        .unwrap();

    assert_eq!(refreshed.id, created.id);
    assert_eq!(refreshed.client_id, "abc");
    assert_eq!(refreshed.created_at, created.created_at);
    assert_eq!(refreshed.access_token, "T2");
    assert_eq!(refreshed.expires_in, 7200);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_missing_partner_is_not_found(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let update = PartnerTokenUpdate {
        access_token: "T2".to_string(),
        token_type: "Bearer".to_string(),
        expires_in: 60,
        updated_at: t0(),
    };
    assert_matches!(
        store.update_partner(999, &update).await,
        Err(CoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Authorization records
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_registration_is_conflict(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store.create_authorization(&new_record("app")).await.unwrap();

    assert_matches!(
        store.create_authorization(&new_record("app")).await,
        Err(CoreError::Conflict(_))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_never_touches_credentials(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let created = store.create_authorization(&new_record("app")).await.unwrap();

    let updated = store
        .update_authorization(
            created.id,
            &UpdateAuthorizationRecord {
                grant_type: Some("refresh_token".to_string()),
                redirect_uri: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.client_id, created.client_id);
    assert_eq!(updated.client_secret, created.client_secret);
    assert_eq!(updated.redirect_uri, created.redirect_uri);
    assert_eq!(updated.grant_type, "refresh_token");
}

// ---------------------------------------------------------------------------
// Authorization tokens
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_soft_deleted_token_is_hidden(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    let token = store.create_token(&new_token("app", "U1", t0())).await.unwrap();

    assert!(store.soft_delete_token(token.id).await.unwrap());
    assert!(
        !store.soft_delete_token(token.id).await.unwrap(),
        "soft delete should be idempotent"
    );

    assert!(store.find_token_by_access_token("U1").await.unwrap().is_none());
    assert!(store.find_token_by_client_id("app").await.unwrap().is_none());
    assert_matches!(
        store
            .update_token(
                token.id,
                &TokenRotation {
                    access_token: "U2".to_string(),
                    refresh_token: "R2".to_string(),
                    scope: "openid".to_string(),
                    updated_at: t0(),
                },
            )
            .await,
        Err(CoreError::NotFound { .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_latest_active_token_wins(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store.create_token(&new_token("app", "U1", t0())).await.unwrap();
    store
        .create_token(&new_token("app", "U2", t0() + Duration::seconds(10)))
        .await
        .unwrap();

    let latest = store.find_token_by_client_id("app").await.unwrap().unwrap();
    assert_eq!(latest.access_token, "U2");
    assert!(!latest.deleted);
}

// ---------------------------------------------------------------------------
// Token manager on PostgreSQL
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_token_manager_refreshes_in_place(pool: PgPool) {
    let store = Arc::new(PgCredentialStore::new(pool));
    let endpoint = Arc::new(ScriptedTokenEndpoint::new());
    endpoint.push_grant(TokenGrant::bearer("T1", 3600));
    endpoint.push_grant(TokenGrant::bearer("T2", 3600));
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = PartnerTokenManager::new(
        store.clone(),
        endpoint.clone(),
        clock.clone(),
        [ClientCredentials::new("abc", "secret")],
    );

    let first = manager.ensure_valid("abc").await.unwrap();
    clock.set(t0() + Duration::seconds(1800));
    assert_eq!(manager.ensure_valid("abc").await.unwrap().access_token, "T1");
    clock.set(t0() + Duration::seconds(3601));
    let refreshed = manager.ensure_valid("abc").await.unwrap();

    assert_eq!(refreshed.access_token, "T2");
    assert_eq!(refreshed.id, first.id);
    assert_eq!(endpoint.call_count(), 2);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM partners")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}
