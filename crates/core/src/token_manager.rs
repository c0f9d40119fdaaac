//! Lifecycle of the cached partner (client-credentials) access token.
//!
//! [`PartnerTokenManager::ensure_valid`] hands callers a non-expired partner
//! token, going upstream only when the cached row is missing or stale:
//!
//! ```text
//! no row            -> fetch upstream -> create row (created_at = now)
//! row, now >= exp   -> fetch upstream -> update token fields in place
//! row, now <  exp   -> return cached row, no upstream call
//! ```
//!
//! Every invocation makes at most one upstream call and at most one write.
//! Failures abort the operation; there is no retry and no fallback to a stale
//! token. Refreshes are single-flight per `client_id` inside this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::partner::{
    expires_in_from_upstream, token_prefix, NewPartner, Partner, PartnerTokenUpdate,
};
use crate::store::PartnerStore;
use crate::upstream::{ClientCredentials, TokenEndpoint, TokenGrant};

/// Owns the partner token cache policy for every configured partner client.
pub struct PartnerTokenManager {
    store: Arc<dyn PartnerStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    credentials: HashMap<String, ClientCredentials>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PartnerTokenManager {
    pub fn new(
        store: Arc<dyn PartnerStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
        credentials: impl IntoIterator<Item = ClientCredentials>,
    ) -> Self {
        let credentials = credentials
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        Self {
            store,
            endpoint,
            clock,
            credentials,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Configured partner client ids, sorted.
    pub fn client_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.credentials.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Return a partner row whose token is valid at the current instant.
    pub async fn ensure_valid(&self, client_id: &str) -> Result<Partner, CoreError> {
        let credentials = self
            .credentials
            .get(client_id)
            .ok_or_else(|| CoreError::not_found("PartnerCredentials", client_id))?;

        let lock = self.refresh_lock(client_id);
        let _guard = lock.lock().await;

        let Some(partner) = self.store.find_partner(client_id).await? else {
            return self.create_from_upstream(credentials).await;
        };

        let now = self.clock.now();
        if partner.is_expired(now)? {
            let expired_at = partner.expires_at()?;
            tracing::info!(client_id, %expired_at, "Partner token expired, refreshing");
            return self.refresh(partner, credentials).await;
        }

        tracing::debug!(client_id, "Partner token still valid");
        Ok(partner)
    }

    /// Ensure every configured partner has a valid token. Run once at startup.
    pub async fn initialize(&self) -> Result<Vec<Partner>, CoreError> {
        let mut partners = Vec::with_capacity(self.credentials.len());
        for client_id in self.client_ids() {
            let partner = self.ensure_valid(client_id).await?;
            tracing::info!(
                client_id,
                access_token = token_prefix(&partner.access_token),
                expires_in = partner.expires_in,
                "Partner initialized"
            );
            partners.push(partner);
        }
        Ok(partners)
    }

    // ---- private helpers ----

    async fn create_from_upstream(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<Partner, CoreError> {
        let client_id = credentials.client_id.as_str();
        tracing::info!(client_id, "Partner not cached, fetching from token endpoint");

        let grant = self.fetch(credentials).await?;
        let input = NewPartner {
            client_id: client_id.to_string(),
            access_token: grant.access_token,
            token_type: grant.token_type,
            expires_in: expires_in_from_upstream(grant.expires_in)?,
            created_at: self.clock.now(),
        };

        match self.store.create_partner(&input).await {
            Ok(partner) => {
                tracing::info!(
                    client_id,
                    id = partner.id,
                    access_token = token_prefix(&partner.access_token),
                    expires_in = partner.expires_in,
                    "Partner created"
                );
                Ok(partner)
            }
            // Another process inserted the row between our read and write.
            Err(CoreError::Conflict(msg)) => {
                tracing::warn!(client_id, %msg, "Partner created concurrently, using stored row");
                self.store.find_partner(client_id).await?.ok_or_else(|| {
                    CoreError::Internal(format!(
                        "partner {client_id} conflicted on create but cannot be read back"
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh(
        &self,
        partner: Partner,
        credentials: &ClientCredentials,
    ) -> Result<Partner, CoreError> {
        let grant = self.fetch(credentials).await?;
        let update = PartnerTokenUpdate {
            access_token: grant.access_token,
            token_type: grant.token_type,
            expires_in: expires_in_from_upstream(grant.expires_in)?,
            updated_at: self.clock.now(),
        };

        let refreshed = self.store.update_partner(partner.id, &update).await?;
        tracing::info!(
            client_id = %refreshed.client_id,
            access_token = token_prefix(&refreshed.access_token),
            expires_in = refreshed.expires_in,
            "Partner token refreshed"
        );
        Ok(refreshed)
    }

    async fn fetch(&self, credentials: &ClientCredentials) -> Result<TokenGrant, CoreError> {
        self.endpoint
            .fetch_client_credentials(credentials)
            .await
            .map_err(|e| match e {
                CoreError::UpstreamUnavailable(_) => e,
                other => CoreError::UpstreamUnavailable(other.to_string()),
            })
            .inspect_err(|e| {
                tracing::warn!(
                    client_id = %credentials.client_id,
                    error = %e,
                    "Partner token request failed"
                );
            })
    }

    fn refresh_lock(&self, client_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(client_id.to_string()).or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::{MemoryStore, ScriptedTokenEndpoint, UpstreamCall};
    use crate::types::{DbId, Timestamp};

    fn t0() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2025, 8, 21, 7, 47, 43).unwrap()
    }

    struct Harness {
        store: Arc<MemoryStore>,
        endpoint: Arc<ScriptedTokenEndpoint>,
        clock: Arc<ManualClock>,
        manager: PartnerTokenManager,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let endpoint = Arc::new(ScriptedTokenEndpoint::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = PartnerTokenManager::new(
            store.clone(),
            endpoint.clone(),
            clock.clone(),
            [ClientCredentials::new("abc", "secret")],
        );
        Harness {
            store,
            endpoint,
            clock,
            manager,
        }
    }

    impl Harness {
        fn at(&self, secs: i64) {
            self.clock.set(t0() + Duration::seconds(secs));
        }
    }

    #[tokio::test]
    async fn scenario_cache_then_refresh() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 3600));
        h.endpoint.push_grant(TokenGrant::bearer("T2", 3600));

        h.at(0);
        let first = h.manager.ensure_valid("abc").await.unwrap();
        assert_eq!(first.access_token, "T1");
        assert_eq!(first.token_type, "Bearer");
        assert_eq!(h.endpoint.call_count(), 1);

        h.at(1800);
        let cached = h.manager.ensure_valid("abc").await.unwrap();
        assert_eq!(cached.access_token, "T1");
        assert_eq!(h.endpoint.call_count(), 1);

        h.at(3601);
        let refreshed = h.manager.ensure_valid("abc").await.unwrap();
        assert_eq!(refreshed.access_token, "T2");
        assert_eq!(h.endpoint.call_count(), 2);
    }

    #[tokio::test]
    async fn refreshed_token_is_not_immediately_stale() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 3600));
        h.endpoint.push_grant(TokenGrant::bearer("T2", 3600));

        h.at(0);
        h.manager.ensure_valid("abc").await.unwrap();
        h.at(3601);
        h.manager.ensure_valid("abc").await.unwrap();
        h.at(3602);
        let again = h.manager.ensure_valid("abc").await.unwrap();

        assert_eq!(again.access_token, "T2");
        assert_eq!(h.endpoint.call_count(), 2);
    }

    #[tokio::test]
    async fn boundary_instant_counts_as_expired() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 3600));
        h.endpoint.push_grant(TokenGrant::bearer("T2", 3600));

        h.at(0);
        h.manager.ensure_valid("abc").await.unwrap();
        h.at(3599);
        assert_eq!(h.manager.ensure_valid("abc").await.unwrap().access_token, "T1");
        h.at(3600);
        assert_eq!(h.manager.ensure_valid("abc").await.unwrap().access_token, "T2");
    }

    #[tokio::test]
    async fn refresh_keeps_identity_fields() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 60));
        let mut second = TokenGrant::bearer("T2", 7200);
        second.token_type = "bearer".to_string();
        h.endpoint.push_grant(second);

        h.at(0);
        let before = h.manager.ensure_valid("abc").await.unwrap();
        h.at(120);
        let after = h.manager.ensure_valid("abc").await.unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.client_id, before.client_id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.expires_in, 7200);
        assert_eq!(after.token_type, "bearer");
        assert_eq!(after.updated_at, t0() + Duration::seconds(120));
        assert_eq!(h.store.partner_count().await, 1);
    }

    #[tokio::test]
    async fn created_partner_round_trips_through_store() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 3600));

        let created = h.manager.ensure_valid("abc").await.unwrap();
        let stored = h.store.find_partner("abc").await.unwrap().unwrap();

        assert_eq!(stored.client_id, created.client_id);
        assert_eq!(stored.access_token, created.access_token);
        assert_eq!(stored.token_type, created.token_type);
        assert_eq!(stored.created_at, t0());
    }

    #[tokio::test]
    async fn upstream_failure_on_first_fetch_stores_nothing() {
        let h = harness();
        h.endpoint.push_failure("connection refused");

        let err = h.manager.ensure_valid("abc").await.unwrap_err();
        assert_matches!(err, CoreError::UpstreamUnavailable(_));
        assert_eq!(h.store.partner_count().await, 0);
    }

    #[tokio::test]
    async fn upstream_failure_on_refresh_has_no_stale_fallback() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 60));
        h.endpoint.push_failure("503 Service Unavailable");

        h.at(0);
        h.manager.ensure_valid("abc").await.unwrap();
        h.at(61);
        let err = h.manager.ensure_valid("abc").await.unwrap_err();
        assert_matches!(err, CoreError::UpstreamUnavailable(_));

        let stored = h.store.find_partner("abc").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "T1");
        assert_eq!(stored.updated_at, t0());
    }

    #[tokio::test]
    async fn unusable_upstream_lifetime_is_rejected() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", -1));

        assert_matches!(
            h.manager.ensure_valid("abc").await,
            Err(CoreError::UpstreamUnavailable(_))
        );
        assert_eq!(h.store.partner_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_client_is_not_found_without_upstream_call() {
        let h = harness();
        assert_matches!(
            h.manager.ensure_valid("nope").await,
            Err(CoreError::NotFound { entity: "PartnerCredentials", .. })
        );
        assert_eq!(h.endpoint.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_stored_lifetime_is_validation_failure() {
        let h = harness();
        h.store
            .create_partner(&NewPartner {
                client_id: "abc".to_string(),
                access_token: "T0".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: -30,
                created_at: t0(),
            })
            .await
            .unwrap();

        assert_matches!(
            h.manager.ensure_valid("abc").await,
            Err(CoreError::Validation(_))
        );
        assert_eq!(h.endpoint.call_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let h = harness();
        h.endpoint.push_grant(TokenGrant::bearer("T1", 3600));

        let (a, b, c) = tokio::join!(
            h.manager.ensure_valid("abc"),
            h.manager.ensure_valid("abc"),
            h.manager.ensure_valid("abc"),
        );

        assert_eq!(a.unwrap().access_token, "T1");
        assert_eq!(b.unwrap().access_token, "T1");
        assert_eq!(c.unwrap().access_token, "T1");
        assert_eq!(
            h.endpoint.calls(),
            vec![UpstreamCall::ClientCredentials {
                client_id: "abc".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn initialize_seeds_every_configured_client() {
        let store = Arc::new(MemoryStore::new());
        let endpoint = Arc::new(ScriptedTokenEndpoint::new());
        endpoint.push_grant(TokenGrant::bearer("A", 3600));
        endpoint.push_grant(TokenGrant::bearer("B", 3600));
        let manager = PartnerTokenManager::new(
            store.clone(),
            endpoint.clone(),
            Arc::new(ManualClock::new(t0())),
            [
                ClientCredentials::new("zeta", "s2"),
                ClientCredentials::new("alpha", "s1"),
            ],
        );

        let partners = manager.initialize().await.unwrap();

        assert_eq!(manager.client_ids(), vec!["alpha", "zeta"]);
        assert_eq!(partners[0].client_id, "alpha");
        assert_eq!(partners[0].access_token, "A");
        assert_eq!(partners[1].client_id, "zeta");
        assert_eq!(store.partner_count().await, 2);
    }

    /// Hides the stored row on the first lookup, as if another process
    /// inserted it between our read and our write.
    struct RacingStore {
        inner: MemoryStore,
        hidden_once: AtomicBool,
    }

    #[async_trait]
    impl PartnerStore for RacingStore {
        async fn find_partner(&self, client_id: &str) -> Result<Option<Partner>, CoreError> {
            if !self.hidden_once.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_partner(client_id).await
        }

        async fn create_partner(&self, input: &NewPartner) -> Result<Partner, CoreError> {
            self.inner.create_partner(input).await
        }

        async fn update_partner(
            &self,
            id: DbId,
            update: &PartnerTokenUpdate,
        ) -> Result<Partner, CoreError> {
            self.inner.update_partner(id, update).await
        }
    }

    #[tokio::test]
    async fn create_conflict_returns_row_written_by_other_process() {
        let inner = MemoryStore::new();
        inner
            .create_partner(&NewPartner {
                client_id: "abc".to_string(),
                access_token: "WINNER".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
                created_at: t0(),
            })
            .await
            .unwrap();
        let store = Arc::new(RacingStore {
            inner,
            hidden_once: AtomicBool::new(false),
        });
        let endpoint = Arc::new(ScriptedTokenEndpoint::new());
        endpoint.push_grant(TokenGrant::bearer("LOSER", 3600));
        let manager = PartnerTokenManager::new(
            store,
            endpoint,
            Arc::new(ManualClock::new(t0())),
            [ClientCredentials::new("abc", "secret")],
        );

        let partner = manager.ensure_valid("abc").await.unwrap();
        assert_eq!(partner.access_token, "WINNER");
    }
}
