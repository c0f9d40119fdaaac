use std::sync::Arc;

use fleetbroker_core::clock::Clock;
use fleetbroker_core::flow::AuthorizationFlow;
use fleetbroker_core::store::CredentialStore;
use fleetbroker_core::token_manager::PartnerTokenManager;
use fleetbroker_core::upstream::TokenEndpoint;
use fleetbroker_fleet::FleetConfig;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for partners, clients and user tokens.
    pub store: Arc<dyn CredentialStore>,
    /// Partner token cache.
    pub partners: Arc<PartnerTokenManager>,
    /// Authorization-code flow for end users.
    pub flow: Arc<AuthorizationFlow>,
    /// Provider endpoints (consent page URL, locale).
    pub fleet: Arc<FleetConfig>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the services over one store, one token endpoint and one clock.
    ///
    /// The partner registry and the callback client both come from the
    /// application credentials in `fleet`.
    pub fn new<S, E>(
        store: Arc<S>,
        endpoint: Arc<E>,
        clock: Arc<dyn Clock>,
        fleet: FleetConfig,
        config: ServerConfig,
    ) -> Self
    where
        S: CredentialStore + 'static,
        E: TokenEndpoint + 'static,
    {
        let partners = PartnerTokenManager::new(
            store.clone(),
            endpoint.clone(),
            clock.clone(),
            fleet.credentials(),
        );
        let flow = AuthorizationFlow::new(
            store.clone(),
            store.clone(),
            endpoint,
            clock,
            fleet.client_id.clone(),
        );
        Self {
            store,
            partners: Arc::new(partners),
            flow: Arc::new(flow),
            fleet: Arc::new(fleet),
            config: Arc::new(config),
        }
    }
}
