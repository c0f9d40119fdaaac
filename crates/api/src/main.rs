use std::net::SocketAddr;
use std::sync::Arc;

use fleetbroker_api::config::ServerConfig;
use fleetbroker_api::router::build_app_router;
use fleetbroker_api::state::AppState;
use fleetbroker_core::clock::SystemClock;
use fleetbroker_core::partner::token_prefix;
use fleetbroker_db::PgCredentialStore;
use fleetbroker_fleet::{FleetAuthClient, FleetConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fleetbroker_api=debug,fleetbroker_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let fleet_config = FleetConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        token_url = %fleet_config.token_url,
        audience = %fleet_config.audience,
        client_configured = fleet_config.credentials().is_some(),
        "Loaded fleet configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fleetbroker_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fleetbroker_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fleetbroker_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Upstream client ---
    let fleet = Arc::new(
        FleetAuthClient::new(fleet_config.clone()).expect("Failed to build fleet HTTP client"),
    );

    // --- App state ---
    let store = Arc::new(PgCredentialStore::new(pool));
    let state = AppState::new(
        store,
        Arc::clone(&fleet),
        Arc::new(SystemClock),
        fleet_config,
        config.clone(),
    );

    // --- Partner tokens ---
    initialize_partners(&state, &fleet).await;

    // --- Start server ---
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Fetch or refresh every configured partner token and, when a partner
/// domain is configured, register it with the fleet API.
///
/// Failures are logged only; tokens are then fetched on first use.
async fn initialize_partners(state: &AppState, fleet: &FleetAuthClient) {
    let partners = match state.partners.initialize().await {
        Ok(partners) => partners,
        Err(e) => {
            tracing::error!(error = %e, "Partner initialization failed");
            return;
        }
    };

    let Some(domain) = state.fleet.partner_domain.as_deref() else {
        return;
    };
    for partner in &partners {
        match fleet.register_partner_domain(partner, domain).await {
            Ok(_) => tracing::info!(client_id = %partner.client_id, domain, "Partner domain registered"),
            Err(e) => {
                tracing::warn!(client_id = %partner.client_id, domain, error = %e, "Partner domain registration failed");
                continue;
            }
        }
        match fleet.partner_public_key(partner, domain).await {
            Ok(key) => tracing::info!(
                client_id = %partner.client_id,
                domain,
                public_key = token_prefix(&key),
                "Partner public key confirmed"
            ),
            Err(e) => tracing::warn!(client_id = %partner.client_id, domain, error = %e, "Partner public key lookup failed"),
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
