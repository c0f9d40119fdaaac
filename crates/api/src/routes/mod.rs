pub mod authorize;
pub mod health;
pub mod partner;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /authorize                         register client (POST)
/// /authorize/{client_id}             update client (PUT)
/// /authorize/redirect                consent redirect parameters (POST)
/// /authorize/callback                provider callback (GET ?code&state)
/// /authorize/token/refresh           rotate a user token (POST)
/// /authorize/token/revoke            soft-delete a user token (POST)
///
/// /partner/{client_id}/token         valid partner token (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/authorize", authorize::router())
        .nest("/partner", partner::router())
}
