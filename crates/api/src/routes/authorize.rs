//! Route definitions for the `/authorize` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::authorize;
use crate::state::AppState;

/// Routes mounted at `/authorize`.
///
/// ```text
/// POST   /                  -> register
/// PUT    /{client_id}       -> update
/// POST   /redirect          -> redirect
/// GET    /callback          -> callback
/// POST   /token/refresh     -> refresh_token
/// POST   /token/revoke      -> revoke_token
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(authorize::register))
        .route("/{client_id}", put(authorize::update))
        .route("/redirect", post(authorize::redirect))
        .route("/callback", get(authorize::callback))
        .route("/token/refresh", post(authorize::refresh_token))
        .route("/token/revoke", post(authorize::revoke_token))
}
