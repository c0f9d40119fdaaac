//! Route definitions for the `/partner` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::partner;
use crate::state::AppState;

/// Routes mounted at `/partner`.
///
/// ```text
/// GET    /{client_id}/token  -> get_token
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{client_id}/token", get(partner::get_token))
}
