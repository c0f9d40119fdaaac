//! Handlers for the `/partner` resource.

use axum::extract::{Path, State};
use axum::Json;
use fleetbroker_core::types::Timestamp;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// Status of a partner token that is valid at response time.
///
/// The access token stays inside the broker.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerTokenResponse {
    pub client_id: String,
    pub token_type: String,
    pub expires_in: i32,
    pub expires_at: Timestamp,
}

/// GET /api/v1/partner/{client_id}/token
pub async fn get_token(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> AppResult<Json<PartnerTokenResponse>> {
    let partner = state.partners.ensure_valid(&client_id).await?;
    let expires_at = partner.expires_at()?;
    Ok(Json(PartnerTokenResponse {
        client_id: partner.client_id,
        token_type: partner.token_type,
        expires_in: partner.expires_in,
        expires_at,
    }))
}
