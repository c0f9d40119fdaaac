//! Handlers for the `/authorize` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use fleetbroker_core::authorization::{
    AuthorizationRecord, ClientUpdateRequest, NewAuthorizationRecord, RedirectParams,
};
use fleetbroker_core::partner::token_prefix;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRequest {
    pub client_id: String,
}

/// Redirect parameters plus the ready-to-use consent page URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectResponse {
    #[serde(flatten)]
    pub params: RedirectParams,
    pub authorize_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub client_id: String,
    pub scope: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTokenRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
}

/// POST /api/v1/authorize
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<NewAuthorizationRecord>,
) -> AppResult<(StatusCode, Json<AuthorizationRecord>)> {
    let record = state.flow.register_client(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/v1/authorize/{client_id}
pub async fn update(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Json(input): Json<ClientUpdateRequest>,
) -> AppResult<Json<AuthorizationRecord>> {
    let record = state.flow.update_client(&client_id, input).await?;
    Ok(Json(record))
}

/// POST /api/v1/authorize/redirect
pub async fn redirect(
    State(state): State<AppState>,
    Json(input): Json<RedirectRequest>,
) -> AppResult<Json<RedirectResponse>> {
    let params = state.flow.prepare_redirect(&input.client_id).await?;
    let authorize_url = fleetbroker_fleet::authorize::authorize_url(
        &state.fleet.authorize_url,
        &params,
        &state.fleet.authorize_locale,
    )
    .map_err(|e| AppError::InternalError(e.to_string()))?;
    Ok(Json(RedirectResponse {
        params,
        authorize_url,
    }))
}

/// GET /api/v1/authorize/callback?code=...&state=...
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Json<CallbackResponse>> {
    tracing::info!(
        code = token_prefix(&query.code),
        state = query.state.as_deref().unwrap_or(""),
        "Authorization callback received"
    );
    let token = state.flow.exchange_code(&query.code).await?;
    Ok(Json(CallbackResponse {
        client_id: token.client_id,
        scope: token.scope,
    }))
}

/// POST /api/v1/authorize/token/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(input): Json<UserTokenRequest>,
) -> AppResult<Json<UserTokenResponse>> {
    let token = state.flow.refresh_user_token(&input.access_token).await?;
    Ok(Json(UserTokenResponse {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        scope: token.scope,
    }))
}

/// POST /api/v1/authorize/token/revoke
pub async fn revoke_token(
    State(state): State<AppState>,
    Json(input): Json<UserTokenRequest>,
) -> AppResult<StatusCode> {
    state.flow.revoke_user_token(&input.access_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
