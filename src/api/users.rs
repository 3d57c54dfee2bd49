// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Current user endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::auth::service_account::DEFAULT_TOKEN_LIFETIME;
use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{ApiUser, UserSettings};
use crate::state::AppState;
use crate::storage::{BindingStore, UserStore};

/// Get the authenticated user with every project membership.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiUser),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn me(State(state): State<AppState>, Auth(caller): Auth) -> Result<Json<ApiUser>, ApiError> {
    let bindings = state.store.list_user_bindings(&caller.user.email).await?;
    Ok(Json(ApiUser::from_bindings(&caller.user, &bindings)))
}

#[utoipa::path(
    get,
    path = "/v1/me/settings",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Stored settings, empty when never set", body = UserSettings),
    )
)]
pub async fn get_settings(State(state): State<AppState>, Auth(caller): Auth) -> Result<Json<UserSettings>, ApiError> {
    let user = state.store.get_user(&caller.user.id).await?;
    Ok(Json(user.settings.unwrap_or_default()))
}

/// Apply a JSON merge patch to the stored settings.
#[utoipa::path(
    patch,
    path = "/v1/me/settings",
    request_body(content = UserSettings, description = "JSON merge patch, `null` clears a field", content_type = "application/merge-patch+json"),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Settings after the patch", body = UserSettings),
        (status = 400, description = "Patch does not produce valid settings"),
    )
)]
pub async fn patch_settings(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(patch): Json<Value>,
) -> Result<Json<UserSettings>, ApiError> {
    let mut user = state.store.get_user(&caller.user.id).await?;
    let settings = user
        .settings
        .clone()
        .unwrap_or_default()
        .merge_patch(&patch)
        .map_err(|e| ApiError::bad_request(format!("cannot apply settings patch: {e}")))?;
    user.settings = Some(settings.clone());
    state.store.update_user(user).await?;
    Ok(Json(settings))
}

/// Invalidate the presented token until it expires.
#[utoipa::path(
    post,
    path = "/v1/me/logout",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Token invalidated"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn logout(State(state): State<AppState>, Auth(caller): Auth) -> Result<StatusCode, ApiError> {
    // Verified tokens normally carry `exp`; fall back to the longest lifetime we issue.
    let expiry = caller
        .token_expiry
        .unwrap_or_else(|| Utc::now() + DEFAULT_TOKEN_LIFETIME);
    state
        .store
        .invalidate_token(&caller.user.id, &caller.token, expiry)
        .await?;
    info!(user_id = %caller.user.id, "token invalidated by logout");
    Ok(StatusCode::NO_CONTENT)
}
