// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::storage::ProjectStore;

/// Readiness response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Backing store reachability.
    pub store: String,
    /// OIDC signing keys. Only present when an issuer is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_store(state: &AppState) -> String {
    match state.store.list_projects().await {
        Ok(_) => "ok".to_string(),
        Err(_) => "unavailable".to_string(),
    }
}

async fn check_jwks(state: &AppState) -> Option<String> {
    let jwks = state.jwks.as_ref()?;
    if jwks.is_cached().await {
        return Some("ok".to_string());
    }
    match jwks.refresh().await {
        Ok(_) => Some("ok".to_string()),
        Err(_) => Some("unavailable".to_string()),
    }
}

/// Liveness probe. Always 200 while the process runs.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe. 503 when the store or the OIDC keys are unavailable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let store = check_store(&state).await;
    let jwks = check_jwks(&state).await;

    let all_ok = store == "ok" && jwks.as_deref().is_none_or(|s| s == "ok");
    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks { store, jwks },
    };
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::seeded_state;

    #[tokio::test]
    async fn liveness_returns_ok() {
        let Json(response) = liveness().await;
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn ready_without_oidc() {
        let (status, Json(response)) = readiness(State(seeded_state().await)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.checks.store, "ok");
        assert!(response.checks.jwks.is_none());
    }

    #[tokio::test]
    async fn unreachable_issuer_degrades_readiness() {
        let mut state = seeded_state().await;
        state.jwks = Some(std::sync::Arc::new(
            crate::auth::JwksManager::for_issuer("http://127.0.0.1:1").unwrap(),
        ));
        let (status, Json(response)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status, "degraded");
        assert_eq!(response.checks.jwks.as_deref(), Some("unavailable"));
    }
}
