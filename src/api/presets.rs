// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential preset endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    presets::{CloudSpec, ProviderKind},
    state::AppState,
};

/// Credential names offered to the caller for one provider.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CredentialList {
    pub names: Vec<String>,
}

/// Fill `cloud` with the secrets of the named credential.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CloudCredentialsRequest {
    pub credential: String,
    pub cloud: CloudSpec,
}

#[utoipa::path(
    get,
    path = "/v1/providers/{provider}/presets/credentials",
    params(("provider" = String, Path, description = "Provider name, e.g. aws")),
    tag = "Presets",
    security(("bearer" = [])),
    responses(
        (status = 200, body = CredentialList),
        (status = 400, description = "Unknown provider"),
    )
)]
pub async fn list_credentials(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(provider): Path<String>,
) -> Result<Json<CredentialList>, ApiError> {
    let kind = ProviderKind::parse(&provider)
        .ok_or_else(|| ApiError::bad_request(format!("invalid provider name {provider}")))?;
    let names = state.presets.credential_names(&caller.user_info(), kind).await?;
    Ok(Json(CredentialList { names }))
}

#[utoipa::path(
    post,
    path = "/v1/presets/cloud-credentials",
    request_body = CloudCredentialsRequest,
    tag = "Presets",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Cloud spec with the credential applied", body = CloudSpec),
        (status = 400, description = "No single provider set, or the provider has no credentials"),
        (status = 404, description = "No visible preset or no credential with that name"),
    )
)]
pub async fn set_cloud_credentials(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(request): Json<CloudCredentialsRequest>,
) -> Result<Json<CloudSpec>, ApiError> {
    let cloud = state
        .presets
        .set_cloud_credentials(&caller.user_info(), &request.credential, &request.cloud)
        .await?;
    Ok(Json(cloud))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::testing::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn lists_credential_names() {
        let app = router(seeded_state().await);
        let (status, body) = send(
            &app,
            Method::GET,
            "/v1/providers/fake/presets/credentials",
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["names"], json!(["test"]));

        let (status, body) = send(
            &app,
            Method::GET,
            "/v1/providers/aws/presets/credentials",
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["names"], json!([]));

        let (status, _) = send(
            &app,
            Method::GET,
            "/v1/providers/alibaba/presets/credentials",
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn domain_preset_fills_cloud_spec() {
        let app = router(seeded_state().await);
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/presets/cloud-credentials",
            Some(BOB_TOKEN),
            Some(json!({"credential": "test", "cloud": {"datacenterName": "dc-1", "fake": {}}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fake"]["token"], "acme-token");
        assert_eq!(body["datacenterName"], "dc-1");
    }

    #[tokio::test]
    async fn provider_errors_keep_their_kind() {
        let app = router(seeded_state().await);
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/presets/cloud-credentials",
            Some(BOB_TOKEN),
            Some(json!({"credential": "test", "cloud": {"fake": {}, "aws": {}}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "can not find provider to set credentials");

        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/presets/cloud-credentials",
            Some(BOB_TOKEN),
            Some(json!({"credential": "missing", "cloud": {"fake": {}}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
