// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service account token endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiServiceAccountToken, PublicServiceAccountToken, TokenNameRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}/tokens",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID")
    ),
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [PublicServiceAccountToken]),
        (status = 403, description = "Caller is not an owner"),
        (status = 404, description = "Project or service account not found"),
    )
)]
pub async fn list_tokens(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id)): Path<(String, String)>,
) -> Result<Json<Vec<PublicServiceAccountToken>>, ApiError> {
    let tokens = state.tokens.list(&caller.user_info(), &project_id, &sa_id).await?;
    Ok(Json(tokens))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}/tokens",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID")
    ),
    request_body = TokenNameRequest,
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Token created; the secret is only returned here and on update", body = ApiServiceAccountToken),
        (status = 400, description = "Invalid token name"),
        (status = 409, description = "Token name already used"),
    )
)]
pub async fn create_token(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id)): Path<(String, String)>,
    Json(request): Json<TokenNameRequest>,
) -> Result<(StatusCode, Json<ApiServiceAccountToken>), ApiError> {
    let token = state
        .tokens
        .create(&caller.user_info(), &project_id, &sa_id, &request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}/tokens/{token_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID"),
        ("token_id" = String, Path, description = "Token ID")
    ),
    request_body = TokenNameRequest,
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token renamed and secret regenerated", body = ApiServiceAccountToken),
        (status = 404, description = "Token not found"),
        (status = 409, description = "Token name already used"),
    )
)]
pub async fn update_token(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id, token_id)): Path<(String, String, String)>,
    Json(request): Json<TokenNameRequest>,
) -> Result<Json<ApiServiceAccountToken>, ApiError> {
    let token = state
        .tokens
        .update(&caller.user_info(), &project_id, &sa_id, &token_id, &request.name)
        .await?;
    Ok(Json(token))
}

#[utoipa::path(
    patch,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}/tokens/{token_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID"),
        ("token_id" = String, Path, description = "Token ID")
    ),
    request_body = TokenNameRequest,
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token renamed", body = PublicServiceAccountToken),
        (status = 404, description = "Token not found"),
        (status = 409, description = "Token name already used"),
    )
)]
pub async fn patch_token(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id, token_id)): Path<(String, String, String)>,
    Json(request): Json<TokenNameRequest>,
) -> Result<Json<PublicServiceAccountToken>, ApiError> {
    let token = state
        .tokens
        .rename(&caller.user_info(), &project_id, &sa_id, &token_id, &request.name)
        .await?;
    Ok(Json(token))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}/tokens/{token_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID"),
        ("token_id" = String, Path, description = "Token ID")
    ),
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 404, description = "Token not found"),
    )
)]
pub async fn delete_token(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id, token_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .tokens
        .delete(&caller.user_info(), &project_id, &sa_id, &token_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::testing::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    fn tokens_uri() -> String {
        format!("/v1/projects/{PROJECT}/serviceaccounts/{SA_ID}/tokens")
    }

    #[tokio::test]
    async fn service_account_token_authenticates_until_revoked() {
        let app = router(seeded_state().await);
        let (status, created) = send(
            &app,
            Method::POST,
            &tokens_uri(),
            Some(BOB_TOKEN),
            Some(json!({"name": "ci"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let secret = created["token"].as_str().unwrap().to_string();
        let token_id = created["id"].as_str().unwrap().to_string();

        // The service account is an editor in the project.
        let (status, me) = send(&app, Method::GET, "/v1/me", Some(&secret), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], SA_EMAIL);
        assert_eq!(me["projects"][0]["group"], "editors");

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("{}/{token_id}", tokens_uri()),
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::GET, "/v1/me", Some(&secret), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_update_and_patch() {
        let app = router(seeded_state().await);
        let (_, created) = send(
            &app,
            Method::POST,
            &tokens_uri(),
            Some(BOB_TOKEN),
            Some(json!({"name": "ci"})),
        )
        .await;
        let token_id = created["id"].as_str().unwrap().to_string();

        let (status, list) = send(&app, Method::GET, &tokens_uri(), Some(BOB_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["name"], "ci");
        assert!(list[0].get("token").is_none());

        let (status, patched) = send(
            &app,
            Method::PATCH,
            &format!("{}/{token_id}", tokens_uri()),
            Some(BOB_TOKEN),
            Some(json!({"name": "ci-renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["name"], "ci-renamed");
        assert!(patched.get("token").is_none());

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("{}/{token_id}", tokens_uri()),
            Some(BOB_TOKEN),
            Some(json!({"name": "ci-new"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "ci-new");
        assert_ne!(updated["token"], created["token"]);
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let app = router(seeded_state().await);
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let (status, _) = send(
                &app,
                Method::POST,
                &tokens_uri(),
                Some(BOB_TOKEN),
                Some(json!({"name": "ci"})),
            )
            .await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let app = router(seeded_state().await);
        let (_, created) = send(
            &app,
            Method::POST,
            &tokens_uri(),
            Some(BOB_TOKEN),
            Some(json!({"name": "ci"})),
        )
        .await;
        let secret = created["token"].as_str().unwrap().to_string();

        // an editor service account cannot mint tokens for itself
        let (status, _) = send(
            &app,
            Method::POST,
            &tokens_uri(),
            Some(&secret),
            Some(json!({"name": "escalate"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
