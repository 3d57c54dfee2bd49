// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service account endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiServiceAccount, ServiceAccountRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/serviceaccounts",
    params(("project_id" = String, Path, description = "Project ID")),
    tag = "ServiceAccounts",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [ApiServiceAccount]),
        (status = 403, description = "Caller is not a member of the project"),
        (status = 404, description = "Project not found"),
    )
)]
pub async fn list_service_accounts(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<ApiServiceAccount>>, ApiError> {
    let accounts = state.service_accounts.list(&caller.user_info(), &project_id).await?;
    Ok(Json(accounts))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/serviceaccounts",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = ServiceAccountRequest,
    tag = "ServiceAccounts",
    security(("bearer" = [])),
    responses(
        (status = 201, body = ApiServiceAccount),
        (status = 400, description = "Empty name or group other than editors and viewers"),
        (status = 403, description = "Caller is not an owner"),
        (status = 409, description = "Name already used in the project"),
    )
)]
pub async fn create_service_account(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(project_id): Path<String>,
    Json(request): Json<ServiceAccountRequest>,
) -> Result<(StatusCode, Json<ApiServiceAccount>), ApiError> {
    let account = state
        .service_accounts
        .create(&caller.user_info(), &project_id, &request.name, &request.group)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID")
    ),
    request_body = ServiceAccountRequest,
    tag = "ServiceAccounts",
    security(("bearer" = [])),
    responses(
        (status = 200, body = ApiServiceAccount),
        (status = 400, description = "Empty name or invalid group"),
        (status = 404, description = "Service account not found in the project"),
        (status = 409, description = "Name already used in the project"),
    )
)]
pub async fn update_service_account(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id)): Path<(String, String)>,
    Json(request): Json<ServiceAccountRequest>,
) -> Result<Json<ApiServiceAccount>, ApiError> {
    let account = state
        .service_accounts
        .update(&caller.user_info(), &project_id, &sa_id, &request.name, &request.group)
        .await?;
    Ok(Json(account))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project_id}/serviceaccounts/{sa_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("sa_id" = String, Path, description = "Service account ID")
    ),
    tag = "ServiceAccounts",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Service account deleted, its tokens are revoked"),
        (status = 403, description = "Caller is not an owner"),
        (status = 404, description = "Service account not found in the project"),
    )
)]
pub async fn delete_service_account(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, sa_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .service_accounts
        .delete(&caller.user_info(), &project_id, &sa_id)
        .await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::testing::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    /// From an empty store: log in, create a project, add a member, create a
    /// service account and a token, then call the API with that token.
    #[tokio::test]
    async fn project_bootstrap_from_empty_store() {
        let app = router(empty_state().await);

        // first request creates both users
        let (status, me) = send(&app, Method::GET, "/v1/me", Some(BOB_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["projects"], json!([]));
        let (status, john) = send(&app, Method::GET, "/v1/me", Some(JOHN_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, project) = send(
            &app,
            Method::POST,
            "/v1/projects",
            Some(BOB_TOKEN),
            Some(json!({ "name": "bootstrap" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let project_id = project["id"].as_str().unwrap().to_string();

        let (status, member) = send(
            &app,
            Method::POST,
            &format!("/v1/projects/{project_id}/users"),
            Some(BOB_TOKEN),
            Some(json!({ "email": "John@Acme.com", "group": "viewers" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(member["id"], john["id"]);
        assert_eq!(member["projects"][0]["group"], "viewers");

        let (status, sa) = send(
            &app,
            Method::POST,
            &format!("/v1/projects/{project_id}/serviceaccounts"),
            Some(BOB_TOKEN),
            Some(json!({ "name": "deployer", "group": "editors" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sa["group"], "editors");
        let sa_id = sa["id"].as_str().unwrap().to_string();

        // viewers see the service account but cannot mint tokens for it
        let (status, listed) = send(
            &app,
            Method::GET,
            &format!("/v1/projects/{project_id}/serviceaccounts"),
            Some(JOHN_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["id"], sa["id"]);
        let tokens_uri = format!("/v1/projects/{project_id}/serviceaccounts/{sa_id}/tokens");
        let (status, _) = send(&app, Method::POST, &tokens_uri, Some(JOHN_TOKEN), Some(json!({ "name": "ci" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, token) = send(&app, Method::POST, &tokens_uri, Some(BOB_TOKEN), Some(json!({ "name": "ci" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let secret = token["token"].as_str().unwrap().to_string();

        let (status, me) = send(&app, Method::GET, "/v1/me", Some(&secret), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], sa["email"]);
        assert_eq!(me["projects"], json!([{ "id": project_id, "group": "editors" }]));

        // service accounts cannot create projects of their own
        let (status, _) = send(&app, Method::POST, "/v1/projects", Some(&secret), Some(json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deleting_service_account_revokes_its_tokens() {
        let app = router(seeded_state().await);
        let tokens_uri = format!("/v1/projects/{PROJECT}/serviceaccounts/{SA_ID}/tokens");
        let (status, token) = send(&app, Method::POST, &tokens_uri, Some(BOB_TOKEN), Some(json!({ "name": "ci" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let secret = token["token"].as_str().unwrap().to_string();

        let uri = format!("/v1/projects/{PROJECT}/serviceaccounts/{SA_ID}");
        let (status, _) = send(&app, Method::DELETE, &uri, Some(JOHN_TOKEN), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, Method::GET, "/v1/me", Some(&secret), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, listed) = send(
            &app,
            Method::GET,
            &format!("/v1/projects/{PROJECT}/serviceaccounts"),
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn update_changes_group() {
        let app = router(seeded_state().await);
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/v1/projects/{PROJECT}/serviceaccounts/{SA_ID}"),
            Some(BOB_TOKEN),
            Some(json!({ "name": "ci", "group": "viewers" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["group"], "viewers");
    }
}
