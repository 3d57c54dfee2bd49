// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project membership endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{AddMemberRequest, ApiUser, EditMemberRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/users",
    params(("project_id" = String, Path, description = "Project ID")),
    tag = "Members",
    security(("bearer" = [])),
    responses(
        (status = 200, body = [ApiUser]),
        (status = 403, description = "Caller is not a member of the project"),
        (status = 404, description = "Project not found"),
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<ApiUser>>, ApiError> {
    let members = state.members.list(&caller.user_info(), &project_id).await?;
    Ok(Json(members))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/users",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body = AddMemberRequest,
    tag = "Members",
    security(("bearer" = [])),
    responses(
        (status = 201, body = ApiUser),
        (status = 400, description = "Invalid request, unknown user or already a member"),
        (status = 403, description = "Self assignment, owners group or caller is not an owner"),
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(project_id): Path<String>,
    Json(request): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<ApiUser>), ApiError> {
    let member = state
        .members
        .add(&caller.user_info(), &project_id, &request.email, &request.group)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project_id}/users/{user_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("user_id" = String, Path, description = "ID of the member to change")
    ),
    request_body = EditMemberRequest,
    tag = "Members",
    security(("bearer" = [])),
    responses(
        (status = 200, body = ApiUser),
        (status = 400, description = "Invalid group, unknown user or not a member"),
        (status = 403, description = "Self edit or caller is not an owner"),
    )
)]
pub async fn edit_member(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, user_id)): Path<(String, String)>,
    Json(request): Json<EditMemberRequest>,
) -> Result<Json<ApiUser>, ApiError> {
    let member = state
        .members
        .edit(&caller.user_info(), &project_id, &user_id, &request.group)
        .await?;
    Ok(Json(member))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project_id}/users/{user_id}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("user_id" = String, Path, description = "ID of the member to remove")
    ),
    tag = "Members",
    security(("bearer" = [])),
    responses(
        (status = 204),
        (status = 400, description = "User is not a member"),
        (status = 403, description = "Self removal or caller is not an owner"),
        (status = 404, description = "Project or user not found"),
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((project_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .members
        .delete(&caller.user_info(), &project_id, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
