// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiProject, CreateProjectRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/projects",
    tag = "Projects",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Projects the caller is bound to", body = [ApiProject]),
    )
)]
pub async fn list_projects(State(state): State<AppState>, Auth(caller): Auth) -> Result<Json<Vec<ApiProject>>, ApiError> {
    let projects = state.projects.list(&caller.user_info()).await?;
    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/v1/projects",
    request_body = CreateProjectRequest,
    tag = "Projects",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Project created, caller is its owner", body = ApiProject),
        (status = 400, description = "Empty project name"),
        (status = 403, description = "Service accounts cannot create projects"),
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ApiProject>), ApiError> {
    let project = state.projects.create(&caller.user_info(), &request.name).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project ID")),
    tag = "Projects",
    security(("bearer" = [])),
    responses(
        (status = 200, body = ApiProject),
        (status = 403, description = "Caller is not a member of the project"),
        (status = 404, description = "Project not found"),
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(project_id): Path<String>,
) -> Result<Json<ApiProject>, ApiError> {
    let project = state.projects.get(&caller.user_info(), &project_id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project ID")),
    tag = "Projects",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project deleted with its bindings and service accounts"),
        (status = 403, description = "Caller is not an owner"),
        (status = 404, description = "Project not found"),
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(project_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.projects.delete(&caller.user_info(), &project_id).await?;
    Ok(StatusCode::OK)
}
