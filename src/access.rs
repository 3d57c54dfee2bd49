// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project access checks shared by the membership and service account
//! managers.

use std::sync::Arc;

use crate::auth::{roles::extract_group_prefix, GroupPrefix, UserInfo};
use crate::error::ApiError;
use crate::models::Project;
use crate::storage::{BindingStore, ProjectStore, StoreError};

/// Level of access an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any binding in the project
    Member,
    /// A binding in the owners group
    Owner,
}

#[derive(Clone)]
pub struct ProjectAccess {
    projects: Arc<dyn ProjectStore>,
    bindings: Arc<dyn BindingStore>,
}

impl ProjectAccess {
    pub fn new(projects: Arc<dyn ProjectStore>, bindings: Arc<dyn BindingStore>) -> Self {
        Self { projects, bindings }
    }

    /// Load the project and check `caller` may act on it.
    ///
    /// Admins pass unconditionally once the project exists.
    pub async fn check(&self, caller: &UserInfo, project_id: &str, access: Access) -> Result<Project, ApiError> {
        let project = self.projects.get_project(project_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::not_found(format!("project {project_id} not found")),
            other => other.into(),
        })?;
        if caller.is_admin {
            return Ok(project);
        }

        let binding = self
            .bindings
            .find_binding(project_id, &caller.email)
            .await?
            .ok_or_else(|| ApiError::forbidden(format!("forbidden: {} is not a member of project {project_id}", caller.email)))?;

        if access == Access::Owner && extract_group_prefix(&binding.group) != GroupPrefix::Owners.as_str() {
            return Err(ApiError::forbidden(format!(
                "forbidden: {} is not an owner of project {project_id}",
                caller.email
            )));
        }
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OwnerReference, UserProjectBinding};
    use crate::storage::InMemoryStore;
    use axum::http::StatusCode;

    async fn setup() -> ProjectAccess {
        let store = Arc::new(InMemoryStore::new());
        store.create_project(Project::new("p1", "one")).await.unwrap();
        for (email, prefix) in [("owner@acme.com", GroupPrefix::Owners), ("viewer@acme.com", GroupPrefix::Viewers)] {
            store
                .create_binding(UserProjectBinding {
                    name: format!("b-{email}"),
                    project_id: "p1".into(),
                    user_email: email.into(),
                    group: prefix.group_name_for("p1"),
                    owner: Some(OwnerReference::project("p1")),
                })
                .await
                .unwrap();
        }
        ProjectAccess::new(store.clone(), store)
    }

    #[tokio::test]
    async fn owner_passes_owner_check() {
        let access = setup().await;
        let project = access
            .check(&UserInfo::new("owner@acme.com"), "p1", Access::Owner)
            .await
            .unwrap();
        assert_eq!(project.id, "p1");
    }

    #[tokio::test]
    async fn viewer_is_member_but_not_owner() {
        let access = setup().await;
        let viewer = UserInfo::new("viewer@acme.com");
        assert!(access.check(&viewer, "p1", Access::Member).await.is_ok());
        let err = access.check(&viewer, "p1", Access::Owner).await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn outsider_is_forbidden_and_admin_is_not() {
        let access = setup().await;
        let err = access
            .check(&UserInfo::new("eve@evil.com"), "p1", Access::Member)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(access
            .check(&UserInfo::admin("root@acme.com"), "p1", Access::Owner)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let access = setup().await;
        let err = access
            .check(&UserInfo::admin("root@acme.com"), "nope", Access::Member)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
