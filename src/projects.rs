// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Projects
//!
//! Project creation is the only way to become an owner: the creator is bound
//! to `owners-<project_id>` in the same operation. Deleting a project removes
//! its bindings, its service accounts and their tokens.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{Access, ProjectAccess};
use crate::auth::{roles::extract_group_prefix, GroupPrefix, UserInfo};
use crate::error::ApiError;
use crate::membership::binding_name;
use crate::models::{ApiProject, ApiUser, OwnerReference, Project, UserProjectBinding};
use crate::storage::{BindingStore, ProjectStore, UserStore};

/// Length of generated project IDs.
const PROJECT_ID_LEN: usize = 10;

pub struct ProjectManager {
    access: ProjectAccess,
    projects: Arc<dyn ProjectStore>,
    users: Arc<dyn UserStore>,
    bindings: Arc<dyn BindingStore>,
}

impl ProjectManager {
    pub fn new(
        access: ProjectAccess,
        projects: Arc<dyn ProjectStore>,
        users: Arc<dyn UserStore>,
        bindings: Arc<dyn BindingStore>,
    ) -> Self {
        Self {
            access,
            projects,
            users,
            bindings,
        }
    }

    /// Create a project owned by `caller`.
    pub async fn create(&self, caller: &UserInfo, name: &str) -> Result<ApiProject, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("the name of the project cannot be empty"));
        }
        if caller.is_service_account() {
            return Err(ApiError::forbidden("the Service Account is not allowed to create a project"));
        }

        let id = Uuid::new_v4().simple().to_string()[..PROJECT_ID_LEN].to_string();
        let project = self.projects.create_project(Project::new(id, name)).await?;

        let binding = UserProjectBinding {
            name: binding_name(&project.id, &caller.email, GroupPrefix::Owners),
            project_id: project.id.clone(),
            user_email: caller.email.clone(),
            group: GroupPrefix::Owners.group_name_for(&project.id),
            owner: Some(OwnerReference::project(&project.id)),
        };
        if let Err(err) = self.bindings.create_binding(binding).await {
            if let Err(cleanup) = self.projects.delete_project(&project.id).await {
                warn!(project_id = %project.id, error = %cleanup, "failed to remove project without owner");
            }
            return Err(err.into());
        }

        info!(project_id = %project.id, owner = %caller.email, "project created");
        let owners = self.owners(&project).await?;
        Ok(ApiProject::new(&project, owners))
    }

    /// Projects the caller is bound to, sorted by name.
    pub async fn list(&self, caller: &UserInfo) -> Result<Vec<ApiProject>, ApiError> {
        let bindings = self.bindings.list_user_bindings(&caller.email).await?;
        let mut projects = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match self.projects.get_project(&binding.project_id).await {
                Ok(project) => {
                    let owners = self.owners(&project).await?;
                    projects.push(ApiProject::new(&project, owners));
                }
                Err(err) => warn!(binding = %binding.name, error = %err, "binding refers to a missing project"),
            }
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    pub async fn get(&self, caller: &UserInfo, project_id: &str) -> Result<ApiProject, ApiError> {
        let project = self.access.check(caller, project_id, Access::Member).await?;
        let owners = self.owners(&project).await?;
        Ok(ApiProject::new(&project, owners))
    }

    /// Delete the project together with its service accounts.
    pub async fn delete(&self, caller: &UserInfo, project_id: &str) -> Result<(), ApiError> {
        let project = self.access.check(caller, project_id, Access::Owner).await?;

        for binding in self.bindings.list_project_bindings(&project.id).await? {
            let Some(user) = self.users.find_user_by_email(&binding.user_email).await? else {
                continue;
            };
            if user.is_service_account() {
                self.users.delete_user(&user.id).await?;
            }
        }
        self.projects.delete_project(&project.id).await?;

        info!(project_id = %project.id, "project deleted");
        Ok(())
    }

    async fn owners(&self, project: &Project) -> Result<Vec<ApiUser>, ApiError> {
        let mut owners = Vec::new();
        for binding in self.bindings.list_project_bindings(&project.id).await? {
            if extract_group_prefix(&binding.group) != GroupPrefix::Owners.as_str() {
                continue;
            }
            if let Some(user) = self.users.find_user_by_email(&binding.user_email).await? {
                owners.push(ApiUser::from_bindings(&user, std::slice::from_ref(&binding)));
            }
        }
        Ok(owners)
    }
}
