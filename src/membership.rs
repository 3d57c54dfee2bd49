// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Project Membership
//!
//! Manages the bindings that give users a group in a project.
//!
//! ## Rules
//!
//! - The caller may never add, edit or delete their own binding here.
//! - `owners` can only be granted by editing an existing member; adding a
//!   new member as an owner is forbidden.
//! - A user can only be added if their user record already exists.
//! - A binding keeps its name for life, even when its group changes.
//! - Nothing stops a project from losing its last owner.
//!
//! Mutations require the caller to own the project (or be an admin);
//! listing requires any membership.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::access::{Access, ProjectAccess};
use crate::auth::{GroupPrefix, UserInfo};
use crate::error::ApiError;
use crate::models::{ApiUser, OwnerReference, UserProjectBinding};
use crate::storage::{BindingStore, StoreError, UserStore};

pub struct ProjectMembershipManager {
    access: ProjectAccess,
    users: Arc<dyn UserStore>,
    bindings: Arc<dyn BindingStore>,
}

impl ProjectMembershipManager {
    pub fn new(access: ProjectAccess, users: Arc<dyn UserStore>, bindings: Arc<dyn BindingStore>) -> Self {
        Self {
            access,
            users,
            bindings,
        }
    }

    /// All members of the project, each with only this project's group.
    pub async fn list(&self, caller: &UserInfo, project_id: &str) -> Result<Vec<ApiUser>, ApiError> {
        let project = self.access.check(caller, project_id, Access::Member).await?;
        let bindings = self.bindings.list_project_bindings(&project.id).await?;

        let mut members = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match self.users.find_user_by_email(&binding.user_email).await? {
                Some(user) => members.push(ApiUser::from_bindings(&user, std::slice::from_ref(&binding))),
                None => warn!(
                    project_id = %project.id,
                    binding = %binding.name,
                    "binding refers to a user that does not exist"
                ),
            }
        }
        Ok(members)
    }

    /// Bind an existing user to the project under `group_prefix`.
    pub async fn add(
        &self,
        caller: &UserInfo,
        project_id: &str,
        email: &str,
        group_prefix: &str,
    ) -> Result<ApiUser, ApiError> {
        validate_email(email)?;
        if email.eq_ignore_ascii_case(&caller.email) {
            return Err(ApiError::forbidden("you cannot assign yourself to a different group"));
        }
        if group_prefix == GroupPrefix::Owners.as_str() {
            return Err(ApiError::forbidden("the given user cannot be assigned to owners group"));
        }
        let prefix = parse_prefix(group_prefix)?;

        let project = self.access.check(caller, project_id, Access::Owner).await?;

        let user = self.users.find_user_by_email(email).await?.ok_or_else(|| {
            ApiError::bad_request(format!(
                "cannot add the user {email} to the project {project_id} because the user doesn't exist."
            ))
        })?;

        let already_member = || {
            ApiError::bad_request(format!(
                "cannot add the user {email} to the project {project_id} because user is already in the project"
            ))
        };
        if self.bindings.find_binding(&project.id, &user.email).await?.is_some() {
            return Err(already_member());
        }

        let binding = UserProjectBinding {
            name: binding_name(&project.id, &user.email, prefix),
            project_id: project.id.clone(),
            user_email: user.email.clone(),
            group: prefix.group_name_for(&project.id),
            owner: Some(OwnerReference::project(&project.id)),
        };
        let binding = self.bindings.create_binding(binding).await.map_err(|e| match e {
            StoreError::AlreadyExists(_) => already_member(),
            other => other.into(),
        })?;

        info!(project_id = %project.id, binding = %binding.name, group = %binding.group, "member added");
        Ok(ApiUser::from_bindings(&user, &[binding]))
    }

    /// Change an existing member's group. The binding name is kept.
    pub async fn edit(
        &self,
        caller: &UserInfo,
        project_id: &str,
        user_id: &str,
        group_prefix: &str,
    ) -> Result<ApiUser, ApiError> {
        if user_id.is_empty() {
            return Err(ApiError::bad_request("the user ID cannot be empty"));
        }
        let user = match self.users.get_user(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                return Err(ApiError::bad_request(format!(
                    "cannot change the membership of the user {user_id} for the project {project_id} because the user doesn't exist."
                )))
            }
            Err(e) => return Err(e.into()),
        };
        validate_email(&user.email)?;
        if user.email.eq_ignore_ascii_case(&caller.email) {
            return Err(ApiError::forbidden("you cannot assign yourself to a different group"));
        }
        let prefix = parse_prefix(group_prefix)?;

        let project = self.access.check(caller, project_id, Access::Owner).await?;

        let mut binding = self
            .bindings
            .find_binding(&project.id, &user.email)
            .await?
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "cannot change the membership of the user {} for the project {project_id} because the user is not a member of the project",
                    user.email
                ))
            })?;

        binding.group = prefix.group_name_for(&project.id);
        let binding = self.bindings.update_binding(binding).await?;

        info!(project_id = %project.id, binding = %binding.name, group = %binding.group, "member group changed");
        Ok(ApiUser::from_bindings(&user, &[binding]))
    }

    /// Remove a member from the project.
    pub async fn delete(&self, caller: &UserInfo, project_id: &str, user_id: &str) -> Result<(), ApiError> {
        if user_id.is_empty() {
            return Err(ApiError::bad_request("the user ID cannot be empty"));
        }
        let project = self.access.check(caller, project_id, Access::Owner).await?;
        let user = self.users.get_user(user_id).await?;

        let binding = self
            .bindings
            .find_binding(&project.id, &user.email)
            .await?
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "cannot delete the user {} from the project {project_id} because the user is not a member of the project",
                    user.email
                ))
            })?;

        if binding.user_email.eq_ignore_ascii_case(&caller.email) {
            return Err(ApiError::forbidden("you cannot delete yourself from the project"));
        }

        self.bindings.delete_binding(&binding.name).await?;
        info!(project_id = %project.id, binding = %binding.name, "member removed");
        Ok(())
    }
}

fn parse_prefix(group_prefix: &str) -> Result<GroupPrefix, ApiError> {
    GroupPrefix::parse(group_prefix).ok_or_else(|| ApiError::bad_request(format!("invalid group name {group_prefix}")))
}

/// Deterministic binding name for `(project, email, prefix)`.
pub fn binding_name(project_id: &str, email: &str, prefix: GroupPrefix) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_id.as_bytes());
    hasher.update([0]);
    hasher.update(email.as_bytes());
    hasher.update([0]);
    hasher.update(prefix.as_str().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{project_id}-{}", &digest[..16])
}

/// Check `email` is a plain `local@domain` address.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("the email address cannot be empty"));
    }
    parse_address(email).map_err(|reason| ApiError::bad_request(format!("incorrect email format: {reason}")))
}

fn parse_address(email: &str) -> Result<(), &'static str> {
    let (local, domain) = email.rsplit_once('@').ok_or("missing @ in addr-spec")?;
    if local.is_empty() {
        return Err("no local part");
    }
    let forbidden = |c: char| c.is_whitespace() || c.is_control() || "<>()[]\\,;:@\"".contains(c);
    if local.chars().any(forbidden) || local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err("invalid local part");
    }
    if domain.is_empty() {
        return Err("no domain");
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !domain.split('.').all(valid_label) {
        return Err("invalid domain");
    }
    Ok(())
}
