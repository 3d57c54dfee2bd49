// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service accounts and their token lifecycle.
//!
//! A service account is a `User` whose email starts with `serviceaccount-`
//! and which holds an editors or viewers binding in one project. Its tokens
//! are named, unique per service account, and revoked by deleting the record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::access::{Access, ProjectAccess};
use crate::auth::{GroupPrefix, ServiceAccountTokenAuthenticator, UserInfo};
use crate::error::ApiError;
use crate::membership::binding_name;
use crate::models::{
    ApiServiceAccount, ApiServiceAccountToken, OwnerReference, PublicServiceAccountToken, ServiceAccountToken, User,
    UserProjectBinding, SERVICE_ACCOUNT_EMAIL_PREFIX,
};
use crate::storage::{BindingStore, ServiceAccountTokenStore, StoreError, TokenFilter, UserStore};

pub const MAX_TOKEN_NAME_LEN: usize = 50;

/// Length of generated service account IDs.
const SERVICE_ACCOUNT_ID_LEN: usize = 10;

pub struct ServiceAccountManager {
    access: ProjectAccess,
    users: Arc<dyn UserStore>,
    bindings: Arc<dyn BindingStore>,
    tokens: Arc<dyn ServiceAccountTokenStore>,
}

impl ServiceAccountManager {
    pub fn new(
        access: ProjectAccess,
        users: Arc<dyn UserStore>,
        bindings: Arc<dyn BindingStore>,
        tokens: Arc<dyn ServiceAccountTokenStore>,
    ) -> Self {
        Self {
            access,
            users,
            bindings,
            tokens,
        }
    }

    /// Create a service account bound to `project_id` in `group`.
    pub async fn create(
        &self,
        caller: &UserInfo,
        project_id: &str,
        name: &str,
        group: &str,
    ) -> Result<ApiServiceAccount, ApiError> {
        let prefix = validate_service_account(name, group)?;
        self.access.check(caller, project_id, Access::Owner).await?;
        if self.list_bound(project_id).await?.iter().any(|(sa, _)| sa.name == name) {
            return Err(ApiError::conflict(format!("service account \"{name}\" already exists")));
        }

        let id = Uuid::new_v4().simple().to_string()[..SERVICE_ACCOUNT_ID_LEN].to_string();
        let email = format!("{SERVICE_ACCOUNT_EMAIL_PREFIX}{id}@localhost");
        let user = self.users.create_user(User::new(id, name, email)).await?;

        let binding = UserProjectBinding {
            name: binding_name(project_id, &user.email, prefix),
            project_id: project_id.to_string(),
            user_email: user.email.clone(),
            group: prefix.group_name_for(project_id),
            owner: Some(OwnerReference::project(project_id)),
        };
        let binding = match self.bindings.create_binding(binding).await {
            Ok(binding) => binding,
            Err(err) => {
                if let Err(cleanup) = self.users.delete_user(&user.id).await {
                    error!(service_account = %user.id, error = %cleanup, "failed to remove unbound service account");
                }
                return Err(err.into());
            }
        };

        info!(project_id, service_account = %user.id, group = %prefix, "service account created");
        Ok(ApiServiceAccount::new(&user, &binding))
    }

    /// Service accounts of the project, sorted by name.
    pub async fn list(&self, caller: &UserInfo, project_id: &str) -> Result<Vec<ApiServiceAccount>, ApiError> {
        self.access.check(caller, project_id, Access::Member).await?;
        let mut accounts: Vec<_> = self
            .list_bound(project_id)
            .await?
            .iter()
            .map(|(sa, binding)| ApiServiceAccount::new(sa, binding))
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    /// Rename the service account and move it to `group`.
    pub async fn update(
        &self,
        caller: &UserInfo,
        project_id: &str,
        sa_id: &str,
        name: &str,
        group: &str,
    ) -> Result<ApiServiceAccount, ApiError> {
        let prefix = validate_service_account(name, group)?;
        self.access.check(caller, project_id, Access::Owner).await?;
        let bound = self.list_bound(project_id).await?;
        let Some((sa, binding)) = bound.iter().find(|(sa, _)| sa.id == sa_id) else {
            return Err(ApiError::not_found(format!(
                "service account {sa_id} not found in project {project_id}"
            )));
        };
        if bound.iter().any(|(other, _)| other.id != sa.id && other.name == name) {
            return Err(ApiError::conflict(format!("service account \"{name}\" already exists")));
        }

        let mut user = sa.clone();
        if user.name != name {
            user.name = name.to_string();
            user = self.users.update_user(user).await?;
        }
        let mut binding = binding.clone();
        let group = prefix.group_name_for(project_id);
        if binding.group != group {
            binding.group = group;
            binding = self.bindings.update_binding(binding).await?;
        }

        info!(project_id, service_account = %user.id, group = %prefix, "service account updated");
        Ok(ApiServiceAccount::new(&user, &binding))
    }

    /// Delete the service account, its binding and its tokens.
    pub async fn delete(&self, caller: &UserInfo, project_id: &str, sa_id: &str) -> Result<(), ApiError> {
        self.access.check(caller, project_id, Access::Owner).await?;
        let bound = self.list_bound(project_id).await?;
        let Some((sa, binding)) = bound.iter().find(|(sa, _)| sa.id == sa_id) else {
            return Err(ApiError::not_found(format!(
                "service account {sa_id} not found in project {project_id}"
            )));
        };

        for token in self.tokens.list_tokens(&TokenFilter::for_service_account(&sa.id)).await? {
            self.tokens.delete_token(&token.id).await?;
        }
        self.bindings.delete_binding(&binding.name).await?;
        self.users.delete_user(&sa.id).await?;

        info!(project_id, service_account = %sa.id, "service account deleted");
        Ok(())
    }

    /// Service account users bound to the project, with their binding.
    async fn list_bound(&self, project_id: &str) -> Result<Vec<(User, UserProjectBinding)>, ApiError> {
        let mut bound = Vec::new();
        for binding in self.bindings.list_project_bindings(project_id).await? {
            if !binding.user_email.starts_with(SERVICE_ACCOUNT_EMAIL_PREFIX) {
                continue;
            }
            if let Some(user) = self.users.find_user_by_email(&binding.user_email).await? {
                bound.push((user, binding));
            }
        }
        Ok(bound)
    }
}

pub struct ServiceAccountTokenManager {
    access: ProjectAccess,
    users: Arc<dyn UserStore>,
    bindings: Arc<dyn BindingStore>,
    tokens: Arc<dyn ServiceAccountTokenStore>,
    issuer: Arc<ServiceAccountTokenAuthenticator>,
}

impl ServiceAccountTokenManager {
    pub fn new(
        access: ProjectAccess,
        users: Arc<dyn UserStore>,
        bindings: Arc<dyn BindingStore>,
        tokens: Arc<dyn ServiceAccountTokenStore>,
        issuer: Arc<ServiceAccountTokenAuthenticator>,
    ) -> Self {
        Self {
            access,
            users,
            bindings,
            tokens,
            issuer,
        }
    }

    pub async fn create(
        &self,
        caller: &UserInfo,
        project_id: &str,
        sa_id: &str,
        name: &str,
    ) -> Result<ApiServiceAccountToken, ApiError> {
        validate_name(name)?;
        self.access.check(caller, project_id, Access::Owner).await?;
        let sa = self.service_account(project_id, sa_id).await?;

        let token_id = format!("sa-token-{}", Uuid::new_v4().simple());
        let (jwt, expiry) = self.sign(&sa, project_id, &token_id)?;
        let record = ServiceAccountToken {
            id: token_id,
            name: name.to_string(),
            project_id: project_id.to_string(),
            service_account_id: sa.id.clone(),
            expiry,
            token: jwt,
            created_at: Utc::now(),
        };
        let record = self.tokens.create_token(record).await.map_err(|e| name_conflict(e, name))?;

        info!(project_id, service_account = %sa.id, token_id = %record.id, "service account token created");
        Ok(ApiServiceAccountToken::from(&record))
    }

    pub async fn list(
        &self,
        caller: &UserInfo,
        project_id: &str,
        sa_id: &str,
    ) -> Result<Vec<PublicServiceAccountToken>, ApiError> {
        self.access.check(caller, project_id, Access::Owner).await?;
        let sa = self.service_account(project_id, sa_id).await?;

        let filter = TokenFilter {
            project_id: Some(project_id.to_string()),
            ..TokenFilter::for_service_account(&sa.id)
        };
        let tokens = self.tokens.list_tokens(&filter).await?;
        Ok(tokens.iter().map(PublicServiceAccountToken::from).collect())
    }

    /// Rename the token and issue a fresh secret. The old secret stops
    /// verifying.
    pub async fn update(
        &self,
        caller: &UserInfo,
        project_id: &str,
        sa_id: &str,
        token_id: &str,
        name: &str,
    ) -> Result<ApiServiceAccountToken, ApiError> {
        validate_name(name)?;
        self.access.check(caller, project_id, Access::Owner).await?;
        let sa = self.service_account(project_id, sa_id).await?;
        let mut record = self.token(project_id, &sa, token_id).await?;

        let (jwt, expiry) = self.sign(&sa, project_id, &record.id)?;
        record.name = name.to_string();
        record.token = jwt;
        record.expiry = expiry;
        let record = self.tokens.update_token(record).await.map_err(|e| name_conflict(e, name))?;

        info!(project_id, service_account = %sa.id, token_id = %record.id, "service account token regenerated");
        Ok(ApiServiceAccountToken::from(&record))
    }

    /// Rename the token, keeping its secret.
    pub async fn rename(
        &self,
        caller: &UserInfo,
        project_id: &str,
        sa_id: &str,
        token_id: &str,
        name: &str,
    ) -> Result<PublicServiceAccountToken, ApiError> {
        validate_name(name)?;
        self.access.check(caller, project_id, Access::Owner).await?;
        let sa = self.service_account(project_id, sa_id).await?;
        let mut record = self.token(project_id, &sa, token_id).await?;

        record.name = name.to_string();
        let record = self.tokens.update_token(record).await.map_err(|e| name_conflict(e, name))?;
        Ok(PublicServiceAccountToken::from(&record))
    }

    /// Delete the token record, revoking the token.
    pub async fn delete(&self, caller: &UserInfo, project_id: &str, sa_id: &str, token_id: &str) -> Result<(), ApiError> {
        self.access.check(caller, project_id, Access::Owner).await?;
        let sa = self.service_account(project_id, sa_id).await?;
        let record = self.token(project_id, &sa, token_id).await?;
        self.tokens.delete_token(&record.id).await?;

        info!(project_id, service_account = %sa.id, token_id = %record.id, "service account token revoked");
        Ok(())
    }

    /// Load a service account that is bound to `project_id`.
    async fn service_account(&self, project_id: &str, sa_id: &str) -> Result<User, ApiError> {
        if sa_id.is_empty() {
            return Err(ApiError::bad_request("service account ID cannot be empty"));
        }
        let not_found = || ApiError::not_found(format!("service account {sa_id} not found in project {project_id}"));

        let user = match self.users.get_user(sa_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        if !user.is_service_account() {
            return Err(not_found());
        }
        if self.bindings.find_binding(project_id, &user.email).await?.is_none() {
            return Err(not_found());
        }
        Ok(user)
    }

    async fn token(&self, project_id: &str, sa: &User, token_id: &str) -> Result<ServiceAccountToken, ApiError> {
        if token_id.is_empty() {
            return Err(ApiError::bad_request("token ID cannot be empty"));
        }
        let filter = TokenFilter {
            token_id: Some(token_id.to_string()),
            service_account_id: Some(sa.id.clone()),
            project_id: Some(project_id.to_string()),
            name: None,
        };
        let mut matches = self.tokens.list_tokens(&filter).await?;
        match matches.len() {
            0 => Err(ApiError::not_found(format!("token {token_id} not found"))),
            1 => Ok(matches.remove(0)),
            n => {
                error!(token_id, count = n, "token ID is not unique");
                Err(ApiError::internal(format!("found {n} tokens with ID {token_id}")))
            }
        }
    }

    fn sign(&self, sa: &User, project_id: &str, token_id: &str) -> Result<(String, chrono::DateTime<Utc>), ApiError> {
        self.issuer.generate(&sa.email, project_id, token_id).map_err(|e| {
            error!(error = %e, "failed to sign service account token");
            ApiError::internal("can not generate token data")
        })
    }
}

fn validate_service_account(name: &str, group: &str) -> Result<GroupPrefix, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("the service account name cannot be empty"));
    }
    match GroupPrefix::parse(group) {
        Some(prefix @ (GroupPrefix::Editors | GroupPrefix::Viewers)) => Ok(prefix),
        _ => Err(ApiError::bad_request(format!(
            "invalid group name {group}, expected editors or viewers"
        ))),
    }
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("the token name cannot be empty"));
    }
    if name.chars().count() > MAX_TOKEN_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "the name is too long, max {MAX_TOKEN_NAME_LEN} chars"
        )));
    }
    Ok(())
}

fn name_conflict(err: StoreError, name: &str) -> ApiError {
    match err {
        StoreError::AlreadyExists(_) => ApiError::conflict(format!("token \"{name}\" already exists")),
        other => other.into(),
    }
}
