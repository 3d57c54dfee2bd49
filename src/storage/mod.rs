// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Narrow store interfaces consumed by the identity subsystem. Each component
//! receives only the trait it needs (`Arc<dyn UserStore>`, ...).
//!
//! ## Consistency
//!
//! Implementations must provide read-your-writes consistency and atomic
//! single-key create/update. Uniqueness of a binding per
//! `(project_id, user_email)` and of a token name per service account is
//! enforced by the create/update primitives themselves, which fail with
//! [`StoreError::AlreadyExists`] instead of relying on list-then-write.
//!
//! ## Backends
//!
//! - [`memory::InMemoryStore`] - process-local, not durable

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Project, ServiceAccountToken, User, UserProjectBinding};
use crate::presets::Preset;

pub use memory::InMemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("internal store error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User records and logout invalidations.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: &str) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with `AlreadyExists` when the ID or the email is taken.
    async fn create_user(&self, user: User) -> StoreResult<User>;
    /// Replace the user with the same `id`. The email cannot change.
    async fn update_user(&self, user: User) -> StoreResult<User>;
    async fn delete_user(&self, id: &str) -> StoreResult<()>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Record `token` as unusable for `user_id` until `expiry`.
    async fn invalidate_token(&self, user_id: &str, token: &str, expiry: DateTime<Utc>) -> StoreResult<()>;
    async fn is_token_invalidated(&self, user_id: &str, token: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, id: &str) -> StoreResult<Project>;
    async fn create_project(&self, project: Project) -> StoreResult<Project>;
    /// Deletes the project and every record it owns.
    async fn delete_project(&self, id: &str) -> StoreResult<()>;
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
}

#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn list_project_bindings(&self, project_id: &str) -> StoreResult<Vec<UserProjectBinding>>;
    async fn list_user_bindings(&self, user_email: &str) -> StoreResult<Vec<UserProjectBinding>>;
    async fn find_binding(&self, project_id: &str, user_email: &str) -> StoreResult<Option<UserProjectBinding>>;
    /// Create-or-conflict on `(project_id, user_email)`.
    async fn create_binding(&self, binding: UserProjectBinding) -> StoreResult<UserProjectBinding>;
    /// Replace the binding with the same `name`.
    async fn update_binding(&self, binding: UserProjectBinding) -> StoreResult<UserProjectBinding>;
    async fn delete_binding(&self, name: &str) -> StoreResult<()>;
}

/// Filter for [`ServiceAccountTokenStore::list_tokens`]. Unset fields match
/// anything.
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    pub token_id: Option<String>,
    pub service_account_id: Option<String>,
    pub project_id: Option<String>,
    pub name: Option<String>,
}

impl TokenFilter {
    pub fn by_id(token_id: impl Into<String>) -> Self {
        Self {
            token_id: Some(token_id.into()),
            ..Default::default()
        }
    }

    pub fn for_service_account(service_account_id: impl Into<String>) -> Self {
        Self {
            service_account_id: Some(service_account_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, token: &ServiceAccountToken) -> bool {
        fn field(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }
        field(&self.token_id, &token.id)
            && field(&self.service_account_id, &token.service_account_id)
            && field(&self.project_id, &token.project_id)
            && field(&self.name, &token.name)
    }
}

#[async_trait]
pub trait ServiceAccountTokenStore: Send + Sync {
    async fn list_tokens(&self, filter: &TokenFilter) -> StoreResult<Vec<ServiceAccountToken>>;
    /// Create-or-conflict on `(service_account_id, name)`.
    async fn create_token(&self, token: ServiceAccountToken) -> StoreResult<ServiceAccountToken>;
    /// Replace the token with the same `id`; the name stays unique.
    async fn update_token(&self, token: ServiceAccountToken) -> StoreResult<ServiceAccountToken>;
    async fn delete_token(&self, id: &str) -> StoreResult<()>;
}

/// Read-only preset source. Presets are managed elsewhere.
#[async_trait]
pub trait PresetStore: Send + Sync {
    async fn list_presets(&self) -> StoreResult<Vec<Preset>>;
}
