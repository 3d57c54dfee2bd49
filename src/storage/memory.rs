// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory implementation of every store trait.
//!
//! All maps live behind one `tokio::sync::RwLock`, so each create/update is
//! checked and applied under the same write guard. State is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::{
    BindingStore, PresetStore, ProjectStore, ServiceAccountTokenStore, StoreError, StoreResult,
    TokenFilter, UserStore,
};
use crate::models::{normalize_email, Project, ServiceAccountToken, User, UserProjectBinding};
use crate::presets::Preset;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    projects: HashMap<String, Project>,
    /// Keyed by binding name
    bindings: HashMap<String, UserProjectBinding>,
    /// Keyed by token ID
    tokens: HashMap<String, ServiceAccountToken>,
    /// user ID -> (token digest -> expiry)
    invalidated: HashMap<String, HashMap<String, DateTime<Utc>>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    presets: Vec<Preset>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the read-only preset list.
    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }
}

/// Invalidated tokens are kept as digests, never verbatim.
fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: &str) -> StoreResult<User> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists(format!("user {}", user.id)));
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::AlreadyExists(format!("user with email {}", user.email)));
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_user(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&user.id) {
            Some(existing) if existing.email != user.email => Err(StoreError::Internal(format!(
                "email of user {} cannot change",
                user.id
            ))),
            Some(existing) => {
                *existing = user.clone();
                Ok(user)
            }
            None => Err(StoreError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        inner.invalidated.remove(id);
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().cloned().collect())
    }

    async fn invalidate_token(&self, user_id: &str, token: &str, expiry: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let now = Utc::now();
        let entries = inner.invalidated.entry(user_id.to_string()).or_default();
        entries.retain(|_, exp| *exp > now);
        entries.insert(token_digest(token), expiry);
        Ok(())
    }

    async fn is_token_invalidated(&self, user_id: &str, token: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        Ok(inner
            .invalidated
            .get(user_id)
            .and_then(|entries| entries.get(&token_digest(token)))
            .is_some_and(|exp| *exp > now))
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn get_project(&self, id: &str) -> StoreResult<Project> {
        let inner = self.inner.read().await;
        inner
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    async fn create_project(&self, project: Project) -> StoreResult<Project> {
        let mut inner = self.inner.write().await;
        if inner.projects.contains_key(&project.id) {
            return Err(StoreError::AlreadyExists(format!("project {}", project.id)));
        }
        inner.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.projects.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("project {id}")));
        }
        inner
            .bindings
            .retain(|_, b| b.owner.as_ref().is_none_or(|owner| owner.name != id));
        inner.tokens.retain(|_, t| t.project_id != id);
        Ok(())
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let inner = self.inner.read().await;
        Ok(inner.projects.values().cloned().collect())
    }
}

#[async_trait]
impl BindingStore for InMemoryStore {
    async fn list_project_bindings(&self, project_id: &str) -> StoreResult<Vec<UserProjectBinding>> {
        let inner = self.inner.read().await;
        let mut bindings: Vec<_> = inner
            .bindings
            .values()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect();
        bindings.sort_by(|a, b| a.user_email.cmp(&b.user_email));
        Ok(bindings)
    }

    async fn list_user_bindings(&self, user_email: &str) -> StoreResult<Vec<UserProjectBinding>> {
        let user_email = normalize_email(user_email);
        let inner = self.inner.read().await;
        let mut bindings: Vec<_> = inner
            .bindings
            .values()
            .filter(|b| b.user_email == user_email)
            .cloned()
            .collect();
        bindings.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(bindings)
    }

    async fn find_binding(&self, project_id: &str, user_email: &str) -> StoreResult<Option<UserProjectBinding>> {
        let user_email = normalize_email(user_email);
        let inner = self.inner.read().await;
        Ok(inner
            .bindings
            .values()
            .find(|b| b.project_id == project_id && b.user_email == user_email)
            .cloned())
    }

    async fn create_binding(&self, mut binding: UserProjectBinding) -> StoreResult<UserProjectBinding> {
        binding.user_email = normalize_email(&binding.user_email);
        let mut inner = self.inner.write().await;
        let duplicate = inner.bindings.contains_key(&binding.name)
            || inner
                .bindings
                .values()
                .any(|b| b.project_id == binding.project_id && b.user_email == binding.user_email);
        if duplicate {
            return Err(StoreError::AlreadyExists(format!(
                "binding for {} in project {}",
                binding.user_email, binding.project_id
            )));
        }
        inner.bindings.insert(binding.name.clone(), binding.clone());
        Ok(binding)
    }

    async fn update_binding(&self, mut binding: UserProjectBinding) -> StoreResult<UserProjectBinding> {
        binding.user_email = normalize_email(&binding.user_email);
        let mut inner = self.inner.write().await;
        match inner.bindings.get_mut(&binding.name) {
            Some(existing) => {
                *existing = binding.clone();
                Ok(binding)
            }
            None => Err(StoreError::NotFound(format!("binding {}", binding.name))),
        }
    }

    async fn delete_binding(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .bindings
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("binding {name}")))
    }
}

#[async_trait]
impl ServiceAccountTokenStore for InMemoryStore {
    async fn list_tokens(&self, filter: &TokenFilter) -> StoreResult<Vec<ServiceAccountToken>> {
        let inner = self.inner.read().await;
        let mut tokens: Vec<_> = inner.tokens.values().filter(|t| filter.matches(t)).cloned().collect();
        tokens.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tokens)
    }

    async fn create_token(&self, token: ServiceAccountToken) -> StoreResult<ServiceAccountToken> {
        let mut inner = self.inner.write().await;
        if inner.tokens.contains_key(&token.id) {
            return Err(StoreError::AlreadyExists(format!("token {}", token.id)));
        }
        if inner
            .tokens
            .values()
            .any(|t| t.service_account_id == token.service_account_id && t.name == token.name)
        {
            return Err(StoreError::AlreadyExists(format!("token with name {}", token.name)));
        }
        inner.tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn update_token(&self, token: ServiceAccountToken) -> StoreResult<ServiceAccountToken> {
        let mut inner = self.inner.write().await;
        if !inner.tokens.contains_key(&token.id) {
            return Err(StoreError::NotFound(format!("token {}", token.id)));
        }
        if inner.tokens.values().any(|t| {
            t.id != token.id && t.service_account_id == token.service_account_id && t.name == token.name
        }) {
            return Err(StoreError::AlreadyExists(format!("token with name {}", token.name)));
        }
        inner.tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn delete_token(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .tokens
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("token {id}")))
    }
}

#[async_trait]
impl PresetStore for InMemoryStore {
    async fn list_presets(&self) -> StoreResult<Vec<Preset>> {
        Ok(self.presets.clone())
    }
}
