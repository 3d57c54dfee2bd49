// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Internal records kept in the store and the external projections returned
//! by the REST API. External types derive `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Users**: human identities and service accounts
//! - **Projects**: tenants; owners are derived from bindings
//! - **Bindings**: one user's role in one project
//! - **Service account tokens**: revocable, named JWT secrets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::roles::extract_group_prefix;

/// Email prefix that marks a `User` record as a service account.
pub const SERVICE_ACCOUNT_EMAIL_PREFIX: &str = "serviceaccount-";

/// Canonical form of an email address. Stores compare emails in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Users
// =============================================================================

/// Internal user record.
///
/// `id` is the hash of the identity provider subject, so the same subject
/// always maps to the same record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettings>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            is_admin: false,
            settings: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_service_account(&self) -> bool {
        self.email.starts_with(SERVICE_ACCOUNT_EMAIL_PREFIX)
    }
}

/// Per-user UI preferences. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "selectedProjectID")]
    pub selected_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_project_view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_sidenav: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_all_projects_for_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_changelog_version: Option<String>,
}

impl UserSettings {
    /// Apply a JSON merge patch (RFC 7396): `null` removes a field, objects
    /// merge recursively and any other value replaces.
    pub fn merge_patch(&self, patch: &serde_json::Value) -> Result<UserSettings, serde_json::Error> {
        let mut doc = serde_json::to_value(self)?;
        merge_json(&mut doc, patch);
        serde_json::from_value(doc)
    }
}

fn merge_json(target: &mut serde_json::Value, patch: &serde_json::Value) {
    use serde_json::Value;

    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_json(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

// =============================================================================
// Projects
// =============================================================================

/// Project lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
pub enum ProjectStatus {
    #[default]
    Inactive,
    Active,
    Terminating,
}

/// Internal project record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: ProjectStatus::Active,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// Owner of a dependent record. Deleting the owner deletes the dependent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

impl OwnerReference {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            kind: "Project".to_string(),
            name: project_id.into(),
        }
    }
}

/// Binds one user email to one project-scoped group.
///
/// `group` is `<prefix>-<project_id>`. `name` is fixed at creation and is
/// kept when `group` is edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProjectBinding {
    pub name: String,
    pub project_id: String,
    pub user_email: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerReference>,
}

// =============================================================================
// Service Account Tokens
// =============================================================================

/// Stored service account token. `token` is the signed JWT itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountToken {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub service_account_id: String,
    pub expiry: DateTime<Utc>,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// External Projections
// =============================================================================

/// A user's group in one project. `group` is the bare prefix (e.g. `editors`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProjectGroup {
    pub id: String,
    pub group: String,
}

impl From<&UserProjectBinding> for ProjectGroup {
    fn from(binding: &UserProjectBinding) -> Self {
        Self {
            id: binding.project_id.clone(),
            group: extract_group_prefix(&binding.group).to_string(),
        }
    }
}

/// User as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    pub id: String,
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
    pub email: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_admin: bool,
    #[serde(default)]
    pub projects: Vec<ProjectGroup>,
}

impl ApiUser {
    /// Build the external view of `user` with one entry per binding.
    pub fn from_bindings(user: &User, bindings: &[UserProjectBinding]) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            creation_timestamp: user.created_at,
            email: user.email.clone(),
            is_admin: user.is_admin,
            projects: bindings.iter().map(ProjectGroup::from).collect(),
        }
    }
}

/// Project as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiProject {
    pub id: String,
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
    pub status: ProjectStatus,
    pub owners: Vec<ApiUser>,
}

impl ApiProject {
    pub fn new(project: &Project, owners: Vec<ApiUser>) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            creation_timestamp: project.created_at,
            status: project.status,
            owners,
        }
    }
}

/// Service account as returned by the API. `group` is the bare prefix.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiServiceAccount {
    pub id: String,
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
    pub email: String,
    pub group: String,
}

impl ApiServiceAccount {
    pub fn new(user: &User, binding: &UserProjectBinding) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            creation_timestamp: user.created_at,
            email: user.email.clone(),
            group: extract_group_prefix(&binding.group).to_string(),
        }
    }
}

/// Token metadata without the secret.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicServiceAccountToken {
    pub id: String,
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl From<&ServiceAccountToken> for PublicServiceAccountToken {
    fn from(token: &ServiceAccountToken) -> Self {
        Self {
            id: token.id.clone(),
            name: token.name.clone(),
            creation_timestamp: token.created_at,
            expiry: token.expiry,
        }
    }
}

/// Token including the secret. Only returned on creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ApiServiceAccountToken {
    pub id: String,
    pub name: String,
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl From<&ServiceAccountToken> for ApiServiceAccountToken {
    fn from(token: &ServiceAccountToken) -> Self {
        Self {
            id: token.id.clone(),
            name: token.name.clone(),
            token: token.token.clone(),
            expiry: token.expiry,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request to add a user to a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    /// Email of an existing user.
    pub email: String,
    /// Group prefix, e.g. `editors`.
    pub group: String,
}

/// Request to change a member's group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditMemberRequest {
    pub group: String,
}

/// Request to create a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// Request to create a service account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceAccountRequest {
    pub name: String,
    /// Group prefix, `editors` or `viewers`.
    pub group: String,
}

/// Request to create or rename a service account token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenNameRequest {
    pub name: String,
}
