// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claims, the authenticated identity and the caller view used by
//! downstream authorization checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::AuthError;
use crate::models::SERVICE_ACCOUNT_EMAIL_PREFIX;

/// Identity attributes produced by a [`super::TokenVerifier`].
///
/// Produced once per request and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    /// Stable subject identifier (`sub`)
    pub subject: String,
    pub email: String,
    pub name: String,
    pub groups: Vec<String>,
    /// Token expiration, when the token carries one
    pub expiry: Option<DateTime<Utc>>,
}

/// Derive the internal user ID from an identity provider subject.
///
/// SHA-256 of the subject, hex encoded. Equal subjects give equal IDs and
/// distinct subjects give distinct IDs.
pub fn user_id_from_subject(subject: &str) -> Result<String, AuthError> {
    if subject.is_empty() {
        return Err(AuthError::HashingFailed);
    }
    let digest = Sha256::digest(subject.as_bytes());
    let id = format!("{digest:x}");
    if id.is_empty() {
        return Err(AuthError::HashingFailed);
    }
    Ok(id)
}

/// Authenticated identity built from verified claims.
///
/// Handlers receive it through the [`super::Auth`] extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Hash of the token subject
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl AuthenticatedUser {
    /// Build the identity from claims. Fails on an empty subject.
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        if claims.subject.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(Self {
            id: user_id_from_subject(&claims.subject)?,
            name: claims.name.clone(),
            email: claims.email.clone(),
            groups: claims.groups.clone(),
        })
    }
}

/// Caller view used by membership and preset checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub email: String,
    pub groups: Vec<String>,
    pub is_admin: bool,
}

impl UserInfo {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_admin: true,
            ..Default::default()
        }
    }

    pub fn is_service_account(&self) -> bool {
        self.email.starts_with(SERVICE_ACCOUNT_EMAIL_PREFIX)
    }

    /// Domain part of the email, lowercased. Empty if there is none.
    pub fn email_domain(&self) -> String {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .unwrap_or_default()
    }
}
