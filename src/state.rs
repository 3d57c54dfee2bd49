// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state and its construction from [`AppConfig`].
//!
//! The extractor and verifier chains are built once here, in a fixed order,
//! and never change afterwards.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::access::ProjectAccess;
use crate::auth::{
    Authenticator, CombinedExtractor, CookieBearerExtractor, HeaderBearerExtractor, JwksManager, OidcVerifier,
    PluginAggregateExtractor, PluginAggregateVerifier, QueryParamExtractor, RequiredToken,
    ServiceAccountTokenAuthenticator, ServiceAccountVerifier, TokenExtractor, TokenVerifier,
};
use crate::config::{AppConfig, ConfigError, OIDC_ISSUER_URL_ENV, PRESETS_FILE_ENV, SERVICE_ACCOUNT_SIGNING_KEY_ENV};
use crate::membership::ProjectMembershipManager;
use crate::presets::{CredentialPresetResolver, Preset};
use crate::projects::ProjectManager;
use crate::service_accounts::{ServiceAccountManager, ServiceAccountTokenManager};
use crate::storage::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub extractor: Arc<dyn TokenExtractor>,
    pub authenticator: Arc<Authenticator>,
    pub projects: Arc<ProjectManager>,
    pub members: Arc<ProjectMembershipManager>,
    pub service_accounts: Arc<ServiceAccountManager>,
    pub presets: Arc<CredentialPresetResolver>,
    pub tokens: Arc<ServiceAccountTokenManager>,
    /// Present when an OIDC issuer is configured.
    pub jwks: Option<Arc<JwksManager>>,
}

impl AppState {
    /// Wire the managers around `store` with the given token plugins.
    pub fn new(
        store: Arc<InMemoryStore>,
        extractor: Arc<dyn TokenExtractor>,
        verifier: Arc<dyn TokenVerifier>,
        issuer: Arc<ServiceAccountTokenAuthenticator>,
        admin_emails: Vec<String>,
    ) -> Self {
        let access = ProjectAccess::new(store.clone(), store.clone());
        let authenticator = Authenticator::new(verifier, store.clone()).with_admin_emails(admin_emails);
        let projects = ProjectManager::new(access.clone(), store.clone(), store.clone(), store.clone());
        let members = ProjectMembershipManager::new(access.clone(), store.clone(), store.clone());
        let service_accounts = ServiceAccountManager::new(access.clone(), store.clone(), store.clone(), store.clone());
        let tokens = ServiceAccountTokenManager::new(access, store.clone(), store.clone(), store.clone(), issuer);
        let presets = CredentialPresetResolver::new(store.clone());

        Self {
            store,
            extractor,
            authenticator: Arc::new(authenticator),
            projects: Arc::new(projects),
            members: Arc::new(members),
            service_accounts: Arc::new(service_accounts),
            presets: Arc::new(presets),
            tokens: Arc::new(tokens),
            jwks: None,
        }
    }

    /// Build the full state: presets from `PRESETS_FILE`, the OIDC verifier
    /// when an issuer is configured, then the service account verifier.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let presets = match &config.presets_file {
            Some(path) => load_presets(path)?,
            None => Vec::new(),
        };
        info!(count = presets.len(), "loaded credential presets");
        let store = Arc::new(InMemoryStore::new().with_presets(presets));

        let issuer = Arc::new(
            ServiceAccountTokenAuthenticator::new(&config.service_account_signing_key).map_err(|e| {
                ConfigError::Invalid {
                    name: SERVICE_ACCOUNT_SIGNING_KEY_ENV,
                    reason: e.to_string(),
                }
            })?,
        );

        let mut verifiers: Vec<Box<dyn TokenVerifier>> = Vec::new();
        let mut jwks = None;
        if let Some(issuer_url) = &config.oidc_issuer_url {
            let oidc = OidcVerifier::new(issuer_url.clone(), config.oidc_client_id.clone()).map_err(|e| {
                ConfigError::Invalid {
                    name: OIDC_ISSUER_URL_ENV,
                    reason: e.to_string(),
                }
            })?;
            jwks = Some(oidc.jwks());
            verifiers.push(Box::new(oidc));
        }
        verifiers.push(Box::new(ServiceAccountVerifier::new(issuer.clone(), store.clone())));
        info!(
            plugins = ?verifiers.iter().map(|v| v.name()).collect::<Vec<_>>(),
            "token verifier chain"
        );

        let extractor = default_extractor(&config.token_query_param, &config.token_cookie_name);
        let mut state = Self::new(
            store,
            Arc::new(extractor),
            Arc::new(PluginAggregateVerifier::new(verifiers)),
            issuer,
            config.admin_emails.clone(),
        );
        state.jwks = jwks;
        Ok(state)
    }
}

/// The `Authorization` header first, then the cookie or the query parameter.
/// Fails with `NoTokenFound` when the request carries no token at all.
pub fn default_extractor(query_param: &str, cookie_name: &str) -> PluginAggregateExtractor {
    let browser = CombinedExtractor::new(vec![
        Box::new(CookieBearerExtractor::new(cookie_name)),
        Box::new(QueryParamExtractor::new(query_param)),
    ]);
    PluginAggregateExtractor::new(vec![
        Box::new(RequiredToken::new(HeaderBearerExtractor::default())),
        Box::new(RequiredToken::new(browser)),
    ])
}

/// Read a JSON array of presets.
pub fn load_presets(path: &Path) -> Result<Vec<Preset>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: PRESETS_FILE_ENV,
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| invalid(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| invalid(format!("{}: {e}", path.display())))
}
