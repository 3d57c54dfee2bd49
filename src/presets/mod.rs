// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Presets
//!
//! Named bundles of cloud provider credentials, optionally restricted to
//! users of one email domain.
//!
//! ## Visibility
//!
//! A preset with an empty `required_email_domain` is global. Otherwise it is
//! visible to users whose email domain equals the required domain or is a
//! subdomain of it (case-insensitive, label aligned: `eng.example.com`
//! matches `example.com`, `notexample.com` does not).

pub mod cloud;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::auth::UserInfo;
use crate::error::ApiError;
use crate::storage::{PresetStore, StoreError};

pub use cloud::{CloudSpec, ProviderCredentials, ProviderKind};
use cloud::{
    AwsCredential, AzureCredential, DigitaloceanCredential, FakeCredential, GcpCredential, HetznerCredential,
    KubevirtCredential, OpenstackCredential, PacketCredential, VsphereCredential,
};

/// Credential bundle as loaded from the preset file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub required_email_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<ProviderCredentials<DigitaloceanCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hetzner: Option<ProviderCredentials<HetznerCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<ProviderCredentials<AwsCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<ProviderCredentials<AzureCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<ProviderCredentials<GcpCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<ProviderCredentials<OpenstackCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<ProviderCredentials<VsphereCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<ProviderCredentials<PacketCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<ProviderCredentials<KubevirtCredential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<ProviderCredentials<FakeCredential>>,
}

impl Preset {
    pub fn is_global(&self) -> bool {
        self.required_email_domain.is_empty()
    }

    /// Whether a user with email domain `domain` may see this preset.
    pub fn is_visible_to(&self, domain: &str) -> bool {
        if self.is_global() {
            return true;
        }
        let required = self.required_email_domain.to_ascii_lowercase();
        let domain = domain.to_ascii_lowercase();
        domain == required
            || domain
                .strip_suffix(required.as_str())
                .is_some_and(|head| head.ends_with('.'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("can not find provider to set credentials")]
    NoProvider,

    #[error("preset \"{0}\" not found")]
    PresetNotFound(String),

    #[error("no credential found for {provider} with name {name}")]
    NoCredentialFound { provider: ProviderKind, name: String },

    #[error("empty credential list for {provider}")]
    EmptyCredentialList { provider: ProviderKind },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PresetError> for ApiError {
    fn from(err: PresetError) -> Self {
        match err {
            PresetError::NoProvider | PresetError::EmptyCredentialList { .. } => ApiError::bad_request(err.to_string()),
            PresetError::PresetNotFound(_) | PresetError::NoCredentialFound { .. } => {
                ApiError::not_found(err.to_string())
            }
            PresetError::Store(e) => e.into(),
        }
    }
}

/// Resolves presets for a caller and fills cloud specs from them.
#[derive(Clone)]
pub struct CredentialPresetResolver {
    presets: Arc<dyn PresetStore>,
}

impl CredentialPresetResolver {
    pub fn new(presets: Arc<dyn PresetStore>) -> Self {
        Self { presets }
    }

    /// Find the preset for `user`.
    ///
    /// With a `name`, only a visible preset of that exact name matches.
    /// Without one, the visible preset with the most specific required
    /// domain wins and the first global preset is the fallback.
    pub async fn get_preset(&self, user: &UserInfo, name: Option<&str>) -> Result<Preset, PresetError> {
        let domain = user.email_domain();
        let visible: Vec<Preset> = self
            .presets
            .list_presets()
            .await?
            .into_iter()
            .filter(|p| p.is_visible_to(&domain))
            .collect();

        if let Some(name) = name {
            return visible
                .into_iter()
                .find(|p| p.name == name)
                .ok_or_else(|| PresetError::PresetNotFound(name.to_string()));
        }

        let mut best: Option<Preset> = None;
        for preset in visible {
            let better = match &best {
                None => true,
                Some(current) => preset.required_email_domain.len() > current.required_email_domain.len(),
            };
            if better {
                best = Some(preset);
            }
        }
        best.ok_or_else(|| PresetError::PresetNotFound(String::new()))
    }

    /// Return a copy of `cloud` with the provider secrets of credential
    /// `credential_name` from the caller's preset filled in.
    pub async fn set_cloud_credentials(
        &self,
        user: &UserInfo,
        credential_name: &str,
        cloud: &CloudSpec,
    ) -> Result<CloudSpec, PresetError> {
        let provider = cloud.provider().ok_or(PresetError::NoProvider)?;
        let preset = self.get_preset(user, None).await?;
        debug!(preset = %preset.name, %provider, credential = %credential_name, "applying preset credential");

        let mut filled = cloud.clone();
        preset.apply_credential(provider, credential_name, &mut filled)?;
        Ok(filled)
    }

    /// Credential names the caller's preset offers for `provider`. Empty when
    /// no preset is visible.
    pub async fn credential_names(&self, user: &UserInfo, provider: ProviderKind) -> Result<Vec<String>, PresetError> {
        match self.get_preset(user, None).await {
            Ok(preset) => Ok(preset.credential_names(provider)),
            Err(PresetError::PresetNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
