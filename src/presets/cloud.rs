// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-provider credential records and the cloud specification they fill.
//!
//! [`ProviderKind`] selects a provider; every provider-specific step is an
//! explicit `match` on it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Preset, PresetError};

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Digitalocean,
    Hetzner,
    Aws,
    Azure,
    Gcp,
    Openstack,
    Vsphere,
    Packet,
    Kubevirt,
    Fake,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 10] = [
        ProviderKind::Digitalocean,
        ProviderKind::Hetzner,
        ProviderKind::Aws,
        ProviderKind::Azure,
        ProviderKind::Gcp,
        ProviderKind::Openstack,
        ProviderKind::Vsphere,
        ProviderKind::Packet,
        ProviderKind::Kubevirt,
        ProviderKind::Fake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Digitalocean => "digitalocean",
            ProviderKind::Hetzner => "hetzner",
            ProviderKind::Aws => "aws",
            ProviderKind::Azure => "azure",
            ProviderKind::Gcp => "gcp",
            ProviderKind::Openstack => "openstack",
            ProviderKind::Vsphere => "vsphere",
            ProviderKind::Packet => "packet",
            ProviderKind::Kubevirt => "kubevirt",
            ProviderKind::Fake => "fake",
        }
    }

    /// Case-insensitive parse of a provider name.
    pub fn parse(s: &str) -> Option<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Preset credentials
// =============================================================================

/// A provider's named credential list inside a preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ProviderCredentials<T> {
    #[serde(default)]
    pub credentials: Vec<T>,
}

impl<T> ProviderCredentials<T> {
    pub fn new(credentials: Vec<T>) -> Self {
        Self { credentials }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitaloceanCredential {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HetznerCredential {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredential {
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredential {
    pub name: String,
    pub tenant_id: String,
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpCredential {
    pub name: String,
    pub service_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenstackCredential {
    pub name: String,
    pub username: String,
    pub password: String,
    pub tenant: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VsphereCredential {
    pub name: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketCredential {
    pub name: String,
    pub api_key: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubevirtCredential {
    pub name: String,
    pub kubeconfig: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeCredential {
    pub name: String,
    pub token: String,
}

/// Named entry of a provider credential list.
pub trait NamedCredential {
    fn name(&self) -> &str;
}

impl NamedCredential for DigitaloceanCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for HetznerCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for AwsCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for AzureCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for GcpCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for OpenstackCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for VsphereCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for PacketCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for KubevirtCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedCredential for FakeCredential {
    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Cloud specification
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DigitaloceanCloudSpec {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HetznerCloudSpec {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsCloudSpec {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub vpc_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureCloudSpec {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub resource_group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GcpCloudSpec {
    #[serde(default)]
    pub service_account: String,
    #[serde(default)]
    pub network: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OpenstackCloudSpec {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub network: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VsphereCloudSpec {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub folder: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PacketCloudSpec {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KubevirtCloudSpec {
    #[serde(default)]
    pub kubeconfig: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FakeCloudSpec {
    #[serde(default)]
    pub token: String,
}

/// Cloud specification of a cluster. Exactly one provider should be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudSpec {
    #[serde(default)]
    pub datacenter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<DigitaloceanCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hetzner: Option<HetznerCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<VsphereCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<PacketCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubevirtCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<FakeCloudSpec>,
}

impl CloudSpec {
    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Digitalocean => self.digitalocean.is_some(),
            ProviderKind::Hetzner => self.hetzner.is_some(),
            ProviderKind::Aws => self.aws.is_some(),
            ProviderKind::Azure => self.azure.is_some(),
            ProviderKind::Gcp => self.gcp.is_some(),
            ProviderKind::Openstack => self.openstack.is_some(),
            ProviderKind::Vsphere => self.vsphere.is_some(),
            ProviderKind::Packet => self.packet.is_some(),
            ProviderKind::Kubevirt => self.kubevirt.is_some(),
            ProviderKind::Fake => self.fake.is_some(),
        }
    }

    /// The provider set on this spec, if exactly one is.
    pub fn provider(&self) -> Option<ProviderKind> {
        let mut set = ProviderKind::ALL.into_iter().filter(|k| self.has_provider(*k));
        match (set.next(), set.next()) {
            (Some(kind), None) => Some(kind),
            _ => None,
        }
    }
}

/// Find `name` in a provider's credential list.
fn find<'a, T: NamedCredential>(
    kind: ProviderKind,
    list: Option<&'a ProviderCredentials<T>>,
    name: &str,
) -> Result<&'a T, PresetError> {
    let credentials = match list {
        Some(list) if !list.credentials.is_empty() => &list.credentials,
        _ => return Err(PresetError::EmptyCredentialList { provider: kind }),
    };
    credentials
        .iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| PresetError::NoCredentialFound {
            provider: kind,
            name: name.to_string(),
        })
}

fn names<T: NamedCredential>(list: Option<&ProviderCredentials<T>>) -> Vec<String> {
    list.map(|l| l.credentials.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default()
}

impl Preset {
    /// Names of the credentials this preset holds for `kind`.
    pub fn credential_names(&self, kind: ProviderKind) -> Vec<String> {
        match kind {
            ProviderKind::Digitalocean => names(self.digitalocean.as_ref()),
            ProviderKind::Hetzner => names(self.hetzner.as_ref()),
            ProviderKind::Aws => names(self.aws.as_ref()),
            ProviderKind::Azure => names(self.azure.as_ref()),
            ProviderKind::Gcp => names(self.gcp.as_ref()),
            ProviderKind::Openstack => names(self.openstack.as_ref()),
            ProviderKind::Vsphere => names(self.vsphere.as_ref()),
            ProviderKind::Packet => names(self.packet.as_ref()),
            ProviderKind::Kubevirt => names(self.kubevirt.as_ref()),
            ProviderKind::Fake => names(self.fake.as_ref()),
        }
    }

    /// Copy the secret fields of credential `name` into `spec`'s `kind`
    /// section. Non-secret fields of the section are kept.
    pub fn apply_credential(&self, kind: ProviderKind, name: &str, spec: &mut CloudSpec) -> Result<(), PresetError> {
        match kind {
            ProviderKind::Digitalocean => {
                let c = find(kind, self.digitalocean.as_ref(), name)?;
                let target = spec.digitalocean.get_or_insert_with(Default::default);
                target.token = c.token.clone();
            }
            ProviderKind::Hetzner => {
                let c = find(kind, self.hetzner.as_ref(), name)?;
                let target = spec.hetzner.get_or_insert_with(Default::default);
                target.token = c.token.clone();
            }
            ProviderKind::Aws => {
                let c = find(kind, self.aws.as_ref(), name)?;
                let target = spec.aws.get_or_insert_with(Default::default);
                target.access_key_id = c.access_key_id.clone();
                target.secret_access_key = c.secret_access_key.clone();
            }
            ProviderKind::Azure => {
                let c = find(kind, self.azure.as_ref(), name)?;
                let target = spec.azure.get_or_insert_with(Default::default);
                target.tenant_id = c.tenant_id.clone();
                target.subscription_id = c.subscription_id.clone();
                target.client_id = c.client_id.clone();
                target.client_secret = c.client_secret.clone();
            }
            ProviderKind::Gcp => {
                let c = find(kind, self.gcp.as_ref(), name)?;
                let target = spec.gcp.get_or_insert_with(Default::default);
                target.service_account = c.service_account.clone();
            }
            ProviderKind::Openstack => {
                let c = find(kind, self.openstack.as_ref(), name)?;
                let target = spec.openstack.get_or_insert_with(Default::default);
                target.username = c.username.clone();
                target.password = c.password.clone();
                target.tenant = c.tenant.clone();
                target.domain = c.domain.clone();
            }
            ProviderKind::Vsphere => {
                let c = find(kind, self.vsphere.as_ref(), name)?;
                let target = spec.vsphere.get_or_insert_with(Default::default);
                target.username = c.username.clone();
                target.password = c.password.clone();
            }
            ProviderKind::Packet => {
                let c = find(kind, self.packet.as_ref(), name)?;
                let target = spec.packet.get_or_insert_with(Default::default);
                target.api_key = c.api_key.clone();
                target.project_id = c.project_id.clone();
            }
            ProviderKind::Kubevirt => {
                let c = find(kind, self.kubevirt.as_ref(), name)?;
                let target = spec.kubevirt.get_or_insert_with(Default::default);
                target.kubeconfig = c.kubeconfig.clone();
            }
            ProviderKind::Fake => {
                let c = find(kind, self.fake.as_ref(), name)?;
                let target = spec.fake.get_or_insert_with(Default::default);
                target.token = c.token.clone();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_requires_exactly_one_section() {
        assert_eq!(CloudSpec::default().provider(), None);

        let spec = CloudSpec {
            aws: Some(AwsCloudSpec::default()),
            ..Default::default()
        };
        assert_eq!(spec.provider(), Some(ProviderKind::Aws));

        let spec = CloudSpec {
            aws: Some(AwsCloudSpec::default()),
            gcp: Some(GcpCloudSpec::default()),
            ..Default::default()
        };
        assert_eq!(spec.provider(), None);
    }

    #[test]
    fn credential_list_defaults_to_empty() {
        let creds: ProviderCredentials<DigitaloceanCredential> = serde_json::from_str("{}").unwrap();
        assert!(creds.credentials.is_empty());

        let creds: ProviderCredentials<HetznerCredential> =
            serde_json::from_str(r#"{"credentials": [{"name": "main", "token": "t"}]}"#).unwrap();
        assert_eq!(creds.credentials[0].name, "main");
    }

    #[test]
    fn provider_names_parse_case_insensitively() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::parse(&kind.as_str().to_uppercase()), Some(kind));
        }
        assert_eq!(ProviderKind::parse("alibaba"), None);
    }

    #[test]
    fn apply_keeps_non_secret_fields() {
        let preset = Preset {
            name: "p".into(),
            openstack: Some(ProviderCredentials::new(vec![OpenstackCredential {
                name: "main".into(),
                username: "u".into(),
                password: "pw".into(),
                tenant: "t".into(),
                domain: "d".into(),
            }])),
            ..Default::default()
        };
        let mut spec = CloudSpec {
            openstack: Some(OpenstackCloudSpec {
                network: "net-1".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        preset.apply_credential(ProviderKind::Openstack, "main", &mut spec).unwrap();
        let os = spec.openstack.unwrap();
        assert_eq!(os.username, "u");
        assert_eq!(os.password, "pw");
        assert_eq!(os.network, "net-1");
    }

    #[test]
    fn empty_list_and_unknown_name_differ() {
        let preset = Preset {
            name: "p".into(),
            hetzner: Some(ProviderCredentials::new(vec![])),
            fake: Some(ProviderCredentials::new(vec![FakeCredential {
                name: "a".into(),
                token: "x".into(),
            }])),
            ..Default::default()
        };
        let mut spec = CloudSpec::default();
        assert_eq!(
            preset.apply_credential(ProviderKind::Hetzner, "a", &mut spec),
            Err(PresetError::EmptyCredentialList { provider: ProviderKind::Hetzner })
        );
        assert_eq!(
            preset.apply_credential(ProviderKind::Gcp, "a", &mut spec),
            Err(PresetError::EmptyCredentialList { provider: ProviderKind::Gcp })
        );
        assert_eq!(
            preset.apply_credential(ProviderKind::Fake, "b", &mut spec),
            Err(PresetError::NoCredentialFound {
                provider: ProviderKind::Fake,
                name: "b".into()
            })
        );
        assert_eq!(preset.credential_names(ProviderKind::Fake), vec!["a".to_string()]);
        assert!(preset.credential_names(ProviderKind::Aws).is_empty());
    }
}
