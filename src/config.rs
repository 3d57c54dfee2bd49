// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `OIDC_ISSUER_URL` | OIDC issuer used for discovery | OIDC disabled |
//! | `OIDC_CLIENT_ID` | Expected `aud` claim of ID tokens | Not checked |
//! | `SERVICE_ACCOUNT_SIGNING_KEY` | HS256 key for service account tokens (>= 32 bytes) | Required |
//! | `TOKEN_QUERY_PARAM` | Query parameter carrying a token | `token` |
//! | `TOKEN_COOKIE_NAME` | Cookie carrying a token | `token` |
//! | `PRESETS_FILE` | JSON file with the credential presets | No presets |
//! | `ADMIN_EMAILS` | Comma separated admin emails | None |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::auth::service_account::MIN_SIGNING_KEY_LEN;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const OIDC_ISSUER_URL_ENV: &str = "OIDC_ISSUER_URL";
pub const OIDC_CLIENT_ID_ENV: &str = "OIDC_CLIENT_ID";
pub const SERVICE_ACCOUNT_SIGNING_KEY_ENV: &str = "SERVICE_ACCOUNT_SIGNING_KEY";
pub const TOKEN_QUERY_PARAM_ENV: &str = "TOKEN_QUERY_PARAM";
pub const TOKEN_COOKIE_NAME_ENV: &str = "TOKEN_COOKIE_NAME";
pub const PRESETS_FILE_ENV: &str = "PRESETS_FILE";
pub const ADMIN_EMAILS_ENV: &str = "ADMIN_EMAILS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOKEN_PARAM: &str = "token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub oidc_issuer_url: Option<String>,
    pub oidc_client_id: Option<String>,
    pub service_account_signing_key: Vec<u8>,
    pub token_query_param: String,
    pub token_cookie_name: String,
    pub presets_file: Option<PathBuf>,
    pub admin_emails: Vec<String>,
    pub log_format: LogFormat,
}

// The signing key stays out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("oidc_issuer_url", &self.oidc_issuer_url)
            .field("oidc_client_id", &self.oidc_client_id)
            .field("token_query_param", &self.token_query_param)
            .field("token_cookie_name", &self.token_cookie_name)
            .field("presets_file", &self.presets_file)
            .field("admin_emails", &self.admin_emails)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source. Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let service_account_signing_key = get(SERVICE_ACCOUNT_SIGNING_KEY_ENV)
            .ok_or(ConfigError::Missing(SERVICE_ACCOUNT_SIGNING_KEY_ENV))?
            .into_bytes();
        if service_account_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid {
                name: SERVICE_ACCOUNT_SIGNING_KEY_ENV,
                reason: format!("must be at least {MIN_SIGNING_KEY_LEN} bytes"),
            });
        }

        let oidc_issuer_url = get(OIDC_ISSUER_URL_ENV);
        if let Some(issuer) = &oidc_issuer_url {
            url::Url::parse(issuer).map_err(|e| ConfigError::Invalid {
                name: OIDC_ISSUER_URL_ENV,
                reason: e.to_string(),
            })?;
        }

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected json or pretty, got {other}"),
                })
            }
        };

        let admin_emails = get(ADMIN_EMAILS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            oidc_issuer_url,
            oidc_client_id: get(OIDC_CLIENT_ID_ENV),
            service_account_signing_key,
            token_query_param: get(TOKEN_QUERY_PARAM_ENV).unwrap_or_else(|| DEFAULT_TOKEN_PARAM.to_string()),
            token_cookie_name: get(TOKEN_COOKIE_NAME_ENV).unwrap_or_else(|| DEFAULT_TOKEN_PARAM.to_string()),
            presets_file: get(PRESETS_FILE_ENV).map(PathBuf::from),
            admin_emails,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[(SERVICE_ACCOUNT_SIGNING_KEY_ENV, KEY)])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.oidc_issuer_url, None);
        assert_eq!(config.token_query_param, "token");
        assert_eq!(config.token_cookie_name, "token");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.admin_emails.is_empty());
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn signing_key_is_required_and_long_enough() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing(SERVICE_ACCOUNT_SIGNING_KEY_ENV)
        );
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[(SERVICE_ACCOUNT_SIGNING_KEY_ENV, "short")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn reads_all_values() {
        let config = AppConfig::from_lookup(lookup(&[
            (SERVICE_ACCOUNT_SIGNING_KEY_ENV, KEY),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (OIDC_ISSUER_URL_ENV, "https://dex.example.com/dex"),
            (OIDC_CLIENT_ID_ENV, "identity-dashboard"),
            (TOKEN_QUERY_PARAM_ENV, "access_token"),
            (TOKEN_COOKIE_NAME_ENV, "session"),
            (PRESETS_FILE_ENV, "/etc/presets.json"),
            (ADMIN_EMAILS_ENV, " Root@Acme.com, ,ops@acme.com"),
            (LOG_FORMAT_ENV, "json"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(config.oidc_issuer_url.as_deref(), Some("https://dex.example.com/dex"));
        assert_eq!(config.oidc_client_id.as_deref(), Some("identity-dashboard"));
        assert_eq!(config.token_query_param, "access_token");
        assert_eq!(config.token_cookie_name, "session");
        assert_eq!(config.presets_file, Some(PathBuf::from("/etc/presets.json")));
        assert_eq!(config.admin_emails, vec!["root@acme.com", "ops@acme.com"]);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (name, value) in [
            (PORT_ENV, "eighty"),
            (OIDC_ISSUER_URL_ENV, "not a url"),
            (LOG_FORMAT_ENV, "xml"),
        ] {
            let err = AppConfig::from_lookup(lookup(&[(SERVICE_ACCOUNT_SIGNING_KEY_ENV, KEY), (name, value)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: n, .. } if n == name));
        }
    }

    #[test]
    fn debug_output_hides_signing_key() {
        let config = AppConfig::from_lookup(lookup(&[(SERVICE_ACCOUNT_SIGNING_KEY_ENV, KEY)])).unwrap();
        assert!(!format!("{config:?}").contains(KEY));
    }
}
