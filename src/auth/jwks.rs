// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) discovery, fetching and caching.
//!
//! [`JwksManager::for_issuer`] reads `jwks_uri` from
//! `<issuer>/.well-known/openid-configuration` on first use and keeps it.
//!
//! Keys are cached with a TTL. A `kid` missing from the cached set forces
//! one refetch so provider key rotation is picked up without waiting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// HTTP timeout for discovery and JWKS requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Subset of the OpenID Connect discovery document.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    issuer: String,
    /// JWKS URL once discovered
    jwks_url: Arc<RwLock<Option<String>>>,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    client: reqwest::Client,
}

impl JwksManager {
    /// Manager that discovers the JWKS endpoint from an OIDC issuer.
    pub fn for_issuer(issuer: impl Into<String>) -> Result<Self, AuthError> {
        let issuer = issuer.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::KeyFetch(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            issuer,
            jwks_url: Arc::new(RwLock::new(None)),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client,
        })
    }

    /// Resolve the JWKS URL, running discovery at most once.
    async fn jwks_url(&self) -> Result<String, AuthError> {
        if let Some(url) = self.jwks_url.read().await.clone() {
            return Ok(url);
        }
        let issuer = &self.issuer;

        let discovery_url = format!("{issuer}/.well-known/openid-configuration");
        let doc: DiscoveryDocument = self.get_json(&discovery_url).await?;
        if doc.issuer.trim_end_matches('/') != issuer {
            return Err(AuthError::KeyFetch(format!(
                "discovery issuer mismatch: expected {issuer}, got {}",
                doc.issuer
            )));
        }

        *self.jwks_url.write().await = Some(doc.jwks_uri.clone());
        Ok(doc.jwks_uri)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!("HTTP {} from {url}", response.status())));
        }

        response.json().await.map_err(|e| AuthError::KeyFetch(e.to_string()))
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<JwkSet, AuthError> {
        let url = self.jwks_url().await?;
        let jwks: JwkSet = self.get_json(&url).await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    /// Get a decoding key for the given key ID.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = find_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        let jwks = self.refresh().await?;
        let jwk = find_key(&jwks, kid)
            .ok_or_else(|| AuthError::VerificationFailed(format!("no signing key with kid {kid}")))?;
        jwk_to_decoding_key(jwk)
    }

    /// Get any usable decoding key (for tokens without kid).
    pub async fn get_any_decoding_key(&self) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.get_jwks().await?;
        jwks.keys
            .iter()
            .find_map(|jwk| jwk_to_decoding_key(jwk).ok())
            .ok_or_else(|| AuthError::VerificationFailed("no usable signing key".to_string()))
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys.iter().find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| AuthError::VerificationFailed(format!("invalid RSA key: {e}")))?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                _ => Algorithm::RS256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| AuthError::VerificationFailed(format!("invalid EC key: {e}")))?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok((key, alg))
        }
        _ => Err(AuthError::VerificationFailed(
            "unsupported key type in JWKS".to_string(),
        )),
    }
}
