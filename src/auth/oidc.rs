// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OIDC ID token verification against an external identity provider.
//!
//! Signature, expiry and issuer (plus audience when a client ID is
//! configured) are checked against the provider's published JWKS. The
//! payload is then read as a generic claim map.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};

use super::{AuthError, Claims, JwksManager, TokenVerifier};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

pub struct OidcVerifier {
    issuer: String,
    client_id: Option<String>,
    jwks: Arc<JwksManager>,
}

impl OidcVerifier {
    /// Verifier for `issuer`. Keys are discovered on first use.
    pub fn new(issuer: impl Into<String>, client_id: Option<String>) -> Result<Self, AuthError> {
        let issuer = issuer.into().trim_end_matches('/').to_string();
        let jwks = Arc::new(JwksManager::for_issuer(issuer.clone())?);
        Ok(Self {
            issuer,
            client_id,
            jwks,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Key manager, shared with the readiness probe.
    pub fn jwks(&self) -> Arc<JwksManager> {
        self.jwks.clone()
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    fn name(&self) -> &'static str {
        "oidc"
    }

    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        let header = decode_header(token).map_err(|e| AuthError::VerificationFailed(e.to_string()))?;
        let (decoding_key, algorithm) = match &header.kid {
            Some(kid) => self.jwks.get_decoding_key(kid).await?,
            None => self.jwks.get_any_decoding_key().await?,
        };
        if header.alg != algorithm {
            return Err(AuthError::VerificationFailed(format!(
                "token algorithm {:?} does not match key algorithm {algorithm:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[&self.issuer]);
        match &self.client_id {
            Some(client_id) => validation.set_audience(&[client_id]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;

        Ok(claims_from_map(&data.claims))
    }
}

/// Extract `sub`, `email`, `name`, `groups` and `exp` from a claim map.
///
/// Missing string claims become empty; `groups` entries that are not
/// strings are dropped.
fn claims_from_map(map: &Map<String, Value>) -> Claims {
    let string = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let groups = map
        .get("groups")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let expiry = map
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0));

    Claims {
        subject: string("sub"),
        email: string("email"),
        name: string("name"),
        groups,
        expiry,
    }
}


#[cfg(test)]
mod tests {
    use super::stub_issuer::{id_token, sign, spawn_issuer};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn empty_token_fails_without_network() {
        let verifier = OidcVerifier::new("http://127.0.0.1:1", None).unwrap();
        assert_eq!(verifier.verify("").await, Err(AuthError::EmptyToken));
    }

    #[tokio::test]
    async fn verifies_token_from_stub_issuer() {
        let issuer = spawn_issuer().await;
        let verifier = OidcVerifier::new(issuer.clone(), Some("identity-dashboard".into())).unwrap();

        let claims = verifier.verify(&sign(&id_token(&issuer, 3600))).await.unwrap();
        assert_eq!(claims.subject, "CgdCb2IxMjM0EgRtb2Nr");
        assert_eq!(claims.email, "bob@acme.com");
        assert_eq!(claims.name, "Bob");
        assert_eq!(claims.groups, vec!["dev".to_string(), "ops".to_string()]);
        assert!(claims.expiry.is_some());
    }

    #[tokio::test]
    async fn rejects_expired_and_foreign_tokens() {
        let issuer = spawn_issuer().await;
        let verifier = OidcVerifier::new(issuer.clone(), Some("identity-dashboard".into())).unwrap();

        let expired = sign(&id_token(&issuer, -3600));
        assert!(matches!(
            verifier.verify(&expired).await,
            Err(AuthError::VerificationFailed(_))
        ));

        let wrong_issuer = sign(&id_token("https://elsewhere.example", 3600));
        assert!(matches!(
            verifier.verify(&wrong_issuer).await,
            Err(AuthError::VerificationFailed(_))
        ));

        let mut wrong_aud = id_token(&issuer, 3600);
        wrong_aud["aud"] = json!("other-client");
        assert!(matches!(
            verifier.verify(&sign(&wrong_aud)).await,
            Err(AuthError::VerificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let issuer = spawn_issuer().await;
        let verifier = OidcVerifier::new(issuer, None).unwrap();
        assert!(matches!(
            verifier.verify("not-a-jwt").await,
            Err(AuthError::VerificationFailed(_))
        ));
    }

    #[test]
    fn claim_map_drops_non_string_groups() {
        let map = json!({"sub": "s", "groups": ["a", {"x": 1}, null, "b"]});
        let claims = claims_from_map(map.as_object().unwrap());
        assert_eq!(claims.groups, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(claims.email, "");
        assert!(claims.expiry.is_none());
    }
}
