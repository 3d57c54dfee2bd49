// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Locally issued service account JWTs.
//!
//! Tokens are HS256 signed with the server's service account key and carry
//! the service account email, the project and the token ID. A token is only
//! valid while its record exists in the token store, so deleting the record
//! revokes it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, Claims, TokenVerifier};
use crate::storage::{ServiceAccountTokenStore, TokenFilter};

/// `iss` claim of every service account token.
pub const SERVICE_ACCOUNT_ISSUER: &str = "project-identity-server";

/// Default token lifetime (3 years).
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::days(3 * 365);

/// Minimum HS256 key length in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Payload of a service account token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountClaims {
    pub email: String,
    pub project_id: String,
    pub token_id: String,
    /// Unique per issued secret, so a regenerated token never equals the old one.
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl ServiceAccountClaims {
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }
}

/// Issues and parses service account tokens. Parsing is local, no store
/// or network access.
pub struct ServiceAccountTokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for ServiceAccountTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokenAuthenticator").finish_non_exhaustive()
    }
}

impl ServiceAccountTokenAuthenticator {
    pub fn new(signing_key: &[u8]) -> Result<Self, AuthError> {
        if signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(AuthError::VerificationFailed(format!(
                "service account signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
        })
    }

    /// Sign a new token. Returns the JWT and its expiry.
    pub fn generate(
        &self,
        email: &str,
        project_id: &str,
        token_id: &str,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expiry = now + DEFAULT_TOKEN_LIFETIME;
        let claims = ServiceAccountClaims {
            email: email.to_string(),
            project_id: project_id.to_string(),
            token_id: token_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: SERVICE_ACCOUNT_ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expiry.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;
        Ok((token, expiry))
    }

    /// Check signature, issuer and validity window, and return the claims.
    pub fn authenticate(&self, token: &str) -> Result<ServiceAccountClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SERVICE_ACCOUNT_ISSUER]);
        validation.validate_nbf = true;
        validation.validate_aud = false;
        decode::<ServiceAccountClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))
    }
}

/// Verifies service account tokens and checks they have not been revoked.
pub struct ServiceAccountVerifier {
    authenticator: Arc<ServiceAccountTokenAuthenticator>,
    tokens: Arc<dyn ServiceAccountTokenStore>,
}

impl ServiceAccountVerifier {
    pub fn new(
        authenticator: Arc<ServiceAccountTokenAuthenticator>,
        tokens: Arc<dyn ServiceAccountTokenStore>,
    ) -> Self {
        Self { authenticator, tokens }
    }
}

#[async_trait]
impl TokenVerifier for ServiceAccountVerifier {
    fn name(&self) -> &'static str {
        "service_account"
    }

    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        let parsed = self.authenticator.authenticate(token)?;

        let matches = self
            .tokens
            .list_tokens(&TokenFilter::by_id(&parsed.token_id))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        match matches.len() {
            0 => Err(AuthError::Revoked),
            // A regenerated token keeps its ID but not its secret.
            1 if matches[0].token != token => Err(AuthError::Revoked),
            1 => Ok(Claims {
                subject: parsed.email.clone(),
                name: parsed.email.clone(),
                expiry: parsed.expiry(),
                email: parsed.email,
                groups: Vec::new(),
            }),
            n => Err(AuthError::Inconsistent(format!(
                "found {n} tokens with id {}",
                parsed.token_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceAccountToken;
    use crate::storage::{InMemoryStore, StoreResult};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn authenticator() -> Arc<ServiceAccountTokenAuthenticator> {
        Arc::new(ServiceAccountTokenAuthenticator::new(KEY).unwrap())
    }

    fn record(id: &str, jwt: &str) -> ServiceAccountToken {
        ServiceAccountToken {
            id: id.into(),
            name: format!("name-{id}"),
            project_id: "p1".into(),
            service_account_id: "sa1".into(),
            expiry: Utc::now() + Duration::days(1),
            token: jwt.into(),
            created_at: Utc::now(),
        }
    }

    /// Store that ignores the filter, to simulate a broken uniqueness invariant.
    struct Duplicating(Vec<ServiceAccountToken>);

    #[async_trait]
    impl ServiceAccountTokenStore for Duplicating {
        async fn list_tokens(&self, _filter: &TokenFilter) -> StoreResult<Vec<ServiceAccountToken>> {
            Ok(self.0.clone())
        }
        async fn create_token(&self, token: ServiceAccountToken) -> StoreResult<ServiceAccountToken> {
            Ok(token)
        }
        async fn update_token(&self, token: ServiceAccountToken) -> StoreResult<ServiceAccountToken> {
            Ok(token)
        }
        async fn delete_token(&self, _id: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(ServiceAccountTokenAuthenticator::new(b"short").is_err());
    }

    #[test]
    fn generate_then_authenticate() {
        let auth = authenticator();
        let (jwt, expiry) = auth
            .generate("serviceaccount-abc@localhost", "p1", "tok1")
            .unwrap();
        let claims = auth.authenticate(&jwt).unwrap();
        assert_eq!(claims.email, "serviceaccount-abc@localhost");
        assert_eq!(claims.project_id, "p1");
        assert_eq!(claims.token_id, "tok1");
        assert_eq!(claims.expiry().unwrap().timestamp(), expiry.timestamp());
        assert!(expiry > Utc::now() + Duration::days(3 * 365 - 1));
    }

    #[test]
    fn foreign_key_is_rejected() {
        let (jwt, _) = authenticator().generate("sa@localhost", "p1", "t").unwrap();
        let other = ServiceAccountTokenAuthenticator::new(b"ffffffffffffffffffffffffffffffff").unwrap();
        assert!(matches!(
            other.authenticate(&jwt),
            Err(AuthError::VerificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn stored_token_verifies_as_service_account() {
        let auth = authenticator();
        let (jwt, _) = auth.generate("serviceaccount-abc@localhost", "p1", "tok1").unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.create_token(record("tok1", &jwt)).await.unwrap();

        let verifier = ServiceAccountVerifier::new(auth, store);
        let claims = verifier.verify(&jwt).await.unwrap();
        assert_eq!(claims.subject, "serviceaccount-abc@localhost");
        assert_eq!(claims.email, "serviceaccount-abc@localhost");
    }

    #[tokio::test]
    async fn deleted_token_is_revoked() {
        let auth = authenticator();
        let (jwt, _) = auth.generate("sa@localhost", "p1", "tok1").unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.create_token(record("tok1", &jwt)).await.unwrap();
        store.delete_token("tok1").await.unwrap();

        let verifier = ServiceAccountVerifier::new(auth, store);
        assert_eq!(verifier.verify(&jwt).await, Err(AuthError::Revoked));
    }

    #[tokio::test]
    async fn replaced_secret_is_revoked() {
        let auth = authenticator();
        let (jwt, _) = auth.generate("sa@localhost", "p1", "tok1").unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.create_token(record("tok1", "regenerated-secret")).await.unwrap();

        let verifier = ServiceAccountVerifier::new(auth, store);
        assert_eq!(verifier.verify(&jwt).await, Err(AuthError::Revoked));
    }

    #[tokio::test]
    async fn duplicate_records_are_inconsistent() {
        let auth = authenticator();
        let (jwt, _) = auth.generate("sa@localhost", "p1", "tok1").unwrap();
        let store = Arc::new(Duplicating(vec![record("tok1", &jwt), record("tok1", &jwt)]));

        let err = ServiceAccountVerifier::new(auth, store).verify(&jwt).await.unwrap_err();
        assert!(matches!(err, AuthError::Inconsistent(_)));
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let verifier = ServiceAccountVerifier::new(authenticator(), Arc::new(InMemoryStore::new()));
        assert_eq!(verifier.verify("").await, Err(AuthError::EmptyToken));
    }
}
