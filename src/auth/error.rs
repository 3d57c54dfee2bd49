// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

/// Authentication error type.
///
/// The variants record the precise cause for server-side logs. The HTTP
/// response built from any of them is generic (see [`IntoResponse`] below).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Verifier was handed an empty token
    #[error("empty token")]
    EmptyToken,
    /// No extractor produced a token
    #[error("no token found in the request")]
    NoTokenFound,
    /// Request context carries no token
    #[error("no token in request context")]
    MissingToken,
    /// Signature, expiry, claim or decoding failure
    #[error("token verification failed: {0}")]
    VerificationFailed(String),
    /// Service account token no longer present in the store
    #[error("token has been revoked")]
    Revoked,
    /// A supposedly unique lookup returned several records
    #[error("inconsistent token store: {0}")]
    Inconsistent(String),
    /// Aggregate verifier built with no plugins
    #[error("no token verifier plugins registered")]
    NoPluginsRegistered,
    /// Every registered verifier rejected the token
    #[error("unable to verify token")]
    UnableToVerify,
    /// Verification exceeded the request-scoped deadline
    #[error("token verification timed out")]
    Timeout,
    /// Verified claims carry no subject
    #[error("token has no subject")]
    MissingSubject,
    /// Subject could not be hashed into a user ID
    #[error("unable to derive user id from subject")]
    HashingFailed,
    /// Token was invalidated by a logout
    #[error("token has been invalidated")]
    TokenInvalidated,
    /// OIDC discovery or JWKS fetch failed
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
    /// Backing store failure while resolving the user
    #[error("store error: {0}")]
    Store(String),
}

impl AuthError {
    /// Get the error code for this error (logging only).
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::EmptyToken => "empty_token",
            AuthError::NoTokenFound => "no_token_found",
            AuthError::MissingToken => "missing_token",
            AuthError::VerificationFailed(_) => "verification_failed",
            AuthError::Revoked => "revoked",
            AuthError::Inconsistent(_) => "inconsistent",
            AuthError::NoPluginsRegistered => "no_plugins_registered",
            AuthError::UnableToVerify => "unable_to_verify",
            AuthError::Timeout => "timeout",
            AuthError::MissingSubject => "missing_subject",
            AuthError::HashingFailed => "hashing_failed",
            AuthError::TokenInvalidated => "token_invalidated",
            AuthError::KeyFetch(_) => "key_fetch",
            AuthError::Store(_) => "store",
        }
    }

    /// Internal-class failures surface as 500 instead of 401.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Inconsistent(_) | AuthError::Store(_))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_internal() {
            ApiError::internal("internal server error")
        } else {
            ApiError::unauthorized()
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
