// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Pluggable token extraction and verification for project API callers.
//!
//! ## Auth Flow
//!
//! 1. The extractor chain reads a token from the `Authorization: Bearer`
//!    header, the `token` cookie or the `token` query parameter.
//! 2. The verifier chain tries, in order:
//!    - [`OidcVerifier`]: ID tokens from the external identity provider,
//!      checked against its discovered JWKS
//!    - [`ServiceAccountVerifier`]: locally issued HS256 tokens, checked
//!      against the token store for revocation
//! 3. The [`Authenticator`] hashes the subject into the user ID, resolves
//!    (or lazily creates) the user record and rejects logged-out tokens.
//! 4. Handlers receive the caller through the [`Auth`] extractor.
//!
//! ## Security
//!
//! - Every failure reaches the caller as a generic 401
//! - Verification is bounded to 10 seconds
//! - Clock skew tolerance for ID tokens is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod oidc;
pub mod roles;
pub mod service_account;
pub mod verifier;

pub use claims::{user_id_from_subject, AuthenticatedUser, Claims, UserInfo};
pub use error::AuthError;
pub use extractor::{
    Auth, CombinedExtractor, CookieBearerExtractor, HeaderBearerExtractor, PluginAggregateExtractor,
    QueryParamExtractor, RequiredToken, TokenExtractor,
};
pub use jwks::JwksManager;
pub use middleware::{authenticate, extract_token, Authenticator, CurrentUser, RequestContext};
pub use oidc::OidcVerifier;
pub use roles::GroupPrefix;
pub use service_account::{ServiceAccountTokenAuthenticator, ServiceAccountVerifier};
pub use verifier::{PluginAggregateVerifier, TokenVerifier};
