// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token extraction from HTTP requests, and the axum extractor for the
//! authenticated caller.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is CurrentUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use super::{AuthError, CurrentUser, RequestContext};

/// Length of the `"Bearer "` scheme prefix.
const BEARER_PREFIX_LEN: usize = 7;

/// Pulls a raw token out of a request.
///
/// Source-specific extractors return an empty string when their source is
/// absent. Only aggregates report errors.
pub trait TokenExtractor: Send + Sync {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError>;
}

/// Reads `<header>: <scheme> <token>` and returns everything after the
/// 7-character scheme prefix.
///
/// A header shorter than the prefix yields an empty token, and so does a
/// header equal to the prefix.
#[derive(Debug, Clone)]
pub struct HeaderBearerExtractor {
    header: String,
}

impl HeaderBearerExtractor {
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into() }
    }
}

impl Default for HeaderBearerExtractor {
    fn default() -> Self {
        Self::new(AUTHORIZATION.as_str())
    }
}

impl TokenExtractor for HeaderBearerExtractor {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError> {
        let value = parts
            .headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(value.get(BEARER_PREFIX_LEN..).unwrap_or_default().to_string())
    }
}

/// Reads a token from a query parameter.
#[derive(Debug, Clone)]
pub struct QueryParamExtractor {
    param: String,
}

impl QueryParamExtractor {
    pub fn new(param: impl Into<String>) -> Self {
        Self { param: param.into() }
    }
}

impl TokenExtractor for QueryParamExtractor {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError> {
        let query = parts.uri.query().unwrap_or_default();
        Ok(url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == self.param.as_str())
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default())
    }
}

/// Reads a token from a named cookie.
#[derive(Debug, Clone)]
pub struct CookieBearerExtractor {
    cookie: String,
}

impl CookieBearerExtractor {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self { cookie: cookie.into() }
    }
}

impl TokenExtractor for CookieBearerExtractor {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError> {
        let token = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie)
            .map(|(_, value)| value.trim_matches('"').to_string());
        Ok(token.unwrap_or_default())
    }
}

/// Tries each extractor in order and returns the first non-empty token.
///
/// Never fails: errors from inner extractors count as "nothing found" and
/// the result is empty when no source carries a token.
pub struct CombinedExtractor {
    extractors: Vec<Box<dyn TokenExtractor>>,
}

impl CombinedExtractor {
    pub fn new(extractors: Vec<Box<dyn TokenExtractor>>) -> Self {
        Self { extractors }
    }
}

impl TokenExtractor for CombinedExtractor {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError> {
        Ok(self
            .extractors
            .iter()
            .filter_map(|e| e.extract(parts).ok())
            .find(|token| !token.is_empty())
            .unwrap_or_default())
    }
}

/// Fails with [`AuthError::NoTokenFound`] where the inner extractor finds
/// nothing, which lets error-free extractors act as aggregate plugins.
pub struct RequiredToken<E> {
    inner: E,
}

impl<E: TokenExtractor> RequiredToken<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: TokenExtractor> TokenExtractor for RequiredToken<E> {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError> {
        match self.inner.extract(parts)? {
            token if token.is_empty() => Err(AuthError::NoTokenFound),
            token => Ok(token),
        }
    }
}

/// Ordered list of extractor plugins; the first one that returns without
/// error wins.
///
/// Fails with [`AuthError::NoTokenFound`] when the list is empty or every
/// plugin fails. Individual failures are not reported.
pub struct PluginAggregateExtractor {
    plugins: Vec<Box<dyn TokenExtractor>>,
}

impl PluginAggregateExtractor {
    pub fn new(plugins: Vec<Box<dyn TokenExtractor>>) -> Self {
        Self { plugins }
    }
}

impl TokenExtractor for PluginAggregateExtractor {
    fn extract(&self, parts: &Parts) -> Result<String, AuthError> {
        self.plugins
            .iter()
            .find_map(|plugin| plugin.extract(parts).ok())
            .ok_or(AuthError::NoTokenFound)
    }
}

/// Extractor for the authenticated caller.
///
/// Reads the [`RequestContext`] left in the request extensions by the
/// authentication middleware. Rejects with 401 when the request was not
/// authenticated.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(Auth(caller): Auth) -> Json<String> {
///     Json(caller.user.email)
/// }
/// ```
pub struct Auth(pub CurrentUser);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(RequestContext::current_user)
            .map(Auth)
            .ok_or(AuthError::MissingToken)
    }
}
