// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Two layers run in order on every protected route:
//!
//! 1. [`extract_token`] pulls the raw token out of the request with the
//!    configured extractor chain and stores it in a fresh [`RequestContext`].
//! 2. [`authenticate`] runs the [`Authenticator`] state machine over that
//!    context and replaces it with the authenticated one.
//!
//! ## State Machine
//!
//! ```text
//! Unauthenticated -> TokenExtracted -> ClaimsVerified -> UserResolved -> Authenticated
//! ```
//!
//! Any step can end in "not authorized". The precise cause is logged with
//! the stage it happened in; the response is always the generic 401 (or a
//! generic 500 for store failures and invariant violations).
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/v1/me", get(me))
//!     .route_layer(from_fn_with_state(state.clone(), authenticate))
//!     .route_layer(from_fn_with_state(state.clone(), extract_token));
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{AuthError, AuthenticatedUser, TokenVerifier, UserInfo};
use crate::models::{normalize_email, User};
use crate::state::AppState;
use crate::storage::{StoreError, UserStore};

/// Upper bound on one token verification.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request authentication state, stored in the request extensions.
///
/// Built incrementally through [`RequestContextBuilder`]; downstream code
/// reads it through typed accessors or the [`super::Auth`] extractor.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    raw_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
    identity: Option<AuthenticatedUser>,
    user: Option<User>,
}

impl RequestContext {
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Builder seeded with this context's fields.
    pub fn to_builder(&self) -> RequestContextBuilder {
        RequestContextBuilder { ctx: self.clone() }
    }

    pub fn raw_token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token_expiry
    }

    pub fn identity(&self) -> Option<&AuthenticatedUser> {
        self.identity.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The authenticated caller, if every stage completed.
    pub fn current_user(&self) -> Option<CurrentUser> {
        Some(CurrentUser {
            user: self.user.clone()?,
            identity: self.identity.clone()?,
            token: self.raw_token.clone()?,
            token_expiry: self.token_expiry,
        })
    }
}

#[derive(Debug, Default)]
pub struct RequestContextBuilder {
    ctx: RequestContext,
}

impl RequestContextBuilder {
    pub fn raw_token(mut self, token: impl Into<String>) -> Self {
        self.ctx.raw_token = Some(token.into());
        self
    }

    pub fn token_expiry(mut self, expiry: Option<DateTime<Utc>>) -> Self {
        self.ctx.token_expiry = expiry;
        self
    }

    pub fn identity(mut self, identity: AuthenticatedUser) -> Self {
        self.ctx.identity = Some(identity);
        self
    }

    pub fn user(mut self, user: User) -> Self {
        self.ctx.user = Some(user);
        self
    }

    pub fn build(self) -> RequestContext {
        self.ctx
    }
}

/// Authenticated caller handed to handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Stored user record
    pub user: User,
    /// Identity from the verified token
    pub identity: AuthenticatedUser,
    /// Raw token the request was authenticated with
    pub token: String,
    pub token_expiry: Option<DateTime<Utc>>,
}

impl CurrentUser {
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            email: self.user.email.clone(),
            groups: self.identity.groups.clone(),
            is_admin: self.user.is_admin,
        }
    }
}

/// Stage reached when authentication stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unauthenticated,
    TokenExtracted,
    ClaimsVerified,
    UserResolved,
    Authenticated,
}

impl AuthStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStage::Unauthenticated => "unauthenticated",
            AuthStage::TokenExtracted => "token_extracted",
            AuthStage::ClaimsVerified => "claims_verified",
            AuthStage::UserResolved => "user_resolved",
            AuthStage::Authenticated => "authenticated",
        }
    }
}

/// Turns an extracted token into an authenticated [`RequestContext`].
///
/// Holds no per-request state; one instance serves every request.
pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
    users: Arc<dyn UserStore>,
    admin_emails: Vec<String>,
    verify_timeout: Duration,
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn TokenVerifier>, users: Arc<dyn UserStore>) -> Self {
        Self {
            verifier,
            users,
            admin_emails: Vec::new(),
            verify_timeout: VERIFY_TIMEOUT,
        }
    }

    /// Emails that get `is_admin` when their user record is first created.
    pub fn with_admin_emails(mut self, emails: Vec<String>) -> Self {
        self.admin_emails = emails.iter().map(|e| normalize_email(e)).collect();
        self
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Run every stage over `ctx`. Failures are logged with their stage.
    pub async fn authenticate(&self, ctx: &RequestContext) -> Result<RequestContext, AuthError> {
        let mut stage = AuthStage::Unauthenticated;
        match self.run(ctx, &mut stage).await {
            Ok(ctx) => {
                if let Some(user) = ctx.user() {
                    debug!(user_id = %user.id, "request authenticated");
                }
                Ok(ctx)
            }
            Err(err) => {
                warn!(
                    stage = stage.as_str(),
                    code = err.error_code(),
                    error = %err,
                    "authentication failed"
                );
                Err(err)
            }
        }
    }

    async fn run(&self, ctx: &RequestContext, stage: &mut AuthStage) -> Result<RequestContext, AuthError> {
        let token = ctx
            .raw_token()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        *stage = AuthStage::TokenExtracted;

        let claims = tokio::time::timeout(self.verify_timeout, self.verifier.verify(token))
            .await
            .map_err(|_| AuthError::Timeout)??;
        *stage = AuthStage::ClaimsVerified;

        let identity = AuthenticatedUser::from_claims(&claims)?;
        let user = self.resolve_user(&identity).await?;
        *stage = AuthStage::UserResolved;

        let invalidated = self
            .users
            .is_token_invalidated(&user.id, token)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        if invalidated {
            return Err(AuthError::TokenInvalidated);
        }
        *stage = AuthStage::Authenticated;

        Ok(ctx
            .to_builder()
            .token_expiry(claims.expiry)
            .identity(identity)
            .user(user)
            .build())
    }

    /// Get the user record for `identity`, creating it on first sight.
    async fn resolve_user(&self, identity: &AuthenticatedUser) -> Result<User, AuthError> {
        if identity.email.is_empty() {
            return Err(AuthError::VerificationFailed("token carries no email".to_string()));
        }
        let store_err = |e: StoreError| AuthError::Store(e.to_string());

        if let Some(user) = self.users.find_user_by_email(&identity.email).await.map_err(store_err)? {
            return Ok(user);
        }

        let email = normalize_email(&identity.email);
        let mut user = User::new(identity.id.clone(), identity.name.clone(), email.clone());
        user.is_admin = self.admin_emails.contains(&email);

        match self.users.create_user(user).await {
            Ok(user) => {
                info!(user_id = %user.id, is_admin = user.is_admin, "created user on first login");
                Ok(user)
            }
            // A concurrent request created it first.
            Err(StoreError::AlreadyExists(_)) => self
                .users
                .find_user_by_email(&identity.email)
                .await
                .map_err(store_err)?
                .ok_or_else(|| AuthError::Store(format!("user {} vanished after create", identity.id))),
            Err(e) => Err(store_err(e)),
        }
    }
}

/// Extraction layer: store the raw token in a new [`RequestContext`].
pub async fn extract_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let token = match state.extractor.extract(&parts) {
        Ok(token) => token,
        Err(err) => {
            warn!(stage = AuthStage::Unauthenticated.as_str(), error = %err, "token extraction failed");
            return err.into_response();
        }
    };
    parts
        .extensions
        .insert(RequestContext::builder().raw_token(token).build());
    next.run(Request::from_parts(parts, body)).await
}

/// Authentication layer: verify the extracted token and resolve the user.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();
    let ctx = state.authenticator.authenticate(&ctx).await?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{user_id_from_subject, Claims};
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;

    struct Fixture;

    #[async_trait]
    impl TokenVerifier for Fixture {
        fn name(&self) -> &'static str {
            "fixture"
        }

        async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
            match token {
                "bob" => Ok(Claims {
                    subject: "bob-subject".into(),
                    email: "bob@acme.com".into(),
                    name: "Bob".into(),
                    groups: vec!["dev".into()],
                    expiry: None,
                }),
                "bob-mixed-case" => Ok(Claims {
                    subject: "bob-subject".into(),
                    email: "Bob@Acme.COM".into(),
                    name: "Bob".into(),
                    groups: vec![],
                    expiry: None,
                }),
                "anonymous" => Ok(Claims {
                    email: "anon@acme.com".into(),
                    ..Default::default()
                }),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Err(AuthError::UnableToVerify)
                }
                _ => Err(AuthError::VerificationFailed("bad signature".into())),
            }
        }
    }

    fn authenticator(store: Arc<InMemoryStore>) -> Authenticator {
        Authenticator::new(Arc::new(Fixture), store)
    }

    fn ctx(token: &str) -> RequestContext {
        RequestContext::builder().raw_token(token).build()
    }

    #[tokio::test]
    async fn valid_token_creates_user_once() {
        let store = Arc::new(InMemoryStore::new());
        let auth = authenticator(store.clone());

        let first = auth.authenticate(&ctx("bob")).await.unwrap();
        let second = auth.authenticate(&ctx("bob")).await.unwrap();

        let user = first.user().unwrap();
        assert_eq!(user.email, "bob@acme.com");
        assert_eq!(user.id, user_id_from_subject("bob-subject").unwrap());
        assert!(!user.is_admin);
        assert_eq!(second.user().unwrap().id, user.id);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
        assert_eq!(first.identity().unwrap().groups, vec!["dev".to_string()]);
    }

    #[tokio::test]
    async fn existing_user_is_reused() {
        let store = Arc::new(InMemoryStore::new());
        let mut existing = User::new("preexisting", "Robert", "bob@acme.com");
        existing.is_admin = true;
        store.create_user(existing).await.unwrap();

        let ctx = authenticator(store).authenticate(&ctx("bob")).await.unwrap();
        let user = ctx.current_user().unwrap();
        assert_eq!(user.user.id, "preexisting");
        assert!(user.user_info().is_admin);
    }

    #[tokio::test]
    async fn email_case_does_not_split_users() {
        let store = Arc::new(InMemoryStore::new());
        let auth = authenticator(store.clone());

        let mixed = auth.authenticate(&ctx("bob-mixed-case")).await.unwrap();
        assert_eq!(mixed.user().unwrap().email, "bob@acme.com");
        let lower = auth.authenticate(&ctx("bob")).await.unwrap();
        assert_eq!(lower.user().unwrap().id, mixed.user().unwrap().id);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_emails_apply_on_creation() {
        let store = Arc::new(InMemoryStore::new());
        let auth = authenticator(store).with_admin_emails(vec!["Bob@Acme.com".into()]);
        let ctx = auth.authenticate(&ctx("bob")).await.unwrap();
        assert!(ctx.user().unwrap().is_admin);
    }

    #[tokio::test]
    async fn missing_or_empty_token_is_rejected() {
        let auth = authenticator(Arc::new(InMemoryStore::new()));
        assert_eq!(
            auth.authenticate(&RequestContext::default()).await.unwrap_err(),
            AuthError::MissingToken
        );
        assert_eq!(auth.authenticate(&ctx("")).await.unwrap_err(), AuthError::MissingToken);
    }

    #[tokio::test]
    async fn verification_failure_is_rejected() {
        let auth = authenticator(Arc::new(InMemoryStore::new()));
        let err = auth.authenticate(&ctx("forged")).await.unwrap_err();
        assert!(matches!(err, AuthError::VerificationFailed(_)));
        assert_eq!(err.into_response().status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let auth = authenticator(Arc::new(InMemoryStore::new()));
        assert_eq!(
            auth.authenticate(&ctx("anonymous")).await.unwrap_err(),
            AuthError::MissingSubject
        );
    }

    #[tokio::test]
    async fn slow_verification_times_out() {
        let auth = authenticator(Arc::new(InMemoryStore::new())).with_verify_timeout(Duration::from_millis(20));
        assert_eq!(auth.authenticate(&ctx("slow")).await.unwrap_err(), AuthError::Timeout);
    }

    #[tokio::test]
    async fn invalidated_token_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let auth = authenticator(store.clone());
        let user = auth.authenticate(&ctx("bob")).await.unwrap().user().cloned().unwrap();

        store
            .invalidate_token(&user.id, "bob", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(
            auth.authenticate(&ctx("bob")).await.unwrap_err(),
            AuthError::TokenInvalidated
        );
    }

    #[test]
    fn builder_keeps_existing_fields() {
        let base = RequestContext::builder().raw_token("tok").build();
        let extended = base.to_builder().user(User::new("u", "n", "e@x.io")).build();
        assert_eq!(extended.raw_token(), Some("tok"));
        assert!(extended.user().is_some());
        assert!(extended.current_user().is_none());
    }
}
