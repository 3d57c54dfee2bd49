// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth,
    models::{
        AddMemberRequest, ApiProject, ApiServiceAccount, ApiServiceAccountToken, ApiUser, CreateProjectRequest,
        EditMemberRequest, ProjectGroup, ProjectStatus, PublicServiceAccountToken, ServiceAccountRequest,
        TokenNameRequest, UserSettings,
    },
    presets::{
        cloud::{
            AwsCloudSpec, AzureCloudSpec, DigitaloceanCloudSpec, FakeCloudSpec, GcpCloudSpec, HetznerCloudSpec,
            KubevirtCloudSpec, OpenstackCloudSpec, PacketCloudSpec, VsphereCloudSpec,
        },
        CloudSpec, ProviderKind,
    },
    state::AppState,
};

pub mod health;
pub mod members;
pub mod presets;
pub mod projects;
pub mod service_accounts;
pub mod tokens;
pub mod users;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    // Route layers run outermost-last: extraction, then authentication.
    let v1_routes = Router::new()
        .route("/me", get(users::me))
        .route("/me/logout", post(users::logout))
        .route("/me/settings", get(users::get_settings).patch(users::patch_settings))
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/projects/{project_id}",
            get(projects::get_project).delete(projects::delete_project),
        )
        .route(
            "/projects/{project_id}/users",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/projects/{project_id}/users/{user_id}",
            put(members::edit_member).delete(members::delete_member),
        )
        .route(
            "/projects/{project_id}/serviceaccounts",
            get(service_accounts::list_service_accounts).post(service_accounts::create_service_account),
        )
        .route(
            "/projects/{project_id}/serviceaccounts/{sa_id}",
            put(service_accounts::update_service_account).delete(service_accounts::delete_service_account),
        )
        .route(
            "/projects/{project_id}/serviceaccounts/{sa_id}/tokens",
            get(tokens::list_tokens).post(tokens::create_token),
        )
        .route(
            "/projects/{project_id}/serviceaccounts/{sa_id}/tokens/{token_id}",
            put(tokens::update_token)
                .patch(tokens::patch_token)
                .delete(tokens::delete_token),
        )
        .route(
            "/providers/{provider}/presets/credentials",
            get(presets::list_credentials),
        )
        .route("/presets/cloud-credentials", post(presets::set_cloud_credentials))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::extract_token));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        users::me,
        users::logout,
        users::get_settings,
        users::patch_settings,
        projects::list_projects,
        projects::create_project,
        projects::get_project,
        projects::delete_project,
        members::list_members,
        members::add_member,
        members::edit_member,
        members::delete_member,
        service_accounts::list_service_accounts,
        service_accounts::create_service_account,
        service_accounts::update_service_account,
        service_accounts::delete_service_account,
        tokens::list_tokens,
        tokens::create_token,
        tokens::update_token,
        tokens::patch_token,
        tokens::delete_token,
        presets::list_credentials,
        presets::set_cloud_credentials
    ),
    components(
        schemas(
            ApiUser,
            UserSettings,
            ProjectGroup,
            ApiProject,
            ProjectStatus,
            CreateProjectRequest,
            ApiServiceAccount,
            ServiceAccountRequest,
            AddMemberRequest,
            EditMemberRequest,
            TokenNameRequest,
            ApiServiceAccountToken,
            PublicServiceAccountToken,
            ProviderKind,
            CloudSpec,
            DigitaloceanCloudSpec,
            HetznerCloudSpec,
            AwsCloudSpec,
            AzureCloudSpec,
            GcpCloudSpec,
            OpenstackCloudSpec,
            VsphereCloudSpec,
            PacketCloudSpec,
            KubevirtCloudSpec,
            FakeCloudSpec,
            presets::CredentialList,
            presets::CloudCredentialsRequest,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Users", description = "Current user, settings and logout"),
        (name = "Projects", description = "Project lifecycle"),
        (name = "Members", description = "Project membership management"),
        (name = "ServiceAccounts", description = "Project service accounts"),
        (name = "Tokens", description = "Service account tokens"),
        (name = "Presets", description = "Credential presets")
    )
)]
struct ApiDoc;

/// Router-level fixtures shared by the handler tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            Method, Request, StatusCode,
        },
        Router,
    };
    use chrono::{Duration, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::{
        user_id_from_subject, AuthError, Claims, PluginAggregateVerifier, ServiceAccountTokenAuthenticator,
        ServiceAccountVerifier, TokenVerifier,
    };
    use crate::models::{OwnerReference, Project, User, UserProjectBinding};
    use crate::presets::cloud::FakeCredential;
    use crate::presets::{Preset, ProviderCredentials};
    use crate::state::{default_extractor, AppState};
    use crate::storage::{BindingStore, InMemoryStore, ProjectStore, UserStore};

    pub const BOB_TOKEN: &str = "fakeTokenId";
    pub const BOB_EMAIL: &str = "bob@acme.com";
    pub const BOB_SUBJECT: &str = "1233";
    pub const JOHN_TOKEN: &str = "johnTokenId";
    pub const ADMIN_TOKEN: &str = "adminTokenId";
    pub const ADMIN_EMAIL: &str = "root@acme.com";
    pub const PROJECT: &str = "my-first-project-ID";
    pub const OTHER_PROJECT: &str = "other-project-ID";
    pub const JOHN_ID: &str = "john-id";
    pub const JOHN_EMAIL: &str = "john@acme.com";
    pub const ALICE_EMAIL: &str = "alice@acme.com";
    pub const SA_ID: &str = "sa-1";
    pub const SA_EMAIL: &str = "serviceaccount-1@localhost";

    const SIGNING_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    /// Maps fixed test tokens to identities.
    pub struct FakeVerifier;

    #[async_trait]
    impl TokenVerifier for FakeVerifier {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
            let expiry = Some(Utc::now() + Duration::hours(1));
            match token {
                BOB_TOKEN => Ok(Claims {
                    subject: BOB_SUBJECT.into(),
                    email: BOB_EMAIL.into(),
                    name: "Bob".into(),
                    groups: vec![],
                    expiry,
                }),
                JOHN_TOKEN => Ok(Claims {
                    subject: "john-subject".into(),
                    email: JOHN_EMAIL.into(),
                    name: "John".into(),
                    groups: vec![],
                    expiry,
                }),
                ADMIN_TOKEN => Ok(Claims {
                    subject: "root-subject".into(),
                    email: ADMIN_EMAIL.into(),
                    name: "Root".into(),
                    groups: vec![],
                    expiry,
                }),
                _ => Err(AuthError::VerificationFailed("unknown test token".into())),
            }
        }
    }

    pub fn bob_id() -> String {
        user_id_from_subject(BOB_SUBJECT).unwrap()
    }

    async fn bind(store: &InMemoryStore, project: &str, email: &str, group: &str) {
        store
            .create_binding(UserProjectBinding {
                name: format!("{project}-{email}"),
                project_id: project.into(),
                user_email: email.into(),
                group: format!("{group}-{project}"),
                owner: Some(OwnerReference::project(project)),
            })
            .await
            .unwrap();
    }

    /// [`seeded_store`] behind [`FakeVerifier`].
    pub async fn seeded_state() -> AppState {
        state_with(seeded_store().await, Box::new(FakeVerifier))
    }

    /// Bob owns `PROJECT` where John is an editor and the service account is
    /// bound. Alice exists but is in no project. Nobody but the admin can
    /// reach `OTHER_PROJECT`.
    pub async fn seeded_store() -> Arc<InMemoryStore> {
        let presets = vec![
            Preset {
                name: "global".into(),
                fake: Some(ProviderCredentials::new(vec![FakeCredential {
                    name: "test".into(),
                    token: "global-token".into(),
                }])),
                ..Default::default()
            },
            Preset {
                name: "acme".into(),
                required_email_domain: "acme.com".into(),
                fake: Some(ProviderCredentials::new(vec![FakeCredential {
                    name: "test".into(),
                    token: "acme-token".into(),
                }])),
                ..Default::default()
            },
        ];
        let store = Arc::new(InMemoryStore::new().with_presets(presets));
        store.create_project(Project::new(PROJECT, "my-first-project")).await.unwrap();
        store.create_project(Project::new(OTHER_PROJECT, "other-project")).await.unwrap();
        store.create_user(User::new(JOHN_ID, "John", JOHN_EMAIL)).await.unwrap();
        store.create_user(User::new("alice-id", "Alice", ALICE_EMAIL)).await.unwrap();
        store.create_user(User::new(SA_ID, "ci", SA_EMAIL)).await.unwrap();
        bind(&store, PROJECT, BOB_EMAIL, "owners").await;
        bind(&store, PROJECT, JOHN_EMAIL, "editors").await;
        bind(&store, PROJECT, SA_EMAIL, "editors").await;
        store
    }

    /// No projects, users or bindings.
    pub async fn empty_state() -> AppState {
        state_with(Arc::new(InMemoryStore::new()), Box::new(FakeVerifier))
    }

    /// Wire `store` with `identity` in front of the service account verifier.
    pub fn state_with(store: Arc<InMemoryStore>, identity: Box<dyn TokenVerifier>) -> AppState {
        let issuer = Arc::new(ServiceAccountTokenAuthenticator::new(SIGNING_KEY).unwrap());
        let verifier = PluginAggregateVerifier::new(vec![
            identity,
            Box::new(ServiceAccountVerifier::new(issuer.clone(), store.clone())),
        ]);
        AppState::new(
            store,
            Arc::new(default_extractor("token", "token")),
            Arc::new(verifier),
            issuer,
            vec![ADMIN_EMAIL.to_string()],
        )
    }

    /// Send one request through `app` and decode the JSON body (`Null` when
    /// empty).
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(seeded_state().await);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn v1_requires_a_token() {
        let app = router(seeded_state().await);
        let (status, body) = send(&app, Method::GET, "/v1/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "not authorized");

        let (status, _) = send(&app, Method::GET, "/v1/me", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_is_accepted_from_query_and_cookie() {
        let app = router(seeded_state().await);
        let (status, body) = send(&app, Method::GET, &format!("/v1/me?token={BOB_TOKEN}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], BOB_EMAIL);

        let request = Request::builder()
            .uri("/v1/me")
            .header("cookie", format!("theme=dark; token={BOB_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = router(seeded_state().await);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/projects/{project_id}/users"));
        assert!(doc.paths.paths.contains_key("/v1/presets/cloud-credentials"));
        assert!(doc.paths.paths.contains_key("/v1/projects"));
        assert!(doc.paths.paths.contains_key("/v1/projects/{project_id}/serviceaccounts/{sa_id}"));
        assert!(doc.paths.paths.contains_key("/v1/me/settings"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
