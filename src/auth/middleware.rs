//! Authentication middleware.
//!
//! Two modes over the same resolver:
//! - [`require_auth`] halts with 401 (no identity) or 500 (provider fault).
//! - [`optional_auth`] never halts; any failure means "no identity".
//!
//! Both attach the [`ResolvedIdentity`] to the request extensions and
//! append rotated session cookies to the response, whatever its status.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::guards;
use crate::auth::credentials::{CredentialExtractor, Credentials};
use crate::auth::identity::ResolvedIdentity;
use crate::auth::provider::IdentityProvider;
use crate::auth::resolver::{AuthError, IdentityResolver};
use crate::auth::session::{CookiePolicy, ResponseContext};
use crate::config::IdentityConfig;
use crate::error::GateError;
use crate::observability::metrics;

/// State shared by both authentication middlewares.
#[derive(Clone)]
pub struct AuthState {
    pub provider: Arc<dyn IdentityProvider>,
    pub resolver: Arc<IdentityResolver>,
    pub extractor: CredentialExtractor,
    pub cookies: CookiePolicy,
}

impl AuthState {
    pub fn new(provider: Arc<dyn IdentityProvider>, config: &IdentityConfig) -> Self {
        Self {
            resolver: Arc::new(IdentityResolver::new(provider.clone(), config.cookie_fault_policy)),
            provider,
            extractor: CredentialExtractor::new(&config.access_cookie, &config.refresh_cookie),
            cookies: CookiePolicy::from_config(config),
        }
    }

    pub fn response_context(&self) -> ResponseContext {
        ResponseContext::new(self.cookies.clone())
    }

    /// Credentials are extracted up front so no borrow of the request
    /// is held across the provider call.
    async fn resolve(&self, credentials: Credentials, ctx: &mut ResponseContext) -> Result<ResolvedIdentity, AuthError> {
        self.resolver.resolve(&credentials, ctx).await
    }
}

fn outcome(result: &Result<ResolvedIdentity, AuthError>) -> &'static str {
    match result {
        Ok(_) => "resolved",
        Err(AuthError::Unauthenticated) => "unauthenticated",
        Err(AuthError::ProviderFault(_)) => "fault",
    }
}

/// Strict mode: reject requests without a resolvable identity.
pub async fn require_auth(State(state): State<AuthState>, mut request: Request, next: Next) -> Response {
    let mut ctx = state.response_context();
    let credentials = state.extractor.extract(request.headers());
    let result = state.resolve(credentials, &mut ctx).await;
    metrics::record_auth_resolution("strict", outcome(&result));

    let mut response = match result {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::Unauthenticated) => GateError::Unauthenticated.into_response(),
        Err(AuthError::ProviderFault(reason)) => {
            tracing::error!(reason = %reason, path = %request.uri().path(), "Authentication failed on provider fault");
            GateError::ProviderFault.into_response()
        }
    };

    ctx.apply(&mut response);
    response
}

/// Optional mode: continue with or without an identity, never halt.
pub async fn optional_auth(State(state): State<AuthState>, mut request: Request, next: Next) -> Response {
    let mut ctx = state.response_context();
    let credentials = state.extractor.extract(request.headers());
    let result = state.resolve(credentials, &mut ctx).await;
    metrics::record_auth_resolution("optional", outcome(&result));

    match result {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
        }
        Err(AuthError::ProviderFault(reason)) => {
            tracing::debug!(reason = %reason, "Continuing anonymously after provider fault");
        }
        Err(AuthError::Unauthenticated) => {}
    }

    let mut response = next.run(request).await;
    ctx.apply(&mut response);
    response
}

/// Handlers taking a `ResolvedIdentity` reject with 401 when none is attached.
impl<S> FromRequestParts<S> for ResolvedIdentity
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        guards::require_identity(parts.extensions.get::<ResolvedIdentity>()).cloned()
    }
}

/// Identity attached by upstream middleware, if any.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<ResolvedIdentity>);

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(parts.extensions.get::<ResolvedIdentity>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    use crate::auth::identity::{SessionCookies, UserId};
    use crate::auth::provider::{ProviderError, SignedIn, VerifiedSession};

    /// Every call fails as if the provider were unreachable.
    struct Unreachable;

    #[async_trait]
    impl IdentityProvider for Unreachable {
        async fn verify_session(&self, _session: &SessionCookies) -> Result<VerifiedSession, ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }

        async fn current_access_token(&self, _session: &SessionCookies) -> Result<Option<String>, ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }

        async fn verify_token(&self, _token: &str) -> Result<UserId, ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }

        async fn delete_user(&self, _user_id: &UserId) -> Result<(), ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }

        async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<SignedIn, ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> Result<SignedIn, ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }

        async fn request_password_reset(&self, _email: &str) -> Result<(), ProviderError> {
            Err(ProviderError::Fault("connection refused".into()))
        }
    }

    fn app() -> Router {
        let state = AuthState::new(Arc::new(Unreachable), &IdentityConfig::default());
        let strict = Router::new()
            .route("/strict", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
        let optional = Router::new()
            .route("/optional", get(|MaybeIdentity(id): MaybeIdentity| async move { id.is_none().to_string() }))
            .route_layer(middleware::from_fn_with_state(state, optional_auth));
        strict.merge(optional)
    }

    fn with_bearer(uri: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("authorization", "Bearer tok")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_both_modes_serve_as_router_layers() {
        let strict = app().oneshot(with_bearer("/strict")).await.unwrap();
        assert_eq!(strict.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let optional = app().oneshot(with_bearer("/optional")).await.unwrap();
        assert_eq!(optional.status(), StatusCode::OK);
        let body = axum::body::to_bytes(optional.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"true");
    }

    #[tokio::test]
    async fn test_strict_mode_without_credentials_is_401() {
        let response = app()
            .oneshot(Request::builder().uri("/strict").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
