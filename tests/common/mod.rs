//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use gatehouse::auth::{
    IdentityProvider, ProviderError, SessionArtifact, SessionCookies, SignedIn, UserId, VerifiedSession,
};
use gatehouse::config::GateConfig;
use gatehouse::profile::InMemoryProfileStore;
use gatehouse::rate_limit::{InMemoryRateLimitStore, ManualClock};
use gatehouse::HttpServer;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const START_MS: u64 = 1_700_000_000_000;

// ---------------------------------------------------------------------------
// In-process identity provider
// ---------------------------------------------------------------------------

/// Identity provider with programmable answers.
#[derive(Default)]
pub struct MockProvider {
    tokens: DashMap<String, UserId>,
    refresh: DashMap<String, (UserId, SessionArtifact)>,
    accounts: DashMap<String, (String, UserId)>,
    faulty: AtomicBool,
    pub calls: AtomicUsize,
    pub deleted: Mutex<Vec<UserId>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str, user: &str) -> Self {
        self.tokens.insert(token.to_string(), UserId::new(user));
        self
    }

    /// `refresh` rotates into `new_access` / `new_refresh` for `user`.
    pub fn with_refresh(self, refresh: &str, user: &str, new_access: &str, new_refresh: &str) -> Self {
        self.refresh.insert(
            refresh.to_string(),
            (
                UserId::new(user),
                SessionArtifact {
                    access_token: new_access.to_string(),
                    refresh_token: new_refresh.to_string(),
                    expires_in: Some(3600),
                },
            ),
        );
        self
    }

    pub fn with_account(self, email: &str, password: &str, user: &str) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), UserId::new(user)));
        self
    }

    /// Every call fails with a fault while set.
    pub fn set_faulty(&self, faulty: bool) {
        self.faulty.store(faulty, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faulty.load(Ordering::SeqCst) {
            Err(ProviderError::Fault("provider unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn issue(&self, user: &UserId) -> SessionArtifact {
        let artifact = SessionArtifact {
            access_token: format!("access-{user}"),
            refresh_token: format!("refresh-{user}"),
            expires_in: Some(3600),
        };
        self.tokens.insert(artifact.access_token.clone(), user.clone());
        artifact
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn verify_session(&self, session: &SessionCookies) -> Result<VerifiedSession, ProviderError> {
        self.enter()?;
        if let Some(user_id) = session.access_token.as_ref().and_then(|t| self.tokens.get(t)) {
            return Ok(VerifiedSession {
                user_id: user_id.clone(),
                refreshed: None,
            });
        }
        match session.refresh_token.as_ref().and_then(|t| self.refresh.get(t)) {
            Some(entry) => {
                let (user_id, artifact) = entry.value().clone();
                self.tokens.insert(artifact.access_token.clone(), user_id.clone());
                Ok(VerifiedSession {
                    user_id,
                    refreshed: Some(artifact),
                })
            }
            None => Err(ProviderError::Rejected("invalid session".into())),
        }
    }

    async fn current_access_token(&self, session: &SessionCookies) -> Result<Option<String>, ProviderError> {
        self.enter()?;
        Ok(session.access_token.clone())
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, ProviderError> {
        self.enter()?;
        self.tokens
            .get(token)
            .map(|u| u.clone())
            .ok_or_else(|| ProviderError::Rejected("invalid token".into()))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), ProviderError> {
        self.enter()?;
        self.deleted.lock().unwrap().push(user_id.clone());
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError> {
        self.enter()?;
        let user_id = match self.accounts.get(email) {
            Some(entry) if entry.0 == password => entry.1.clone(),
            _ => return Err(ProviderError::Rejected("invalid login".into())),
        };
        let session = self.issue(&user_id);
        Ok(SignedIn {
            user_id,
            session: Some(session),
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError> {
        self.enter()?;
        if self.accounts.contains_key(email) {
            return Err(ProviderError::Rejected("already registered".into()));
        }
        let user_id = UserId::new(format!("user-{}", self.accounts.len() + 1));
        self.accounts
            .insert(email.to_string(), (password.to_string(), user_id.clone()));
        Ok(SignedIn { user_id, session: None })
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), ProviderError> {
        self.enter()
    }
}

// ---------------------------------------------------------------------------
// Router harness
// ---------------------------------------------------------------------------

/// Defaults with the admin surface on and non-secure cookies.
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config.identity.secure_cookies = false;
    config
}

/// A full router over in-memory backends and a manual clock.
pub struct TestApp {
    pub router: Router,
    pub provider: Arc<MockProvider>,
    pub profiles: Arc<InMemoryProfileStore>,
    pub store: Arc<InMemoryRateLimitStore>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new(config: GateConfig, provider: MockProvider) -> Self {
        let provider = Arc::new(provider);
        let profiles = Arc::new(InMemoryProfileStore::new());
        let store = Arc::new(InMemoryRateLimitStore::new());
        let clock = Arc::new(ManualClock::new(START_MS));

        let server = HttpServer::with_rate_limit_backend(
            config,
            provider.clone(),
            profiles.clone(),
            store.clone(),
            clock.clone(),
        );

        Self {
            router: server.router(),
            provider,
            profiles,
            store,
            clock,
        }
    }

    pub async fn send(&self, request: Request) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn bearer(uri: &str, token: &str) -> Request {
    get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Mock GoTrue server
// ---------------------------------------------------------------------------

pub const SERVICE_KEY: &str = "service-key";

/// Programmable state behind the mock auth API.
#[derive(Default)]
pub struct GoTrueState {
    /// access token → user id
    pub users: DashMap<String, String>,
    /// refresh token → user id
    pub refresh: DashMap<String, String>,
    /// email → (password, user id)
    pub accounts: DashMap<String, (String, String)>,
    pub fail_status: Mutex<Option<u16>>,
    pub delay: Mutex<Duration>,
    pub malformed: AtomicBool,
    pub deleted: Mutex<Vec<String>>,
    issued: AtomicUsize,
}

impl GoTrueState {
    pub fn fail_with(&self, status: Option<u16>) {
        *self.fail_status.lock().unwrap() = status;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    fn issue(&self, user_id: &str) -> Value {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        self.users.insert(access.clone(), user_id.to_string());
        self.refresh.insert(refresh.clone(), user_id.to_string());
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": user_id }
        })
    }
}

pub struct MockGoTrue {
    pub base_url: String,
    pub state: Arc<GoTrueState>,
}

/// Start the mock auth API on an ephemeral port.
pub async fn start_mock_gotrue() -> MockGoTrue {
    let state = Arc::new(GoTrueState::default());

    let app = Router::new()
        .route("/auth/v1/user", axum::routing::get(gotrue_user))
        .route("/auth/v1/token", post(gotrue_token))
        .route("/auth/v1/signup", post(gotrue_signup))
        .route("/auth/v1/recover", post(gotrue_recover))
        .route("/auth/v1/admin/users/{id}", delete(gotrue_delete))
        .layer(middleware::from_fn_with_state(state.clone(), gotrue_faults))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockGoTrue {
        base_url: format!("http://{addr}"),
        state,
    }
}

async fn gotrue_faults(State(state): State<Arc<GoTrueState>>, request: Request, next: Next) -> Response {
    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let fail = *state.fail_status.lock().unwrap();
    if let Some(status) = fail {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({ "msg": "injected failure" }))).into_response();
    }
    if state.malformed.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }
    next.run(request).await
}

fn rejected(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "msg": msg }))).into_response()
}

fn bearer_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn gotrue_user(State(state): State<Arc<GoTrueState>>, headers: HeaderMap) -> Response {
    match bearer_of(&headers).and_then(|t| state.users.get(&t).map(|u| u.clone())) {
        Some(id) => Json(json!({ "id": id, "aud": "authenticated" })).into_response(),
        None => rejected(StatusCode::UNAUTHORIZED, "invalid JWT"),
    }
}

#[derive(Deserialize)]
struct GrantQuery {
    grant_type: String,
}

async fn gotrue_token(
    State(state): State<Arc<GoTrueState>>,
    Query(query): Query<GrantQuery>,
    Json(body): Json<Value>,
) -> Response {
    match query.grant_type.as_str() {
        "refresh_token" => {
            let token = body["refresh_token"].as_str().unwrap_or_default();
            match state.refresh.remove(token) {
                Some((_, user_id)) => Json(state.issue(&user_id)).into_response(),
                None => rejected(StatusCode::BAD_REQUEST, "invalid refresh token"),
            }
        }
        "password" => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            let user_id = state
                .accounts
                .get(email)
                .filter(|a| a.0 == password)
                .map(|a| a.1.clone());
            match user_id {
                Some(user_id) => Json(state.issue(&user_id)).into_response(),
                None => rejected(StatusCode::BAD_REQUEST, "invalid login credentials"),
            }
        }
        _ => rejected(StatusCode::BAD_REQUEST, "unsupported grant"),
    }
}

/// Addresses on `instant.test` get a session right away; others await confirmation.
async fn gotrue_signup(State(state): State<Arc<GoTrueState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if state.accounts.contains_key(&email) {
        return rejected(StatusCode::UNPROCESSABLE_ENTITY, "user already registered");
    }
    let user_id = format!("user-{}", state.accounts.len() + 1);
    state.accounts.insert(email.clone(), (password, user_id.clone()));

    if email.ends_with("@instant.test") {
        Json(state.issue(&user_id)).into_response()
    } else {
        Json(json!({ "id": user_id, "email": email })).into_response()
    }
}

async fn gotrue_recover() -> Json<Value> {
    Json(json!({}))
}

async fn gotrue_delete(State(state): State<Arc<GoTrueState>>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if bearer_of(&headers).as_deref() != Some(SERVICE_KEY) {
        return rejected(StatusCode::UNAUTHORIZED, "service key required");
    }
    state.deleted.lock().unwrap().push(id);
    Json(json!({})).into_response()
}
