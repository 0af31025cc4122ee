//! HTTP identity provider for GoTrue-style auth APIs.
//!
//! # Endpoints
//! - `GET    auth/v1/user`                          verify an access token
//! - `POST   auth/v1/token?grant_type=refresh_token` rotate a session
//! - `POST   auth/v1/token?grant_type=password`      sign in
//! - `POST   auth/v1/signup`                         sign up
//! - `POST   auth/v1/recover`                        password reset mail
//! - `DELETE auth/v1/admin/users/{id}`               delete (service key)
//!
//! # Error classification
//! 400/401/403/404/422 are definite rejections. Everything else that is not
//! a success (transport errors, timeouts, 5xx, 429, undecodable bodies) is a
//! fault, so callers can tell "bad credential" from "provider down".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::auth::identity::{SessionArtifact, SessionCookies, UserId};
use crate::auth::provider::{IdentityProvider, ProviderError, SignedIn, VerifiedSession};
use crate::config::IdentityConfig;

/// Construction failure.
#[derive(Debug, Error)]
pub enum RemoteProviderError {
    #[error("invalid identity base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GrantBody {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    user: UserBody,
}

impl GrantBody {
    fn into_signed_in(self) -> SignedIn {
        SignedIn {
            user_id: UserId::new(self.user.id),
            session: Some(SessionArtifact {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_in: self.expires_in,
            }),
        }
    }
}

/// Sign-up answers with a session, or with the bare user when confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(GrantBody),
    User(UserBody),
}

/// Identity provider backed by a remote auth API.
#[derive(Debug, Clone)]
pub struct RemoteIdentityProvider {
    client: Client,
    base_url: Url,
    anon_key: String,
    service_role_key: String,
}

impl RemoteIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, RemoteProviderError> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Fault(format!("bad endpoint {path}: {e}")))
    }

    /// Admin endpoint for one user. The id is pushed as a single
    /// percent-encoded path segment.
    fn user_endpoint(&self, user_id: &UserId) -> Result<Url, ProviderError> {
        let mut url = self.endpoint("auth/v1/admin/users")?;
        let shown = url.to_string();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Fault(format!("base URL cannot carry a path: {shown}")))?
            .push(user_id.as_str());
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| ProviderError::Fault(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Fault(format!("malformed response: {e}")))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<UserId, ProviderError> {
        let url = self.endpoint("auth/v1/user")?;
        let user: UserBody = self.send(self.client.get(url).bearer_auth(access_token)).await?;
        Ok(UserId::new(user.id))
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<GrantBody, ProviderError> {
        let url = self.endpoint("auth/v1/token")?;
        self.send(
            self.client
                .post(url)
                .query(&[("grant_type", grant_type)])
                .json(&body),
        )
        .await
    }
}

/// Map a non-success status to a provider error.
pub fn classify(status: StatusCode) -> ProviderError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::UNPROCESSABLE_ENTITY => ProviderError::Rejected(format!("provider answered {status}")),
        _ => ProviderError::Fault(format!("provider answered {status}")),
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn verify_session(&self, session: &SessionCookies) -> Result<VerifiedSession, ProviderError> {
        if let Some(access_token) = &session.access_token {
            match self.fetch_user(access_token).await {
                Ok(user_id) => return Ok(VerifiedSession { user_id, refreshed: None }),
                // Expired access token; a refresh token may still renew it.
                Err(ProviderError::Rejected(_)) if session.refresh_token.is_some() => {}
                Err(e) => return Err(e),
            }
        }

        let Some(refresh_token) = &session.refresh_token else {
            return Err(ProviderError::Rejected("session has no tokens".into()));
        };

        let grant = self
            .grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        let signed_in = grant.into_signed_in();
        Ok(VerifiedSession {
            user_id: signed_in.user_id,
            refreshed: signed_in.session,
        })
    }

    async fn current_access_token(&self, session: &SessionCookies) -> Result<Option<String>, ProviderError> {
        Ok(session.access_token.clone())
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, ProviderError> {
        self.fetch_user(token).await
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), ProviderError> {
        let url = self.user_endpoint(user_id)?;
        let response = self
            .client
            .delete(url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| ProviderError::Fault(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(classify(status))
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError> {
        let grant = self
            .grant("password", json!({ "email": email, "password": password }))
            .await?;
        Ok(grant.into_signed_in())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError> {
        let url = self.endpoint("auth/v1/signup")?;
        let body: SignUpBody = self
            .send(self.client.post(url).json(&json!({ "email": email, "password": password })))
            .await?;

        Ok(match body {
            SignUpBody::Session(grant) => grant.into_signed_in(),
            SignUpBody::User(user) => SignedIn {
                user_id: UserId::new(user.id),
                session: None,
            },
        })
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        let url = self.endpoint("auth/v1/recover")?;
        let _: serde_json::Value = self
            .send(self.client.post(url).json(&json!({ "email": email })))
            .await?;
        Ok(())
    }
}
