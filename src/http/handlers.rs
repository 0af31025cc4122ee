//! Bundled route handlers.
//!
//! Each handler relies on the middleware in front of it: auth attaches the
//! identity, the access gate attaches membership, limiters run before any
//! of this code. Handlers only read what was attached.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::access::MembershipContext;
use crate::auth::identity::{ResolvedIdentity, SessionArtifact};
use crate::auth::middleware::MaybeIdentity;
use crate::auth::provider::{ProviderError, SignedIn};
use crate::error::{GateError, GateResult};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::profile::ProfileUpdate;

const MAX_FIELD_LEN: usize = 320;
const MAX_MESSAGE_LEN: usize = 5_000;
const MIN_PASSWORD_LEN: usize = 8;

/// JSON body, with malformed input reported through the error envelope.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> GateResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| GateError::bad_request(rejection.body_text()))
}

fn validate_email(email: &str) -> GateResult<()> {
    let email = email.trim();
    let valid = email.len() <= MAX_FIELD_LEN
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(GateError::bad_request("A valid email address is required"))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountBody {
    pub user_id: String,
    pub session_issued: bool,
}

fn with_session(state: &AppState, session: Option<&SessionArtifact>, mut response: Response) -> Response {
    if let Some(session) = session {
        let mut ctx = state.auth.response_context();
        ctx.write_session(session);
        ctx.apply(&mut response);
    }
    response
}

fn account_response(state: &AppState, signed_in: SignedIn, status: StatusCode, message: &str) -> Response {
    let body = AccountBody {
        user_id: signed_in.user_id.to_string(),
        session_issued: signed_in.session.is_some(),
    };
    let response = ApiResponse::data(body)
        .with_message(message)
        .with_status(status)
        .into_response();
    with_session(state, signed_in.session.as_ref(), response)
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<PasswordCredentials>, JsonRejection>,
) -> GateResult<Response> {
    let credentials = json_body(body)?;
    validate_email(&credentials.email)?;
    if credentials.password.is_empty() {
        return Err(GateError::bad_request("Password is required"));
    }

    match state
        .auth
        .provider
        .sign_in_with_password(credentials.email.trim(), &credentials.password)
        .await
    {
        Ok(signed_in) => {
            tracing::info!(user_id = %signed_in.user_id, "User signed in");
            Ok(account_response(&state, signed_in, StatusCode::OK, "Signed in"))
        }
        Err(ProviderError::Rejected(_)) => Err(GateError::bad_request("Invalid email or password")),
        Err(ProviderError::Fault(reason)) => {
            tracing::error!(reason = %reason, "Sign-in failed on provider fault");
            Err(GateError::ProviderFault)
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<PasswordCredentials>, JsonRejection>,
) -> GateResult<Response> {
    let credentials = json_body(body)?;
    validate_email(&credentials.email)?;
    if credentials.password.len() < MIN_PASSWORD_LEN {
        return Err(GateError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    match state
        .auth
        .provider
        .sign_up(credentials.email.trim(), &credentials.password)
        .await
    {
        Ok(signed_in) => {
            tracing::info!(user_id = %signed_in.user_id, confirmed = signed_in.session.is_some(), "User registered");
            let message = if signed_in.session.is_some() {
                "Account created"
            } else {
                "Account created, check your email to confirm it"
            };
            Ok(account_response(&state, signed_in, StatusCode::CREATED, message))
        }
        Err(ProviderError::Rejected(reason)) => {
            tracing::debug!(reason = %reason, "Registration rejected");
            Err(GateError::bad_request("Registration failed"))
        }
        Err(ProviderError::Fault(reason)) => {
            tracing::error!(reason = %reason, "Registration failed on provider fault");
            Err(GateError::ProviderFault)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Same answer whether or not the address exists.
pub async fn password_reset(
    State(state): State<AppState>,
    body: Result<Json<PasswordResetRequest>, JsonRejection>,
) -> GateResult<ApiResponse<()>> {
    let request = json_body(body)?;
    validate_email(&request.email)?;

    match state.auth.provider.request_password_reset(request.email.trim()).await {
        Ok(()) | Err(ProviderError::Rejected(_)) => Ok(ApiResponse::message(
            "If an account exists for that address, a reset link has been sent",
        )),
        Err(ProviderError::Fault(reason)) => {
            tracing::error!(reason = %reason, "Password reset failed on provider fault");
            Err(GateError::ProviderFault)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub async fn contact(body: Result<Json<ContactMessage>, JsonRejection>) -> GateResult<ApiResponse<()>> {
    let message = json_body(body)?;
    if message.name.trim().is_empty() || message.name.len() > MAX_FIELD_LEN {
        return Err(GateError::bad_request("Name is required"));
    }
    validate_email(&message.email)?;
    if message.message.trim().is_empty() || message.message.len() > MAX_MESSAGE_LEN {
        return Err(GateError::bad_request(format!(
            "Message must be between 1 and {MAX_MESSAGE_LEN} characters"
        )));
    }

    tracing::info!(from = %message.email.trim(), length = message.message.len(), "Contact message received");
    Ok(ApiResponse::message("Message received"))
}

pub async fn get_profile(State(state): State<AppState>, identity: ResolvedIdentity) -> GateResult<Response> {
    let profile = state
        .profiles
        .get(&identity.user_id, identity.access_token.as_deref())
        .await?
        .ok_or_else(|| GateError::not_found("Profile not found"))?;
    Ok(ApiResponse::data(profile).into_response())
}

pub async fn update_profile(
    State(state): State<AppState>,
    identity: ResolvedIdentity,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> GateResult<Response> {
    let update = json_body(body)?;
    if update.is_empty() {
        return Err(GateError::bad_request("No profile fields to update"));
    }
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    if update.display_name.as_ref().is_some_and(|n| n.len() > MAX_FIELD_LEN) {
        return Err(GateError::bad_request("Display name is too long"));
    }

    let profile = state
        .profiles
        .update(&identity.user_id, identity.access_token.as_deref(), update)
        .await?;
    tracing::info!(user_id = %identity.user_id, "Profile updated");
    Ok(ApiResponse::data(profile).with_message("Profile updated").into_response())
}

/// Delete the account at the provider, then local records, then the session.
pub async fn delete_account(State(state): State<AppState>, identity: ResolvedIdentity) -> GateResult<Response> {
    if let Err(e) = state.auth.provider.delete_user(&identity.user_id).await {
        tracing::error!(user_id = %identity.user_id, error = %e, "Account deletion failed");
        return Err(GateError::internal("Failed to delete account"));
    }
    state.profiles.delete(&identity.user_id).await?;
    tracing::info!(user_id = %identity.user_id, "Account deleted");

    let mut response = ApiResponse::message("Account deleted").into_response();
    let mut ctx = state.auth.response_context();
    ctx.clear_session();
    ctx.apply(&mut response);
    Ok(response)
}

pub async fn get_membership(membership: MembershipContext) -> ApiResponse<MembershipContext> {
    ApiResponse::data(membership)
}

#[derive(Debug, Serialize)]
pub struct Insights {
    pub tier: String,
    pub insights: Vec<&'static str>,
}

pub async fn premium_insights(identity: ResolvedIdentity, membership: MembershipContext) -> ApiResponse<Insights> {
    tracing::debug!(user_id = %identity.user_id, tier = %membership.tier_name, "Serving premium insights");
    ApiResponse::data(Insights {
        tier: membership.tier_display_name,
        insights: vec![
            "Weekly activity is trending up",
            "Most engagement happens on weekday mornings",
        ],
    })
}

#[derive(Debug, Serialize)]
pub struct Feed {
    pub personalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub items: Vec<&'static str>,
}

/// Public route that personalises when an identity happens to be present.
pub async fn feed(MaybeIdentity(identity): MaybeIdentity) -> ApiResponse<Feed> {
    let items = vec!["Welcome to the community", "New features this month"];
    ApiResponse::data(match identity {
        Some(identity) => Feed {
            personalized: true,
            user_id: Some(identity.user_id.to_string()),
            items,
        },
        None => Feed {
            personalized: false,
            user_id: None,
            items,
        },
    })
}
