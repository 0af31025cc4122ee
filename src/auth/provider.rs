//! Identity provider seam.
//!
//! The gate never verifies credentials itself. It asks an [`IdentityProvider`]
//! and classifies every answer as either a definite rejection or a fault.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::identity::{SessionArtifact, SessionCookies, UserId};

/// Failure reported by an identity provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The credential is invalid, expired or revoked.
    #[error("credential rejected: {0}")]
    Rejected(String),

    /// The provider could not give an answer (network, timeout, bad payload).
    #[error("identity provider fault: {0}")]
    Fault(String),
}

impl ProviderError {
    pub fn is_fault(&self) -> bool {
        matches!(self, ProviderError::Fault(_))
    }
}

/// Result of a session verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub user_id: UserId,
    /// Present when verification rotated the session.
    pub refreshed: Option<SessionArtifact>,
}

/// Result of a password sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user_id: UserId,
    /// Absent when the provider requires confirmation before issuing a session.
    pub session: Option<SessionArtifact>,
}

/// External system of record for authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a cookie session. May rotate the session as a side effect.
    async fn verify_session(&self, session: &SessionCookies) -> Result<VerifiedSession, ProviderError>;

    /// Access token associated with a (possibly refreshed) session.
    async fn current_access_token(
        &self,
        session: &SessionCookies,
    ) -> Result<Option<String>, ProviderError>;

    /// Stateless verification of a raw bearer token.
    async fn verify_token(&self, token: &str) -> Result<UserId, ProviderError>;

    /// Delete a user; the provider cascades to dependent records.
    async fn delete_user(&self, user_id: &UserId) -> Result<(), ProviderError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignedIn, ProviderError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedIn, ProviderError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), ProviderError>;
}
