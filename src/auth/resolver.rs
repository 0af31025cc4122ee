//! Identity resolution.
//!
//! # Algorithm
//! ```text
//! credentials (cookie first, bearer second)
//!     → CookieSessionStrategy   verify_session, write rotated cookies,
//!                               fetch current access token
//!     → BearerTokenStrategy     verify_token, token kept verbatim
//!     → first success wins; otherwise Unauthenticated or ProviderFault
//! ```
//!
//! A rejected or faulted channel falls through to the next one. Under
//! [`CookieFaultPolicy::ShortCircuit`] a fault stops resolution instead.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::credentials::Credentials;
use crate::auth::identity::{CredentialSource, ResolvedIdentity};
use crate::auth::provider::{IdentityProvider, ProviderError};
use crate::auth::session::ResponseContext;
use crate::config::CookieFaultPolicy;
use crate::error::GateError;

/// Why no identity was produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No channel produced an identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// A channel could not be checked because the provider failed.
    #[error("identity provider fault: {0}")]
    ProviderFault(String),
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => GateError::Unauthenticated,
            AuthError::ProviderFault(_) => GateError::ProviderFault,
        }
    }
}

/// One credential channel.
///
/// `Ok(None)` means the channel has nothing to work with for this request.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn source(&self) -> CredentialSource;

    async fn attempt(
        &self,
        credentials: &Credentials,
        response: &mut ResponseContext,
    ) -> Result<Option<ResolvedIdentity>, ProviderError>;
}

/// Session cookies verified through the provider's session-aware path.
pub struct CookieSessionStrategy {
    provider: Arc<dyn IdentityProvider>,
}

impl CookieSessionStrategy {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ResolutionStrategy for CookieSessionStrategy {
    fn source(&self) -> CredentialSource {
        CredentialSource::Cookie
    }

    async fn attempt(
        &self,
        credentials: &Credentials,
        response: &mut ResponseContext,
    ) -> Result<Option<ResolvedIdentity>, ProviderError> {
        let Some(session) = credentials.cookie() else {
            return Ok(None);
        };

        let verified = self.provider.verify_session(session).await?;

        // Rotated tokens go out before anything else can fail.
        let effective = match &verified.refreshed {
            Some(artifact) => {
                tracing::debug!(user_id = %verified.user_id, "Session rotated during verification");
                response.write_session(artifact);
                artifact.as_cookies()
            }
            None => session.clone(),
        };

        let access_token = match self.provider.current_access_token(&effective).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id = %verified.user_id, error = %e, "Could not read access token for verified session");
                None
            }
        };

        Ok(Some(ResolvedIdentity {
            user_id: verified.user_id,
            access_token,
            source: CredentialSource::Cookie,
        }))
    }
}

/// `Authorization: Bearer` tokens verified statelessly.
pub struct BearerTokenStrategy {
    provider: Arc<dyn IdentityProvider>,
}

impl BearerTokenStrategy {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ResolutionStrategy for BearerTokenStrategy {
    fn source(&self) -> CredentialSource {
        CredentialSource::Bearer
    }

    async fn attempt(
        &self,
        credentials: &Credentials,
        _response: &mut ResponseContext,
    ) -> Result<Option<ResolvedIdentity>, ProviderError> {
        let Some(token) = credentials.bearer() else {
            return Ok(None);
        };

        let user_id = self.provider.verify_token(token).await?;
        Ok(Some(ResolvedIdentity {
            user_id,
            access_token: Some(token.to_string()),
            source: CredentialSource::Bearer,
        }))
    }
}

/// Evaluates strategies in priority order, short-circuiting on success.
pub struct IdentityResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    fault_policy: CookieFaultPolicy,
}

impl IdentityResolver {
    /// Cookie session first, bearer token second.
    pub fn new(provider: Arc<dyn IdentityProvider>, fault_policy: CookieFaultPolicy) -> Self {
        Self::with_strategies(
            vec![
                Box::new(CookieSessionStrategy::new(provider.clone())),
                Box::new(BearerTokenStrategy::new(provider)),
            ],
            fault_policy,
        )
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn ResolutionStrategy>>,
        fault_policy: CookieFaultPolicy,
    ) -> Self {
        Self {
            strategies,
            fault_policy,
        }
    }

    /// Resolve the caller. Runs fresh on every request; nothing is cached.
    pub async fn resolve(
        &self,
        credentials: &Credentials,
        response: &mut ResponseContext,
    ) -> Result<ResolvedIdentity, AuthError> {
        let mut fault = None;

        for strategy in &self.strategies {
            let source = strategy.source().as_str();
            match strategy.attempt(credentials, response).await {
                Ok(Some(identity)) => {
                    tracing::debug!(user_id = %identity.user_id, source, "Identity resolved");
                    return Ok(identity);
                }
                Ok(None) => {}
                Err(ProviderError::Rejected(reason)) => {
                    tracing::debug!(source, reason = %reason, "Credential rejected");
                }
                Err(ProviderError::Fault(reason)) => {
                    tracing::warn!(source, reason = %reason, "Identity provider fault");
                    if self.fault_policy == CookieFaultPolicy::ShortCircuit {
                        return Err(AuthError::ProviderFault(reason));
                    }
                    fault = Some(reason);
                }
            }
        }

        Err(fault.map_or(AuthError::Unauthenticated, AuthError::ProviderFault))
    }
}
