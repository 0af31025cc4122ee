//! Identity value types shared by the extractor, resolver and guards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a user as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The channel an identity was established through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Cookie,
    Bearer,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Cookie => "cookie",
            CredentialSource::Bearer => "bearer",
        }
    }
}

/// Session tokens carried by the session cookies.
///
/// Either half may be missing; a refresh token alone can still renew a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCookies {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookies")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A renewed session issued by the provider.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SessionArtifact {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds, if the provider reports one.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl SessionArtifact {
    /// The cookie view of this session.
    pub fn as_cookies(&self) -> SessionCookies {
        SessionCookies {
            access_token: Some(self.access_token.clone()),
            refresh_token: Some(self.refresh_token.clone()),
        }
    }
}

impl fmt::Debug for SessionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionArtifact")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Caller identity resolved for one request.
///
/// Lives in the request extensions and is never cached across requests.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: UserId,
    pub access_token: Option<String>,
    pub source: CredentialSource,
}

impl fmt::Debug for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedIdentity")
            .field("user_id", &self.user_id)
            .field("has_access_token", &self.access_token.is_some())
            .field("source", &self.source)
            .finish()
    }
}
