//! Profile store seam and in-memory implementation.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::identity::UserId;
use crate::error::GateError;

/// A user's profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Membership tier tag (e.g. `free`, `premium`).
    pub tier: Option<String>,
    /// Billing status of the tier (e.g. `active`, `trialing`, `canceled`).
    pub tier_status: Option<String>,
    /// Seconds since epoch.
    pub updated_at: u64,
}

impl Profile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            email: None,
            tier: None,
            tier_status: None,
            updated_at: now_secs(),
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>, status: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self.tier_status = Some(status.into());
        self
    }
}

/// Partial update; only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none()
    }

    fn apply(self, profile: &mut Profile) {
        if let Some(name) = self.display_name {
            profile.display_name = Some(name);
        }
        if let Some(email) = self.email {
            profile.email = Some(email);
        }
        profile.updated_at = now_secs();
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileStoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),

    #[error("access to profile denied")]
    Denied,
}

impl From<ProfileStoreError> for GateError {
    fn from(err: ProfileStoreError) -> Self {
        match err {
            ProfileStoreError::Unavailable(reason) => {
                tracing::error!(reason = %reason, "Profile store unavailable");
                GateError::internal("Profile service unavailable")
            }
            ProfileStoreError::Denied => GateError::forbidden("profile_denied", "Access to profile denied"),
        }
    }
}

/// Keyed CRUD on profile records.
///
/// `access_token` scopes the call to the caller for row-level authorization
/// in stores that support it.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &UserId, access_token: Option<&str>) -> Result<Option<Profile>, ProfileStoreError>;

    async fn update(
        &self,
        user_id: &UserId,
        access_token: Option<&str>,
        update: ProfileUpdate,
    ) -> Result<Profile, ProfileStoreError>;

    async fn delete(&self, user_id: &UserId) -> Result<(), ProfileStoreError>;
}

/// Process-local profile store.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<UserId, Profile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a whole record.
    pub fn upsert(&self, profile: Profile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user_id: &UserId, access_token: Option<&str>) -> Result<Option<Profile>, ProfileStoreError> {
        tracing::trace!(user_id = %user_id, scoped = access_token.is_some(), "Profile read");
        Ok(self.profiles.get(user_id).map(|p| p.value().clone()))
    }

    async fn update(
        &self,
        user_id: &UserId,
        access_token: Option<&str>,
        update: ProfileUpdate,
    ) -> Result<Profile, ProfileStoreError> {
        tracing::trace!(user_id = %user_id, scoped = access_token.is_some(), "Profile update");
        let mut entry = self
            .profiles
            .entry(user_id.clone())
            .or_insert_with(|| Profile::new(user_id.clone()));
        update.apply(entry.value_mut());
        Ok(entry.value().clone())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), ProfileStoreError> {
        self.profiles.remove(user_id);
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
