//! Membership context and lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::auth::identity::ResolvedIdentity;
use crate::config::{MembershipConfig, TierConfig};
use crate::profile::{ProfileStore, ProfileStoreError};

/// Membership facts attached to a request after identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipContext {
    pub tier_name: String,
    pub tier_display_name: String,
    pub status: String,
    pub capabilities: BTreeSet<String>,
}

impl MembershipContext {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error(transparent)]
    Store(#[from] ProfileStoreError),
}

/// Produces the membership context for a resolved identity.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn lookup(&self, identity: &ResolvedIdentity) -> Result<MembershipContext, LookupError>;
}

/// Tier name → display name and capabilities.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: HashMap<String, TierConfig>,
    default_tier: String,
}

impl TierCatalog {
    pub fn from_config(config: &MembershipConfig) -> Self {
        Self {
            tiers: config
                .tiers
                .iter()
                .map(|t| (t.name.clone(), t.clone()))
                .collect(),
            default_tier: config.default_tier.clone(),
        }
    }

    /// Context for a tier tag; unknown or missing tags map to the default tier.
    pub fn context_for(&self, tier: Option<&str>, status: Option<&str>) -> MembershipContext {
        let requested = tier.unwrap_or(&self.default_tier);
        let entry = match self.tiers.get(requested) {
            Some(entry) => Some(entry),
            None => {
                tracing::warn!(tier = requested, "Unknown membership tier, using default");
                self.tiers.get(&self.default_tier)
            }
        };

        match entry {
            Some(entry) => MembershipContext {
                tier_name: entry.name.clone(),
                tier_display_name: entry.display_name.clone(),
                status: status.unwrap_or("active").to_string(),
                capabilities: entry.capabilities.iter().cloned().collect(),
            },
            // Validation guarantees the default tier is catalogued.
            None => MembershipContext {
                tier_name: self.default_tier.clone(),
                tier_display_name: self.default_tier.clone(),
                status: status.unwrap_or("active").to_string(),
                capabilities: BTreeSet::new(),
            },
        }
    }
}

/// Membership read from the profile record's tier fields.
pub struct ProfileMembership {
    profiles: Arc<dyn ProfileStore>,
    catalog: TierCatalog,
}

impl ProfileMembership {
    pub fn new(profiles: Arc<dyn ProfileStore>, catalog: TierCatalog) -> Self {
        Self { profiles, catalog }
    }
}

#[async_trait]
impl MembershipLookup for ProfileMembership {
    async fn lookup(&self, identity: &ResolvedIdentity) -> Result<MembershipContext, LookupError> {
        let profile = self
            .profiles
            .get(&identity.user_id, identity.access_token.as_deref())
            .await?;

        Ok(match profile {
            Some(p) => self.catalog.context_for(p.tier.as_deref(), p.tier_status.as_deref()),
            None => self.catalog.context_for(None, None),
        })
    }
}
