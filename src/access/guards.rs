//! Pure access predicates. No I/O; failures are structured [`GateError`]s.

use std::collections::BTreeSet;

use crate::access::membership::MembershipContext;
use crate::auth::identity::ResolvedIdentity;
use crate::error::{GateError, GateResult};

pub const REASON_TIER_REQUIRED: &str = "tier_required";
pub const REASON_MEMBERSHIP_MISSING: &str = "membership_missing";

/// Fixed set of tier tags admitted by a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedTiers(BTreeSet<String>);

impl AllowedTiers {
    pub fn new<I, T>(tiers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(tiers.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, tier: &str) -> bool {
        self.0.contains(tier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Pass iff upstream attached an identity. Never resolves one itself.
pub fn require_identity(identity: Option<&ResolvedIdentity>) -> GateResult<&ResolvedIdentity> {
    identity.ok_or(GateError::Unauthenticated)
}

/// Pass iff the membership tier is one of `allowed`.
pub fn require_capability<'a>(
    membership: Option<&'a MembershipContext>,
    allowed: &AllowedTiers,
) -> GateResult<&'a MembershipContext> {
    let Some(membership) = membership else {
        return Err(GateError::forbidden(
            REASON_MEMBERSHIP_MISSING,
            "Membership information unavailable",
        ));
    };

    if allowed.contains(&membership.tier_name) {
        Ok(membership)
    } else {
        Err(GateError::forbidden(
            REASON_TIER_REQUIRED,
            format!(
                "This feature requires one of: {}",
                allowed.iter().collect::<Vec<_>>().join(", ")
            ),
        ))
    }
}
