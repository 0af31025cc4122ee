//! Access control middleware.
//! Attaches membership and enforces the identity and tier guards.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::guards::{self, AllowedTiers};
use crate::access::membership::{MembershipContext, MembershipLookup};
use crate::auth::identity::ResolvedIdentity;
use crate::error::GateError;
use crate::observability::metrics;

/// Look up and attach the caller's membership. Never rejects.
///
/// Without an identity there is nothing to look up; on lookup failure the
/// request continues without membership and the tier guard rejects later.
pub async fn attach_membership(
    State(lookup): State<Arc<dyn MembershipLookup>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(identity) = request.extensions().get::<ResolvedIdentity>().cloned() {
        match lookup.lookup(&identity).await {
            Ok(membership) => {
                tracing::debug!(user_id = %identity.user_id, tier = %membership.tier_name, "Membership attached");
                request.extensions_mut().insert(membership);
            }
            Err(e) => {
                tracing::warn!(user_id = %identity.user_id, error = %e, "Membership lookup failed");
            }
        }
    }
    next.run(request).await
}

/// Reject requests that reached this point without an identity.
pub async fn require_identity(request: Request, next: Next) -> Response {
    if let Err(rejection) = guards::require_identity(request.extensions().get::<ResolvedIdentity>()) {
        metrics::record_gate_rejection("identity");
        return rejection.into_response();
    }
    next.run(request).await
}

/// Reject requests whose membership tier is not in the allowed set.
pub async fn require_tier(State(allowed): State<Arc<AllowedTiers>>, request: Request, next: Next) -> Response {
    if let Err(rejection) = guards::require_capability(request.extensions().get::<MembershipContext>(), &allowed) {
        tracing::debug!(reason = ?rejection.code(), "Tier gate rejected request");
        metrics::record_gate_rejection("tier");
        return rejection.into_response();
    }
    next.run(request).await
}

/// Handlers taking a `MembershipContext` reject with 403 when none is attached.
impl<S> FromRequestParts<S> for MembershipContext
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<MembershipContext>().cloned().ok_or_else(|| {
            GateError::forbidden(guards::REASON_MEMBERSHIP_MISSING, "Membership information unavailable")
        })
    }
}
