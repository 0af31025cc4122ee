//! Access gate subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedIdentity (from auth middleware, may be absent)
//!     → membership.rs (lookup → MembershipContext in extensions)
//!     → guards.rs require_identity   (401 when absent)
//!     → guards.rs require_capability (403 when tier not allowed)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Guards only inspect what upstream attached; they never resolve identity
//! - Guards are pure predicates; middleware adapts them to axum
//! - 401 (who are you) and 403 (not allowed) stay distinct

pub mod guards;
pub mod membership;
pub mod middleware;

pub use guards::{require_capability, require_identity, AllowedTiers};
pub use membership::{
    LookupError, MembershipContext, MembershipLookup, ProfileMembership, TierCatalog,
};
pub use middleware::{attach_membership, require_tier};
