//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → credentials.rs (Cookie + Authorization headers → Credentials)
//!     → resolver.rs (cookie session, then bearer token, via IdentityProvider)
//!     → middleware.rs (strict: 401/500, optional: continue)
//!     → ResolvedIdentity in request extensions
//! ```
//!
//! # Design Decisions
//! - Cookie channel has priority over the bearer channel
//! - Identity is resolved fresh on every request, never cached
//! - Session rotation is written back through `ResponseContext`

pub mod credentials;
pub mod identity;
pub mod middleware;
pub mod provider;
pub mod remote;
pub mod resolver;
pub mod session;

pub use credentials::{Credential, CredentialExtractor, Credentials};
pub use identity::{CredentialSource, ResolvedIdentity, SessionArtifact, SessionCookies, UserId};
pub use middleware::{optional_auth, require_auth, AuthState, MaybeIdentity};
pub use provider::{IdentityProvider, ProviderError, SignedIn, VerifiedSession};
pub use remote::RemoteIdentityProvider;
pub use resolver::{AuthError, IdentityResolver, ResolutionStrategy};
pub use session::{CookiePolicy, ResponseContext};
