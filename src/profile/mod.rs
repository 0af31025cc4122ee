//! Profile records keyed by user id.
//!
//! The gate only consumes this seam: the membership lookup reads tiers
//! from it and the bundled handlers expose get/update/delete.

pub mod store;

pub use store::{InMemoryProfileStore, Profile, ProfileStore, ProfileStoreError, ProfileUpdate};
