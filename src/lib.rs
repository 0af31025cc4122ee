//! Authentication resolution, access gating and fixed-window rate limiting
//! for axum services.

pub mod access;
pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod profile;
pub mod rate_limit;

pub use config::schema::GateConfig;
pub use error::{GateError, GateResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
