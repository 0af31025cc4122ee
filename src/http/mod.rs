//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, body limit, timeout)
//!     → route group guard chain:
//!         auth (strict | optional) → rate limit → membership → tier gate
//!     → handlers.rs
//!     → response.rs / error envelope → client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use response::ApiResponse;
pub use server::{AppState, HttpServer};
