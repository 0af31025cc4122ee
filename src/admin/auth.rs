use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::credentials::bearer_token;
use crate::error::GateError;

/// Bearer key guarding the admin routes.
#[derive(Clone)]
pub struct AdminKey(pub Arc<str>);

pub async fn admin_auth_middleware(State(key): State<AdminKey>, request: Request, next: Next) -> Response {
    match bearer_token(request.headers()) {
        Some(token) if !key.0.is_empty() && constant_time_eq(token.as_bytes(), key.0.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request");
            GateError::Unauthenticated.into_response()
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
