//! Admin introspection endpoints, behind `Authorization: Bearer <api key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::{admin_auth_middleware, AdminKey};
use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router(api_key: &str) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rate-limits", get(get_rate_limits))
        .route("/admin/rate-limits/sweep", post(sweep))
        .route_layer(middleware::from_fn_with_state(AdminKey(api_key.into()), admin_auth_middleware))
}
