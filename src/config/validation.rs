//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics (value ranges,
//! references between sections). All errors are collected, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GateConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeout,

    #[error("identity.base_url `{0}` is not a valid URL")]
    IdentityBaseUrl(String),

    #[error("identity.request_timeout_secs must be greater than zero")]
    IdentityTimeout,

    #[error("identity cookie names must be non-empty and distinct")]
    CookieNames,

    #[error("rate_limit.sweep_interval_secs must be greater than zero")]
    SweepInterval,

    #[error("rate limiter name `{0}` must be non-empty and must not contain `:`")]
    LimiterName(String),

    #[error("rate limiter `{0}`: window_ms must be greater than zero")]
    LimiterWindow(String),

    #[error("rate limiter `{0}`: max_requests must be greater than zero")]
    LimiterMax(String),

    #[error("membership tier `{0}` is referenced but not in the tier catalog")]
    UnknownTier(String),

    #[error("admin.api_key must be set when the admin surface is enabled")]
    AdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    let identity = &config.identity;
    if Url::parse(&identity.base_url).is_err() {
        errors.push(ValidationError::IdentityBaseUrl(identity.base_url.clone()));
    }
    if identity.request_timeout_secs == 0 {
        errors.push(ValidationError::IdentityTimeout);
    }
    if identity.access_cookie.is_empty()
        || identity.refresh_cookie.is_empty()
        || identity.access_cookie == identity.refresh_cookie
    {
        errors.push(ValidationError::CookieNames);
    }

    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::SweepInterval);
    }
    for (name, limiter) in &config.rate_limit.limiters {
        // Store keys are `{name}:{key}`; a `:` in the name would overlap namespaces.
        if name.is_empty() || name.contains(':') {
            errors.push(ValidationError::LimiterName(name.clone()));
        }
        if limiter.window_ms == 0 {
            errors.push(ValidationError::LimiterWindow(name.clone()));
        }
        if limiter.max_requests == 0 {
            errors.push(ValidationError::LimiterMax(name.clone()));
        }
    }

    let membership = &config.membership;
    let known = |tier: &str| membership.tiers.iter().any(|t| t.name == tier);
    for tier in std::iter::once(&membership.default_tier).chain(&membership.gated_tiers) {
        if !known(tier) {
            errors.push(ValidationError::UnknownTier(tier.clone()));
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::AdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
